use serde::{Deserialize, Serialize};

pub const TIMELINE_COUNT: usize = 3;
pub const EVENTS_PER_TIMELINE: usize = 5;
pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;
pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub enum Theme {
    Safe,
    Risk,
    Chaos,
}

impl Theme {
    pub const ALL: [Theme; TIMELINE_COUNT] = [Theme::Safe, Theme::Risk, Theme::Chaos];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Safe => "Safe",
            Theme::Risk => "Risk",
            Theme::Chaos => "Chaos",
        }
    }

    /// Conventional timeline label for this theme.
    pub fn label(self) -> &'static str {
        match self {
            Theme::Safe => "A",
            Theme::Risk => "B",
            Theme::Chaos => "C",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInput {
    pub age: u32,
    pub occupation: String,
    pub regret: String,
    pub decision: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub year: i32,
    pub title: String,
    pub description: String,
    pub happiness: u8,
    pub wealth: u8,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: String,
    pub theme: Theme,
    pub description: String,
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub timelines: Vec<Timeline>,
}

impl SimulationResult {
    pub fn timeline(&self, theme: Theme) -> Option<&Timeline> {
        self.timelines.iter().find(|t| t.theme == theme)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceStatus {
    Saved,
    Fallback,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceRecord {
    pub key: String,
    pub timestamp: i64,
    pub status: PersistenceStatus,
}

impl PersistenceRecord {
    pub fn is_fallback(&self) -> bool {
        self.status == PersistenceStatus::Fallback
    }
}
