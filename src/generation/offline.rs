//! Canned timelines for demos and for running the service without model
//! credentials. Narrative text is filled from the scenario, scores are fixed.

use async_trait::async_trait;
use tracing::info;

use super::{SimulationGenerator, current_year};
use crate::config::GenerationMode;
use crate::core::{
    GenerationError, ScenarioInput, SimulationResult, Theme, Timeline, TimelineEvent,
    check_invariants,
};

struct Beat {
    title: &'static str,
    diary: &'static str,
    happiness: u8,
    wealth: u8,
}

const fn beat(title: &'static str, diary: &'static str, happiness: u8, wealth: u8) -> Beat {
    Beat {
        title,
        diary,
        happiness,
        wealth,
    }
}

struct Script {
    theme: Theme,
    summary: &'static str,
    beats: [Beat; 5],
}

const SCRIPTS: [Script; 3] = [
    Script {
        theme: Theme::Safe,
        summary: "The steady, predictable path forward",
        beats: [
            beat(
                "Stability Achieved",
                "I chose the safe route. {decision} seemed too risky, so I stayed a {occupation}. The routine brings peace of mind, even if excitement is rare.",
                70,
                65,
            ),
            beat(
                "Incremental Progress",
                "A modest promotion this year. {regret} still crosses my mind sometimes, but I have made peace with it. My savings grow steadily.",
                72,
                72,
            ),
            beat(
                "Comfortable Plateau",
                "The decision to avoid {decision} feels distant now. Friends say I seem content, and I wonder if content is the same as happy.",
                75,
                78,
            ),
            beat(
                "Reflection Phase",
                "Financially secure, emotionally stable. Sometimes I wonder what would have happened if I had taken the risk. The what-ifs are quieter now.",
                74,
                82,
            ),
            beat(
                "Peaceful Resolution",
                "Five years later I understand why I chose this path. Being a {occupation} gave me a foundation for everything else. My life is good.",
                80,
                85,
            ),
        ],
    },
    Script {
        theme: Theme::Risk,
        summary: "The bold leap into the unknown",
        beats: [
            beat(
                "The Leap of Faith",
                "I did it. {decision}. I actually went through with it. The first months are terrifying and exhilarating. I'm scared, but I'm alive.",
                60,
                45,
            ),
            beat(
                "Struggling to Swim",
                "Year two is brutal. Money is tight and stress is high, but there are moments of breakthrough that make it all worthwhile.",
                55,
                40,
            ),
            beat(
                "First Real Win",
                "Something finally clicked. The work is paying off and people are noticing. {regret} feels like it belongs to someone else.",
                75,
                60,
            ),
            beat(
                "Scaling Up",
                "Growth brings new problems, but they are better problems. I hired my first help and slept a full night for the first time in months.",
                78,
                75,
            ),
            beat(
                "No Regrets",
                "Looking back, {decision} was the hinge my life turned on. It cost me a lot and gave me more. I would do it again.",
                85,
                80,
            ),
        ],
    },
    Script {
        theme: Theme::Chaos,
        summary: "Entropy takes the wheel",
        beats: [
            beat(
                "Unexpected Detour",
                "Before I could decide on {decision}, a stranger's offer sent me to a city I had never heard of. My life as a {occupation} ended on a Tuesday.",
                50,
                50,
            ),
            beat(
                "Strange Fortunes",
                "I won a small lottery, lost it in a failed food truck, then found a new calling teaching tango. None of this was planned.",
                65,
                35,
            ),
            beat(
                "The Collapse",
                "Everything fell apart at once. The apartment, the relationship, the savings. I laughed about it, which worried everyone.",
                30,
                15,
            ),
            beat(
                "Rebuilding From Static",
                "I started again with nothing and a notebook. {regret} became a story I tell at parties. Strangers keep offering me work.",
                60,
                40,
            ),
            beat(
                "A New Equilibrium",
                "Somehow the chaos settled into a shape I recognise as mine. Nothing went to plan, and I have never felt more awake.",
                78,
                55,
            ),
        ],
    },
];

pub struct OfflineGenerator {
    year: Option<i32>,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self { year: None }
    }

    pub fn with_year(year: i32) -> Self {
        Self { year: Some(year) }
    }

    pub fn build(&self, input: &ScenarioInput) -> Result<SimulationResult, GenerationError> {
        let first_year = self.year.unwrap_or_else(current_year) + 1;
        let regret = if input.regret.is_empty() {
            "My old doubts"
        } else {
            input.regret.as_str()
        };
        let timelines = SCRIPTS
            .iter()
            .map(|script| Timeline {
                id: script.theme.label().to_string(),
                theme: script.theme,
                description: script.summary.to_string(),
                events: script
                    .beats
                    .iter()
                    .zip(first_year..)
                    .map(|(b, year)| TimelineEvent {
                        year,
                        title: b.title.to_string(),
                        description: fill(b.diary, input, regret),
                        happiness: b.happiness,
                        wealth: b.wealth,
                    })
                    .collect(),
            })
            .collect();

        let result = SimulationResult { timelines };
        check_invariants(&result)?;
        Ok(result)
    }
}

/// Substitutes the scenario placeholders in one pass; braces inside the
/// substituted text are left as written.
fn fill(template: &str, input: &ScenarioInput, regret: &str) -> String {
    let slots = [
        ("{decision}", input.decision.as_str()),
        ("{occupation}", input.occupation.as_str()),
        ("{regret}", regret),
    ];
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, consumed) = slots
            .iter()
            .find(|(name, _)| tail.starts_with(name))
            .map_or(("{", 1), |(name, value)| (*value, name.len()));
        out.push_str(value);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimulationGenerator for OfflineGenerator {
    fn mode(&self) -> GenerationMode {
        GenerationMode::Offline
    }

    async fn generate(
        &self,
        input: &ScenarioInput,
        _runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError> {
        info!(age = input.age, "building offline timelines");
        self.build(input)
    }
}
