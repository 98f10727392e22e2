//! Structured-output schema for a simulation response.
//!
//! The same static descriptor is rendered into the model request and walked
//! to check whatever text comes back, so the two cannot drift apart.

use serde_json::{Map, Value, json};
use tracing::warn;

use super::error::GenerationError;
use super::types::{
    EVENTS_PER_TIMELINE, SCORE_MAX, SCORE_MIN, SimulationResult, TIMELINE_COUNT, Theme,
};

pub const DIARY_WORD_LIMIT: usize = 150;

#[derive(Debug)]
pub enum Node {
    Object(&'static [Field]),
    Array { items: &'static Node, len: usize },
    Integer { min: Option<i64>, max: Option<i64> },
    Text { non_empty: bool, allowed: &'static [&'static str] },
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub node: Node,
}

const fn field(name: &'static str, description: &'static str, node: Node) -> Field {
    Field {
        name,
        description: Some(description),
        node,
    }
}

const SCORE: Node = Node::Integer {
    min: Some(SCORE_MIN),
    max: Some(SCORE_MAX),
};

const PLAIN_TEXT: Node = Node::Text {
    non_empty: false,
    allowed: &[],
};

const EVENT_FIELDS: &[Field] = &[
    field(
        "year",
        "The year of the event (Current year + n)",
        Node::Integer {
            min: None,
            max: None,
        },
    ),
    field(
        "title",
        "Short headline of the life event",
        Node::Text {
            non_empty: true,
            allowed: &[],
        },
    ),
    field(
        "description",
        "A first-person diary entry (max 150 words) describing the event, feelings, and consequences.",
        PLAIN_TEXT,
    ),
    field("happiness", "Happiness score from 0 to 100", SCORE),
    field("wealth", "Wealth/Financial score from 0 to 100", SCORE),
];

pub const EVENT: Node = Node::Object(EVENT_FIELDS);

const TIMELINE_FIELDS: &[Field] = &[
    field("id", "Timeline ID (A, B, or C)", PLAIN_TEXT),
    Field {
        name: "theme",
        description: None,
        node: Node::Text {
            non_empty: true,
            allowed: &["Safe", "Risk", "Chaos"],
        },
    },
    field(
        "description",
        "A short summary of this timeline's vibe",
        PLAIN_TEXT,
    ),
    Field {
        name: "events",
        description: None,
        node: Node::Array {
            items: &EVENT,
            len: EVENTS_PER_TIMELINE,
        },
    },
];

pub const TIMELINE: Node = Node::Object(TIMELINE_FIELDS);

pub const SIMULATION: Node = Node::Object(&[Field {
    name: "timelines",
    description: None,
    node: Node::Array {
        items: &TIMELINE,
        len: TIMELINE_COUNT,
    },
}]);

impl Node {
    /// Renders the descriptor in the model API's response-schema dialect.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Object(fields) => {
                let mut properties = Map::new();
                for f in fields.iter() {
                    let mut prop = f.node.to_json();
                    if let (Some(desc), Value::Object(obj)) = (f.description, &mut prop) {
                        obj.insert("description".to_string(), json!(desc));
                    }
                    properties.insert(f.name.to_string(), prop);
                }
                let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                    "propertyOrdering": required,
                })
            }
            Node::Array { items, len } => json!({
                "type": "ARRAY",
                "items": items.to_json(),
                "minItems": len,
                "maxItems": len,
            }),
            Node::Integer { min, max } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("INTEGER"));
                if let Some(min) = min {
                    obj.insert("minimum".to_string(), json!(min));
                }
                if let Some(max) = max {
                    obj.insert("maximum".to_string(), json!(max));
                }
                Value::Object(obj)
            }
            Node::Text { allowed, .. } => {
                if allowed.is_empty() {
                    json!({ "type": "STRING" })
                } else {
                    json!({ "type": "STRING", "enum": allowed })
                }
            }
        }
    }

    /// Walks `value` against the descriptor, reporting the first mismatch with
    /// its JSON path.
    pub fn check(&self, value: &Value, path: &str) -> Result<(), String> {
        match self {
            Node::Object(fields) => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| format!("{path}: expected an object"))?;
                for f in fields.iter() {
                    let child = format!("{path}.{}", f.name);
                    match obj.get(f.name) {
                        Some(v) if !v.is_null() => f.node.check(v, &child)?,
                        _ => return Err(format!("{child}: missing required field")),
                    }
                }
                Ok(())
            }
            Node::Array { items, len } => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| format!("{path}: expected an array"))?;
                if arr.len() != *len {
                    return Err(format!(
                        "{path}: expected exactly {len} entries, got {}",
                        arr.len()
                    ));
                }
                for (i, item) in arr.iter().enumerate() {
                    items.check(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            Node::Integer { min, max } => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| format!("{path}: expected an integer"))?;
                if min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m) {
                    return Err(format!(
                        "{path}: {v} outside [{}, {}]",
                        min.unwrap_or(i64::MIN),
                        max.unwrap_or(i64::MAX)
                    ));
                }
                Ok(())
            }
            Node::Text { non_empty, allowed } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{path}: expected a string"))?;
                if *non_empty && s.trim().is_empty() {
                    return Err(format!("{path}: must not be empty"));
                }
                if !allowed.is_empty() && !allowed.iter().any(|a| *a == s) {
                    return Err(format!("{path}: `{s}` is not one of {allowed:?}"));
                }
                Ok(())
            }
        }
    }
}

pub fn response_schema() -> Value {
    SIMULATION.to_json()
}

/// Parses model output into a `SimulationResult`, rejecting anything that does
/// not satisfy the schema and the cross-field invariants.
pub fn accept_response(
    text: &str,
    expected_first_year: Option<i32>,
) -> Result<SimulationResult, GenerationError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| GenerationError::malformed(format!("invalid JSON: {e}")))?;
    accept_value(value, expected_first_year)
}

pub fn accept_value(
    value: Value,
    expected_first_year: Option<i32>,
) -> Result<SimulationResult, GenerationError> {
    SIMULATION.check(&value, "$").map_err(GenerationError::malformed)?;
    let mut result: SimulationResult =
        serde_json::from_value(value).map_err(|e| GenerationError::malformed(e.to_string()))?;
    check_invariants(&result)?;

    result.timelines.sort_by_key(|t| t.theme);
    warn_soft_limits(&result, expected_first_year);
    Ok(result)
}

/// Cross-field invariants the per-node walk cannot express: one timeline per
/// theme and strictly ascending years.
pub fn check_invariants(result: &SimulationResult) -> Result<(), GenerationError> {
    if result.timelines.len() != TIMELINE_COUNT {
        return Err(GenerationError::malformed(format!(
            "expected {TIMELINE_COUNT} timelines, got {}",
            result.timelines.len()
        )));
    }
    for theme in Theme::ALL {
        let count = result.timelines.iter().filter(|t| t.theme == theme).count();
        if count != 1 {
            return Err(GenerationError::malformed(format!(
                "expected exactly one {} timeline, got {count}",
                theme.as_str()
            )));
        }
    }
    for timeline in &result.timelines {
        if timeline.events.len() != EVENTS_PER_TIMELINE {
            return Err(GenerationError::malformed(format!(
                "{} timeline has {} events, expected {EVENTS_PER_TIMELINE}",
                timeline.theme.as_str(),
                timeline.events.len()
            )));
        }
        for event in &timeline.events {
            if i64::from(event.happiness) > SCORE_MAX || i64::from(event.wealth) > SCORE_MAX {
                return Err(GenerationError::malformed(format!(
                    "{} timeline year {} has a score above {SCORE_MAX}",
                    timeline.theme.as_str(),
                    event.year
                )));
            }
            if event.title.trim().is_empty() {
                return Err(GenerationError::malformed(format!(
                    "{} timeline year {} has an empty title",
                    timeline.theme.as_str(),
                    event.year
                )));
            }
        }
        if let Some(pair) = timeline.events.windows(2).find(|w| w[1].year <= w[0].year) {
            return Err(GenerationError::malformed(format!(
                "{} timeline years not ascending: {} then {}",
                timeline.theme.as_str(),
                pair[0].year,
                pair[1].year
            )));
        }
    }
    Ok(())
}

fn warn_soft_limits(result: &SimulationResult, expected_first_year: Option<i32>) {
    for timeline in &result.timelines {
        if let (Some(expected), Some(first)) = (expected_first_year, timeline.events.first()) {
            if first.year != expected {
                warn!(
                    theme = timeline.theme.as_str(),
                    expected,
                    actual = first.year,
                    "timeline does not start at the requested year"
                );
            }
        }
        for event in &timeline.events {
            let words = event.description.split_whitespace().count();
            if words > DIARY_WORD_LIMIT {
                warn!(
                    theme = timeline.theme.as_str(),
                    year = event.year,
                    words,
                    "diary entry exceeds the advisory word limit"
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub fn event(year: i32, happiness: i64, wealth: i64) -> Value {
        json!({
            "year": year,
            "title": format!("Year {year}"),
            "description": "I woke up and everything had changed.",
            "happiness": happiness,
            "wealth": wealth,
        })
    }

    pub fn timeline(id: &str, theme: &str, first_year: i32) -> Value {
        let events: Vec<Value> = (0..5).map(|i| event(first_year + i, 50, 50)).collect();
        json!({
            "id": id,
            "theme": theme,
            "description": format!("The {theme} path"),
            "events": events,
        })
    }

    pub fn simulation(first_year: i32) -> Value {
        json!({
            "timelines": [
                timeline("A", "Safe", first_year),
                timeline("B", "Risk", first_year),
                timeline("C", "Chaos", first_year),
            ]
        })
    }
}
