use serde::Deserialize;
use serde_json::Value;

use super::error::ValidationError;
use super::types::{MAX_AGE, MIN_AGE, ScenarioInput};

/// A scenario exactly as submitted. Front-ends send form values, so `age` may be
/// a number or a numeric string.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawScenario {
    pub age: Option<Value>,
    pub occupation: Option<String>,
    pub regret: Option<String>,
    pub decision: Option<String>,
}

pub fn validate(raw: RawScenario) -> Result<ScenarioInput, ValidationError> {
    let occupation = required_text(raw.occupation, "occupation")?;
    let decision = required_text(raw.decision, "decision")?;
    let age = parse_age(raw.age.as_ref())?;
    let regret = raw.regret.map(|r| r.trim().to_string()).unwrap_or_default();

    Ok(ScenarioInput {
        age,
        occupation,
        regret,
        decision,
    })
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn parse_age(value: Option<&Value>) -> Result<u32, ValidationError> {
    let out_of_range = ValidationError::OutOfRange {
        min: MIN_AGE,
        max: MAX_AGE,
    };
    let age = match value {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => v,
            None => match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
                _ => return Err(out_of_range),
            },
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| out_of_range.clone())?,
        _ => return Err(out_of_range),
    };

    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(out_of_range);
    }
    u32::try_from(age).map_err(|_| out_of_range)
}
