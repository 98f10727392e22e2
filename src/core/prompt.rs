use std::fmt::Write;

use serde_json::Value;

use super::schema::response_schema;
use super::types::{EVENTS_PER_TIMELINE, ScenarioInput};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a sci-fi simulation engine. You are objective but creative.";

/// Everything the model needs for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub prompt: String,
    pub system_instruction: &'static str,
    pub schema: Value,
    pub first_year: i32,
    pub last_year: i32,
}

pub fn build(input: &ScenarioInput, current_year: i32) -> PromptSpec {
    let first_year = current_year + 1;
    let last_year = current_year + EVENTS_PER_TIMELINE as i32;
    let regret = if input.regret.is_empty() {
        "None"
    } else {
        input.regret.as_str()
    };
    let years = (first_year..=last_year)
        .map(|y| y.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are the Chronos Engine.");
    let _ = writeln!(prompt, "User Profile:");
    let _ = writeln!(prompt, "- Current Age: {}", input.age);
    let _ = writeln!(prompt, "- Current Occupation: {}", input.occupation);
    let _ = writeln!(prompt, "- Major Regret: {regret}");
    let _ = writeln!(prompt, "- The Split Decision: {}", input.decision);
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Generate 3 distinct timelines for the next {EVENTS_PER_TIMELINE} years starting from {first_year}."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Timeline A (The Safe Path): Low variance, steady growth, playing it safe."
    );
    let _ = writeln!(
        prompt,
        "Timeline B (The Risk Path): High variance, taking the leap defined in 'The Split Decision'. Could be great, could be hard."
    );
    let _ = writeln!(
        prompt,
        "Timeline C (The Chaos Path): Unexpected random events, entropy, high strangeness."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "For each timeline, generate {EVENTS_PER_TIMELINE} sequential yearly events, one for each of the years {years}."
    );
    let _ = writeln!(
        prompt,
        "The 'description' field must be written in first-person as a diary entry."
    );

    PromptSpec {
        prompt,
        system_instruction: SYSTEM_INSTRUCTION,
        schema: response_schema(),
        first_year,
        last_year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn engineer() -> ScenarioInput {
        ScenarioInput {
            age: 30,
            occupation: "Engineer".to_string(),
            regret: String::new(),
            decision: "Quit my job".to_string(),
        }
    }

    #[test]
    fn build_embeds_profile_and_requested_years() {
        let spec = build(&engineer(), 2024);

        assert!(spec.prompt.contains("Current Age: 30"));
        assert!(spec.prompt.contains("Current Occupation: Engineer"));
        assert!(spec.prompt.contains("The Split Decision: Quit my job"));
        assert!(spec.prompt.contains("Major Regret: None"));
        assert!(spec.prompt.contains("starting from 2025"));
        assert!(spec.prompt.contains("2025, 2026, 2027, 2028, 2029"));
        assert!(!spec.prompt.contains("2030"));
        assert_eq!((spec.first_year, spec.last_year), (2025, 2029));
    }

    #[test]
    fn build_uses_stated_regret() {
        let mut input = engineer();
        input.regret = "Never learned piano".to_string();
        let spec = build(&input, 2024);
        assert!(spec.prompt.contains("Major Regret: Never learned piano"));
    }

    #[test]
    fn build_attaches_shared_schema_and_system_instruction() {
        let spec = build(&engineer(), 2024);
        assert_eq!(spec.schema, response_schema());
        assert_eq!(spec.system_instruction, SYSTEM_INSTRUCTION);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_build_is_pure(
            age in 1u32..=120,
            occupation in "[A-Za-z ]{1,24}",
            decision in "[A-Za-z ]{1,40}",
            year in 1900i32..2200
        ) {
            let input = ScenarioInput {
                age,
                occupation,
                regret: String::new(),
                decision,
            };
            let first = build(&input, year);
            let second = build(&input, year);
            prop_assert_eq!(&first.prompt, &second.prompt);
            prop_assert_eq!(
                serde_json::to_string(&first.schema).ok(),
                serde_json::to_string(&second.schema).ok()
            );
            let expected_age = format!("Current Age: {age}");
            prop_assert!(first.prompt.contains(&expected_age));
        }
    }
}
