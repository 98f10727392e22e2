mod error;
pub mod prompt;
pub mod schema;
mod types;
mod validate;

pub use error::{GenerationError, StoreError, ValidationError};
pub use prompt::{PromptSpec, SYSTEM_INSTRUCTION};
pub use schema::{accept_response, accept_value, check_invariants, response_schema};
pub use types::{
    EVENTS_PER_TIMELINE, MAX_AGE, MIN_AGE, PersistenceRecord, PersistenceStatus, ScenarioInput,
    SimulationResult, TIMELINE_COUNT, Theme, Timeline, TimelineEvent,
};
pub use validate::{RawScenario, validate};
