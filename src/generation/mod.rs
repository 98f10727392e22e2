//! Generation clients.
//!
//! A [`SimulationGenerator`] turns a validated scenario into a checked
//! [`SimulationResult`]. Which implementation runs is decided once from
//! configuration by [`from_settings`].

mod backend;
mod gemini;
mod offline;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Local};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::{GenerationMode, Settings};
use crate::core::{
    GenerationError, PromptSpec, ScenarioInput, SimulationResult, accept_response, prompt,
};

pub use backend::BackendGenerator;
pub use gemini::GeminiTransport;
pub use offline::OfflineGenerator;

/// Values that front-ends send when no key was configured.
const PLACEHOLDER_KEYS: &[&str] = &["undefined", "null", "GEMINI_API_KEY"];

#[async_trait]
pub trait SimulationGenerator: Send + Sync {
    fn mode(&self) -> GenerationMode;

    async fn generate(
        &self,
        input: &ScenarioInput,
        runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError>;
}

/// Model parameters sent alongside a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub temperature: f32,
    pub spec: PromptSpec,
}

/// The raw model boundary: prompt and schema in, response text out.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        request: &ModelRequest,
    ) -> Result<Option<String>, GenerationError>;
}

/// Picks the runtime key if one was supplied, otherwise the configured default.
pub fn resolve_api_key(
    runtime: Option<&str>,
    configured: Option<&str>,
) -> Result<String, GenerationError> {
    let key = [runtime, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|k| !k.is_empty())
        .ok_or(GenerationError::MissingCredentials)?;
    if PLACEHOLDER_KEYS.iter().any(|p| *p == key) {
        return Err(GenerationError::MissingCredentials);
    }
    Ok(key.to_string())
}

pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, GenerationError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(limit.as_secs())),
    }
}

pub(crate) fn current_year() -> i32 {
    Local::now().year()
}

/// Calls the model directly with credentials held by this process.
pub struct DirectGenerator<T> {
    transport: T,
    default_key: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
    year: Option<i32>,
}

impl<T: ModelTransport> DirectGenerator<T> {
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self {
            transport,
            default_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout: settings.timeout(),
            year: None,
        }
    }

    /// Pins the "current year" used for prompts instead of reading the clock.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    async fn run(
        &self,
        input: &ScenarioInput,
        runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError> {
        let api_key = resolve_api_key(runtime_key, self.default_key.as_deref())?;
        let year = self.year.unwrap_or_else(current_year);
        let request = ModelRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            spec: prompt::build(input, year),
        };

        info!(
            model = %request.model,
            age = input.age,
            occupation = %input.occupation,
            first_year = request.spec.first_year,
            "requesting timelines from model"
        );
        let text = bounded(self.timeout, self.transport.complete(&api_key, &request))
            .await
            .inspect_err(|e| warn!(error = %e, "model call failed"))?;

        let text = match text {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(GenerationError::EmptyResponse),
        };
        accept_response(&text, Some(request.spec.first_year))
    }
}

#[async_trait]
impl<T: ModelTransport> SimulationGenerator for DirectGenerator<T> {
    fn mode(&self) -> GenerationMode {
        GenerationMode::Direct
    }

    async fn generate(
        &self,
        input: &ScenarioInput,
        runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError> {
        self.run(input, runtime_key).await
    }
}

pub fn from_settings(settings: &Settings) -> Result<Arc<dyn SimulationGenerator>, GenerationError> {
    let generator: Arc<dyn SimulationGenerator> = match settings.mode {
        GenerationMode::Direct => Arc::new(DirectGenerator::new(
            GeminiTransport::new(settings.model_base_url.clone())?,
            settings,
        )),
        GenerationMode::Backend => Arc::new(BackendGenerator::new(settings)?),
        GenerationMode::Offline => Arc::new(OfflineGenerator::new()),
    };
    Ok(generator)
}
