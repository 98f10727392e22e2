use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{SimulationGenerator, bounded, current_year};
use crate::config::{GenerationMode, Settings};
use crate::core::{GenerationError, ScenarioInput, SimulationResult, accept_value};

/// Forwards scenarios to a Chronos backend, which holds the model credentials.
pub struct BackendGenerator {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    #[serde(flatten)]
    input: &'a ScenarioInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

impl BackendGenerator {
    pub fn new(settings: &Settings) -> Result<Self, GenerationError> {
        let base_url = settings
            .backend_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| GenerationError::upstream("backend mode requires a backend URL"))?;
        let client = Client::builder()
            .build()
            .map_err(|e| GenerationError::upstream(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            base_url,
            timeout: settings.timeout(),
        })
    }

    async fn run(
        &self,
        input: &ScenarioInput,
        runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError> {
        let url = format!("{}/api/simulation/generate", self.base_url);
        info!(%url, age = input.age, "forwarding scenario to backend");

        let response = self
            .client
            .post(&url)
            .json(&GenerateBody {
                input,
                api_key: runtime_key,
            })
            .send()
            .await
            .map_err(|e| GenerationError::upstream(format!("backend unreachable: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::upstream(format!("unreadable backend response: {e}")))?;

        if !status.is_success() {
            let message = body["message"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("backend API request failed");
            warn!(status = status.as_u16(), message, "backend rejected scenario");
            return Err(GenerationError::upstream(format!(
                "backend returned {status}: {message}"
            )));
        }

        match body.get("data") {
            Some(data) if !data.is_null() => accept_value(data.clone(), Some(current_year() + 1)),
            _ => Err(GenerationError::EmptyResponse),
        }
    }
}

#[async_trait]
impl SimulationGenerator for BackendGenerator {
    fn mode(&self) -> GenerationMode {
        GenerationMode::Backend
    }

    async fn generate(
        &self,
        input: &ScenarioInput,
        runtime_key: Option<&str>,
    ) -> Result<SimulationResult, GenerationError> {
        bounded(self.timeout, self.run(input, runtime_key)).await
    }
}
