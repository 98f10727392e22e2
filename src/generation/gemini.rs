use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{ModelRequest, ModelTransport};
use crate::core::GenerationError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `generateContent` over the Gemini REST API.
pub struct GeminiTransport {
    client: Client,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(base_url: Option<String>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GenerationError::upstream(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn call(
        &self,
        api_key: &str,
        request: &ModelRequest,
    ) -> Result<Option<String>, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_payload(request))
            .send()
            .await
            .map_err(|e| GenerationError::upstream(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::upstream(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(GenerationError::upstream(format!(
                "Gemini API error: {}",
                error_message(status.as_u16(), &body)
            )));
        }
        response_text(&body)
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn complete(
        &self,
        api_key: &str,
        request: &ModelRequest,
    ) -> Result<Option<String>, GenerationError> {
        self.call(api_key, request).await
    }
}

pub(crate) fn request_payload(request: &ModelRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": request.spec.system_instruction }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.spec.prompt }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.spec.schema,
            "temperature": request.temperature,
        }
    })
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}: {body}"))
}

/// Concatenates the text parts of the first candidate. `None` when the model
/// produced no text at all (e.g. a safety block).
pub(crate) fn response_text(body: &str) -> Result<Option<String>, GenerationError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| GenerationError::upstream(format!("unreadable API response: {e}")))?;

    if let Some(message) = v.get("error").and_then(|e| e["message"].as_str()) {
        return Err(GenerationError::upstream(format!("Gemini API error: {message}")));
    }

    let text: String = v["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    Ok(if text.is_empty() { None } else { Some(text) })
}
