use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::core::{
    GenerationError, PersistenceRecord, RawScenario, SimulationResult, ValidationError,
    check_invariants, validate,
};
use crate::generation::{self, SimulationGenerator};
use crate::persistence::PersistenceAdapter;
use crate::session::SessionTracker;

const REQUIRED_FIELDS: [&str; 3] = ["age", "occupation", "decision"];

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn SimulationGenerator>,
    pub persistence: Arc<PersistenceAdapter>,
    pub sessions: SessionTracker,
    pub service_name: String,
}

impl AppState {
    pub fn new(
        generator: Arc<dyn SimulationGenerator>,
        persistence: PersistenceAdapter,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            persistence: Arc::new(persistence),
            sessions: SessionTracker::new(),
            service_name: service_name.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, GenerationError> {
        Ok(Self::new(
            generation::from_settings(settings)?,
            PersistenceAdapter::from_settings(settings),
            settings.service_name.clone(),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePayload {
    #[serde(flatten)]
    scenario: RawScenario,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SavePayload {
    user_id: Option<String>,
    simulation_data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ResetPayload {
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    data: SimulationResult,
}

#[derive(Debug, Serialize)]
struct SaveResponse {
    success: bool,
    session: PersistenceRecord,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    success: bool,
    cleared: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Integrations {
    generation: &'static str,
    memory_store: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    timestamp: String,
    integrations: Integrations,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<&'static str>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulation/generate", post(generate_handler))
        .route("/api/simulation/save", post(save_handler))
        .route("/api/simulation/reset", post(reset_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

pub async fn run_http_server(settings: &Settings) -> std::io::Result<()> {
    let state = AppState::from_settings(settings)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let mode = state.generator.mode();
    let memory_store = state.persistence.has_store();

    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        mode = mode.as_str(),
        memory_store,
        "Chronos HTTP API listening"
    );

    axum::serve(listener, router(state)).await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    info!(%method, %path, status = response.status().as_u16(), "request");
    response
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            service: state.service_name.clone(),
            timestamp: Utc::now().to_rfc3339(),
            integrations: Integrations {
                generation: state.generator.mode().as_str(),
                memory_store: if state.persistence.has_store() {
                    "configured"
                } else {
                    "disabled"
                },
            },
        },
    )
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            );
        }
    };

    let input = match validate(payload.scenario) {
        Ok(input) => input,
        Err(err) => return validation_response(&err),
    };

    let token = match payload.session_id.as_deref().map(|s| state.sessions.begin(s)) {
        Some(Ok(token)) => Some(token),
        Some(Err(busy)) => {
            return error_response(
                StatusCode::CONFLICT,
                "Simulation in progress",
                Some(busy.to_string()),
            );
        }
        None => None,
    };

    info!(
        age = input.age,
        occupation = %input.occupation,
        mode = state.generator.mode().as_str(),
        request = ?token.as_ref().map(|t| t.id()),
        "generating simulation"
    );
    let outcome = state
        .generator
        .generate(&input, payload.api_key.as_deref())
        .await;

    let outcome = match token {
        Some(token) => match token.complete(outcome) {
            Some(outcome) => outcome,
            None => {
                return error_response(
                    StatusCode::CONFLICT,
                    "Simulation superseded",
                    Some("the session was reset before this simulation finished".to_string()),
                );
            }
        },
        None => outcome,
    };

    match outcome {
        Ok(data) => json_response(
            StatusCode::OK,
            GenerateResponse {
                success: true,
                data,
            },
        ),
        Err(err) if err.is_client_error() => {
            error_response(StatusCode::BAD_REQUEST, "Invalid scenario", Some(err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "simulation generation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Divergence Engine Failed",
                Some(err.to_string()),
            )
        }
    }
}

async fn save_handler(
    State(state): State<AppState>,
    payload: Result<Json<SavePayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            );
        }
    };

    let (Some(user_id), Some(data)) = (
        payload.user_id.filter(|u| !u.trim().is_empty()),
        payload.simulation_data.filter(|d| !d.is_null()),
    ) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing userId or simulationData",
            None,
        );
    };

    let result = match serde_json::from_value::<SimulationResult>(data)
        .map_err(|e| GenerationError::malformed(e.to_string()))
        .and_then(|r| check_invariants(&r).map(|()| r))
    {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "rejecting invalid simulation data");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid simulationData",
                Some(err.to_string()),
            );
        }
    };

    let session = state.persistence.save(user_id.trim(), &result).await;
    json_response(
        StatusCode::OK,
        SaveResponse {
            success: true,
            session,
        },
    )
}

async fn reset_handler(
    State(state): State<AppState>,
    payload: Result<Json<ResetPayload>, JsonRejection>,
) -> Response {
    let session_id = match payload {
        Ok(Json(ResetPayload {
            session_id: Some(id),
        })) if !id.trim().is_empty() => id,
        _ => return error_response(StatusCode::BAD_REQUEST, "Missing sessionId", None),
    };

    let cleared = state.sessions.reset(&session_id);
    json_response(
        StatusCode::OK,
        ResetResponse {
            success: true,
            cleared,
        },
    )
}

fn validation_response(err: &ValidationError) -> Response {
    let (error, required) = match err {
        ValidationError::MissingField(_) => {
            ("Missing required fields", Some(REQUIRED_FIELDS.to_vec()))
        }
        ValidationError::OutOfRange { .. } => ("Invalid age", None),
    };
    json_response(
        StatusCode::BAD_REQUEST,
        ErrorResponse {
            error: error.to_string(),
            message: Some(err.to_string()),
            required,
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, error: &str, message: Option<String>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: error.to_string(),
            message,
            required: None,
        },
    )
}
