//! Intake HTTP API.
//!
//! - `GET  /`                                      service banner
//! - `GET  /api/intake/initial-greeting/{session_id}`
//! - `POST /api/intake/text-message`
//! - `POST /api/intake/voice-transcript`
//! - `POST /api/intake/switch-mode`
//! - `GET  /api/intake/cost-summary/{session_id}`
//! - `DELETE /api/intake/session/{session_id}`

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use intake_agent::{AdapterReply, Greeting, IntakeRuntime, ModeSwitch};
use intake_core::errors::{ApplicationError, InterfaceError};
use intake_core::usage::CostSummary;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<IntakeRuntime>,
}

impl ApiState {
    pub fn new(runtime: Arc<IntakeRuntime>) -> Self {
        Self { runtime }
    }
}

#[derive(Debug, Deserialize)]
pub struct TextMessageRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub agent_state: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceTranscriptRequest {
    pub session_id: String,
    pub transcript: String,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    #[serde(default)]
    pub audio_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchModeRequest {
    pub session_id: String,
    pub current_mode: String,
    pub new_mode: String,
    #[serde(default)]
    pub agent_state: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub session_id: String,
    pub ended: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Full application router: intake API, health probe and permissive CORS.
pub fn router(runtime: Arc<IntakeRuntime>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/intake/initial-greeting/{session_id}", get(initial_greeting))
        .route("/api/intake/text-message", post(text_message))
        .route("/api/intake/voice-transcript", post(voice_transcript))
        .route("/api/intake/switch-mode", post(switch_mode))
        .route("/api/intake/cost-summary/{session_id}", get(cost_summary))
        .route("/api/intake/session/{session_id}", delete(end_session))
        .with_state(ApiState::new(runtime))
        .merge(crate::health::router())
        .layer(CorsLayer::permissive())
}

pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok", message: "Real Estate Intake Agent API is running" })
}

pub async fn initial_greeting(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Greeting> {
    let correlation_id = new_correlation_id();
    let greeting = state
        .runtime
        .initial_greeting(&session_id)
        .await
        .map_err(|error| api_error(error, &correlation_id))?;

    info!(
        event_name = "api.initial_greeting",
        correlation_id = %correlation_id,
        session_id = %session_id,
        "initial greeting served"
    );
    Ok(Json(greeting))
}

pub async fn text_message(
    State(state): State<ApiState>,
    Json(body): Json<TextMessageRequest>,
) -> ApiResult<AdapterReply> {
    let correlation_id = new_correlation_id();
    let reply = state
        .runtime
        .text_message(&body.session_id, &body.message, body.agent_state.as_ref())
        .await
        .map_err(|error| api_error(error, &correlation_id))?;
    Ok(Json(reply))
}

pub async fn voice_transcript(
    State(state): State<ApiState>,
    Json(body): Json<VoiceTranscriptRequest>,
) -> ApiResult<AdapterReply> {
    let correlation_id = new_correlation_id();
    let reply = state
        .runtime
        .voice_transcript(
            &body.session_id,
            &body.transcript,
            body.context.as_ref(),
            body.audio_seconds,
        )
        .await
        .map_err(|error| api_error(error, &correlation_id))?;
    Ok(Json(reply))
}

pub async fn switch_mode(
    State(state): State<ApiState>,
    Json(body): Json<SwitchModeRequest>,
) -> ApiResult<ModeSwitch> {
    let correlation_id = new_correlation_id();
    let switch = state
        .runtime
        .switch_mode(
            &body.session_id,
            &body.current_mode,
            &body.new_mode,
            body.agent_state.as_ref(),
        )
        .await
        .map_err(|error| api_error(error, &correlation_id))?;
    Ok(Json(switch))
}

pub async fn cost_summary(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> Json<CostSummary> {
    Json(state.runtime.cost_summary(&session_id))
}

pub async fn end_session(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<EndSessionResponse> {
    let correlation_id = new_correlation_id();
    let removed = state
        .runtime
        .end_session(&session_id)
        .await
        .map_err(|error| api_error(error, &correlation_id))?;

    Ok(Json(EndSessionResponse { session_id, ended: removed.is_some() }))
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id);
    let status = status_for(&interface);

    warn!(
        event_name = "api.request_failed",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %detail,
        "intake request failed"
    );

    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            detail,
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
