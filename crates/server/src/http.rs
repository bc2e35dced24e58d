//! HTTP Endpoints
//!
//! Telephony webhooks plus audio, health and metrics routes. Every webhook answers with a
//! TwiML document; collaborator failures never surface as HTTP errors.

use std::time::Duration;

use axum::{
    extract::{Form, Json, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use voicebot_agent::CallResponse;

use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Logged in place of a missing `CallSid`
const UNKNOWN_CALL: &str = "unknown";

/// Twilio gives up on a webhook after 15 seconds
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let audio_dir = ServeDir::new(&state.settings.tts.audio_dir);

    Router::new()
        // Telephony webhooks
        .route("/voice", post(voice))
        .route("/handle-response", post(handle_response))
        .route("/handle-silence", post(handle_silence))
        .route("/poll-reply", post(poll_reply))
        .route("/call-status", post(call_status))
        // Synthesized clips
        .nest_service("/audio", audio_dir)
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(WEBHOOK_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    pub scenario: Option<String>,
}

/// Fields common to every call webhook
#[derive(Debug, Default, Deserialize)]
pub struct CallForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

impl CallForm {
    fn call_id(self) -> Option<String> {
        call_id(self.call_sid)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

/// A usable `CallSid`. Without one the webhook cannot belong to any live call.
fn call_id(call_sid: Option<String>) -> Option<String> {
    call_sid
        .map(|sid| sid.trim().to_string())
        .filter(|sid| !sid.is_empty())
}

/// Seconds from a `CallDuration` field; anything unparsable counts as zero
fn parse_duration(raw: Option<&str>) -> u64 {
    raw.and_then(|d| d.trim().parse().ok()).unwrap_or(0)
}

fn twiml(state: &AppState, response: &CallResponse) -> ([(header::HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        state.renderer.render(response),
    )
}

/// Respond to the event, or hang up when the webhook carried no call id
fn answer(
    state: &AppState,
    call_id: Option<String>,
    event: &'static str,
    respond: impl FnOnce(&str) -> CallResponse,
) -> ([(header::HeaderName, &'static str); 1], String) {
    let response = match call_id {
        Some(call_id) => respond(&call_id),
        None => state.orchestrator.orphaned(UNKNOWN_CALL, event),
    };
    twiml(state, &response)
}

/// POST /voice?scenario=<name>
///
/// The outbound call connected.
async fn voice(
    State(state): State<AppState>,
    Query(query): Query<VoiceQuery>,
    Form(form): Form<CallForm>,
) -> impl IntoResponse {
    answer(&state, form.call_id(), "call_start", |call_id| {
        state
            .orchestrator
            .call_started(call_id, query.scenario.as_deref())
    })
}

/// POST /handle-response
///
/// A listen window captured speech.
async fn handle_response(
    State(state): State<AppState>,
    Form(form): Form<SpeechForm>,
) -> impl IntoResponse {
    let text = form.speech_result.unwrap_or_default();
    answer(&state, call_id(form.call_sid), "speech", |call_id| {
        state.orchestrator.speech_captured(call_id, &text)
    })
}

/// POST /handle-silence
async fn handle_silence(
    State(state): State<AppState>,
    Form(form): Form<CallForm>,
) -> impl IntoResponse {
    answer(&state, form.call_id(), "silence", |call_id| {
        state.orchestrator.silence_timeout(call_id)
    })
}

/// POST /poll-reply
async fn poll_reply(
    State(state): State<AppState>,
    Form(form): Form<CallForm>,
) -> impl IntoResponse {
    answer(&state, form.call_id(), "poll", |call_id| state.orchestrator.poll(call_id))
}

/// POST /call-status
///
/// The call ended; the transcript is flushed before answering.
async fn call_status(
    State(state): State<AppState>,
    Form(form): Form<StatusForm>,
) -> impl IntoResponse {
    let duration = parse_duration(form.call_duration.as_deref());
    let status = form.call_status.unwrap_or_else(|| "unknown".to_string());

    let Some(call_id) = call_id(form.call_sid) else {
        tracing::warn!(status = %status, "Call status without CallSid, ignoring");
        return ([(header::CONTENT_TYPE, "text/plain")], "OK");
    };

    if let Some(location) = state
        .orchestrator
        .call_ended(&call_id, duration, &status)
        .await
    {
        tracing::info!(call_id = %call_id, path = %location, "Transcript written");
    }

    ([(header::CONTENT_TYPE, "text/plain")], "OK")
}

/// Liveness
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: fillers rendered and the reply model reachable
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let clips = state.filler_clips();
    let pipeline = state.orchestrator.pipeline();
    let llm_available = pipeline.reply_source().is_available().await;
    let ready = clips > 0 && llm_available;

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "degraded" },
            "checks": {
                "sessions": { "status": "ok", "active": state.active_calls() },
                "fillers": {
                    "status": if clips > 0 { "ok" } else { "missing" },
                    "clips": clips,
                },
                "llm": {
                    "status": if llm_available { "ok" } else { "unavailable" },
                    "model": pipeline.reply_source().model_name(),
                },
                "tts": { "model": pipeline.synthesizer().model_name() },
                "scenarios": { "count": state.orchestrator.catalog().len() },
            }
        })),
    )
}
