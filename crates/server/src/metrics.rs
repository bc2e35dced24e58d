//! Prometheus metrics
//!
//! The recorder is installed once at start-up; `/metrics` renders whatever the other
//! crates have recorded through the `metrics` facade.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Reply latency buckets in seconds; replies usually land within a few polls
const LATENCY_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 8.0, 13.0, 30.0];

/// Install the Prometheus recorder. Returns `None` if one is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS.get() {
        return Some(handle.clone());
    }

    let builder = match PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("voicebot_reply_latency_seconds".to_string()),
        LATENCY_BUCKETS,
    ) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid histogram buckets, using summaries");
            PrometheusBuilder::new()
        }
    };

    match builder.install_recorder() {
        Ok(handle) => {
            describe_metrics();
            let _ = PROMETHEUS.set(handle.clone());
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Register help text for every metric the bot emits
pub fn describe_metrics() {
    metrics::describe_counter!("voicebot_calls_started_total", "Calls connected");
    metrics::describe_counter!("voicebot_calls_ended_total", "Calls ended, by final status");
    metrics::describe_counter!("voicebot_agent_turns_total", "Agent utterances accepted");
    metrics::describe_counter!(
        "voicebot_silence_timeouts_total",
        "Listen windows that closed without speech, by escalation level"
    );
    metrics::describe_counter!("voicebot_replies_delivered_total", "Caller replies spoken");
    metrics::describe_counter!(
        "voicebot_reply_fallbacks_total",
        "Replies that used a fallback (llm, tts or timeout)"
    );
    metrics::describe_counter!(
        "voicebot_orphaned_callbacks_total",
        "Webhooks for calls with no session"
    );
    metrics::describe_counter!("voicebot_filler_plays_total", "Filler clips played");
    metrics::describe_histogram!(
        "voicebot_reply_latency_seconds",
        metrics::Unit::Seconds,
        "Time to generate and synthesize one caller reply"
    );
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics disabled\n".to_string(),
        ),
    }
}
