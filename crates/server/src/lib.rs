//! Voice Bot Server
//!
//! Twilio-style webhook endpoints driving the call orchestrator, plus audio clip serving,
//! health checks and Prometheus metrics.

pub mod http;
pub mod metrics;
pub mod state;
pub mod twiml;

pub use http::create_router;
pub use crate::metrics::{describe_metrics, init_metrics, metrics_handler};
pub use state::AppState;
pub use twiml::TwimlRenderer;
