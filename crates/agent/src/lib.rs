//! Turn-taking orchestrator for the simulated caller
//!
//! Features:
//! - Per-call session state keyed by the telephony call id
//! - Call state machine (opening, agent turns, silence escalation, deferred replies)
//! - Transport-neutral response descriptors rendered by the server

pub mod orchestrator;
pub mod response;
pub mod session;

pub use orchestrator::{CallEvent, CallOrchestrator};
pub use response::{CallResponse, Callback, Verb};
pub use session::{CallPhase, CallSession, SessionState, SessionStore};
