//! Reply generation for the simulated caller
//!
//! Features:
//! - OpenAI-compatible chat completion backend
//! - Patient persona prompt construction
//! - `[END]` marker handling for caller-initiated hang-ups

pub mod backend;
pub mod prompt;
pub mod reply;

pub use backend::{FinishReason, GenerationResult, LlmBackend, OpenAIBackend, OpenAIConfig};
pub use prompt::{Message, PatientPromptBuilder, Role, BASE_PATIENT_PROMPT};
pub use reply::PatientReplySource;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for voicebot_core::Error {
    fn from(err: LlmError) -> Self {
        voicebot_core::Error::Llm(err.to_string())
    }
}
