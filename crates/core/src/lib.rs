//! Core traits and types for the voice bot
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation turns and the scenario descriptor
//! - Audio references handed to the telephony layer
//! - Collaborator traits (reply generation, speech synthesis, transcripts)
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod traits;

pub use audio::{AudioRef, SpeechAudio};
pub use conversation::{CallId, Reply, Scenario, Turn, TurnRole};
pub use error::{Error, Result};

pub use traits::{ReplySource, Synthesizer, TranscriptSink, TranscriptStore};
