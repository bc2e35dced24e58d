//! Persistence layer for the voice bot
//!
//! Provides durable storage for:
//! - Call transcripts (plain text, one file per call)

pub mod error;
pub mod transcripts;

pub use error::PersistenceError;
pub use transcripts::{FileTranscript, FileTranscriptStore};
