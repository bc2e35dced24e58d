//! Collaborator traits consumed by the call orchestrator
//!
//! All external dependencies of the turn-taking core sit behind these traits so that
//! backends can be swapped and tests can script them:
//!
//! ```text
//! ReplySource      - next caller utterance + end-of-call flag from the dialogue so far
//! Synthesizer      - text → playable audio reference
//! TranscriptStore  - opens a TranscriptSink per call
//! TranscriptSink   - accumulates turns, flushed to durable storage when the call ends
//! ```

mod reply;
mod speech;
mod transcript;

pub use reply::ReplySource;
pub use speech::Synthesizer;
pub use transcript::{TranscriptSink, TranscriptStore};
