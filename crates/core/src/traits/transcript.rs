//! Transcript persistence interface

use crate::{Result, Turn, TurnRole};
use async_trait::async_trait;

/// Per-call transcript accumulator.
///
/// Turns are recorded in dialogue order while the call is live and written out once
/// when the call ends.
#[async_trait]
pub trait TranscriptSink: Send + 'static {
    /// Append one dialogue entry
    fn record_turn(&mut self, role: TurnRole, text: &str);

    /// Entries recorded so far, oldest first
    fn entries(&self) -> &[Turn];

    /// Write the transcript to durable storage
    ///
    /// # Returns
    /// Location the transcript was written to
    async fn flush(&mut self, duration_secs: u64) -> Result<String>;
}

/// Factory for per-call transcript sinks
pub trait TranscriptStore: Send + Sync + 'static {
    /// Open a sink for a newly started call
    fn open(&self, scenario: &str, call_id: &str) -> Box<dyn TranscriptSink>;
}
