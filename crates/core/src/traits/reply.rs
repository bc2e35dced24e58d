//! Reply generation interface

use crate::{Reply, Result, Scenario, Turn};
use async_trait::async_trait;

/// Produces the simulated caller's next utterance.
///
/// Implementations must not retry internally; the caller decides how to recover
/// (the latency-hiding pipeline substitutes a fixed apology).
///
/// # Example
///
/// ```ignore
/// let reply = source.generate_reply(&scenario, &history, "How can I help?").await?;
/// if reply.end_call { /* hang up after speaking */ }
/// ```
#[async_trait]
pub trait ReplySource: Send + Sync + 'static {
    /// Generate the next caller utterance
    ///
    /// # Arguments
    /// * `scenario` - Scenario the caller is playing
    /// * `history` - Dialogue so far, oldest first, excluding `utterance`
    /// * `utterance` - What the agent just said
    async fn generate_reply(
        &self,
        scenario: &Scenario,
        history: &[Turn],
        utterance: &str,
    ) -> Result<Reply>;

    /// Whether the model behind this source currently answers requests
    async fn is_available(&self) -> bool {
        true
    }

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
