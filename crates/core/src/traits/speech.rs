//! Speech synthesis interface

use crate::{AudioRef, Result};
use async_trait::async_trait;

/// Text-to-Speech interface
///
/// Used once at start-up to pre-render filler clips and then per turn to render the
/// caller's replies.
///
/// # Example
///
/// ```ignore
/// let tts: Arc<dyn Synthesizer> = Arc::new(ElevenLabsSynthesizer::new(config)?);
/// let audio = tts.synthesize("Mm-hmm.").await?;
/// ```
#[async_trait]
pub trait Synthesizer: Send + Sync + 'static {
    /// Synthesize text into a playable artifact
    async fn synthesize(&self, text: &str) -> Result<AudioRef>;

    /// Delete an artifact produced by [`Synthesizer::synthesize`] once it will not be
    /// played again. Releasing an artifact that is already gone succeeds.
    async fn release(&self, _audio: &AudioRef) -> Result<()> {
        Ok(())
    }

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
