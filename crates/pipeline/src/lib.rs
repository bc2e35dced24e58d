//! Speech pipeline for the simulated caller
//!
//! Components:
//! - ElevenLabs text-to-speech (`tts`)
//! - Pre-synthesized filler clips and the selection heuristics (`filler`)
//! - Background reply generation with a per-call result cache (`latency`)

pub mod filler;
pub mod latency;
pub mod tts;

pub use filler::{FillerClip, FillerLibrary, FillerSelector};
pub use latency::{LatencyHidingPipeline, PendingSlot, ReadyReply, ResultCache, TakeOutcome};
pub use tts::{ElevenLabsConfig, ElevenLabsSynthesizer, TtsError, VoiceSettings};
