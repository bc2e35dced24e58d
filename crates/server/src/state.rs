//! Application State
//!
//! Shared state across all handlers, and the start-up wiring of the collaborators.

use std::sync::Arc;

use anyhow::Context;
use voicebot_agent::{CallOrchestrator, SessionStore};
use voicebot_config::{ScenarioCatalog, Settings};
use voicebot_core::{ReplySource, Synthesizer, TranscriptStore};
use voicebot_llm::{OpenAIBackend, OpenAIConfig, PatientReplySource};
use voicebot_persistence::FileTranscriptStore;
use voicebot_pipeline::{
    ElevenLabsConfig, ElevenLabsSynthesizer, FillerLibrary, FillerSelector, LatencyHidingPipeline,
    ResultCache,
};

use crate::twiml::TwimlRenderer;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: Arc<CallOrchestrator>,
    pub renderer: Arc<TwimlRenderer>,
}

impl AppState {
    pub fn new(settings: Settings, orchestrator: CallOrchestrator) -> Self {
        let renderer = TwimlRenderer::from_settings(&settings);
        Self {
            settings: Arc::new(settings),
            orchestrator: Arc::new(orchestrator),
            renderer: Arc::new(renderer),
        }
    }

    /// Build the production collaborators from settings and pre-render the filler clips
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let catalog = ScenarioCatalog::load(settings.scenarios_path.as_deref())
            .context("loading scenario catalog")?;
        tracing::info!(scenarios = catalog.len(), "Loaded scenario catalog");

        let backend = OpenAIBackend::new(OpenAIConfig::from(&settings.llm))
            .context("creating LLM backend")?;
        let reply_source: Arc<dyn ReplySource> =
            Arc::new(PatientReplySource::new(Arc::new(backend)));

        let tts_config = ElevenLabsConfig::from(&settings.tts);
        tokio::fs::create_dir_all(&tts_config.audio_dir)
            .await
            .with_context(|| format!("creating audio dir {}", tts_config.audio_dir.display()))?;
        let elevenlabs = ElevenLabsSynthesizer::new(tts_config).context("creating synthesizer")?;
        tracing::info!(audio_dir = %elevenlabs.audio_dir().display(), "Serving clips");
        let synthesizer: Arc<dyn Synthesizer> = Arc::new(elevenlabs);

        let library = FillerLibrary::build(synthesizer.as_ref(), &settings.fillers.texts).await;
        if library.is_empty() {
            tracing::warn!("No filler clips rendered, replies will be preceded by silence");
        }

        let store = FileTranscriptStore::from_config(&settings.transcripts);
        tracing::info!(dir = %store.dir().display(), "Writing transcripts");
        let transcripts: Arc<dyn TranscriptStore> = Arc::new(store);

        tracing::info!(
            llm = %reply_source.model_name(),
            tts = %synthesizer.model_name(),
            fillers = library.len(),
            "Collaborators ready"
        );

        let pipeline = LatencyHidingPipeline::new(
            reply_source,
            synthesizer,
            Arc::new(ResultCache::new()),
        );

        let orchestrator = CallOrchestrator::new(
            settings.call.clone(),
            Arc::new(catalog),
            Arc::new(SessionStore::new()),
            Arc::new(pipeline),
            Arc::new(FillerSelector::new(Arc::new(library))),
            transcripts,
        );

        Ok(Self::new(settings, orchestrator))
    }

    /// Active call count
    pub fn active_calls(&self) -> usize {
        self.orchestrator.sessions().count()
    }

    /// Rendered filler clip count
    pub fn filler_clips(&self) -> usize {
        self.orchestrator.fillers().library().len()
    }
}
