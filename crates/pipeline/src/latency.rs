//! Latency-hiding reply pipeline
//!
//! Reply generation and synthesis take seconds; the webhook that captured the agent's
//! speech cannot wait that long. [`LatencyHidingPipeline::begin`] spawns the work and
//! returns at once; the result lands in a [`ResultCache`] slot keyed by call id, which the
//! orchestrator's poll path checks and consumes.
//!
//! Slot lifecycle per turn: absent → in-progress → ready → absent (taken). Each in-progress
//! slot carries a ticket; a background task only writes to the slot holding its own ticket,
//! so a result that outlives its call (or an abandoned turn) is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use voicebot_config::constants::utterances;
use voicebot_core::{
    AudioRef, CallId, Reply, ReplySource, Scenario, SpeechAudio, Synthesizer, Turn,
};

/// A reply ready to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReply {
    pub text: String,
    pub audio: SpeechAudio,
    pub end_call: bool,
}

impl ReadyReply {
    /// The synthesized clip, if the reply has one
    pub fn clip(&self) -> Option<&AudioRef> {
        match &self.audio {
            SpeechAudio::Synthesized(audio) => Some(audio),
            SpeechAudio::Fallback => None,
        }
    }
}

/// Contents of a cache slot
#[derive(Debug, Clone)]
pub enum PendingSlot {
    InProgress { ticket: u64, started: Instant },
    Ready(ReadyReply),
}

/// Result of a non-blocking check-and-consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeOutcome {
    /// No work in flight for this call
    Absent,
    /// Work in flight, nothing to deliver yet
    NotReady,
    /// Consumed; the slot is now absent
    Ready(ReadyReply),
}

/// Per-call result slots
#[derive(Debug, Default)]
pub struct ResultCache {
    slots: DashMap<CallId, PendingSlot>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new computation. Fails if the call already has one in flight
    /// or an unconsumed result.
    pub fn mark_in_progress(&self, call_id: &str, ticket: u64) -> bool {
        use dashmap::mapref::entry::Entry;

        match self.slots.entry(call_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(PendingSlot::InProgress {
                    ticket,
                    started: Instant::now(),
                });
                true
            }
        }
    }

    /// Publish a result. Only the computation holding `ticket` may write; returns false
    /// when the slot was discarded or reassigned in the meantime.
    pub fn complete(&self, call_id: &str, ticket: u64, reply: ReadyReply) -> bool {
        let Some(mut slot) = self.slots.get_mut(call_id) else {
            return false;
        };

        let owned = matches!(
            &*slot,
            PendingSlot::InProgress { ticket: current, .. } if *current == ticket
        );
        if owned {
            *slot = PendingSlot::Ready(reply);
        }
        owned
    }

    /// Non-blocking check-and-consume
    pub fn take(&self, call_id: &str) -> TakeOutcome {
        let removed = self
            .slots
            .remove_if(call_id, |_, slot| matches!(slot, PendingSlot::Ready(_)));

        match removed {
            Some((_, PendingSlot::Ready(reply))) => TakeOutcome::Ready(reply),
            Some((_, PendingSlot::InProgress { .. })) => TakeOutcome::NotReady,
            None if self.slots.contains_key(call_id) => TakeOutcome::NotReady,
            None => TakeOutcome::Absent,
        }
    }

    /// Drop whatever the call has in the cache, handing it back
    pub fn discard(&self, call_id: &str) -> Option<PendingSlot> {
        self.slots.remove(call_id).map(|(_, slot)| slot)
    }

    pub fn is_pending(&self, call_id: &str) -> bool {
        matches!(
            self.slots.get(call_id).as_deref(),
            Some(PendingSlot::InProgress { .. })
        )
    }

    /// How long the in-flight computation for `call_id` has been running
    pub fn pending_age(&self, call_id: &str) -> Option<std::time::Duration> {
        match self.slots.get(call_id).as_deref() {
            Some(PendingSlot::InProgress { started, .. }) => Some(started.elapsed()),
            _ => None,
        }
    }

    pub fn is_ready(&self, call_id: &str) -> bool {
        matches!(self.slots.get(call_id).as_deref(), Some(PendingSlot::Ready(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Spawns generate-then-synthesize work per agent turn
pub struct LatencyHidingPipeline {
    reply_source: Arc<dyn ReplySource>,
    synthesizer: Arc<dyn Synthesizer>,
    cache: Arc<ResultCache>,
    next_ticket: AtomicU64,
}

impl LatencyHidingPipeline {
    pub fn new(
        reply_source: Arc<dyn ReplySource>,
        synthesizer: Arc<dyn Synthesizer>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            reply_source,
            synthesizer,
            cache,
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn synthesizer(&self) -> &Arc<dyn Synthesizer> {
        &self.synthesizer
    }

    pub fn reply_source(&self) -> &Arc<dyn ReplySource> {
        &self.reply_source
    }

    /// Drop the call's slot. An undelivered reply has its clip released in the background.
    pub fn abandon(&self, call_id: &str) -> Option<JoinHandle<()>> {
        match self.cache.discard(call_id)? {
            PendingSlot::Ready(reply) => self.release(reply.clip().into_iter().cloned().collect()),
            PendingSlot::InProgress { .. } => None,
        }
    }

    /// Delete clips that will not be played again. Returns `None` when there is nothing to do.
    pub fn release(&self, clips: Vec<AudioRef>) -> Option<JoinHandle<()>> {
        if clips.is_empty() {
            return None;
        }

        let synthesizer = Arc::clone(&self.synthesizer);
        Some(tokio::spawn(async move {
            for audio in &clips {
                if let Err(e) = synthesizer.release(audio).await {
                    tracing::warn!(audio = %audio, error = %e, "Failed to release clip");
                }
            }
            tracing::debug!(clips = clips.len(), "Released clips");
        }))
    }

    /// Start computing the caller's reply to `utterance`.
    ///
    /// Never fails: collaborator errors are folded into the cached result. Returns `None`
    /// without spawning when the call already has a computation in flight.
    pub fn begin(
        &self,
        call_id: &str,
        scenario: Arc<Scenario>,
        history: Vec<Turn>,
        utterance: String,
    ) -> Option<JoinHandle<()>> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        if !self.cache.mark_in_progress(call_id, ticket) {
            tracing::warn!(call_id, "Reply already in flight, not starting another");
            return None;
        }

        let call_id = call_id.to_string();
        let reply_source = Arc::clone(&self.reply_source);
        let synthesizer = Arc::clone(&self.synthesizer);
        let cache = Arc::clone(&self.cache);

        Some(tokio::spawn(async move {
            let started = Instant::now();

            let reply = match reply_source
                .generate_reply(&scenario, &history, &utterance)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(call_id = %call_id, error = %e, "Reply generation failed, using apology");
                    metrics::counter!("voicebot_reply_fallbacks_total", "kind" => "llm").increment(1);
                    Reply::new(utterances::APOLOGY, false)
                }
            };

            let audio = match synthesizer.synthesize(&reply.text).await {
                Ok(audio) => SpeechAudio::Synthesized(audio),
                Err(e) => {
                    tracing::warn!(call_id = %call_id, error = %e, "Synthesis failed, using fallback voice");
                    metrics::counter!("voicebot_reply_fallbacks_total", "kind" => "tts").increment(1);
                    SpeechAudio::Fallback
                }
            };

            let elapsed = started.elapsed();
            metrics::histogram!("voicebot_reply_latency_seconds").record(elapsed.as_secs_f64());

            let ready = ReadyReply {
                text: reply.text,
                audio,
                end_call: reply.end_call,
            };
            let clip = ready.clip().cloned();

            if cache.complete(&call_id, ticket, ready) {
                tracing::debug!(
                    call_id = %call_id,
                    latency_ms = elapsed.as_millis() as u64,
                    "Reply ready"
                );
            } else {
                tracing::debug!(call_id = %call_id, "Reply finished after its slot was dropped, discarding");
                if let Some(clip) = clip {
                    if let Err(e) = synthesizer.release(&clip).await {
                        tracing::warn!(call_id = %call_id, error = %e, "Failed to release unused clip");
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct EchoSource {
        fail: bool,
    }

    #[async_trait]
    impl ReplySource for EchoSource {
        async fn generate_reply(
            &self,
            _scenario: &Scenario,
            history: &[Turn],
            utterance: &str,
        ) -> voicebot_core::Result<Reply> {
            if self.fail {
                return Err(voicebot_core::Error::Llm("HTTP 503".to_string()));
            }
            Ok(Reply::new(
                format!("reply #{} to {}", history.len(), utterance),
                utterance.contains("bye"),
            ))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct FileNameSynth {
        fail: bool,
        released: Mutex<Vec<AudioRef>>,
    }

    #[async_trait]
    impl Synthesizer for FileNameSynth {
        async fn synthesize(&self, text: &str) -> voicebot_core::Result<AudioRef> {
            if self.fail {
                return Err(voicebot_core::Error::Tts("quota exceeded".to_string()));
            }
            Ok(AudioRef::new(format!("{}.mp3", text.len())))
        }

        async fn release(&self, audio: &AudioRef) -> voicebot_core::Result<()> {
            self.released.lock().push(audio.clone());
            Ok(())
        }

        fn model_name(&self) -> &str {
            "names"
        }
    }

    fn pipeline(reply_fails: bool, tts_fails: bool) -> LatencyHidingPipeline {
        LatencyHidingPipeline::new(
            Arc::new(EchoSource { fail: reply_fails }),
            Arc::new(FileNameSynth {
                fail: tts_fails,
                ..Default::default()
            }),
            Arc::new(ResultCache::new()),
        )
    }

    fn tracked_pipeline() -> (LatencyHidingPipeline, Arc<FileNameSynth>) {
        let synth = Arc::new(FileNameSynth::default());
        let pipeline = LatencyHidingPipeline::new(
            Arc::new(EchoSource { fail: false }),
            synth.clone(),
            Arc::new(ResultCache::new()),
        );
        (pipeline, synth)
    }

    fn scenario() -> Arc<Scenario> {
        Arc::new(Scenario::new("test", "Be a patient.", "Hi there."))
    }

    fn ready(text: &str) -> ReadyReply {
        ReadyReply {
            text: text.to_string(),
            audio: SpeechAudio::Fallback,
            end_call: false,
        }
    }

    #[test]
    fn test_slot_lifecycle() {
        let cache = ResultCache::new();
        assert_eq!(cache.take("CA1"), TakeOutcome::Absent);

        assert!(cache.mark_in_progress("CA1", 1));
        assert!(!cache.mark_in_progress("CA1", 2));
        assert_eq!(cache.take("CA1"), TakeOutcome::NotReady);
        assert_eq!(cache.take("CA1"), TakeOutcome::NotReady);

        assert!(cache.complete("CA1", 1, ready("hi")));
        assert!(cache.is_ready("CA1"));
        assert_eq!(cache.take("CA1"), TakeOutcome::Ready(ready("hi")));
        assert_eq!(cache.take("CA1"), TakeOutcome::Absent);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_ticket_cannot_write() {
        let cache = ResultCache::new();
        cache.mark_in_progress("CA1", 1);
        cache.discard("CA1");
        cache.mark_in_progress("CA1", 2);

        assert!(!cache.complete("CA1", 1, ready("late")));
        assert!(cache.is_pending("CA1"));
        assert!(cache.complete("CA1", 2, ready("current")));
    }

    #[test]
    fn test_complete_after_discard_is_dropped() {
        let cache = ResultCache::new();
        cache.mark_in_progress("CA1", 7);
        assert!(matches!(cache.discard("CA1"), Some(PendingSlot::InProgress { ticket: 7, .. })));
        assert!(cache.discard("CA1").is_none());
        assert!(!cache.complete("CA1", 7, ready("late")));
        assert_eq!(cache.take("CA1"), TakeOutcome::Absent);
    }

    #[tokio::test]
    async fn test_begin_produces_ready_reply() {
        let pipeline = pipeline(false, false);
        let handle = pipeline
            .begin("CA1", scenario(), vec![Turn::agent("Hello?")], "How can I help?".to_string())
            .unwrap();
        handle.await.unwrap();

        match pipeline.cache().take("CA1") {
            TakeOutcome::Ready(reply) => {
                assert_eq!(reply.text, "reply #1 to How can I help?");
                assert!(!reply.end_call);
                assert_eq!(
                    reply.audio,
                    SpeechAudio::Synthesized(AudioRef::new("27.mp3"))
                );
            }
            other => panic!("expected ready reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_begin_while_in_flight_is_refused() {
        let pipeline = pipeline(false, false);
        let first = pipeline.begin("CA1", scenario(), vec![], "one".to_string());
        let second = pipeline.begin("CA1", scenario(), vec![], "two".to_string());

        assert!(first.is_some());
        assert!(second.is_none());
        first.unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_failure_becomes_apology() {
        let pipeline = pipeline(true, false);
        pipeline
            .begin("CA1", scenario(), vec![], "Hello".to_string())
            .unwrap()
            .await
            .unwrap();

        let TakeOutcome::Ready(reply) = pipeline.cache().take("CA1") else {
            panic!("expected ready reply");
        };
        assert_eq!(reply.text, utterances::APOLOGY);
        assert!(!reply.end_call);
        assert!(!reply.audio.is_fallback());
    }

    #[tokio::test]
    async fn test_synthesis_failure_uses_fallback_voice() {
        let pipeline = pipeline(false, true);
        pipeline
            .begin("CA1", scenario(), vec![], "ok bye".to_string())
            .unwrap()
            .await
            .unwrap();

        let TakeOutcome::Ready(reply) = pipeline.cache().take("CA1") else {
            panic!("expected ready reply");
        };
        assert!(reply.end_call);
        assert_eq!(reply.audio, SpeechAudio::Fallback);
    }

    #[tokio::test]
    async fn test_result_for_ended_call_is_discarded() {
        let pipeline = pipeline(false, false);
        let handle = pipeline
            .begin("CA1", scenario(), vec![], "Hello".to_string())
            .unwrap();
        pipeline.cache().discard("CA1");
        handle.await.unwrap();

        assert_eq!(pipeline.cache().take("CA1"), TakeOutcome::Absent);
    }

    #[tokio::test]
    async fn test_late_result_releases_its_clip() {
        let (pipeline, synth) = tracked_pipeline();
        let handle = pipeline
            .begin("CA1", scenario(), vec![], "Hello".to_string())
            .unwrap();
        pipeline.abandon("CA1");
        handle.await.unwrap();

        assert_eq!(*synth.released.lock(), vec![AudioRef::new("17.mp3")]);
    }

    #[tokio::test]
    async fn test_abandon_releases_undelivered_reply() {
        let (pipeline, synth) = tracked_pipeline();
        pipeline
            .begin("CA1", scenario(), vec![], "Hello".to_string())
            .unwrap()
            .await
            .unwrap();
        assert!(pipeline.cache().is_ready("CA1"));

        pipeline.abandon("CA1").unwrap().await.unwrap();
        assert_eq!(*synth.released.lock(), vec![AudioRef::new("17.mp3")]);
        assert!(pipeline.cache().is_empty());
        assert!(pipeline.abandon("CA1").is_none());
    }

    #[tokio::test]
    async fn test_release_skips_empty_batch() {
        let (pipeline, synth) = tracked_pipeline();
        assert!(pipeline.release(Vec::new()).is_none());

        pipeline
            .release(vec![AudioRef::new("a.mp3"), AudioRef::new("b.mp3")])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(synth.released.lock().len(), 2);
    }
}
