//! Call orchestrator
//!
//! Consumes telephony events for every live call and answers each with a
//! [`CallResponse`]. Events for one call arrive strictly one after another; events for
//! different calls may interleave freely.
//!
//! ```text
//! CallStart ──► AwaitingAgentOpening ──speech──► ProcessingReply ──poll(ready)──► AwaitingAgentTurn
//!                     │                               │   ▲                              │
//!                  silence                      poll(not ready)                       speech
//!                     ▼                               └───┘                              │
//!              SilenceEscalation(1..3) ──speech──► ProcessingReply ◄─────────────────────┘
//!
//! max turns reached, end-of-call reply, or CallEnd ──► CallEnded
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use voicebot_config::constants::utterances;
use voicebot_config::{CallConfig, ScenarioCatalog};
use voicebot_core::{CallId, TranscriptStore, Turn};
use voicebot_pipeline::{FillerSelector, LatencyHidingPipeline, TakeOutcome};

use crate::response::{CallResponse, Callback};
use crate::session::{CallPhase, CallSession, SessionState, SessionStore};

/// Silence level at which the caller speaks its opening line
const OPENING_LINE_LEVEL: u32 = 3;

/// Inbound telephony event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    CallStart {
        call_id: CallId,
        scenario: Option<String>,
    },
    SpeechCaptured {
        call_id: CallId,
        text: String,
    },
    SilenceTimeout {
        call_id: CallId,
    },
    PollForResult {
        call_id: CallId,
    },
    CallEnd {
        call_id: CallId,
        duration_secs: u64,
        status: String,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> &str {
        match self {
            CallEvent::CallStart { call_id, .. }
            | CallEvent::SpeechCaptured { call_id, .. }
            | CallEvent::SilenceTimeout { call_id }
            | CallEvent::PollForResult { call_id }
            | CallEvent::CallEnd { call_id, .. } => call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallEvent::CallStart { .. } => "call_start",
            CallEvent::SpeechCaptured { .. } => "speech",
            CallEvent::SilenceTimeout { .. } => "silence",
            CallEvent::PollForResult { .. } => "poll",
            CallEvent::CallEnd { .. } => "call_end",
        }
    }
}

/// The per-call state machine shared by all webhook handlers
pub struct CallOrchestrator {
    config: CallConfig,
    catalog: Arc<ScenarioCatalog>,
    sessions: Arc<SessionStore>,
    pipeline: Arc<LatencyHidingPipeline>,
    fillers: Arc<FillerSelector>,
    transcripts: Arc<dyn TranscriptStore>,
}

impl CallOrchestrator {
    pub fn new(
        config: CallConfig,
        catalog: Arc<ScenarioCatalog>,
        sessions: Arc<SessionStore>,
        pipeline: Arc<LatencyHidingPipeline>,
        fillers: Arc<FillerSelector>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            sessions,
            pipeline,
            fillers,
            transcripts,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    pub fn pipeline(&self) -> &Arc<LatencyHidingPipeline> {
        &self.pipeline
    }

    pub fn fillers(&self) -> &Arc<FillerSelector> {
        &self.fillers
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Dispatch one event. `CallEnd` yields an empty response.
    pub async fn handle(&self, event: CallEvent) -> CallResponse {
        match event {
            CallEvent::CallStart { call_id, scenario } => {
                self.call_started(&call_id, scenario.as_deref())
            }
            CallEvent::SpeechCaptured { call_id, text } => self.speech_captured(&call_id, &text),
            CallEvent::SilenceTimeout { call_id } => self.silence_timeout(&call_id),
            CallEvent::PollForResult { call_id } => self.poll(&call_id),
            CallEvent::CallEnd {
                call_id,
                duration_secs,
                status,
            } => {
                self.call_ended(&call_id, duration_secs, &status).await;
                CallResponse::new()
            }
        }
    }

    /// Call connected: bind the scenario and listen quietly for the agent's greeting
    pub fn call_started(&self, call_id: &str, scenario: Option<&str>) -> CallResponse {
        let (session, created) = self.sessions.get_or_create(call_id, || {
            let scenario = self.catalog.find(scenario);
            let transcript = self.transcripts.open(&scenario.name, call_id);
            CallSession::new(call_id, scenario, transcript)
        });

        if created {
            metrics::counter!("voicebot_calls_started_total").increment(1);
            tracing::info!(call_id, scenario = %session.scenario.name, "Call started");
        } else {
            let phase = session.phase();
            tracing::warn!(call_id, %phase, "Duplicate call start, keeping existing session");

            match phase {
                CallPhase::ProcessingReply => return self.wait_and_poll(),
                CallPhase::CallEnded => return CallResponse::hangup_only(),
                _ => {}
            }
        }

        CallResponse::new()
            .wait(self.config.listen_pause_secs)
            .listen(self.config.opening_listen)
    }

    /// The agent finished speaking
    pub fn speech_captured(&self, call_id: &str, text: &str) -> CallResponse {
        let Some(session) = self.sessions.get(call_id) else {
            return self.orphaned(call_id, "speech");
        };

        let text = text.trim();
        if text.is_empty() {
            tracing::info!(call_id, "Empty speech result, treating as silence");
            return self.silence_timeout(call_id);
        }

        let mut state = session.lock();
        match state.phase {
            CallPhase::CallEnded => return CallResponse::hangup_only(),
            CallPhase::ProcessingReply => {
                tracing::warn!(call_id, "Speech while a reply is pending, ignoring");
                return self.wait_and_poll();
            }
            _ => {}
        }

        state.silence_count = 0;
        state.turns += 1;
        let turn = state.turns;
        state.record(Turn::agent(text));

        metrics::counter!("voicebot_agent_turns_total").increment(1);
        tracing::info!(call_id, turn, agent = text, "Agent turn");

        if turn >= self.config.max_turns {
            state.record(Turn::caller(utterances::GOODBYE));
            state.phase = CallPhase::CallEnded;
            tracing::info!(call_id, turn, "Max turns reached, ending call");

            return CallResponse::new()
                .say(utterances::GOODBYE)
                .wait(1)
                .hangup();
        }

        let prior = state.history[..state.history.len() - 1].to_vec();
        state.phase = CallPhase::ProcessingReply;
        state.poll_attempts = 0;
        drop(state);

        let started = self
            .pipeline
            .begin(call_id, Arc::clone(&session.scenario), prior, text.to_string());
        if started.is_none() {
            tracing::error!(call_id, turn, "Reply slot still occupied, dropping it");
            self.pipeline.abandon(call_id);
            return self.apologize(&mut session.lock());
        }

        match self.fillers.select_for(text, turn) {
            Some(clip) => {
                metrics::counter!("voicebot_filler_plays_total").increment(1);
                tracing::debug!(call_id, filler = %clip.text, "Playing filler");
                CallResponse::new().play(clip.audio).redirect(Callback::Poll)
            }
            None => self.wait_and_poll(),
        }
    }

    /// A listen window closed without speech
    pub fn silence_timeout(&self, call_id: &str) -> CallResponse {
        let Some(session) = self.sessions.get(call_id) else {
            return self.orphaned(call_id, "silence");
        };

        let mut state = session.lock();
        match state.phase {
            CallPhase::CallEnded => return CallResponse::hangup_only(),
            CallPhase::ProcessingReply => return self.wait_and_poll(),
            _ => {}
        }

        state.silence_count = state.silence_count.saturating_add(1);
        let count = state.silence_count;
        let level = count.min(OPENING_LINE_LEVEL);
        state.phase = CallPhase::SilenceEscalation(level);

        metrics::counter!("voicebot_silence_timeouts_total", "level" => level.to_string())
            .increment(1);
        tracing::info!(call_id, silence = count, "Silence timeout");

        match level {
            1 => CallResponse::new()
                .wait(self.config.listen_pause_secs)
                .listen(self.config.patient_listen),
            2 => CallResponse::new()
                .say(utterances::SILENCE_CHECK)
                .wait(1)
                .listen(self.config.relisten),
            _ => {
                let opening = if session.scenario.opening_line.trim().is_empty() {
                    utterances::DEFAULT_OPENING
                } else {
                    session.scenario.opening_line.as_str()
                };

                if count == OPENING_LINE_LEVEL {
                    tracing::info!(call_id, opening, "Caller opens the conversation");
                    state.record(Turn::caller(opening));
                }

                CallResponse::new()
                    .say(opening)
                    .wait(1)
                    .listen(self.config.relisten)
            }
        }
    }

    /// Telephony checks back for the pending reply
    pub fn poll(&self, call_id: &str) -> CallResponse {
        let Some(session) = self.sessions.get(call_id) else {
            return self.orphaned(call_id, "poll");
        };

        let mut state = session.lock();
        match state.phase {
            CallPhase::CallEnded => return CallResponse::hangup_only(),
            CallPhase::ProcessingReply => {}
            phase => {
                tracing::warn!(call_id, %phase, "Poll with no reply pending");
                return self.relisten_after_reply();
            }
        }

        match self.pipeline.cache().take(call_id) {
            TakeOutcome::Ready(reply) => {
                state.poll_attempts = 0;
                state.record(Turn::caller(reply.text.as_str()));
                state.clips.extend(reply.clip().cloned());
                metrics::counter!("voicebot_replies_delivered_total").increment(1);
                tracing::info!(
                    call_id,
                    end_call = reply.end_call,
                    fallback_voice = reply.audio.is_fallback(),
                    caller = %reply.text,
                    "Delivering reply"
                );

                let response = CallResponse::new().speak(&reply.text, &reply.audio).wait(1);
                if reply.end_call {
                    state.phase = CallPhase::CallEnded;
                    response.hangup()
                } else {
                    state.phase = CallPhase::AwaitingAgentTurn;
                    response.listen(self.config.reply_listen)
                }
            }
            TakeOutcome::NotReady => {
                state.poll_attempts += 1;
                let attempts = state.poll_attempts;

                if attempts >= self.config.max_poll_attempts {
                    let age = self.pipeline.cache().pending_age(call_id);
                    self.pipeline.abandon(call_id);
                    tracing::warn!(call_id, attempts, ?age, "Reply never arrived, giving up");
                    return self.apologize(&mut state);
                }

                let every = self.config.filler_every_polls;
                if every > 0 && attempts % every == 0 {
                    if let Some(clip) = self.fillers.rotate() {
                        metrics::counter!("voicebot_filler_plays_total").increment(1);
                        tracing::debug!(call_id, attempts, filler = %clip.text, "Filling long wait");
                        return CallResponse::new().play(clip.audio).redirect(Callback::Poll);
                    }
                }

                self.wait_and_poll()
            }
            TakeOutcome::Absent => {
                tracing::warn!(call_id, "Reply slot missing while processing");
                self.apologize(&mut state)
            }
        }
    }

    /// Call is over: flush the transcript, release the call's clips and forget the session.
    ///
    /// Returns where the transcript was written. Unknown or already-ended calls are a no-op.
    pub async fn call_ended(&self, call_id: &str, duration_secs: u64, status: &str) -> Option<String> {
        settle(call_id, self.pipeline.abandon(call_id)).await;

        let Some(session) = self.sessions.remove(call_id) else {
            tracing::debug!(call_id, status, "Call end for unknown session");
            return None;
        };

        let (transcript, turns, clips) = {
            let mut state = session.lock();
            state.phase = CallPhase::CallEnded;
            (
                state.take_transcript(),
                state.turns,
                std::mem::take(&mut state.clips),
            )
        };

        metrics::counter!("voicebot_calls_ended_total", "status" => status.to_string())
            .increment(1);
        tracing::info!(
            call_id,
            status,
            duration_secs,
            turns,
            age_secs = session.age().as_secs(),
            "Call ended"
        );

        settle(call_id, self.pipeline.release(clips)).await;

        let mut transcript = transcript?;
        match transcript.flush(duration_secs).await {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::error!(call_id, error = %e, "Failed to save transcript");
                None
            }
        }
    }

    fn apologize(&self, state: &mut SessionState) -> CallResponse {
        state.poll_attempts = 0;
        state.phase = CallPhase::AwaitingAgentTurn;
        state.record(Turn::caller(utterances::APOLOGY));
        metrics::counter!("voicebot_reply_fallbacks_total", "kind" => "timeout").increment(1);

        CallResponse::new()
            .say(utterances::APOLOGY)
            .wait(1)
            .listen(self.config.reply_listen)
    }

    fn wait_and_poll(&self) -> CallResponse {
        CallResponse::new()
            .wait(self.config.poll_interval_secs)
            .redirect(Callback::Poll)
    }

    fn relisten_after_reply(&self) -> CallResponse {
        CallResponse::new().wait(1).listen(self.config.reply_listen)
    }

    /// Answer a callback that belongs to no live call
    pub fn orphaned(&self, call_id: &str, event: &'static str) -> CallResponse {
        metrics::counter!("voicebot_orphaned_callbacks_total", "event" => event).increment(1);
        tracing::error!(call_id, event, "No session for call, hanging up");
        CallResponse::hangup_only()
    }
}

/// Wait for clip cleanup so a finished call leaves nothing behind
async fn settle(call_id: &str, cleanup: Option<JoinHandle<()>>) {
    if let Some(handle) = cleanup {
        if let Err(e) = handle.await {
            tracing::warn!(call_id, error = %e, "Clip cleanup task failed");
        }
    }
}
