//! Call sessions
//!
//! One [`CallSession`] per live call id, created on call start and removed on call end.
//! Mutable state sits behind a per-session mutex; the store's own lock only guards the
//! id → session map, so calls never contend on each other's state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use voicebot_core::{AudioRef, CallId, Scenario, TranscriptSink, Turn};

/// Where the call is in the turn-taking cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Call connected, waiting for the agent's greeting
    AwaitingAgentOpening,
    /// A reply was delivered, waiting for the agent to speak again
    AwaitingAgentTurn,
    /// Consecutive listen windows without speech; level saturates at 3
    SilenceEscalation(u32),
    /// Reply being generated in the background, telephony is polling
    ProcessingReply,
    /// Goodbye spoken or hang-up issued
    CallEnded,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallPhase::AwaitingAgentOpening => write!(f, "awaiting_agent_opening"),
            CallPhase::AwaitingAgentTurn => write!(f, "awaiting_agent_turn"),
            CallPhase::SilenceEscalation(level) => write!(f, "silence_escalation({})", level),
            CallPhase::ProcessingReply => write!(f, "processing_reply"),
            CallPhase::CallEnded => write!(f, "call_ended"),
        }
    }
}

/// Mutable part of a session
pub struct SessionState {
    pub phase: CallPhase,
    pub history: Vec<Turn>,
    /// Accepted agent utterances
    pub turns: u32,
    /// Consecutive silence timeouts since the agent last spoke
    pub silence_count: u32,
    /// Consecutive not-ready polls for the pending reply
    pub poll_attempts: u32,
    /// Synthesized replies played on this call, released when it ends
    pub clips: Vec<AudioRef>,
    transcript: Option<Box<dyn TranscriptSink>>,
}

impl SessionState {
    fn new(transcript: Box<dyn TranscriptSink>) -> Self {
        Self {
            phase: CallPhase::AwaitingAgentOpening,
            history: Vec::new(),
            turns: 0,
            silence_count: 0,
            poll_attempts: 0,
            clips: Vec::new(),
            transcript: Some(transcript),
        }
    }

    /// Append to the dialogue and mirror onto the transcript
    pub fn record(&mut self, turn: Turn) {
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.record_turn(turn.role, &turn.text);
        }
        self.history.push(turn);
    }

    /// Hand the transcript out for flushing; later calls return `None`
    pub fn take_transcript(&mut self) -> Option<Box<dyn TranscriptSink>> {
        self.transcript.take()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("turns", &self.turns)
            .field("silence_count", &self.silence_count)
            .field("poll_attempts", &self.poll_attempts)
            .field("history_len", &self.history.len())
            .field("clips", &self.clips.len())
            .finish()
    }
}

/// A live call
pub struct CallSession {
    pub call_id: CallId,
    pub scenario: Arc<Scenario>,
    pub created_at: DateTime<Utc>,
    started: Instant,
    state: Mutex<SessionState>,
}

impl CallSession {
    pub fn new(
        call_id: impl Into<CallId>,
        scenario: Arc<Scenario>,
        transcript: Box<dyn TranscriptSink>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            scenario,
            created_at: Utc::now(),
            started: Instant::now(),
            state: Mutex::new(SessionState::new(transcript)),
        }
    }

    /// Lock the mutable state. Never hold the guard across an await.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub fn phase(&self) -> CallPhase {
        self.state.lock().phase
    }

    pub fn turns(&self) -> u32 {
        self.state.lock().turns
    }

    pub fn silence_count(&self) -> u32 {
        self.state.lock().silence_count
    }

    /// Snapshot of the dialogue so far
    pub fn history(&self) -> Vec<Turn> {
        self.state.lock().history.clone()
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("call_id", &self.call_id)
            .field("scenario", &self.scenario.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Live calls by call id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<CallId, Arc<CallSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `call_id`, creating it with `init` if absent.
    ///
    /// The flag is true when a new session was inserted.
    pub fn get_or_create<F>(&self, call_id: &str, init: F) -> (Arc<CallSession>, bool)
    where
        F: FnOnce() -> CallSession,
    {
        if let Some(existing) = self.get(call_id) {
            return (existing, false);
        }

        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(call_id) {
            return (Arc::clone(existing), false);
        }

        let session = Arc::new(init());
        sessions.insert(call_id.to_string(), Arc::clone(&session));

        tracing::info!(
            call_id,
            scenario = %session.scenario.name,
            active = sessions.len(),
            "Created session"
        );

        (session, true)
    }

    /// Get a session by call id
    pub fn get(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().get(call_id).cloned()
    }

    /// Remove a session
    pub fn remove(&self, call_id: &str) -> Option<Arc<CallSession>> {
        let removed = self.sessions.write().remove(call_id);
        if removed.is_some() {
            tracing::info!(call_id, "Removed session");
        }
        removed
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.read().contains_key(call_id)
    }

    /// Get active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use voicebot_core::TurnRole;

    #[derive(Default)]
    struct VecSink {
        entries: Vec<Turn>,
    }

    #[async_trait]
    impl TranscriptSink for VecSink {
        fn record_turn(&mut self, role: TurnRole, text: &str) {
            self.entries.push(Turn {
                role,
                text: text.to_string(),
            });
        }

        fn entries(&self) -> &[Turn] {
            &self.entries
        }

        async fn flush(&mut self, _duration_secs: u64) -> voicebot_core::Result<String> {
            Ok("memory".to_string())
        }
    }

    fn session(call_id: &str) -> CallSession {
        CallSession::new(
            call_id,
            Arc::new(Scenario::new("test", "prompt", "Hi there.")),
            Box::new(VecSink::default()),
        )
    }

    #[test]
    fn test_session_creation() {
        let store = SessionStore::new();
        let (session, created) = store.get_or_create("CA1", || session("CA1"));

        assert!(created);
        assert_eq!(session.phase(), CallPhase::AwaitingAgentOpening);
        assert_eq!(session.turns(), 0);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_duplicate_create_keeps_existing() {
        let store = SessionStore::new();
        let (first, _) = store.get_or_create("CA1", || session("CA1"));
        first.lock().turns = 4;

        let (second, created) = store.get_or_create("CA1", || panic!("must not rebuild"));
        assert!(!created);
        assert_eq!(second.turns(), 4);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_session_remove() {
        let store = SessionStore::new();
        store.get_or_create("CA1", || session("CA1"));
        store.get_or_create("CA2", || session("CA2"));

        assert!(store.remove("CA1").is_some());
        assert!(store.remove("CA1").is_none());
        assert!(!store.contains("CA1"));
        assert!(store.contains("CA2"));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_record_mirrors_transcript() {
        let session = session("CA1");
        {
            let mut state = session.lock();
            state.record(Turn::agent("Hello?"));
            state.record(Turn::caller("Hi there."));
        }

        let mut state = session.lock();
        let transcript = state.take_transcript().unwrap();
        assert_eq!(transcript.entries(), state.history.as_slice());
        assert!(state.take_transcript().is_none());

        // Recording after the transcript is gone only touches history
        state.record(Turn::agent("Still there?"));
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CallPhase::SilenceEscalation(2).to_string(), "silence_escalation(2)");
        assert_eq!(CallPhase::ProcessingReply.to_string(), "processing_reply");
    }
}
