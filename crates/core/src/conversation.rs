//! Conversation types: turns, roles and the scenario a call plays out

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one live call, assigned by the telephony layer
pub type CallId = String;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The telephony agent under test
    Agent,
    /// The simulated caller driven by this system
    Caller,
}

impl TurnRole {
    /// Label written into saved transcripts
    pub fn transcript_label(&self) -> &'static str {
        match self {
            TurnRole::Agent => "AGENT",
            TurnRole::Caller => "PATIENT",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::Agent => write!(f, "agent"),
            TurnRole::Caller => write!(f, "caller"),
        }
    }
}

/// One utterance in the dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            text: text.into(),
        }
    }

    pub fn caller(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Caller,
            text: text.into(),
        }
    }
}

/// A test scenario: who the simulated caller is and how they open the call.
///
/// Read-only after start-up and shared by every session that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub system_prompt: String,
    pub opening_line: String,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        opening_line: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            opening_line: opening_line.into(),
        }
    }
}

/// Output of reply generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The simulated caller wants to hang up after saying `text`
    pub end_call: bool,
}

impl Reply {
    pub fn new(text: impl Into<String>, end_call: bool) -> Self {
        Self {
            text: text.into(),
            end_call,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_labels() {
        assert_eq!(TurnRole::Agent.transcript_label(), "AGENT");
        assert_eq!(TurnRole::Caller.transcript_label(), "PATIENT");
    }

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::agent("Hello");
        assert_eq!(turn.role, TurnRole::Agent);
        assert_eq!(Turn::caller("Hi").role, TurnRole::Caller);
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&TurnRole::Caller).unwrap();
        assert_eq!(json, "\"caller\"");
    }
}
