//! Prompt Building
//!
//! Constructs the chat messages that make the model play a patient calling a medical
//! office. The model plays the `assistant`; the agent under test is the `user`.

use std::fmt;

use serde::{Deserialize, Serialize};
use voicebot_core::{Scenario, Turn, TurnRole};

/// Persona rules shared by every scenario
pub const BASE_PATIENT_PROMPT: &str = "\
You are a patient calling a medical or dental office. Stay in character for the entire call.

Rules:
- Speak naturally and conversationally, like a real person on the phone.
- Keep each response to 1-3 sentences — real callers are concise.
- Answer any questions the receptionist asks (name, DOB, insurance, etc.).
- Do NOT rush to end the call. Have a complete, realistic conversation.
- If something in the receptionist's response seems wrong, incorrect, or odd, \
gently push back or ask a clarifying question about it.
- When the conversation has naturally concluded and you have said goodbye, \
append the token [END] at the very end of your message.
- Do NOT include [END] until you have fully wrapped up and said goodbye.
- NEVER use placeholders like [Your Name], [Your DOB], [Month/Day/Year], or any \
bracketed template text. Always invent realistic fake values on the spot. \
Use names like \"James Miller\", dates like \"March 15, 1990\", \
insurance like \"Blue Cross Blue Shield\". Speak as if these are real details.
- You are ALWAYS a male patient. Use a male name for yourself. \
If you mention a spouse, she is female.
- If you are given an opening line, you MUST use it EXACTLY as your very first \
message — word for word. Do not paraphrase, do not change any names, \
do not add or remove anything. Your first message must be that exact line.";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            TurnRole::Agent => Message::user(turn.text.clone()),
            TurnRole::Caller => Message::assistant(turn.text.clone()),
        }
    }
}

/// Prompt builder for the simulated patient
pub struct PatientPromptBuilder<'a> {
    scenario: &'a Scenario,
    messages: Vec<Message>,
}

impl<'a> PatientPromptBuilder<'a> {
    /// Start a prompt with the persona rules and the scenario brief
    pub fn new(scenario: &'a Scenario) -> Self {
        let system = format!(
            "{}\n\nYour scenario:\n{}",
            BASE_PATIENT_PROMPT, scenario.system_prompt
        );

        Self {
            scenario,
            messages: vec![Message::system(system)],
        }
    }

    /// Append the dialogue so far
    pub fn with_history(mut self, history: &[Turn]) -> Self {
        self.messages.extend(history.iter().map(Message::from));
        self
    }

    /// Append what the agent just said
    pub fn agent_utterance(mut self, text: &str) -> Self {
        self.messages.push(Message::user(text));
        self
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario.name
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}
