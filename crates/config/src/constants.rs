//! Centralized constants for the voice bot
//!
//! Scripted utterances and service endpoints live here so the orchestrator, the reply
//! source and the tests agree on the exact wording.

/// Fixed lines the simulated caller speaks without consulting the language model
pub mod utterances {
    /// Spoken when the conversation hits the turn limit, right before hanging up
    pub const GOODBYE: &str = "Alright, thank you so much for your help. Have a great day, bye!";

    /// Substituted when reply generation fails
    pub const APOLOGY: &str = "I'm sorry, could you repeat that?";

    /// Second-level silence check
    pub const SILENCE_CHECK: &str = "Hello?";

    /// Used when the model returns nothing usable
    pub const EMPTY_REPLY: &str = "Could you repeat that?";

    /// Opening line for scenarios that do not define one
    pub const DEFAULT_OPENING: &str = "Hello, is anyone there?";
}

/// Markers exchanged with the language model
pub mod markers {
    /// Appended by the model once the caller has said goodbye
    pub const END_OF_CALL: &str = "[END]";
}

/// Default service endpoints
pub mod endpoints {
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
    pub const ELEVENLABS_TTS: &str = "https://api.elevenlabs.io/v1/text-to-speech";
}

/// Default filler clip texts, pre-synthesized at start-up
pub mod fillers {
    pub const OKAY: &str = "Okay.";
    pub const MM_HMM: &str = "Mm-hmm.";
    pub const YES: &str = "Yes.";
    pub const SURE: &str = "Sure.";
    pub const RIGHT: &str = "Right.";
    pub const UH_HUH: &str = "Uh-huh.";
    pub const GOT_IT: &str = "Got it.";
    pub const ONE_SECOND: &str = "Okay, one second.";

    pub const DEFAULT_TEXTS: &[&str] = &[OKAY, MM_HMM, YES, SURE, RIGHT, UH_HUH, GOT_IT, ONE_SECOND];

    /// Short, emotionally neutral clips safe to play before the reply content is known
    pub const NEUTRAL: &[&str] = &[OKAY, MM_HMM, UH_HUH];
}

/// Telephony defaults
pub mod telephony {
    pub const DEFAULT_VOICE: &str = "Polly.Matthew-Neural";
    pub const LANGUAGE: &str = "en-US";
}
