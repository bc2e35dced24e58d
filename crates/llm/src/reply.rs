//! Simulated caller reply source

use std::sync::Arc;

use async_trait::async_trait;
use voicebot_config::constants::{markers, utterances};
use voicebot_core::{Reply, ReplySource, Result, Scenario, Turn};

use crate::backend::{FinishReason, LlmBackend};
use crate::prompt::PatientPromptBuilder;

/// [`ReplySource`] backed by a chat model playing the patient.
///
/// One request per turn, no retries; failures surface as `Error::Llm` and the pipeline
/// substitutes its apology line.
pub struct PatientReplySource {
    backend: Arc<dyn LlmBackend>,
}

impl PatientReplySource {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

/// Split the raw completion into spoken text and the end-of-call flag.
///
/// Every `[END]` marker is removed. An empty remainder becomes a request to repeat and
/// never ends the call.
pub fn parse_completion(raw: &str) -> Reply {
    let end_call = raw.contains(markers::END_OF_CALL);
    let text = raw.replace(markers::END_OF_CALL, "");
    let text = text.trim();

    if text.is_empty() {
        return Reply::new(utterances::EMPTY_REPLY, false);
    }

    Reply::new(text, end_call)
}

#[async_trait]
impl ReplySource for PatientReplySource {
    async fn generate_reply(
        &self,
        scenario: &Scenario,
        history: &[Turn],
        utterance: &str,
    ) -> Result<Reply> {
        let messages = PatientPromptBuilder::new(scenario)
            .with_history(history)
            .agent_utterance(utterance)
            .build();

        let result = self.backend.generate(&messages).await?;
        if result.finish_reason == FinishReason::Length {
            tracing::warn!(
                scenario = %scenario.name,
                tokens = result.tokens,
                "Reply hit the token limit and was cut off"
            );
        }
        let reply = parse_completion(&result.text);

        tracing::info!(
            scenario = %scenario.name,
            end_call = reply.end_call,
            tokens = result.tokens,
            finish_reason = ?result.finish_reason,
            latency_ms = result.total_time_ms,
            text = %reply.text.chars().take(80).collect::<String>(),
            "Patient reply generated"
        );

        Ok(reply)
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationResult;
    use crate::prompt::{Message, Role};
    use crate::LlmError;
    use parking_lot::Mutex;

    struct CannedBackend {
        response: std::result::Result<String, String>,
        seen: Mutex<Vec<Message>>,
        available: bool,
    }

    impl CannedBackend {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
                available: true,
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("HTTP 500".to_string()),
                seen: Mutex::new(Vec::new()),
                available: false,
            }
        }
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(
            &self,
            messages: &[Message],
        ) -> std::result::Result<GenerationResult, LlmError> {
            *self.seen.lock() = messages.to_vec();
            match &self.response {
                Ok(text) => Ok(GenerationResult {
                    text: text.clone(),
                    tokens: 0,
                    total_time_ms: 1,
                    finish_reason: FinishReason::Stop,
                }),
                Err(e) => Err(LlmError::Api(e.clone())),
            }
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn scenario() -> Scenario {
        Scenario::new("emergency_mid_call", "Mention chest pain.", "Hi, I need a follow up.")
    }

    #[test]
    fn test_parse_plain_reply() {
        let reply = parse_completion("  Sure, it's James Miller.  ");
        assert_eq!(reply, Reply::new("Sure, it's James Miller.", false));
    }

    #[test]
    fn test_parse_end_marker() {
        let reply = parse_completion("Thanks so much, bye! [END]");
        assert_eq!(reply, Reply::new("Thanks so much, bye!", true));
    }

    #[test]
    fn test_parse_empty_reply() {
        assert_eq!(parse_completion("   "), Reply::new("Could you repeat that?", false));
        assert_eq!(parse_completion("[END]"), Reply::new("Could you repeat that?", false));
    }

    #[tokio::test]
    async fn test_generate_reply_builds_messages() {
        let backend = Arc::new(CannedBackend::ok("My name is James Miller."));
        let source = PatientReplySource::new(backend.clone());

        let history = vec![Turn::agent("Hello?"), Turn::caller("Hi, I need a follow up.")];
        let reply = source
            .generate_reply(&scenario(), &history, "Can I get your name?")
            .await
            .unwrap();

        assert_eq!(reply.text, "My name is James Miller.");
        assert!(!reply.end_call);

        let seen = backend.seen.lock();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].role, Role::System);
        assert_eq!(seen[3].content, "Can I get your name?");
        assert_eq!(source.model_name(), "canned");
    }

    #[tokio::test]
    async fn test_backend_failure_is_llm_error() {
        let source = PatientReplySource::new(Arc::new(CannedBackend::failing()));
        let err = source
            .generate_reply(&scenario(), &[], "Hello?")
            .await
            .unwrap_err();

        assert!(matches!(err, voicebot_core::Error::Llm(_)));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_availability_follows_backend() {
        assert!(PatientReplySource::new(Arc::new(CannedBackend::ok("hi"))).is_available().await);
        assert!(!PatientReplySource::new(Arc::new(CannedBackend::failing())).is_available().await);
    }
}
