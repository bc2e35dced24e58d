//! LLM Backend implementations
//!
//! A single OpenAI-compatible chat completions backend. Works against OpenAI itself and
//! against local servers that expose the same API (vLLM, Ollama's `/v1` endpoint).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::prompt::Message;
use crate::LlmError;

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Tokens generated, when the backend reports usage
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut off at `max_tokens`
    Length,
    Other,
}

impl FinishReason {
    fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(_) => FinishReason::Other,
        }
    }
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a complete (non-streaming) response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Check if model is available
    async fn is_available(&self) -> bool;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API endpoint (OpenAI: https://api.openai.com/v1)
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature (0-2)
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: voicebot_config::constants::endpoints::OPENAI_DEFAULT.to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 200,
            temperature: 0.8,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&voicebot_config::LlmConfig> for OpenAIConfig {
    fn from(settings: &voicebot_config::LlmConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build request headers
    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        let auth_value = format!("Bearer {}", self.config.api_key);
        if let Ok(val) = HeaderValue::from_str(&auth_value) {
            headers.insert(reqwest::header::AUTHORIZATION, val);
        }

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers
    }

    fn build_request(&self, messages: &[Message]) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        }
    }
}

fn is_local(endpoint: &str) -> bool {
    endpoint.starts_with("http://localhost") || endpoint.starts_with("http://127.0.0.1")
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages);

        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(GenerationResult {
            text: choice.message.content.unwrap_or_default(),
            tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        self.client
            .get(&url)
            .headers(self.build_headers())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_config_default() {
        let config = OpenAIConfig::default();
        assert_eq!(config.endpoint, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 200);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = voicebot_config::LlmConfig::default();
        settings.api_key = "sk-test".to_string();
        settings.timeout_secs = 7;

        let config = OpenAIConfig::from(&settings);
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    fn local(endpoint: &str) -> OpenAIConfig {
        OpenAIConfig {
            endpoint: endpoint.to_string(),
            model: "llama-3".to_string(),
            ..Default::default()
        }
    }

    fn remote(api_key: &str) -> OpenAIConfig {
        OpenAIConfig {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_openai_backend_creation() {
        assert!(OpenAIBackend::new(local("http://localhost:8000/v1")).is_ok());

        // Remote endpoint requires API key
        assert!(OpenAIBackend::new(OpenAIConfig::default()).is_err());
        assert!(OpenAIBackend::new(remote("sk-xxx")).is_ok());
    }

    #[test]
    fn test_openai_chat_url() {
        let backend = OpenAIBackend::new(local("http://localhost:8000/v1/")).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let mut config = local("http://127.0.0.1:9/v1");
        config.timeout = Duration::from_millis(500);
        let backend = OpenAIBackend::new(config).unwrap();
        assert!(!backend.is_available().await);
    }

    #[test]
    fn test_request_serialization() {
        let backend = OpenAIBackend::new(remote("sk-xxx")).unwrap();
        let request = backend.build_request(&[Message::system("Be a patient."), Message::user("Hello")]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_api(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_api(None), FinishReason::Stop);
        assert_eq!(FinishReason::from_api(Some("length")), FinishReason::Length);
        assert_eq!(FinishReason::from_api(Some("content_filter")), FinishReason::Other);
    }

    #[test]
    fn test_response_with_null_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#;
        let response: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        assert!(response.choices[0].message.content.is_none());
        assert!(response.usage.is_none());
    }
}
