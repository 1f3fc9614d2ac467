use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmParams {
    pub temperature: f32,
    pub max_tokens: usize,
    pub model_id: Option<String>,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1500,
            model_id: None,
        }
    }
}

pub type LlmTokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], params: &LlmParams)
        -> Result<String, LlmError>;

    /// One-shot prompt with an optional system message; sugar over `chat`.
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: &LlmParams,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages, params).await
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _params: &LlmParams,
    ) -> Result<LlmTokenStream, LlmError> {
        Err(LlmError::StreamingUnsupported)
    }

    fn model_name(&self) -> &str;

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("llm request timed out: {0}")]
    Timeout(String),
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("streaming not supported by this provider")]
    StreamingUnsupported,
    #[error("llm configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::ApiRequestFailed(_) | LlmError::Timeout(_) | LlmError::RateLimited
        )
    }
}
