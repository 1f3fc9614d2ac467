use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{ChatMessage, LlmClient, LlmError, LlmParams, LlmTokenStream};
use crate::infrastructure::observability::sanitize_prompt;

/// OpenAI-compatible chat completions client. Also fronts the aggregators
/// (OpenRouter, Moonshot, …) that speak the same wire format with a
/// different base URL.
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    cost_per_million_tokens: f64,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        cost_per_million_tokens: f64,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model,
            cost_per_million_tokens,
        }
    }

    fn wire_messages(&self, messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|message| WireMessage {
                role: message.role.clone(),
                content: message.content.clone(),
            })
            .collect()
    }

    fn model_for(&self, params: &LlmParams) -> String {
        params.model_id.clone().unwrap_or_else(|| self.model.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> Result<String, LlmError> {
        let request_body = ChatCompletionRequest {
            model: self.model_for(params),
            messages: self.wire_messages(messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: None,
        };

        if let Some(last) = messages.last() {
            tracing::debug!(
                model = %request_body.model,
                prompt = %sanitize_prompt(&last.content),
                "Chat completion request"
            );
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()))
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> Result<LlmTokenStream, LlmError> {
        let request_body = ChatCompletionRequest {
            model: self.model_for(params),
            messages: self.wire_messages(messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: Some(true),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let stream = response.bytes_stream();
        let token_stream = Box::pin(stream.flat_map(|chunk_result| {
            let items: Vec<Result<String, LlmError>> = match chunk_result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    let mut tokens = Vec::new();
                    for line in text.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                break;
                            }
                            if let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) {
                                if let Some(choice) = chunk.choices.first() {
                                    if let Some(content) = &choice.delta.content {
                                        tokens.push(Ok(content.clone()));
                                    }
                                }
                            }
                        }
                    }
                    tokens
                }
                Err(e) => vec![Err(LlmError::ApiRequestFailed(e.to_string()))],
            };
            futures::stream::iter(items)
        }));

        Ok(token_stream)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.cost_per_million_tokens * (input_tokens + output_tokens) as f64 / 1_000_000.0
    }
}
