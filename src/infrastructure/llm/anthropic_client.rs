use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{ChatMessage, LlmClient, LlmError, LlmParams};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API. The system prompt rides in its own field, not
/// the message list.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    cost_per_million_tokens: f64,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        cost_per_million_tokens: f64,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            api_key,
            model,
            cost_per_million_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &LlmParams,
    ) -> Result<String, LlmError> {
        let system = messages
            .iter()
            .find(|message| message.role == "system")
            .map(|message| message.content.clone());
        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .filter(|message| message.role != "system")
            .map(|message| WireMessage {
                role: message.role.clone(),
                content: message.content.clone(),
            })
            .collect();

        let request_body = MessagesRequest {
            model: params.model_id.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
            messages: wire_messages,
        };

        let endpoint = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text: String = result
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty content".to_string()));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.cost_per_million_tokens * (input_tokens + output_tokens) as f64 / 1_000_000.0
    }
}
