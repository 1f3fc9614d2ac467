use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::ports::{ChatMessage, LlmClient, LlmError, LlmParams};

/// Canned-response client for tests. Records every prompt it sees.
pub struct MockLlmClient {
    responses: Mutex<Vec<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    model: String,
}

impl MockLlmClient {
    pub fn always(response: &str) -> Self {
        Self::scripted(vec![Ok(response.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(message.to_string())])
    }

    pub fn scripted(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            model: "mock-llm".to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _params: &LlmParams,
    ) -> Result<String, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut prompts = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
            prompts.extend(messages.iter().map(|message| message.content.clone()));
        }
        let responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = responses
            .get(call.min(responses.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()));
        outcome.map_err(LlmError::ApiRequestFailed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens + output_tokens) as f64 / 1_000_000.0
    }
}
