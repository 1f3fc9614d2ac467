mod anthropic_client;
mod mock_llm_client;
mod openai_client;

pub use anthropic_client::AnthropicClient;
pub use mock_llm_client::MockLlmClient;
pub use openai_client::OpenAiChatClient;
