mod deepgram_engine;
mod mock_engine;
mod openai_whisper_engine;

pub use deepgram_engine::DeepgramEngine;
pub use mock_engine::MockAsrEngine;
pub use openai_whisper_engine::OpenAiWhisperEngine;
