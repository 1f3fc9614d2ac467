use async_trait::async_trait;

use crate::domain::{AsrVariant, WordTimestamp};

#[derive(Debug, Clone, Default)]
pub struct AsrRequest {
    pub language: Option<String>,
    pub variant: Option<AsrVariant>,
    pub enable_speaker_diarization: bool,
    /// Known media length in seconds, when the caller has one. Engines may
    /// use it for polling budgets; the authoritative duration is the one
    /// they report back.
    pub duration_hint: Option<f64>,
}

/// Vendor-neutral transcript piece, before it is attached to a task.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrSegment {
    pub speaker_id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub content: String,
    pub confidence: Option<f64>,
    pub words: Option<Vec<WordTimestamp>>,
}

#[derive(Debug, Clone)]
pub struct Transcription {
    pub segments: Vec<AsrSegment>,
    /// Seconds of audio the vendor actually consumed.
    pub duration_seconds: f64,
}

#[async_trait]
pub trait AsrEngine: Send + Sync {
    async fn transcribe(
        &self,
        audio_url: &str,
        request: &AsrRequest,
    ) -> Result<Transcription, AsrError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AsrError {
    #[error("transient asr failure: {0}")]
    Transient(String),
    #[error("asr request timed out: {0}")]
    Timeout(String),
    #[error("asr quota exceeded for provider {0}")]
    QuotaExceeded(String),
    #[error("unsupported audio format: {0}")]
    InvalidFormat(String),
    #[error("asr service unavailable: {0}")]
    Unavailable(String),
    #[error("asr configuration error: {0}")]
    Config(String),
}

impl AsrError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AsrError::Transient(_) | AsrError::Timeout(_) | AsrError::Unavailable(_)
        )
    }
}
