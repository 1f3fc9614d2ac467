use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct TranscodedAudio {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

/// Normalizes arbitrary media into the canonical audio format the ASR
/// vendors accept (mono, fixed sample rate).
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn normalize(&self, input: &Path, work_dir: &Path)
        -> Result<TranscodedAudio, TranscodeError>;

    async fn probe_duration(&self, input: &Path) -> Result<f64, TranscodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("transcode failed: {0}")]
    Failed(String),
    #[error("media probe failed: {0}")]
    ProbeFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
