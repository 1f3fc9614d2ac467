use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub download_url: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
}

/// Turns a user-supplied page or media URL into a direct download URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia, MediaError>;
}

/// Streams a direct media URL to a local file with a size ceiling.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        max_bytes: u64,
    ) -> Result<DownloadedMedia, MediaError>;
}

#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("no playable media found at {0}")]
    NoMediaFound(String),
    #[error("download exceeds size limit of {0} bytes")]
    TooLarge(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::FetchFailed(_) | MediaError::Io(_))
    }
}
