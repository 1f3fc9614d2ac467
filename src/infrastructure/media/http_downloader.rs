use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{DownloadedMedia, MediaDownloader, MediaError};

/// Streams a media URL to disk, enforcing the size ceiling as bytes
/// arrive. `file://` URLs are copied locally, which keeps the local
/// storage backend usable in development.
pub struct HttpMediaDownloader {
    client: reqwest::Client,
}

impl HttpMediaDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMediaDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDownloader for HttpMediaDownloader {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        max_bytes: u64,
    ) -> Result<DownloadedMedia, MediaError> {
        if let Some(path) = url.strip_prefix("file://") {
            let metadata = tokio::fs::metadata(path).await?;
            if metadata.len() > max_bytes {
                return Err(MediaError::TooLarge(max_bytes));
            }
            tokio::fs::copy(path, dest).await?;
            return Ok(DownloadedMedia {
                path: dest.to_path_buf(),
                size_bytes: metadata.len(),
                content_type: None,
            });
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MediaError::FetchFailed(format!(
                "status {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(MediaError::TooLarge(max_bytes));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| MediaError::FetchFailed(e.to_string()))?;
            total_bytes += bytes.len() as u64;
            if total_bytes > max_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(dest).await;
                return Err(MediaError::TooLarge(max_bytes));
            }
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = total_bytes, "Download finished");
        Ok(DownloadedMedia {
            path: dest.to_path_buf(),
            size_bytes: total_bytes,
            content_type,
        })
    }
}
