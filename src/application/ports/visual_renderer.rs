use async_trait::async_trait;
use bytes::Bytes;

/// Renders Mermaid diagram source into an image via an external tool.
/// Optional: when absent or failing, visuals fall back to text-only
/// Mermaid source.
#[async_trait]
pub trait VisualRenderer: Send + Sync {
    async fn render(&self, mermaid: &str, format: &str) -> Result<Bytes, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("render failed: {0}")]
    Failed(String),
}
