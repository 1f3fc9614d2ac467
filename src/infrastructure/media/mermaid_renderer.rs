use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;

use crate::application::ports::{RenderError, VisualRenderer};

/// Mermaid CLI (`mmdc`) renderer. Entirely optional: when the binary is
/// missing, visual summaries stay text-only.
pub struct MermaidCliRenderer {
    mmdc_path: String,
}

impl MermaidCliRenderer {
    pub fn new(mmdc_path: Option<String>) -> Self {
        Self {
            mmdc_path: mmdc_path.unwrap_or_else(|| "mmdc".to_string()),
        }
    }
}

#[async_trait]
impl VisualRenderer for MermaidCliRenderer {
    async fn render(&self, mermaid: &str, format: &str) -> Result<Bytes, RenderError> {
        let work_dir = std::env::temp_dir().join(format!("mermaid-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        let input = work_dir.join("diagram.mmd");
        let output = work_dir.join(format!("diagram.{}", format));

        let result = async {
            tokio::fs::write(&input, mermaid)
                .await
                .map_err(|e| RenderError::Failed(e.to_string()))?;

            let status = Command::new(&self.mmdc_path)
                .arg("-i")
                .arg(&input)
                .arg("-o")
                .arg(&output)
                .args(["-b", "transparent"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| RenderError::Unavailable(format!("mmdc spawn: {}", e)))?;
            if !status.success() {
                return Err(RenderError::Failed(format!("mmdc exited with {}", status)));
            }

            let bytes = tokio::fs::read(&output)
                .await
                .map_err(|e| RenderError::Failed(e.to_string()))?;
            Ok(Bytes::from(bytes))
        }
        .await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            tracing::debug!(error = %e, "Mermaid scratch cleanup failed");
        }
        result
    }
}
