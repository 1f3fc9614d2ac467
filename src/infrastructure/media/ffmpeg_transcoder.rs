use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::application::ports::{TranscodeError, TranscodedAudio, Transcoder};

const TARGET_SAMPLE_RATE: &str = "16000";

/// ffmpeg/ffprobe-backed normalization to mono 16 kHz WAV, the one format
/// every ASR vendor in the catalog accepts.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: Option<String>, ffprobe_path: Option<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: ffprobe_path.unwrap_or_else(|| "ffprobe".to_string()),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn normalize(
        &self,
        input: &Path,
        work_dir: &Path,
    ) -> Result<TranscodedAudio, TranscodeError> {
        let output = work_dir.join("canonical.wav");

        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ac", "1", "-ar", TARGET_SAMPLE_RATE, "-acodec", "pcm_s16le", "-vn"])
            .arg(&output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| TranscodeError::Failed(format!("ffmpeg spawn: {}", e)))?;
        if !status.success() {
            return Err(TranscodeError::Failed(format!(
                "ffmpeg exited with {}",
                status
            )));
        }

        let duration_seconds = self.probe_duration(&output).await.unwrap_or(0.0);
        tracing::debug!(
            input = %input.display(),
            duration = duration_seconds,
            "Audio normalized"
        );

        Ok(TranscodedAudio {
            path: output,
            duration_seconds,
        })
    }

    async fn probe_duration(&self, input: &Path) -> Result<f64, TranscodeError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .await
            .map_err(|e| TranscodeError::ProbeFailed(format!("ffprobe spawn: {}", e)))?;
        if !output.status.success() {
            return Err(TranscodeError::ProbeFailed(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| TranscodeError::ProbeFailed(format!("unparseable duration: {}", e)))
    }
}
