use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{AsrEngine, AsrError, AsrRequest, AsrSegment, Transcription};

/// OpenAI-compatible `audio/transcriptions` endpoint. The vendor wants
/// the bytes, not a URL, so the presigned source is fetched first.
pub struct OpenAiWhisperEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiWhisperEngine {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }

    async fn fetch_audio(&self, audio_url: &str) -> Result<Vec<u8>, AsrError> {
        let response = self
            .client
            .get(audio_url)
            .send()
            .await
            .map_err(|e| AsrError::Transient(format!("audio fetch: {}", e)))?;
        if !response.status().is_success() {
            return Err(AsrError::Transient(format!(
                "audio fetch status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AsrError::Transient(format!("audio fetch body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}

#[async_trait]
impl AsrEngine for OpenAiWhisperEngine {
    async fn transcribe(
        &self,
        audio_url: &str,
        request: &AsrRequest,
    ) -> Result<Transcription, AsrError> {
        let audio = self.fetch_audio(audio_url).await?;

        let file_part = multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| AsrError::InvalidFormat(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &request.language {
            if language != "auto" {
                form = form.text("language", language.clone());
            }
        }

        let endpoint = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        tracing::debug!(endpoint = %endpoint, model = %self.model, "Sending audio to Whisper");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AsrError::Transient(format!("request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(match status.as_u16() {
                400 | 415 => AsrError::InvalidFormat(format!("status {}: {}", status, body)),
                429 => AsrError::QuotaExceeded(self.model.clone()),
                500..=599 => AsrError::Unavailable(format!("status {}: {}", status, body)),
                _ => AsrError::Transient(format!("status {}: {}", status, body)),
            });
        }

        let result: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| AsrError::Transient(format!("parse response: {}", e)))?;

        let mut segments: Vec<AsrSegment> = result
            .segments
            .iter()
            .map(|segment| AsrSegment {
                speaker_id: None,
                start_time: segment.start,
                end_time: segment.end,
                content: segment.text.trim().to_string(),
                // avg_logprob is ln(p); exp maps it back into [0,1].
                confidence: segment.avg_logprob.map(|lp| lp.exp().clamp(0.0, 1.0)),
                words: None,
            })
            .filter(|segment| !segment.content.is_empty())
            .collect();

        if segments.is_empty() && !result.text.trim().is_empty() {
            segments.push(AsrSegment {
                speaker_id: None,
                start_time: 0.0,
                end_time: result.duration.unwrap_or(0.0),
                content: result.text.trim().to_string(),
                confidence: None,
                words: None,
            });
        }

        let duration_seconds = result
            .duration
            .or_else(|| segments.last().map(|segment| segment.end_time))
            .unwrap_or(0.0);

        tracing::info!(
            segments = segments.len(),
            duration = duration_seconds,
            "Whisper transcription completed"
        );

        Ok(Transcription {
            segments,
            duration_seconds,
        })
    }
}
