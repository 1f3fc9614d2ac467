use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AsrEngine, AsrError, AsrRequest, AsrSegment, Transcription};
use crate::domain::WordTimestamp;

/// Deepgram pre-recorded transcription. The audio stays in object storage;
/// only its presigned URL is submitted. Supports diarization and word-level
/// confidences, which makes it the preferred lane for speaker-tagged jobs.
pub struct DeepgramEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepgramEngine {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.deepgram.com".to_string()),
            api_key,
            model: model.unwrap_or_else(|| "nova-2".to_string()),
        }
    }
}

#[derive(Serialize)]
struct ListenRequest {
    url: String,
}

#[derive(Deserialize)]
struct ListenResponse {
    #[serde(default)]
    metadata: Option<ListenMetadata>,
    results: ListenResults,
}

#[derive(Deserialize)]
struct ListenMetadata {
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct ListenResults {
    #[serde(default)]
    utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Deserialize)]
struct Utterance {
    start: f64,
    end: f64,
    transcript: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    speaker: Option<u32>,
    #[serde(default)]
    words: Vec<ListenWord>,
}

#[derive(Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    words: Vec<ListenWord>,
}

#[derive(Deserialize)]
struct ListenWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

fn convert_words(words: &[ListenWord]) -> Option<Vec<WordTimestamp>> {
    if words.is_empty() {
        return None;
    }
    Some(
        words
            .iter()
            .map(|word| WordTimestamp {
                word: word.word.clone(),
                start_time: word.start,
                end_time: word.end,
                confidence: word.confidence,
            })
            .collect(),
    )
}

#[async_trait]
impl AsrEngine for DeepgramEngine {
    async fn transcribe(
        &self,
        audio_url: &str,
        request: &AsrRequest,
    ) -> Result<Transcription, AsrError> {
        let mut query: Vec<(&str, String)> = vec![
            ("model", self.model.clone()),
            ("utterances", "true".to_string()),
            ("punctuate", "true".to_string()),
        ];
        if request.enable_speaker_diarization {
            query.push(("diarize", "true".to_string()));
        }
        if let Some(language) = &request.language {
            if language != "auto" {
                query.push(("language", language.clone()));
            }
        }

        let endpoint = format!("{}/v1/listen", self.base_url.trim_end_matches('/'));
        tracing::debug!(endpoint = %endpoint, model = %self.model, "Submitting audio URL to Deepgram");

        let response = self
            .client
            .post(&endpoint)
            .query(&query)
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&ListenRequest {
                url: audio_url.to_string(),
            })
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
                402 | 429 => AsrError::QuotaExceeded("deepgram".to_string()),
                500..=599 => AsrError::Unavailable(format!("status {}: {}", status, body)),
                _ => AsrError::Transient(format!("status {}: {}", status, body)),
            });
        }

        let result: ListenResponse = response
            .json()
            .await
            .map_err(|e| AsrError::Transient(format!("parse response: {}", e)))?;

        let segments: Vec<AsrSegment> = match &result.results.utterances {
            Some(utterances) if !utterances.is_empty() => utterances
                .iter()
                .map(|utterance| AsrSegment {
                    speaker_id: utterance.speaker.map(|speaker| format!("spk_{}", speaker)),
                    start_time: utterance.start,
                    end_time: utterance.end,
                    content: utterance.transcript.trim().to_string(),
                    confidence: utterance.confidence,
                    words: convert_words(&utterance.words),
                })
                .filter(|segment| !segment.content.is_empty())
                .collect(),
            _ => result
                .results
                .channels
                .iter()
                .flat_map(|channel| channel.alternatives.first())
                .filter(|alternative| !alternative.transcript.trim().is_empty())
                .map(|alternative| {
                    let end_time = alternative
                        .words
                        .last()
                        .map(|word| word.end)
                        .unwrap_or(0.0);
                    AsrSegment {
                        speaker_id: None,
                        start_time: 0.0,
                        end_time,
                        content: alternative.transcript.trim().to_string(),
                        confidence: alternative.confidence,
                        words: convert_words(&alternative.words),
                    }
                })
                .collect(),
        };

        let duration_seconds = result
            .metadata
            .and_then(|metadata| metadata.duration)
            .or_else(|| segments.last().map(|segment| segment.end_time))
            .unwrap_or(0.0);

        tracing::info!(
            segments = segments.len(),
            duration = duration_seconds,
            "Deepgram transcription completed"
        );

        Ok(Transcription {
            segments,
            duration_seconds,
        })
    }
}
