use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::ports::{AsrEngine, AsrError, AsrRequest, AsrSegment, Transcription};

/// Scripted engine for tests and local development: returns the queued
/// outcomes in order, repeating the last one.
pub struct MockAsrEngine {
    outcomes: Mutex<Vec<Result<Transcription, String>>>,
    calls: AtomicUsize,
}

impl MockAsrEngine {
    pub fn always(transcription: Transcription) -> Self {
        Self {
            outcomes: Mutex::new(vec![Ok(transcription)]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcomes: Mutex::new(vec![Err(message.to_string())]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn scripted(outcomes: Vec<Result<Transcription, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn simple_transcription(text: &str, duration_seconds: f64) -> Transcription {
        Transcription {
            segments: vec![AsrSegment {
                speaker_id: None,
                start_time: 0.0,
                end_time: duration_seconds,
                content: text.to_string(),
                confidence: Some(0.95),
                words: None,
            }],
            duration_seconds,
        }
    }
}

#[async_trait]
impl AsrEngine for MockAsrEngine {
    async fn transcribe(
        &self,
        _audio_url: &str,
        _request: &AsrRequest,
    ) -> Result<Transcription, AsrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = outcomes
            .get(call.min(outcomes.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_else(|| Err("no scripted outcome".to_string()));
        outcome.map_err(AsrError::Unavailable)
    }
}
