use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskId;

/// Word-level timing detail. Vendor-conditional: consumers must tolerate
/// segments without words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub id: Uuid,
    pub task_id: TaskId,
    pub sequence: i32,
    pub speaker_id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub content: String,
    pub confidence: Option<f64>,
    pub words: Option<Vec<WordTimestamp>>,
    pub is_edited: bool,
    pub original_content: Option<String>,
}

impl TranscriptSegment {
    pub fn new(
        task_id: TaskId,
        sequence: i32,
        speaker_id: Option<String>,
        start_time: f64,
        end_time: f64,
        content: String,
        confidence: Option<f64>,
        words: Option<Vec<WordTimestamp>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            sequence,
            speaker_id,
            start_time,
            end_time,
            content,
            confidence,
            words,
            is_edited: false,
            original_content: None,
        }
    }
}
