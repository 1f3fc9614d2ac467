use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// Work item handed from the API tier to the worker tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: TaskId,
    pub request_id: Option<String>,
    #[serde(default)]
    pub job: QueueJob,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueueJob {
    #[default]
    ProcessTask,
    GenerateVisual {
        visual_type: String,
        content_style: String,
        provider: Option<String>,
        model_id: Option<String>,
        generate_image: bool,
        image_format: String,
    },
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn push(&self, message: &TaskMessage) -> Result<(), QueueError>;

    /// Block until a message is available. Returns `None` when the queue
    /// has been closed (shutdown).
    async fn pop(&self) -> Result<Option<TaskMessage>, QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    #[error("message encoding failed: {0}")]
    Encoding(String),
}
