use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{TaskId, TaskStatus};

const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressEventType {
    Progress,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub progress: i16,
    pub task_id: TaskId,
}

impl ProgressEvent {
    pub fn progress(task_id: TaskId, status: TaskStatus, stage: Option<String>, progress: i16) -> Self {
        Self {
            event_type: ProgressEventType::Progress,
            status,
            stage,
            progress,
            task_id,
        }
    }

    pub fn completed(task_id: TaskId) -> Self {
        Self {
            event_type: ProgressEventType::Completed,
            status: TaskStatus::Completed,
            stage: None,
            progress: 100,
            task_id,
        }
    }

    pub fn error(task_id: TaskId, progress: i16) -> Self {
        Self {
            event_type: ProgressEventType::Error,
            status: TaskStatus::Failed,
            stage: None,
            progress,
            task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            ProgressEventType::Completed | ProgressEventType::Error
        )
    }
}

struct Topic {
    snapshot: ProgressEvent,
    sender: broadcast::Sender<ProgressEvent>,
}

/// Per-task publish/subscribe channel between the pipeline and the
/// transport layers. Late subscribers get the current snapshot first;
/// live delivery is in publish order, at-most-once (lagging receivers
/// drop). Terminal events tear the topic down, ending every stream.
pub struct ProgressBroadcaster {
    topics: RwLock<HashMap<TaskId, Topic>>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub fn publish(&self, event: ProgressEvent) {
        let terminal = event.is_terminal();
        let task_id = event.task_id;
        {
            let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
            let topic = topics.entry(task_id).or_insert_with(|| Topic {
                snapshot: event.clone(),
                sender: broadcast::channel(TOPIC_CAPACITY).0,
            });
            topic.snapshot = event.clone();
            // Send only fails with zero subscribers, which is fine.
            let _ = topic.sender.send(event);
            if terminal {
                topics.remove(&task_id);
            }
        }
    }

    /// Current snapshot (if any) plus a live receiver.
    pub fn subscribe(
        &self,
        task_id: TaskId,
    ) -> (Option<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
        let topic = topics.entry(task_id).or_insert_with(|| Topic {
            snapshot: ProgressEvent::progress(task_id, TaskStatus::Pending, None, 0),
            sender: broadcast::channel(TOPIC_CAPACITY).0,
        });
        (Some(topic.snapshot.clone()), topic.sender.subscribe())
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
