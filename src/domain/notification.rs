use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::task::{TaskId, UserId};

/// In-app notification row created when a task reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub task_id: Option<TaskId>,
    pub category: String,
    pub action: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn task_completed(user_id: UserId, task_id: TaskId, title: &str) -> Self {
        Self::new(
            user_id,
            Some(task_id),
            "completed",
            format!("Task \"{}\" completed", title),
            "Transcript and summaries are ready".to_string(),
            "normal",
        )
    }

    pub fn task_failed(user_id: UserId, task_id: TaskId, title: &str, error: &str) -> Self {
        Self::new(
            user_id,
            Some(task_id),
            "failed",
            format!("Task \"{}\" failed", title),
            error.to_string(),
            "high",
        )
    }

    fn new(
        user_id: UserId,
        task_id: Option<TaskId>,
        action: &str,
        title: String,
        message: String,
        priority: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            category: "task".to_string(),
            action: action.to_string(),
            title,
            message,
            priority: priority.to_string(),
            created_at: Utc::now(),
            read_at: None,
        }
    }
}
