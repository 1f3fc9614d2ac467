use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{Task, TaskId, TaskStatus, UserId};

#[derive(Debug, Clone, Default)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: i64,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;

    /// Dedup lookup for instant upload: a live task of this user with the
    /// same content hash.
    async fn find_by_content_hash(
        &self,
        user_id: UserId,
        content_hash: &str,
    ) -> Result<Option<Task>, RepositoryError>;

    async fn list(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<TaskPage, RepositoryError>;

    /// Progress only moves forward; the implementation clamps to the
    /// current value when a smaller one is offered.
    async fn update_progress(
        &self,
        id: TaskId,
        status: TaskStatus,
        progress: i16,
    ) -> Result<(), RepositoryError>;

    async fn mark_failed(&self, id: TaskId, error_message: &str) -> Result<(), RepositoryError>;

    async fn set_duration(&self, id: TaskId, duration_seconds: f64)
        -> Result<(), RepositoryError>;

    async fn set_providers(
        &self,
        id: TaskId,
        asr_provider: Option<&str>,
        llm_provider: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn set_source_key(&self, id: TaskId, source_key: &str) -> Result<(), RepositoryError>;

    async fn soft_delete(&self, id: TaskId) -> Result<(), RepositoryError>;
}
