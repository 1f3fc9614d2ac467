use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{Summary, SummaryType, TaskId};

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Deactivate prior versions of this (task, type) and insert the new
    /// row in one transaction, bumping the version number. Keeps the
    /// exactly-one-active invariant.
    async fn insert_active(&self, summary: &Summary) -> Result<Summary, RepositoryError>;

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<Summary>, RepositoryError>;

    async fn get_active(
        &self,
        task_id: TaskId,
        summary_type: SummaryType,
    ) -> Result<Option<Summary>, RepositoryError>;

    async fn set_image_key(
        &self,
        summary_id: uuid::Uuid,
        image_key: &str,
    ) -> Result<(), RepositoryError>;
}
