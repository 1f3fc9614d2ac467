use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{StageId, StageStatus, StageType, TaskId, TaskStage};

#[async_trait]
pub trait StageRepository: Send + Sync {
    async fn insert(&self, stage: &TaskStage) -> Result<(), RepositoryError>;

    /// The single `is_active = true` row for this (task, stage_type), if any.
    async fn active_stage(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<Option<TaskStage>, RepositoryError>;

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<TaskStage>, RepositoryError>;

    async fn set_status(
        &self,
        id: StageId,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Archive the currently active row for a stage (sets `is_active = false`)
    /// so a retry can insert a fresh attempt.
    async fn archive(&self, task_id: TaskId, stage_type: StageType)
        -> Result<(), RepositoryError>;
}
