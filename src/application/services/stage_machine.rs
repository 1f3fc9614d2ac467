use std::sync::Arc;

use crate::application::ports::{RepositoryError, StageRepository};
use crate::domain::{StageStatus, StageType, TaskId, TaskStage};

/// Stage-level execution control: idempotent starts, archived retries,
/// and the completed-stage short-circuit that makes crash-resume work.
pub struct StageMachine {
    stages: Arc<dyn StageRepository>,
}

impl StageMachine {
    pub fn new(stages: Arc<dyn StageRepository>) -> Self {
        Self { stages }
    }

    /// A stage runs unless its active record already completed or was
    /// skipped (previous artifacts reused).
    pub async fn should_execute(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<bool, RepositoryError> {
        match self.stages.active_stage(task_id, stage_type).await? {
            Some(stage) => Ok(!matches!(
                stage.status,
                StageStatus::Completed | StageStatus::Skipped
            )),
            None => Ok(true),
        }
    }

    /// Start or resume an attempt. A row still `running` was interrupted
    /// mid-stage (worker crash); it is resumed under the same attempt so
    /// idempotency keys derived from `(task_id, stage, attempt)` stay
    /// stable. A `failed` row is a real retry: archived, attempt bumped.
    pub async fn begin(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<TaskStage, RepositoryError> {
        match self.stages.active_stage(task_id, stage_type).await? {
            Some(previous) if previous.status == StageStatus::Running => {
                tracing::info!(
                    task_id = %task_id,
                    stage = %stage_type,
                    attempt = previous.attempt,
                    "Resuming interrupted stage"
                );
                Ok(previous)
            }
            Some(previous) => {
                self.stages.archive(task_id, stage_type).await?;
                let stage = TaskStage::begin(task_id, stage_type, previous.attempt + 1);
                self.stages.insert(&stage).await?;
                tracing::info!(
                    task_id = %task_id,
                    stage = %stage_type,
                    attempt = stage.attempt,
                    "Stage retried"
                );
                Ok(stage)
            }
            None => {
                let stage = TaskStage::begin(task_id, stage_type, 1);
                self.stages.insert(&stage).await?;
                tracing::info!(task_id = %task_id, stage = %stage_type, "Stage started");
                Ok(stage)
            }
        }
    }

    pub async fn complete(&self, stage: &TaskStage) -> Result<(), RepositoryError> {
        self.stages
            .set_status(stage.id, StageStatus::Completed, None)
            .await?;
        tracing::info!(task_id = %stage.task_id, stage = %stage.stage_type, "Stage completed");
        Ok(())
    }

    pub async fn fail(&self, stage: &TaskStage, error: &str) -> Result<(), RepositoryError> {
        self.stages
            .set_status(stage.id, StageStatus::Failed, Some(error))
            .await?;
        tracing::error!(
            task_id = %stage.task_id,
            stage = %stage.stage_type,
            error,
            "Stage failed"
        );
        Ok(())
    }

    pub async fn skip(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<(), RepositoryError> {
        let mut stage = TaskStage::begin(task_id, stage_type, 1);
        stage.status = StageStatus::Skipped;
        stage.completed_at = Some(chrono::Utc::now());
        self.stages.insert(&stage).await?;
        tracing::info!(task_id = %task_id, stage = %stage_type, "Stage skipped");
        Ok(())
    }

    pub async fn active_stages(&self, task_id: TaskId) -> Result<Vec<TaskStage>, RepositoryError> {
        self.stages.list_active(task_id).await
    }
}

/// Active stages must form a prefix of the canonical order with at most
/// one running.
pub fn is_canonical_prefix(stages: &[TaskStage], flow: &[StageType]) -> bool {
    let running = stages
        .iter()
        .filter(|stage| stage.status == StageStatus::Running)
        .count();
    if running > 1 {
        return false;
    }
    let mut present: Vec<StageType> = stages.iter().map(|stage| stage.stage_type).collect();
    present.sort_by_key(|stage_type| flow.iter().position(|s| s == stage_type));
    present
        .iter()
        .zip(flow.iter())
        .all(|(have, want)| have == want)
        && present.len() <= flow.len()
}
