use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, StageRepository};
use crate::domain::{StageId, StageStatus, StageType, TaskId, TaskStage};

pub struct PgStageRepository {
    pool: PgPool,
}

impl PgStageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_stage(row: &PgRow) -> Result<TaskStage, RepositoryError> {
    let stage_type: String = row.try_get("stage_type").map_err(query_failed)?;
    let status: String = row.try_get("status").map_err(query_failed)?;
    Ok(TaskStage {
        id: StageId::from_uuid(row.try_get("id").map_err(query_failed)?),
        task_id: TaskId::from_uuid(row.try_get("task_id").map_err(query_failed)?),
        stage_type: stage_type
            .parse::<StageType>()
            .map_err(RepositoryError::Conversion)?,
        status: status
            .parse::<StageStatus>()
            .map_err(RepositoryError::Conversion)?,
        attempt: row.try_get("attempt").map_err(query_failed)?,
        is_active: row.try_get("is_active").map_err(query_failed)?,
        started_at: row.try_get("started_at").map_err(query_failed)?,
        completed_at: row.try_get("completed_at").map_err(query_failed)?,
        error_message: row.try_get("error_message").map_err(query_failed)?,
    })
}

const STAGE_COLUMNS: &str =
    "id, task_id, stage_type, status, attempt, is_active, started_at, completed_at, error_message";

#[async_trait]
impl StageRepository for PgStageRepository {
    #[instrument(skip(self, stage), fields(task_id = %stage.task_id, stage = %stage.stage_type))]
    async fn insert(&self, stage: &TaskStage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO task_stages (id, task_id, stage_type, status, attempt, is_active, \
             started_at, completed_at, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(stage.id.as_uuid())
        .bind(stage.task_id.as_uuid())
        .bind(stage.stage_type.as_str())
        .bind(stage.status.as_str())
        .bind(stage.attempt)
        .bind(stage.is_active)
        .bind(stage.started_at)
        .bind(stage.completed_at)
        .bind(&stage.error_message)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn active_stage(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<Option<TaskStage>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM task_stages \
             WHERE task_id = $1 AND stage_type = $2 AND is_active LIMIT 1",
            STAGE_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .bind(stage_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.as_ref().map(map_stage).transpose()
    }

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<TaskStage>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM task_stages \
             WHERE task_id = $1 AND is_active ORDER BY started_at",
            STAGE_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(map_stage).collect()
    }

    async fn set_status(
        &self,
        id: StageId,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let completed_at = matches!(
            status,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
        .then(Utc::now);
        sqlx::query(
            "UPDATE task_stages SET status = $1, completed_at = COALESCE($2, completed_at), \
             error_message = $3 WHERE id = $4",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(error_message)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn archive(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE task_stages SET is_active = FALSE \
             WHERE task_id = $1 AND stage_type = $2 AND is_active",
        )
        .bind(task_id.as_uuid())
        .bind(stage_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }
}
