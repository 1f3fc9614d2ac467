use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, TaskPage, TaskRepository};
use crate::domain::{SourceType, Task, TaskId, TaskOptions, TaskStatus, UserId};

pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_task(row: &PgRow) -> Result<Task, RepositoryError> {
    let status: String = row.try_get("status").map_err(query_failed)?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(RepositoryError::Conversion)?;
    let source_type: String = row.try_get("source_type").map_err(query_failed)?;
    let source_type = source_type
        .parse::<SourceType>()
        .map_err(RepositoryError::Conversion)?;
    let options: serde_json::Value = row.try_get("options").map_err(query_failed)?;
    let options: TaskOptions =
        serde_json::from_value(options).map_err(|e| RepositoryError::Conversion(e.to_string()))?;

    Ok(Task {
        id: TaskId::from_uuid(row.try_get("id").map_err(query_failed)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(query_failed)?),
        title: row.try_get("title").map_err(query_failed)?,
        source_type,
        source_key: row.try_get("source_key").map_err(query_failed)?,
        source_url: row.try_get("source_url").map_err(query_failed)?,
        content_hash: row.try_get("content_hash").map_err(query_failed)?,
        options,
        status,
        progress: row.try_get("progress").map_err(query_failed)?,
        duration_seconds: row.try_get("duration_seconds").map_err(query_failed)?,
        asr_provider: row.try_get("asr_provider").map_err(query_failed)?,
        llm_provider: row.try_get("llm_provider").map_err(query_failed)?,
        error_message: row.try_get("error_message").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
        updated_at: row.try_get("updated_at").map_err(query_failed)?,
        deleted_at: row.try_get("deleted_at").map_err(query_failed)?,
    })
}

const TASK_COLUMNS: &str = "id, user_id, title, source_type, source_key, source_url, \
     content_hash, options, status, progress, duration_seconds, asr_provider, llm_provider, \
     error_message, created_at, updated_at, deleted_at";

#[async_trait]
impl TaskRepository for PgTaskRepository {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn create(&self, task: &Task) -> Result<(), RepositoryError> {
        let options = serde_json::to_value(&task.options)
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, title, source_type, source_key, source_url,
                content_hash, options, status, progress, duration_seconds, asr_provider,
                llm_provider, error_message, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(task.user_id.as_uuid())
        .bind(&task.title)
        .bind(task.source_type.as_str())
        .bind(&task.source_key)
        .bind(&task.source_url)
        .bind(&task.content_hash)
        .bind(options)
        .bind(task.status.as_str())
        .bind(task.progress)
        .bind(task.duration_seconds)
        .bind(&task.asr_provider)
        .bind(&task.llm_provider)
        .bind(&task.error_message)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE id = $1 AND deleted_at IS NULL",
            TASK_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.as_ref().map(map_task).transpose()
    }

    async fn find_by_content_hash(
        &self,
        user_id: UserId,
        content_hash: &str,
    ) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tasks \
             WHERE user_id = $1 AND content_hash = $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1",
            TASK_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.as_ref().map(map_task).transpose()
    }

    async fn list(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<TaskPage, RepositoryError> {
        let offset = (page.max(1) - 1) * page_size;
        let status_str = status.map(|s| s.as_str().to_string());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks \
             WHERE user_id = $1 AND deleted_at IS NULL \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            TASK_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .bind(&status_str)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks \
             WHERE user_id = $1 AND deleted_at IS NULL \
               AND ($2::text IS NULL OR status = $2)",
        )
        .bind(user_id.as_uuid())
        .bind(&status_str)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        let tasks = rows
            .iter()
            .map(map_task)
            .collect::<Result<Vec<Task>, RepositoryError>>()?;
        Ok(TaskPage { tasks, total })
    }

    /// GREATEST keeps progress monotone even when two writers race.
    #[instrument(skip(self), fields(task_id = %id, status = %status))]
    async fn update_progress(
        &self,
        id: TaskId,
        status: TaskStatus,
        progress: i16,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE tasks SET status = $1, progress = GREATEST(progress, $2), updated_at = $3 \
             WHERE id = $4 AND status NOT IN ('completed', 'failed')",
        )
        .bind(status.as_str())
        .bind(progress)
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self, error_message), fields(task_id = %id))]
    async fn mark_failed(&self, id: TaskId, error_message: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE tasks SET status = 'failed', error_message = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(error_message)
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn set_duration(
        &self,
        id: TaskId,
        duration_seconds: f64,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE tasks SET duration_seconds = $1, updated_at = $2 WHERE id = $3")
            .bind(duration_seconds)
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    async fn set_providers(
        &self,
        id: TaskId,
        asr_provider: Option<&str>,
        llm_provider: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE tasks SET asr_provider = COALESCE($1, asr_provider), \
             llm_provider = COALESCE($2, llm_provider), updated_at = $3 WHERE id = $4",
        )
        .bind(asr_provider)
        .bind(llm_provider)
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn set_source_key(&self, id: TaskId, source_key: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE tasks SET source_key = $1, updated_at = $2 WHERE id = $3")
            .bind(source_key)
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn soft_delete(&self, id: TaskId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE tasks SET deleted_at = $1, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }
}
