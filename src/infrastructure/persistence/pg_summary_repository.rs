use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, SummaryRepository};
use crate::domain::{Summary, SummaryType, TaskId};

pub struct PgSummaryRepository {
    pool: PgPool,
}

impl PgSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_summary(row: &PgRow) -> Result<Summary, RepositoryError> {
    let summary_type: String = row.try_get("summary_type").map_err(query_failed)?;
    Ok(Summary {
        id: row.try_get("id").map_err(query_failed)?,
        task_id: TaskId::from_uuid(row.try_get("task_id").map_err(query_failed)?),
        summary_type: summary_type
            .parse::<SummaryType>()
            .map_err(RepositoryError::Conversion)?,
        version: row.try_get("version").map_err(query_failed)?,
        is_active: row.try_get("is_active").map_err(query_failed)?,
        content: row.try_get("content").map_err(query_failed)?,
        visual_format: row.try_get("visual_format").map_err(query_failed)?,
        visual_content: row.try_get("visual_content").map_err(query_failed)?,
        image_key: row.try_get("image_key").map_err(query_failed)?,
        model_used: row.try_get("model_used").map_err(query_failed)?,
        prompt_version: row.try_get("prompt_version").map_err(query_failed)?,
        token_count: row.try_get("token_count").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
    })
}

const SUMMARY_COLUMNS: &str = "id, task_id, summary_type, version, is_active, content, \
     visual_format, visual_content, image_key, model_used, prompt_version, token_count, created_at";

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    /// Deactivate-then-insert in one transaction, so exactly one row per
    /// (task, type) is ever active.
    #[instrument(skip(self, summary), fields(task_id = %summary.task_id, summary_type = %summary.summary_type))]
    async fn insert_active(&self, summary: &Summary) -> Result<Summary, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let previous_version: Option<i32> = sqlx::query_scalar(
            "UPDATE summaries SET is_active = FALSE \
             WHERE task_id = $1 AND summary_type = $2 AND is_active \
             RETURNING version",
        )
        .bind(summary.task_id.as_uuid())
        .bind(summary.summary_type.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed)?;

        let version = previous_version.map(|v| v + 1).unwrap_or(summary.version);

        sqlx::query(
            "INSERT INTO summaries (id, task_id, summary_type, version, is_active, content, \
             visual_format, visual_content, image_key, model_used, prompt_version, token_count, \
             created_at) \
             VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(summary.id)
        .bind(summary.task_id.as_uuid())
        .bind(summary.summary_type.as_str())
        .bind(version)
        .bind(&summary.content)
        .bind(&summary.visual_format)
        .bind(&summary.visual_content)
        .bind(&summary.image_key)
        .bind(&summary.model_used)
        .bind(&summary.prompt_version)
        .bind(summary.token_count)
        .bind(summary.created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        tx.commit().await.map_err(query_failed)?;

        let mut stored = summary.clone();
        stored.version = version;
        stored.is_active = true;
        Ok(stored)
    }

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<Summary>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM summaries WHERE task_id = $1 AND is_active ORDER BY summary_type",
            SUMMARY_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(map_summary).collect()
    }

    async fn get_active(
        &self,
        task_id: TaskId,
        summary_type: SummaryType,
    ) -> Result<Option<Summary>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM summaries \
             WHERE task_id = $1 AND summary_type = $2 AND is_active LIMIT 1",
            SUMMARY_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .bind(summary_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.as_ref().map(map_summary).transpose()
    }

    async fn set_image_key(
        &self,
        summary_id: uuid::Uuid,
        image_key: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE summaries SET image_key = $1 WHERE id = $2")
            .bind(image_key)
            .bind(summary_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }
}
