use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, TranscriptPage, TranscriptRepository};
use crate::domain::{TaskId, TranscriptSegment, WordTimestamp};

pub struct PgTranscriptRepository {
    pool: PgPool,
}

impl PgTranscriptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_segment(row: &PgRow) -> Result<TranscriptSegment, RepositoryError> {
    let words: Option<serde_json::Value> = row.try_get("words").map_err(query_failed)?;
    let words: Option<Vec<WordTimestamp>> = match words {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| RepositoryError::Conversion(e.to_string()))?,
        None => None,
    };
    Ok(TranscriptSegment {
        id: row.try_get("id").map_err(query_failed)?,
        task_id: TaskId::from_uuid(row.try_get("task_id").map_err(query_failed)?),
        sequence: row.try_get("sequence").map_err(query_failed)?,
        speaker_id: row.try_get("speaker_id").map_err(query_failed)?,
        start_time: row.try_get("start_time").map_err(query_failed)?,
        end_time: row.try_get("end_time").map_err(query_failed)?,
        content: row.try_get("content").map_err(query_failed)?,
        confidence: row.try_get("confidence").map_err(query_failed)?,
        words,
        is_edited: row.try_get("is_edited").map_err(query_failed)?,
        original_content: row.try_get("original_content").map_err(query_failed)?,
    })
}

const SEGMENT_COLUMNS: &str = "id, task_id, sequence, speaker_id, start_time, end_time, \
     content, confidence, words, is_edited, original_content";

#[async_trait]
impl TranscriptRepository for PgTranscriptRepository {
    #[instrument(skip(self, segments), fields(task_id = %task_id, count = segments.len()))]
    async fn replace_for_task(
        &self,
        task_id: TaskId,
        segments: &[TranscriptSegment],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        // Clear rows from an interrupted earlier attempt; the unique
        // (task_id, sequence) constraint backstops anything that slips
        // past this.
        sqlx::query("DELETE FROM transcript_segments WHERE task_id = $1")
            .bind(task_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        for segment in segments {
            let words = segment
                .words
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
            sqlx::query(
                "INSERT INTO transcript_segments (id, task_id, sequence, speaker_id, \
                 start_time, end_time, content, confidence, words, is_edited, original_content) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(segment.id)
            .bind(segment.task_id.as_uuid())
            .bind(segment.sequence)
            .bind(&segment.speaker_id)
            .bind(segment.start_time)
            .bind(segment.end_time)
            .bind(&segment.content)
            .bind(segment.confidence)
            .bind(words)
            .bind(segment.is_edited)
            .bind(&segment.original_content)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;
        }
        tx.commit().await.map_err(query_failed)?;
        Ok(())
    }

    async fn list(
        &self,
        task_id: TaskId,
        page: i64,
        page_size: i64,
    ) -> Result<TranscriptPage, RepositoryError> {
        let offset = (page.max(1) - 1) * page_size;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transcript_segments \
             WHERE task_id = $1 ORDER BY sequence LIMIT $2 OFFSET $3",
            SEGMENT_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transcript_segments WHERE task_id = $1")
                .bind(task_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(query_failed)?;

        let segments = rows
            .iter()
            .map(map_segment)
            .collect::<Result<Vec<TranscriptSegment>, RepositoryError>>()?;
        Ok(TranscriptPage { segments, total })
    }

    async fn list_all(&self, task_id: TaskId) -> Result<Vec<TranscriptSegment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transcript_segments WHERE task_id = $1 ORDER BY sequence",
            SEGMENT_COLUMNS
        ))
        .bind(task_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(map_segment).collect()
    }
}
