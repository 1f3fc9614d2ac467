use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{TaskId, TranscriptSegment};

#[derive(Debug, Clone, Default)]
pub struct TranscriptPage {
    pub segments: Vec<TranscriptSegment>,
    pub total: i64,
}

#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    /// Persist the full segment set for a task, discarding any rows a
    /// previous attempt left behind, in one transaction. Re-running a
    /// transcribe attempt therefore converges instead of duplicating.
    async fn replace_for_task(
        &self,
        task_id: TaskId,
        segments: &[TranscriptSegment],
    ) -> Result<(), RepositoryError>;

    async fn list(
        &self,
        task_id: TaskId,
        page: i64,
        page_size: i64,
    ) -> Result<TranscriptPage, RepositoryError>;

    async fn list_all(&self, task_id: TaskId) -> Result<Vec<TranscriptSegment>, RepositoryError>;
}
