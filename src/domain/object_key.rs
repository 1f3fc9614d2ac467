use std::fmt;

use chrono::{DateTime, Datelike, Utc};

use super::task::{TaskId, UserId};

/// Key of an object in the configured storage backend.
///
/// Uploads are content-addressed (`uploads/{yyyy}/{mm}/{sha256}.{ext}`) so
/// re-uploading the same bytes lands on the same key and the second upload
/// is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn upload(content_hash: &str, extension: &str, now: DateTime<Utc>) -> Self {
        Self(format!(
            "uploads/{:04}/{:02}/{}.{}",
            now.year(),
            now.month(),
            content_hash,
            extension.trim_start_matches('.')
        ))
    }

    pub fn visual(
        user_id: UserId,
        task_id: TaskId,
        visual_type: &str,
        summary_id: uuid::Uuid,
        format: &str,
    ) -> Self {
        Self(format!(
            "visuals/{}/{}/{}_{}.{}",
            user_id, task_id, visual_type, summary_id, format
        ))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
