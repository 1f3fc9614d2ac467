use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Upload,
    Url,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Upload => "upload",
            SourceType::Url => "url",
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(SourceType::Upload),
            "url" => Ok(SourceType::Url),
            _ => Err(format!("Invalid source type: {}", s)),
        }
    }
}

/// Observable task status. `Extracting` covers every stage before ASR
/// (resolve, download, transcode, upload to storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Extracting,
    Transcribing,
    Summarizing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Extracting => "extracting",
            TaskStatus::Transcribing => "transcribing",
            TaskStatus::Summarizing => "summarizing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "extracting" => Ok(TaskStatus::Extracting),
            "transcribing" => Ok(TaskStatus::Transcribing),
            "summarizing" => Ok(TaskStatus::Summarizing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_speaker_diarization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model_id: Option<String>,
}

impl TaskOptions {
    pub fn summary_style(&self) -> &str {
        self.summary_style.as_deref().unwrap_or("meeting")
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub source_type: SourceType,
    pub source_key: Option<String>,
    pub source_url: Option<String>,
    pub content_hash: Option<String>,
    pub options: TaskOptions,
    pub status: TaskStatus,
    pub progress: i16,
    pub duration_seconds: Option<f64>,
    pub asr_provider: Option<String>,
    pub llm_provider: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new_upload(
        user_id: UserId,
        title: Option<String>,
        source_key: String,
        content_hash: Option<String>,
        options: TaskOptions,
    ) -> Self {
        Self::new(
            user_id,
            title,
            SourceType::Upload,
            Some(source_key),
            None,
            content_hash,
            options,
        )
    }

    pub fn new_url(
        user_id: UserId,
        title: Option<String>,
        source_url: String,
        options: TaskOptions,
    ) -> Self {
        Self::new(
            user_id,
            title,
            SourceType::Url,
            None,
            Some(source_url),
            None,
            options,
        )
    }

    fn new(
        user_id: UserId,
        title: Option<String>,
        source_type: SourceType,
        source_key: Option<String>,
        source_url: Option<String>,
        content_hash: Option<String>,
        options: TaskOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            user_id,
            title,
            source_type,
            source_key,
            source_url,
            content_hash,
            options,
            status: TaskStatus::Pending,
            progress: 0,
            duration_seconds: None,
            asr_provider: None,
            llm_provider: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
