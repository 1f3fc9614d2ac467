use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::task::{SourceType, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageType {
    Resolve,
    Download,
    Transcode,
    UploadStorage,
    Transcribe,
    Summarize,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Resolve => "resolve",
            StageType::Download => "download",
            StageType::Transcode => "transcode",
            StageType::UploadStorage => "upload_storage",
            StageType::Transcribe => "transcribe",
            StageType::Summarize => "summarize",
        }
    }

    /// Observable task status while this stage is running.
    pub fn task_status(&self) -> TaskStatus {
        match self {
            StageType::Resolve
            | StageType::Download
            | StageType::Transcode
            | StageType::UploadStorage => TaskStatus::Extracting,
            StageType::Transcribe => TaskStatus::Transcribing,
            StageType::Summarize => TaskStatus::Summarizing,
        }
    }
}

impl FromStr for StageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolve" => Ok(StageType::Resolve),
            "download" => Ok(StageType::Download),
            "transcode" => Ok(StageType::Transcode),
            "upload_storage" => Ok(StageType::UploadStorage),
            "transcribe" => Ok(StageType::Transcribe),
            "summarize" => Ok(StageType::Summarize),
            _ => Err(format!("Invalid stage type: {}", s)),
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StageStatus::Pending),
            "running" => Ok(StageStatus::Running),
            "completed" => Ok(StageStatus::Completed),
            "failed" => Ok(StageStatus::Failed),
            "skipped" => Ok(StageStatus::Skipped),
            _ => Err(format!("Invalid stage status: {}", s)),
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const URL_STAGE_FLOW: &[StageType] = &[
    StageType::Resolve,
    StageType::Download,
    StageType::Transcode,
    StageType::UploadStorage,
    StageType::Transcribe,
    StageType::Summarize,
];

const UPLOAD_STAGE_FLOW: &[StageType] = &[
    StageType::UploadStorage,
    StageType::Transcribe,
    StageType::Summarize,
];

/// Canonical stage order for a task source. Uploaded files are already in
/// object storage by the time the worker sees them, so the extraction
/// stages collapse to the storage sync alone.
pub fn stage_flow(source_type: SourceType) -> &'static [StageType] {
    match source_type {
        SourceType::Url => URL_STAGE_FLOW,
        SourceType::Upload => UPLOAD_STAGE_FLOW,
    }
}

/// Progress band `[lower, upper]` assigned to an observable status.
pub fn progress_band(status: TaskStatus) -> (i16, i16) {
    match status {
        TaskStatus::Pending => (0, 0),
        TaskStatus::Extracting => (0, 20),
        TaskStatus::Transcribing => (20, 70),
        TaskStatus::Summarizing => (70, 99),
        TaskStatus::Completed => (100, 100),
        TaskStatus::Failed => (0, 100),
    }
}

/// Map a stage-local fraction in `[0,1]` into the stage's band.
pub fn band_progress(status: TaskStatus, fraction: f64) -> i16 {
    let (lower, upper) = progress_band(status);
    let fraction = fraction.clamp(0.0, 1.0);
    lower + ((upper - lower) as f64 * fraction).round() as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(Uuid);

impl StageId {
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

impl Default for StageId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct TaskStage {
    pub id: StageId,
    pub task_id: super::task::TaskId,
    pub stage_type: StageType,
    pub status: StageStatus,
    pub attempt: i32,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl TaskStage {
    pub fn begin(task_id: super::task::TaskId, stage_type: StageType, attempt: i32) -> Self {
        Self {
            id: StageId::new(),
            task_id,
            stage_type,
            status: StageStatus::Running,
            attempt,
            is_active: true,
            started_at: Some(Utc::now()),
            completed_at: None,
            error_message: None,
        }
    }
}
