mod notification;
mod object_key;
mod quota;
mod summary;
mod task;
mod task_stage;
mod transcript;
mod usage;

pub use notification::Notification;
pub use object_key::ObjectKey;
pub use quota::{
    window_bounds, AsrVariant, QuotaEntry, QuotaOwner, QuotaStatus, WindowType,
};
pub use summary::{Summary, SummaryType};
pub use task::{SourceType, Task, TaskId, TaskOptions, TaskStatus, UserId};
pub use task_stage::{
    band_progress, progress_band, stage_flow, StageId, StageStatus, StageType, TaskStage,
};
pub use transcript::{TranscriptSegment, WordTimestamp};
pub use usage::{ServiceKind, UsageRecord};
