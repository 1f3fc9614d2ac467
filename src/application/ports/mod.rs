mod asr_engine;
mod llm_client;
mod media_source;
mod notification_repository;
mod object_storage;
mod quota_store;
mod repository_error;
mod stage_repository;
mod summary_repository;
mod task_queue;
mod task_repository;
mod transcoder;
mod transcript_repository;
mod usage_log;
mod visual_renderer;

pub use asr_engine::{AsrEngine, AsrError, AsrRequest, AsrSegment, Transcription};
pub use llm_client::{ChatMessage, LlmClient, LlmError, LlmParams, LlmTokenStream};
pub use media_source::{
    DownloadedMedia, MediaDownloader, MediaError, MediaResolver, ResolvedMedia,
};
pub use notification_repository::NotificationRepository;
pub use object_storage::{ObjectStorage, StorageError};
pub use quota_store::QuotaStore;
pub use repository_error::RepositoryError;
pub use stage_repository::StageRepository;
pub use summary_repository::SummaryRepository;
pub use task_queue::{QueueError, QueueJob, TaskMessage, TaskQueue};
pub use task_repository::{TaskPage, TaskRepository};
pub use transcoder::{TranscodeError, TranscodedAudio, Transcoder};
pub use transcript_repository::{TranscriptPage, TranscriptRepository};
pub use usage_log::{CostIndex, UsageLog, UsageLogError};
pub use visual_renderer::{RenderError, VisualRenderer};
