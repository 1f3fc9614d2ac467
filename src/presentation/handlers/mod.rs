mod envelope;
mod health;
mod progress;
mod quotas;
mod summaries;
mod tasks;
mod transcripts;
mod upload;
mod visuals;

pub use envelope::{Envelope, ErrorCode, RequestContext, USER_ID_HEADER};
pub use health::health_handler;
pub use progress::stream_progress_handler;
pub use quotas::{query_quotas_handler, refresh_quota_handler};
pub use summaries::get_summaries_handler;
pub use tasks::{
    create_task_handler, delete_task_handler, get_task_handler, list_tasks_handler,
};
pub use transcripts::get_transcript_handler;
pub use upload::presign_upload_handler;
pub use visuals::generate_visual_handler;
