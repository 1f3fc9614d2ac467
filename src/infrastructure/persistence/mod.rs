mod pg_notification_repository;
mod pg_pool;
mod pg_quota_store;
mod pg_stage_repository;
mod pg_summary_repository;
mod pg_task_repository;
mod pg_transcript_repository;
mod pg_usage_log;
mod redis_cost_index;
mod task_queue;

pub use pg_notification_repository::PgNotificationRepository;
pub use pg_pool::create_pool;
pub use pg_quota_store::PgQuotaStore;
pub use pg_stage_repository::PgStageRepository;
pub use pg_summary_repository::PgSummaryRepository;
pub use pg_task_repository::PgTaskRepository;
pub use pg_transcript_repository::PgTranscriptRepository;
pub use pg_usage_log::PgUsageLog;
pub use redis_cost_index::RedisCostIndex;
pub use task_queue::{InMemoryTaskQueue, RedisTaskQueue};
