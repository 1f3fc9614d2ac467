use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{ServiceKind, UsageRecord};

/// Durable append-only usage log (long-term queries, per-user attribution).
#[async_trait]
pub trait UsageLog: Send + Sync {
    /// Idempotent over `(request_id, attempt)`: replaying a record is a
    /// no-op, not a duplicate.
    async fn append(&self, record: &UsageRecord) -> Result<(), UsageLogError>;

    async fn total_cost(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<f64, UsageLogError>;

    /// Seconds of audio consumed since `since`. Feeds the selector's
    /// free-tier score.
    async fn total_duration_seconds(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<f64, UsageLogError>;
}

/// Short-TTL fast index for hot aggregation, keyed by
/// `(service_kind, provider, date)`.
#[async_trait]
pub trait CostIndex: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageLogError>;

    async fn daily_total(
        &self,
        date: NaiveDate,
        service_kind: ServiceKind,
        provider: &str,
    ) -> Result<f64, UsageLogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UsageLogError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
}
