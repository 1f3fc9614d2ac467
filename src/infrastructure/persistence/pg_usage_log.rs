use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::application::ports::{UsageLog, UsageLogError};
use crate::domain::{ServiceKind, UsageRecord};

pub struct PgUsageLog {
    pool: PgPool,
}

impl PgUsageLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLog for PgUsageLog {
    /// ON CONFLICT DO NOTHING over (request_id, attempt) makes replays
    /// harmless.
    #[instrument(skip(self, record), fields(provider = %record.provider, request_id = %record.request_id))]
    async fn append(&self, record: &UsageRecord) -> Result<(), UsageLogError> {
        sqlx::query(
            "INSERT INTO usage_records (id, recorded_at, service_kind, provider, user_id, \
             task_id, estimated_cost, tokens, duration_seconds, request_id, attempt) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (request_id, attempt) DO NOTHING",
        )
        .bind(record.id)
        .bind(record.recorded_at)
        .bind(record.service_kind.as_str())
        .bind(&record.provider)
        .bind(record.user_id.map(|id| id.as_uuid()))
        .bind(record.task_id.map(|id| id.as_uuid()))
        .bind(record.estimated_cost)
        .bind(record.tokens)
        .bind(record.duration_seconds)
        .bind(&record.request_id)
        .bind(record.attempt)
        .execute(&self.pool)
        .await
        .map_err(|e| UsageLogError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn total_cost(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<f64, UsageLogError> {
        let total: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(estimated_cost) FROM usage_records \
             WHERE service_kind = $1 AND provider = $2 AND recorded_at >= $3",
        )
        .bind(service_kind.as_str())
        .bind(provider)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| UsageLogError::QueryFailed(e.to_string()))?;
        Ok(total.unwrap_or(0.0))
    }

    async fn total_duration_seconds(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<f64, UsageLogError> {
        let total: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(duration_seconds) FROM usage_records \
             WHERE service_kind = $1 AND provider = $2 AND recorded_at >= $3",
        )
        .bind(service_kind.as_str())
        .bind(provider)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| UsageLogError::QueryFailed(e.to_string()))?;
        Ok(total.unwrap_or(0.0))
    }
}
