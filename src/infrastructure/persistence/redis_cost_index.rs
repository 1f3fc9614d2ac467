use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;

use crate::application::ports::{CostIndex, UsageLogError};
use crate::domain::{ServiceKind, UsageRecord};

const RECORD_TTL_SECONDS: i64 = 90 * 24 * 3600;

/// Redis fast index for hot cost aggregation: a sorted set of records per
/// (kind, provider) scored by timestamp, plus a per-day hash of totals.
pub struct RedisCostIndex {
    connection: ConnectionManager,
}

impl RedisCostIndex {
    pub async fn connect(url: &str) -> Result<Self, UsageLogError> {
        let client =
            redis::Client::open(url).map_err(|e| UsageLogError::WriteFailed(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| UsageLogError::WriteFailed(e.to_string()))?;
        Ok(Self { connection })
    }

    fn record_key(record: &UsageRecord) -> String {
        format!(
            "cost:records:{}:{}",
            record.service_kind.as_str(),
            record.provider
        )
    }

    fn daily_key(date: NaiveDate) -> String {
        format!("cost:daily:{}", date.format("%Y%m%d"))
    }
}

#[async_trait]
impl CostIndex for RedisCostIndex {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageLogError> {
        let mut connection = self.connection.clone();
        let record_key = Self::record_key(record);
        let daily_key = Self::daily_key(record.recorded_at.date_naive());
        let field = format!("{}:{}", record.service_kind.as_str(), record.provider);

        let payload = serde_json::json!({
            "request_id": record.request_id,
            "attempt": record.attempt,
            "estimated_cost": record.estimated_cost,
            "duration_seconds": record.duration_seconds,
            "tokens": record.tokens,
            "recorded_at": record.recorded_at.to_rfc3339(),
        })
        .to_string();

        let mut pipe = redis::pipe();
        pipe.cmd("ZADD")
            .arg(&record_key)
            .arg(record.recorded_at.timestamp_millis() as f64 / 1000.0)
            .arg(&payload)
            .ignore();
        pipe.cmd("HINCRBYFLOAT")
            .arg(&daily_key)
            .arg(&field)
            .arg(record.estimated_cost)
            .ignore();
        pipe.cmd("EXPIRE").arg(&record_key).arg(RECORD_TTL_SECONDS).ignore();
        pipe.cmd("EXPIRE").arg(&daily_key).arg(RECORD_TTL_SECONDS).ignore();

        pipe.query_async::<()>(&mut connection)
            .await
            .map_err(|e| UsageLogError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn daily_total(
        &self,
        date: NaiveDate,
        service_kind: ServiceKind,
        provider: &str,
    ) -> Result<f64, UsageLogError> {
        let mut connection = self.connection.clone();
        let field = format!("{}:{}", service_kind.as_str(), provider);
        let value: Option<String> = redis::cmd("HGET")
            .arg(Self::daily_key(date))
            .arg(field)
            .query_async(&mut connection)
            .await
            .map_err(|e| UsageLogError::QueryFailed(e.to_string()))?;
        Ok(value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0))
    }
}
