use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{CostIndex, UsageLog};
use crate::domain::UsageRecord;

use super::registry::ProviderMetadata;

/// Dual-write cost accounting: a short-TTL fast index for hot aggregation
/// plus a durable append-only log. Neither write may take the calling
/// pipeline down; the fast index degrades to a counter, the durable log
/// failure is logged at error level.
pub struct CostTracker {
    index: Option<Arc<dyn CostIndex>>,
    log: Arc<dyn UsageLog>,
    index_write_failures: AtomicU64,
}

impl CostTracker {
    pub fn new(log: Arc<dyn UsageLog>, index: Option<Arc<dyn CostIndex>>) -> Self {
        Self {
            index,
            log,
            index_write_failures: AtomicU64::new(0),
        }
    }

    pub async fn record(&self, record: &UsageRecord) {
        if let Some(index) = &self.index {
            if let Err(e) = index.record(record).await {
                self.index_write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    provider = %record.provider,
                    kind = %record.service_kind,
                    failures = self.index_write_failures.load(Ordering::Relaxed),
                    "Cost fast-index write failed"
                );
            }
        }

        if let Err(e) = self.log.append(record).await {
            tracing::error!(
                error = %e,
                provider = %record.provider,
                kind = %record.service_kind,
                request_id = %record.request_id,
                "Durable usage log write failed"
            );
        }
    }

    pub fn index_write_failures(&self) -> u64 {
        self.index_write_failures.load(Ordering::Relaxed)
    }

    pub fn usage_log(&self) -> Arc<dyn UsageLog> {
        Arc::clone(&self.log)
    }

    pub fn estimate_asr_cost(metadata: &ProviderMetadata, duration_seconds: f64) -> f64 {
        metadata.cost_per_unit * duration_seconds.max(0.0)
    }

    pub fn estimate_llm_cost(metadata: &ProviderMetadata, tokens: u64) -> f64 {
        metadata.cost_per_million_tokens * tokens as f64 / 1_000_000.0
    }
}
