use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use echoscribe::application::ports::{CostIndex, UsageLog, UsageLogError};
use echoscribe::application::services::{CostTracker, ProviderMetadata};
use echoscribe::domain::{ServiceKind, UsageRecord};

use crate::support::InMemoryUsageLog;

struct FailingCostIndex;

#[async_trait]
impl CostIndex for FailingCostIndex {
    async fn record(&self, _record: &UsageRecord) -> Result<(), UsageLogError> {
        Err(UsageLogError::WriteFailed("redis down".to_string()))
    }

    async fn daily_total(
        &self,
        _date: NaiveDate,
        _service_kind: ServiceKind,
        _provider: &str,
    ) -> Result<f64, UsageLogError> {
        Ok(0.0)
    }
}

#[tokio::test]
async fn given_fast_index_failure_when_recording_then_counted_and_durable_write_still_lands() {
    let log = Arc::new(InMemoryUsageLog::new());
    let tracker = CostTracker::new(
        log.clone() as Arc<dyn UsageLog>,
        Some(Arc::new(FailingCostIndex)),
    );

    let record = UsageRecord::new(ServiceKind::Asr, "deepgram", 0.12, "req-1", 1);
    tracker.record(&record).await;
    tracker.record(&UsageRecord::new(ServiceKind::Asr, "deepgram", 0.3, "req-2", 1)).await;

    assert_eq!(tracker.index_write_failures(), 2);
    assert_eq!(log.records().len(), 2);
}

#[tokio::test]
async fn given_same_request_and_attempt_when_recorded_twice_then_durable_log_deduplicates() {
    let log = Arc::new(InMemoryUsageLog::new());
    let tracker = CostTracker::new(log.clone() as Arc<dyn UsageLog>, None);

    let record = UsageRecord::new(ServiceKind::Llm, "openai", 0.002, "task-1:overview", 1);
    tracker.record(&record).await;
    tracker.record(&record).await;

    assert_eq!(log.records().len(), 1);
}

#[test]
fn given_metadata_prices_when_estimating_then_linear_in_usage() {
    let asr = ProviderMetadata::new("asr").cost_per_unit(0.0001);
    let llm = ProviderMetadata::new("llm").cost_per_million_tokens(10.0);

    assert!((CostTracker::estimate_asr_cost(&asr, 600.0) - 0.06).abs() < 1e-9);
    assert!((CostTracker::estimate_llm_cost(&llm, 50_000) - 0.5).abs() < 1e-9);
    assert_eq!(CostTracker::estimate_asr_cost(&asr, -5.0), 0.0);
}
