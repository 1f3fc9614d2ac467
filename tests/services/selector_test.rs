use std::sync::Arc;

use chrono::Utc;

use echoscribe::application::ports::AsrEngine;
use echoscribe::application::services::{
    PreferredReason, ProviderMetadata, SelectionStrategy, SelectorError,
};
use echoscribe::domain::{
    AsrVariant, QuotaEntry, QuotaOwner, QuotaStatus, ServiceKind, WindowType,
};
use echoscribe::infrastructure::asr::MockAsrEngine;

use crate::support::{asr_metadata, SelectorBuilder};

fn engine() -> Arc<dyn AsrEngine> {
    Arc::new(MockAsrEngine::always(MockAsrEngine::simple_transcription(
        "hello", 60.0,
    )))
}

fn exhausted_entry(provider: &str, variant: AsrVariant) -> QuotaEntry {
    let mut entry = QuotaEntry::new(
        QuotaOwner::Global,
        provider,
        variant,
        WindowType::Day,
        60.0,
        Utc::now(),
    );
    entry.used_seconds = 60.0;
    entry.status = QuotaStatus::Exhausted;
    entry
}

#[tokio::test]
async fn given_quota_exhausted_provider_when_selecting_then_healthy_one_wins() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine())
        .with_asr("beta", asr_metadata(), engine());
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::File));
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::FileFast));
    let fixture = builder.build();

    let selection = fixture
        .selector
        .select_asr(None, None, Some(AsrVariant::File), Some(120.0), false, None)
        .await
        .unwrap();

    assert_eq!(selection.provider, "beta");
}

#[tokio::test]
async fn given_all_candidates_exhausted_when_selecting_then_no_provider_available() {
    let builder = SelectorBuilder::new().with_asr("alpha", asr_metadata(), engine());
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::File));
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::FileFast));
    let fixture = builder.build();

    let result = fixture
        .selector
        .select_asr(None, None, None, None, false, None)
        .await;

    assert!(matches!(
        result,
        Err(SelectorError::NoProviderAvailable(ServiceKind::Asr))
    ));
}

#[tokio::test]
async fn given_open_circuit_when_selecting_then_provider_never_returned() {
    let fixture = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine())
        .with_asr("beta", asr_metadata(), engine())
        .build();

    for _ in 0..5 {
        fixture.circuits.on_failure(ServiceKind::Asr, "alpha");
    }

    for _ in 0..10 {
        let selection = fixture
            .selector
            .select_asr(None, None, Some(AsrVariant::File), None, false, None)
            .await
            .unwrap();
        assert_eq!(selection.provider, "beta");
    }
}

#[tokio::test]
async fn given_equal_candidates_when_selecting_then_tie_breaks_on_name_ascending() {
    let fixture = SelectorBuilder::new()
        .with_asr("zeta", asr_metadata(), engine())
        .with_asr("alpha", asr_metadata(), engine())
        .with_asr("mid", asr_metadata(), engine())
        .build();

    let selection = fixture
        .selector
        .select_asr(None, None, Some(AsrVariant::File), None, false, None)
        .await
        .unwrap();

    assert_eq!(selection.provider, "alpha");
}

#[tokio::test]
async fn given_preferred_provider_exhausted_when_selecting_then_fails_without_substitution() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine())
        .with_asr("beta", asr_metadata(), engine());
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::File));
    let fixture = builder.build();

    let result = fixture
        .selector
        .select_asr(None, Some("alpha"), Some(AsrVariant::File), None, false, None)
        .await;

    match result {
        Err(SelectorError::PreferredUnavailable { provider, reason }) => {
            assert_eq!(provider, "alpha");
            assert_eq!(reason, PreferredReason::QuotaExhausted);
        }
        other => panic!("expected PreferredUnavailable, got {:?}", other.map(|s| s.provider)),
    }
}

#[tokio::test]
async fn given_preferred_provider_with_open_circuit_when_selecting_then_circuit_reason() {
    let fixture = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine())
        .build();
    for _ in 0..5 {
        fixture.circuits.on_failure(ServiceKind::Asr, "alpha");
    }

    let result = fixture
        .selector
        .select_asr(None, Some("alpha"), None, None, false, None)
        .await;

    assert!(matches!(
        result,
        Err(SelectorError::PreferredUnavailable {
            reason: PreferredReason::CircuitOpen,
            ..
        })
    ));
}

#[tokio::test]
async fn given_no_variant_when_selecting_then_file_fast_lane_preferred() {
    let fixture = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine())
        .build();

    let selection = fixture
        .selector
        .select_asr(None, None, None, None, false, None)
        .await
        .unwrap();

    assert_eq!(selection.variant, AsrVariant::FileFast);
}

#[tokio::test]
async fn given_file_fast_exhausted_when_selecting_then_falls_back_to_file_lane() {
    let builder = SelectorBuilder::new().with_asr("alpha", asr_metadata(), engine());
    builder.quota_store().seed(exhausted_entry("alpha", AsrVariant::FileFast));
    let fixture = builder.build();

    let selection = fixture
        .selector
        .select_asr(None, None, None, None, false, None)
        .await
        .unwrap();

    assert_eq!(selection.variant, AsrVariant::File);
}

#[tokio::test]
async fn given_diarization_required_when_selecting_then_capable_provider_only() {
    let plain = ProviderMetadata::new("plain")
        .cost_per_unit(0.00001)
        .variants(&[AsrVariant::File]);
    let fixture = SelectorBuilder::new()
        .with_asr("aplain", plain, engine())
        .with_asr("bdiar", asr_metadata(), engine())
        .build();

    let selection = fixture
        .selector
        .select_asr(None, None, Some(AsrVariant::File), None, true, None)
        .await
        .unwrap();

    assert_eq!(selection.provider, "bdiar");
}

#[tokio::test]
async fn given_unhealthy_provider_when_health_first_strategy_then_healthy_wins_despite_cost() {
    let cheap = ProviderMetadata::new("cheap")
        .cost_per_unit(0.00001)
        .variants(&[AsrVariant::File]);
    let pricey = ProviderMetadata::new("pricey")
        .cost_per_unit(0.01)
        .variants(&[AsrVariant::File]);
    let fixture = SelectorBuilder::new()
        .with_asr("cheap", cheap, engine())
        .with_asr("pricey", pricey, engine())
        .with_strategy(SelectionStrategy::HealthFirst)
        .build();

    for _ in 0..3 {
        fixture.health.record_failure(ServiceKind::Asr, "cheap");
    }

    let selection = fixture
        .selector
        .select_asr(None, None, Some(AsrVariant::File), Some(600.0), false, None)
        .await
        .unwrap();

    assert_eq!(selection.provider, "pricey");
}

#[tokio::test]
async fn given_cost_first_strategy_when_selecting_then_cheaper_provider_wins() {
    let cheap = ProviderMetadata::new("cheap")
        .cost_per_unit(0.00001)
        .variants(&[AsrVariant::File]);
    let pricey = ProviderMetadata::new("pricey")
        .cost_per_unit(0.01)
        .variants(&[AsrVariant::File]);
    let fixture = SelectorBuilder::new()
        .with_asr("pricey", pricey, engine())
        .with_asr("zcheap", cheap, engine())
        .with_strategy(SelectionStrategy::CostFirst)
        .build();

    let selection = fixture
        .selector
        .select_asr(None, None, Some(AsrVariant::File), Some(600.0), false, None)
        .await
        .unwrap();

    assert_eq!(selection.provider, "zcheap");
}

#[tokio::test]
async fn given_no_llm_providers_when_selecting_then_no_provider_available() {
    let fixture = SelectorBuilder::new().build();

    let result = fixture.selector.select_llm(None, None, None, None).await;

    assert!(matches!(
        result,
        Err(SelectorError::NoProviderAvailable(ServiceKind::Llm))
    ));
}
