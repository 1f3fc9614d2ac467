use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;

use echoscribe::application::ports::{
    AsrEngine, LlmClient, StageRepository, TaskRepository, TranscriptRepository, UsageLog,
};
use echoscribe::application::services::{is_canonical_prefix, ProgressEvent, ProviderMetadata};
use echoscribe::domain::{
    stage_flow, AsrVariant, ObjectKey, QuotaEntry, QuotaOwner, QuotaStatus, ServiceKind,
    SourceType, StageStatus, StageType, SummaryType, Task, TaskOptions, TaskStage, TaskStatus,
    UsageRecord, UserId, WindowType,
};
use echoscribe::infrastructure::asr::MockAsrEngine;
use echoscribe::infrastructure::llm::MockLlmClient;

use crate::support::{asr_metadata, segment, PipelineHarness, SelectorBuilder};

fn upload_task(source_key: &str) -> Task {
    Task::new_upload(
        UserId::new(),
        Some("board meeting".to_string()),
        source_key.to_string(),
        Some("f".repeat(64)),
        TaskOptions::default(),
    )
}

fn ok_engine(duration: f64) -> Arc<dyn AsrEngine> {
    Arc::new(MockAsrEngine::always(MockAsrEngine::simple_transcription(
        "we agreed to ship next week",
        duration,
    )))
}

fn llm() -> Arc<dyn LlmClient> {
    Arc::new(MockLlmClient::always("generated summary"))
}

fn exhausted(provider: &str, variant: AsrVariant, used: f64) -> QuotaEntry {
    let mut entry = QuotaEntry::new(
        QuotaOwner::Global,
        provider,
        variant,
        WindowType::Day,
        used,
        Utc::now(),
    );
    entry.used_seconds = used;
    entry.status = QuotaStatus::Exhausted;
    entry
}

async fn seed_upload_object(harness: &PipelineHarness, task: &Task) {
    let key = ObjectKey::from_raw(task.source_key.clone().unwrap());
    harness.storage.insert(&key, Bytes::from_static(b"audio bytes"));
}

#[tokio::test]
async fn given_uploaded_audio_when_pipeline_runs_then_task_completes_with_all_artifacts() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(600.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    let harness = PipelineHarness::new(builder, 600.0);

    let task = upload_task("uploads/2025/07/deadbeef.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    let (_, mut progress_rx) = harness.progress.subscribe(task.id);
    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert_eq!(finished.asr_provider.as_deref(), Some("alpha"));
    assert_eq!(finished.llm_provider.as_deref(), Some("llm"));
    assert_eq!(finished.duration_seconds, Some(600.0));

    assert!(harness.transcripts.count() > 0);
    let summaries = harness.summaries.active_for(task.id);
    assert_eq!(summaries.len(), 3);
    let types: Vec<SummaryType> = summaries.iter().map(|s| s.summary_type).collect();
    assert!(types.contains(&SummaryType::Overview));
    assert!(types.contains(&SummaryType::KeyPoints));
    assert!(types.contains(&SummaryType::ActionItems));

    // Stage rows form a prefix of the canonical upload flow, all done.
    let stages = harness.stages.all();
    assert!(is_canonical_prefix(&stages, stage_flow(SourceType::Upload)));
    assert!(stages
        .iter()
        .all(|stage| stage.status == StageStatus::Completed));

    // Progress only ever moves forward and ends at the completed event.
    let mut events: Vec<ProgressEvent> = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), progress_rx.recv()).await {
            Ok(Ok(event)) => {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    break;
                }
            }
            _ => break,
        }
    }
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(pair[1].progress >= pair[0].progress);
    }
    let last = events.last().unwrap();
    assert_eq!(last.progress, 100);

    let notifications = harness.notifications.all();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].action, "completed");
}

#[tokio::test]
async fn given_exhausted_provider_when_pipeline_runs_then_fails_over_and_charges_other_quota() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(120.0))
        .with_asr("beta", asr_metadata(), ok_engine(120.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    builder.quota_store().seed(exhausted("alpha", AsrVariant::File, 60.0));
    builder.quota_store().seed(exhausted("alpha", AsrVariant::FileFast, 60.0));
    builder.quota_store().seed(QuotaEntry::new(
        QuotaOwner::Global,
        "beta",
        AsrVariant::FileFast,
        WindowType::Day,
        100_000.0,
        Utc::now(),
    ));
    let harness = PipelineHarness::new(builder, 120.0);

    let task = upload_task("uploads/2025/07/cafebabe.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.asr_provider.as_deref(), Some("beta"));

    // Alpha untouched, beta charged for the full 120 seconds.
    let entries = harness.fixture.quota_store.all();
    for entry in &entries {
        if entry.provider == "alpha" {
            assert_eq!(entry.used_seconds, 60.0);
        }
        if entry.provider == "beta" {
            assert_eq!(entry.used_seconds, 120.0);
        }
    }
}

#[tokio::test]
async fn given_all_quotas_exhausted_when_pipeline_runs_then_task_fails_terminally() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(60.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    builder.quota_store().seed(exhausted("alpha", AsrVariant::File, 60.0));
    builder.quota_store().seed(exhausted("alpha", AsrVariant::FileFast, 60.0));
    let harness = PipelineHarness::new(builder, 60.0);

    let task = upload_task("uploads/2025/07/0badf00d.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished.error_message.is_some());

    let stages = harness.stages.all();
    assert!(stages
        .iter()
        .any(|stage| stage.stage_type == StageType::Transcribe
            && stage.status == StageStatus::Failed));

    let notifications = harness.notifications.all();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].action, "failed");
}

#[tokio::test]
async fn given_transient_asr_failure_when_pipeline_runs_then_retried_to_success() {
    let flaky = Arc::new(MockAsrEngine::scripted(vec![
        Err("vendor 503".to_string()),
        Ok(MockAsrEngine::simple_transcription("recovered", 90.0)),
    ]));
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), flaky.clone() as Arc<dyn AsrEngine>)
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    let harness = PipelineHarness::new(builder, 90.0);

    let task = upload_task("uploads/2025/07/5eed5eed.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn given_completed_task_when_reprocessed_then_no_duplicate_work() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(60.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    let harness = PipelineHarness::new(builder, 60.0);

    let task = upload_task("uploads/2025/07/feedface.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    harness.spawn_worker();
    harness.enqueue(task.id).await;
    harness.wait_for_terminal(task.id).await;

    let transcripts_before = harness.transcripts.count();
    let summaries_before = harness.summaries.all().len();

    harness.enqueue(task.id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.transcripts.count(), transcripts_before);
    assert_eq!(harness.summaries.all().len(), summaries_before);
    let task_after = harness.tasks.get(task.id).unwrap();
    assert_eq!(task_after.status, TaskStatus::Completed);
    assert_eq!(task_after.progress, 100);
}

#[tokio::test]
async fn given_transcribe_left_running_by_crash_when_resumed_then_nothing_is_charged_twice() {
    let engine = Arc::new(MockAsrEngine::always(MockAsrEngine::simple_transcription(
        "we agreed to ship next week",
        120.0,
    )));
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), engine.clone() as Arc<dyn AsrEngine>)
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    builder.quota_store().seed(QuotaEntry::new(
        QuotaOwner::Global,
        "alpha",
        AsrVariant::FileFast,
        WindowType::Day,
        100_000.0,
        Utc::now(),
    ));
    let harness = PipelineHarness::new(builder, 120.0);

    // Task state as the crashed worker left it: mid-transcribe, with the
    // vendor call, transcript rows, quota commit and cost record all
    // already landed, but the stage row never marked completed.
    let mut task = upload_task("uploads/2025/07/1nterrupt.wav");
    task.status = TaskStatus::Transcribing;
    task.progress = 20;
    task.duration_seconds = Some(120.0);
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    let mut upload_stage = TaskStage::begin(task.id, StageType::UploadStorage, 1);
    upload_stage.status = StageStatus::Completed;
    upload_stage.completed_at = Some(Utc::now());
    harness.stages.insert(&upload_stage).await.unwrap();
    let interrupted = TaskStage::begin(task.id, StageType::Transcribe, 1);
    harness.stages.insert(&interrupted).await.unwrap();

    harness
        .transcripts
        .replace_for_task(
            task.id,
            &[segment(task.id, 1, "we agreed to ship next week", 0.95)],
        )
        .await
        .unwrap();

    let attempt_key = format!("{}:transcribe:1", task.id);
    harness.fixture.quota_store.seed_commit_key(&attempt_key);
    harness
        .fixture
        .quota_store
        .commit_direct("alpha", AsrVariant::FileFast, 120.0);
    harness
        .fixture
        .usage
        .append(
            &UsageRecord::new(ServiceKind::Asr, "alpha", 0.012, &attempt_key, 1)
                .with_task(task.user_id, task.id)
                .with_duration(120.0),
        )
        .await
        .unwrap();

    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);

    // The interrupted row was resumed, not retried under a new attempt.
    let transcribe_rows: Vec<TaskStage> = harness
        .stages
        .all()
        .into_iter()
        .filter(|stage| stage.stage_type == StageType::Transcribe)
        .collect();
    assert_eq!(transcribe_rows.len(), 1);
    assert_eq!(transcribe_rows[0].id, interrupted.id);
    assert_eq!(transcribe_rows[0].attempt, 1);
    assert_eq!(transcribe_rows[0].status, StageStatus::Completed);

    // Transcript rows replaced, not appended.
    assert_eq!(harness.transcripts.count(), 1);

    // Quota ledger dropped the replayed commit.
    assert_eq!(harness.fixture.quota_store.used_for("alpha"), 120.0);

    // Usage log still holds exactly one record for the attempt, even
    // though the vendor call itself ran again (at-least-once).
    let asr_records = harness
        .fixture
        .usage
        .records()
        .into_iter()
        .filter(|record| record.request_id == attempt_key)
        .count();
    assert_eq!(asr_records, 1);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn given_cancelled_task_when_pipeline_runs_then_fails_with_cancelled_message() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(60.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    let harness = PipelineHarness::new(builder, 60.0);

    let task = upload_task("uploads/2025/07/deadc0de.wav");
    harness.tasks.create(&task).await.unwrap();
    seed_upload_object(&harness, &task).await;

    harness.cancellations.cancel(task.id);
    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Failed);
    assert_eq!(finished.error_message.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn given_url_task_when_pipeline_runs_then_media_stages_execute_and_object_stored() {
    let builder = SelectorBuilder::new()
        .with_asr("alpha", asr_metadata(), ok_engine(300.0))
        .with_llm("llm", ProviderMetadata::new("llm"), llm());
    let harness = PipelineHarness::new(builder, 300.0);

    let task = Task::new_url(
        UserId::new(),
        Some("conference talk".to_string()),
        "https://example.com/talks/42".to_string(),
        TaskOptions::default(),
    );
    harness.tasks.create(&task).await.unwrap();

    harness.spawn_worker();
    harness.enqueue(task.id).await;

    let finished = harness.wait_for_terminal(task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);
    // Content-addressed key recorded and the canonical audio uploaded.
    let key = finished.source_key.expect("source key expected");
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with(".wav"));
    assert_eq!(harness.storage.object_count(), 1);

    let stages = harness.stages.all();
    assert!(is_canonical_prefix(&stages, stage_flow(SourceType::Url)));
    assert_eq!(stages.len(), stage_flow(SourceType::Url).len());
}
