use std::sync::Arc;

use echoscribe::application::ports::StageRepository;
use echoscribe::application::services::{is_canonical_prefix, StageMachine};
use echoscribe::domain::{stage_flow, SourceType, StageStatus, StageType, TaskId, TaskStage};

use crate::support::InMemoryStageRepository;

fn machine() -> (StageMachine, Arc<InMemoryStageRepository>) {
    let stages = Arc::new(InMemoryStageRepository::new());
    let machine = StageMachine::new(Arc::clone(&stages) as Arc<dyn StageRepository>);
    (machine, stages)
}

#[tokio::test]
async fn given_no_record_when_checking_then_stage_should_execute() {
    let (machine, _) = machine();

    assert!(machine
        .should_execute(TaskId::new(), StageType::Transcribe)
        .await
        .unwrap());
}

#[tokio::test]
async fn given_completed_active_record_when_checking_then_stage_is_skipped() {
    let (machine, _) = machine();
    let task_id = TaskId::new();

    let stage = machine.begin(task_id, StageType::Transcribe).await.unwrap();
    machine.complete(&stage).await.unwrap();

    assert!(!machine
        .should_execute(task_id, StageType::Transcribe)
        .await
        .unwrap());
}

#[tokio::test]
async fn given_running_record_when_beginning_again_then_same_attempt_resumed() {
    let (machine, stages) = machine();
    let task_id = TaskId::new();

    let first = machine.begin(task_id, StageType::Transcribe).await.unwrap();
    // A crashed worker leaves the row running; the next worker picks the
    // stage up again.
    let resumed = machine.begin(task_id, StageType::Transcribe).await.unwrap();

    assert_eq!(resumed.id, first.id);
    assert_eq!(resumed.attempt, 1);
    assert_eq!(stages.all().len(), 1);
}

#[tokio::test]
async fn given_failed_record_when_beginning_again_then_old_row_archived_and_attempt_bumped() {
    let (machine, stages) = machine();
    let task_id = TaskId::new();

    let first = machine.begin(task_id, StageType::Download).await.unwrap();
    machine.fail(&first, "network down").await.unwrap();

    let second = machine.begin(task_id, StageType::Download).await.unwrap();

    assert_eq!(second.attempt, 2);
    let all = stages.all();
    let active: Vec<&TaskStage> = all.iter().filter(|stage| stage.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].attempt, 2);
    assert_eq!(active[0].status, StageStatus::Running);
    // The archived first attempt keeps its failure record.
    assert!(all
        .iter()
        .any(|stage| !stage.is_active && stage.error_message.as_deref() == Some("network down")));
}

#[tokio::test]
async fn given_skip_when_invoked_then_active_skipped_row_written() {
    let (machine, stages) = machine();
    let task_id = TaskId::new();

    machine.skip(task_id, StageType::Resolve).await.unwrap();

    let all = stages.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, StageStatus::Skipped);
    assert!(all[0].is_active);
    assert!(!machine
        .should_execute(task_id, StageType::Resolve)
        .await
        .unwrap());
}

#[test]
fn given_active_stage_prefix_when_validating_then_accepted() {
    let task_id = TaskId::new();
    let flow = stage_flow(SourceType::Url);
    let stages: Vec<TaskStage> = flow
        .iter()
        .take(3)
        .map(|stage_type| {
            let mut stage = TaskStage::begin(task_id, *stage_type, 1);
            stage.status = StageStatus::Completed;
            stage
        })
        .collect();

    assert!(is_canonical_prefix(&stages, flow));
}

#[test]
fn given_gap_in_stages_when_validating_then_rejected() {
    let task_id = TaskId::new();
    let flow = stage_flow(SourceType::Url);
    let stages = vec![
        TaskStage::begin(task_id, StageType::Resolve, 1),
        TaskStage::begin(task_id, StageType::Transcribe, 1),
    ];

    assert!(!is_canonical_prefix(&stages, flow));
}

#[test]
fn given_two_running_stages_when_validating_then_rejected() {
    let task_id = TaskId::new();
    let flow = stage_flow(SourceType::Upload);
    let stages = vec![
        TaskStage::begin(task_id, StageType::UploadStorage, 1),
        TaskStage::begin(task_id, StageType::Transcribe, 1),
    ];

    assert!(!is_canonical_prefix(&stages, flow));
}
