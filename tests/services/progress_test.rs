use echoscribe::application::services::{ProgressBroadcaster, ProgressEvent, ProgressEventType};
use echoscribe::domain::{TaskId, TaskStatus};

#[tokio::test]
async fn given_events_published_when_subscribed_then_delivered_in_publish_order() {
    let broadcaster = ProgressBroadcaster::new();
    let task_id = TaskId::new();

    let (_, mut receiver) = broadcaster.subscribe(task_id);
    for progress in [10, 20, 45] {
        broadcaster.publish(ProgressEvent::progress(
            task_id,
            TaskStatus::Transcribing,
            Some("transcribe".to_string()),
            progress,
        ));
    }

    assert_eq!(receiver.recv().await.unwrap().progress, 10);
    assert_eq!(receiver.recv().await.unwrap().progress, 20);
    assert_eq!(receiver.recv().await.unwrap().progress, 45);
}

#[tokio::test]
async fn given_late_subscriber_when_subscribing_then_receives_current_snapshot() {
    let broadcaster = ProgressBroadcaster::new();
    let task_id = TaskId::new();

    broadcaster.publish(ProgressEvent::progress(
        task_id,
        TaskStatus::Summarizing,
        Some("summarize".to_string()),
        80,
    ));

    let (snapshot, _) = broadcaster.subscribe(task_id);

    let snapshot = snapshot.expect("snapshot expected");
    assert_eq!(snapshot.progress, 80);
    assert_eq!(snapshot.status, TaskStatus::Summarizing);
}

#[tokio::test]
async fn given_terminal_event_when_published_then_stream_ends_for_subscribers() {
    let broadcaster = ProgressBroadcaster::new();
    let task_id = TaskId::new();

    let (_, mut receiver) = broadcaster.subscribe(task_id);
    broadcaster.publish(ProgressEvent::completed(task_id));

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event_type, ProgressEventType::Completed);
    assert_eq!(event.progress, 100);

    // Topic torn down: the channel is now closed.
    assert!(receiver.recv().await.is_err());
}

#[tokio::test]
async fn given_two_tasks_when_publishing_then_no_cross_talk() {
    let broadcaster = ProgressBroadcaster::new();
    let task_a = TaskId::new();
    let task_b = TaskId::new();

    let (_, mut receiver_a) = broadcaster.subscribe(task_a);
    let (_, _receiver_b) = broadcaster.subscribe(task_b);

    broadcaster.publish(ProgressEvent::progress(task_b, TaskStatus::Extracting, None, 5));
    broadcaster.publish(ProgressEvent::progress(task_a, TaskStatus::Extracting, None, 7));

    let event = receiver_a.recv().await.unwrap();
    assert_eq!(event.task_id, task_a);
    assert_eq!(event.progress, 7);
}

#[test]
fn given_error_event_when_serialized_then_envelope_fields_match_contract() {
    let task_id = TaskId::new();
    let event = ProgressEvent::error(task_id, 40);

    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["type"], "error");
    assert_eq!(value["status"], "failed");
    assert_eq!(value["progress"], 40);
    assert_eq!(value["task_id"], task_id.to_string());
}
