use chrono::{TimeZone, Utc};
use uuid::Uuid;

use echoscribe::domain::{ObjectKey, TaskId, UserId};

#[test]
fn given_hash_and_extension_when_building_upload_key_then_year_month_addressed() {
    let now = Utc.with_ymd_and_hms(2025, 7, 3, 10, 0, 0).unwrap();
    let hash = "a".repeat(64);

    let key = ObjectKey::upload(&hash, "wav", now);

    assert_eq!(key.as_str(), format!("uploads/2025/07/{}.wav", hash));
}

#[test]
fn given_dotted_extension_when_building_upload_key_then_single_dot() {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let key = ObjectKey::upload("abc123", ".mp3", now);

    assert_eq!(key.as_str(), "uploads/2025/01/abc123.mp3");
}

#[test]
fn given_same_content_hash_when_building_keys_in_same_month_then_keys_collide() {
    let now = Utc.with_ymd_and_hms(2025, 7, 3, 10, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2025, 7, 28, 23, 0, 0).unwrap();

    assert_eq!(
        ObjectKey::upload("deadbeef", "wav", now),
        ObjectKey::upload("deadbeef", "wav", later)
    );
}

#[test]
fn given_visual_parts_when_building_key_then_user_and_task_scoped() {
    let user = UserId::new();
    let task = TaskId::new();
    let summary = Uuid::new_v4();

    let key = ObjectKey::visual(user, task, "mindmap", summary, "png");

    assert_eq!(
        key.as_str(),
        format!("visuals/{}/{}/mindmap_{}.png", user, task, summary)
    );
    assert_eq!(key.extension(), Some("png"));
}
