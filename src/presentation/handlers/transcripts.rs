use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::domain::{TranscriptSegment, WordTimestamp};
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};
use super::tasks::load_owned_task;

const MAX_PAGE_SIZE: i64 = 200;

#[derive(Deserialize)]
pub struct TranscriptQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

#[derive(Serialize)]
struct SegmentView {
    id: String,
    sequence: i32,
    speaker_id: Option<String>,
    start_time: f64,
    end_time: f64,
    content: String,
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    words: Option<Vec<WordTimestamp>>,
    is_edited: bool,
}

fn segment_view(segment: &TranscriptSegment) -> SegmentView {
    SegmentView {
        id: segment.id.to_string(),
        sequence: segment.sequence,
        speaker_id: segment.speaker_id.clone(),
        start_time: segment.start_time,
        end_time: segment.end_time,
        content: segment.content.clone(),
        confidence: segment.confidence,
        words: segment.words.clone(),
        is_edited: segment.is_edited,
    }
}

pub async fn get_transcript_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
    Query(query): Query<TranscriptQuery>,
) -> Response {
    let task = match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if query.page < 1 || query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("page/page_size"));
    }

    match state
        .transcripts
        .list(task.id, query.page, query.page_size)
        .await
    {
        Ok(page) => {
            let speakers: Vec<String> = {
                let mut speakers: Vec<String> = page
                    .segments
                    .iter()
                    .filter_map(|segment| segment.speaker_id.clone())
                    .collect();
                speakers.sort();
                speakers.dedup();
                speakers
            };
            ctx.ok(serde_json::json!({
                "segments": page.segments.iter().map(segment_view).collect::<Vec<_>>(),
                "total": page.total,
                "page": query.page,
                "page_size": query.page_size,
                "speakers": speakers,
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load transcript");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}
