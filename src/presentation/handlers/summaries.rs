use axum::extract::{Path, State};
use axum::response::Response;
use serde::Serialize;

use crate::domain::Summary;
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};
use super::tasks::load_owned_task;

#[derive(Serialize)]
struct SummaryView {
    id: String,
    summary_type: String,
    version: i32,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    visual_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visual_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_key: Option<String>,
    model_used: Option<String>,
    prompt_version: Option<String>,
    token_count: Option<i32>,
    created_at: String,
}

fn summary_view(summary: &Summary) -> SummaryView {
    SummaryView {
        id: summary.id.to_string(),
        summary_type: summary.summary_type.as_str().to_string(),
        version: summary.version,
        content: summary.content.clone(),
        visual_format: summary.visual_format.clone(),
        visual_content: summary.visual_content.clone(),
        image_key: summary.image_key.clone(),
        model_used: summary.model_used.clone(),
        prompt_version: summary.prompt_version.clone(),
        token_count: summary.token_count,
        created_at: summary.created_at.to_rfc3339(),
    }
}

pub async fn get_summaries_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
) -> Response {
    let task = match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };

    match state.summaries.list_active(task.id).await {
        Ok(summaries) => ctx.ok(serde_json::json!({
            "summaries": summaries.iter().map(summary_view).collect::<Vec<_>>(),
        })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load summaries");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}
