use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::application::ports::{QueueJob, TaskMessage};
use crate::domain::TaskStatus;
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};
use super::tasks::load_owned_task;

const VISUAL_TYPES: &[&str] = &["mindmap", "timeline", "flowchart"];

#[derive(Deserialize)]
pub struct GenerateVisualRequest {
    pub visual_type: String,
    #[serde(default)]
    pub content_style: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default = "default_generate_image")]
    pub generate_image: bool,
    #[serde(default = "default_image_format")]
    pub image_format: String,
}

fn default_generate_image() -> bool {
    true
}

fn default_image_format() -> String {
    "png".to_string()
}

/// Enqueue visualization generation as its own pipeline run over the
/// already-transcribed task.
pub async fn generate_visual_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
    Json(request): Json<GenerateVisualRequest>,
) -> Response {
    let task = match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };

    if !VISUAL_TYPES.contains(&request.visual_type.as_str()) {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("visual_type"));
    }
    if !matches!(request.image_format.as_str(), "png" | "svg") {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("image_format"));
    }
    if task.status != TaskStatus::Completed {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("task not completed"));
    }

    let message = TaskMessage {
        task_id: task.id,
        request_id: Some(ctx.trace_id.clone()),
        job: QueueJob::GenerateVisual {
            visual_type: request.visual_type.clone(),
            content_style: request
                .content_style
                .unwrap_or_else(|| task.options.summary_style().to_string()),
            provider: request.provider,
            model_id: request.model_id,
            generate_image: request.generate_image,
            image_format: request.image_format,
        },
    };
    if let Err(e) = state.queue.push(&message).await {
        tracing::error!(error = %e, "Failed to enqueue visual generation");
        return ctx.error(ErrorCode::InternalError);
    }

    ctx.ok(serde_json::json!({
        "task_id": task.id.to_string(),
        "visual_type": request.visual_type,
        "status": "queued",
    }))
}
