use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::{QueueJob, TaskMessage};
use crate::domain::{SourceType, Task, TaskId, TaskOptions, TaskStatus};
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub options: TaskOptions,
}

#[derive(Serialize)]
pub struct TaskSummaryView {
    pub id: String,
    pub title: Option<String>,
    pub status: String,
    pub progress: i16,
    pub source_type: String,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct TaskDetailView {
    #[serde(flatten)]
    pub summary: TaskSummaryView,
    pub source_key: Option<String>,
    pub source_url: Option<String>,
    pub content_hash: Option<String>,
    pub asr_provider: Option<String>,
    pub llm_provider: Option<String>,
    pub options: TaskOptions,
}

fn summary_view(task: &Task) -> TaskSummaryView {
    TaskSummaryView {
        id: task.id.to_string(),
        title: task.title.clone(),
        status: task.status.as_str().to_string(),
        progress: task.progress,
        source_type: task.source_type.as_str().to_string(),
        duration_seconds: task.duration_seconds,
        error_message: task.error_message.clone(),
        created_at: task.created_at.to_rfc3339(),
        updated_at: task.updated_at.to_rfc3339(),
    }
}

fn detail_view(task: &Task) -> TaskDetailView {
    TaskDetailView {
        summary: summary_view(task),
        source_key: task.source_key.clone(),
        source_url: task.source_url.clone(),
        content_hash: task.content_hash.clone(),
        asr_provider: task.asr_provider.clone(),
        llm_provider: task.llm_provider.clone(),
        options: task.options.clone(),
    }
}

pub async fn create_task_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateTaskRequest>,
) -> Response {
    let task = match request.source_type {
        SourceType::Upload => {
            let file_key = match request.file_key {
                Some(key) if !key.is_empty() => key,
                _ => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("file_key")),
            };
            Task::new_upload(
                ctx.user_id,
                request.title,
                file_key,
                request.content_hash,
                request.options,
            )
        }
        SourceType::Url => {
            let source_url = match request.source_url {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => url,
                _ => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("source_url")),
            };
            Task::new_url(ctx.user_id, request.title, source_url, request.options)
        }
    };

    if let Err(e) = state.tasks.create(&task).await {
        tracing::error!(error = %e, "Failed to create task");
        return ctx.error(ErrorCode::DatabaseError);
    }

    let message = TaskMessage {
        task_id: task.id,
        request_id: Some(ctx.trace_id.clone()),
        job: QueueJob::ProcessTask,
    };
    if let Err(e) = state.queue.push(&message).await {
        tracing::error!(error = %e, task_id = %task.id, "Failed to enqueue task");
        return ctx.error(ErrorCode::InternalError);
    }

    tracing::info!(task_id = %task.id, source_type = %task.source_type.as_str(), "Task enqueued");
    ctx.ok(serde_json::json!({
        "id": task.id.to_string(),
        "status": task.status.as_str(),
        "progress": task.progress,
    }))
}

#[derive(Deserialize)]
pub struct ListTasksQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

pub async fn list_tasks_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    if query.page < 1 || query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("page/page_size"));
    }
    let status = match &query.status {
        Some(raw) => match raw.parse::<TaskStatus>() {
            Ok(status) => Some(status),
            Err(_) => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("status")),
        },
        None => None,
    };

    match state
        .tasks
        .list(ctx.user_id, status, query.page, query.page_size)
        .await
    {
        Ok(page) => ctx.ok(serde_json::json!({
            "items": page.tasks.iter().map(summary_view).collect::<Vec<_>>(),
            "total": page.total,
            "page": query.page,
            "page_size": query.page_size,
        })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list tasks");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}

/// Ownership check shared by the task-scoped handlers.
pub(super) async fn load_owned_task(
    state: &AppState,
    ctx: &RequestContext,
    raw_id: &str,
) -> Result<Task, Response> {
    let id = Uuid::parse_str(raw_id)
        .map(TaskId::from_uuid)
        .map_err(|_| ctx.error_with_detail(ErrorCode::InvalidParameter, Some("task id")))?;
    match state.tasks.get_by_id(id).await {
        Ok(Some(task)) => {
            if task.user_id != ctx.user_id {
                Err(ctx.error(ErrorCode::Forbidden))
            } else {
                Ok(task)
            }
        }
        Ok(None) => Err(ctx.error(ErrorCode::TaskNotFound)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load task");
            Err(ctx.error(ErrorCode::DatabaseError))
        }
    }
}

pub async fn get_task_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
) -> Response {
    match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => ctx.ok(detail_view(&task)),
        Err(response) => response,
    }
}

pub async fn delete_task_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
) -> Response {
    let task = match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };

    // A running pipeline sees the flag at its next checkpoint.
    state.cancellations.cancel(task.id);

    match state.tasks.soft_delete(task.id).await {
        Ok(()) => ctx.ok(serde_json::json!({ "deleted": true })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete task");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}
