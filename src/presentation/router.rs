use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    create_task_handler, delete_task_handler, generate_visual_handler, get_summaries_handler,
    get_task_handler, get_transcript_handler, health_handler, list_tasks_handler,
    presign_upload_handler, query_quotas_handler, refresh_quota_handler,
    stream_progress_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/upload/presign", post(presign_upload_handler))
        .route("/api/v1/tasks", post(create_task_handler))
        .route("/api/v1/tasks", get(list_tasks_handler))
        .route("/api/v1/tasks/{task_id}", get(get_task_handler))
        .route("/api/v1/tasks/{task_id}", delete(delete_task_handler))
        .route(
            "/api/v1/tasks/{task_id}/transcript",
            get(get_transcript_handler),
        )
        .route(
            "/api/v1/tasks/{task_id}/summaries",
            get(get_summaries_handler),
        )
        .route(
            "/api/v1/tasks/{task_id}/visualizations",
            post(generate_visual_handler),
        )
        .route(
            "/api/v1/tasks/{task_id}/progress",
            get(stream_progress_handler),
        )
        .route("/api/v1/quotas", get(query_quotas_handler))
        .route("/api/v1/quotas/refresh", post(refresh_quota_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
