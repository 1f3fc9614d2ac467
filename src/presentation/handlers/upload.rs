use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::ObjectKey;
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};

#[derive(Deserialize)]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub content_hash: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PresignResponse {
    Existing {
        exists: bool,
        task_id: String,
    },
    Fresh {
        exists: bool,
        upload_url: String,
        file_key: String,
        expires_in: u64,
    },
}

/// Presigned-upload handshake with content-hash dedup: a hash the user
/// has already processed short-circuits to the existing task ("instant
/// upload").
pub async fn presign_upload_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<PresignRequest>,
) -> Response {
    let extension = match request.filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => {
            return ctx.error_with_detail(ErrorCode::UnsupportedFileFormat, Some(&request.filename));
        }
    };
    if !state.upload.allowed_extensions.contains(&extension) {
        return ctx.error_with_detail(ErrorCode::UnsupportedFileFormat, Some(&extension));
    }
    if request.size_bytes > state.upload.max_size_bytes {
        return ctx.error(ErrorCode::FileTooLarge);
    }
    if request.content_hash.len() != 64
        || !request.content_hash.chars().all(|c| c.is_ascii_hexdigit())
    {
        return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("content_hash"));
    }

    match state
        .tasks
        .find_by_content_hash(ctx.user_id, &request.content_hash)
        .await
    {
        Ok(Some(task)) => {
            tracing::info!(task_id = %task.id, "Instant upload hit");
            return ctx.ok(PresignResponse::Existing {
                exists: true,
                task_id: task.id.to_string(),
            });
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Dedup lookup failed");
            return ctx.error(ErrorCode::DatabaseError);
        }
    }

    let key = ObjectKey::upload(&request.content_hash, &extension, Utc::now());
    let expires_in = state.upload.presign_expires_secs;

    let selection = match state.selector.select_storage(None).await {
        Ok(selection) => selection,
        Err(e) => {
            tracing::error!(error = %e, "No storage backend for presign");
            return ctx.error(ErrorCode::StorageServiceFailed);
        }
    };
    let upload_url = match selection
        .store
        .presign_put(&key, Duration::from_secs(expires_in), &request.content_type)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, provider = %selection.provider, "Presign failed");
            return ctx.error(ErrorCode::StorageServiceFailed);
        }
    };

    ctx.ok(PresignResponse::Fresh {
        exists: false,
        upload_url,
        file_key: key.as_str().to_string(),
        expires_in,
    })
    .into_response()
}
