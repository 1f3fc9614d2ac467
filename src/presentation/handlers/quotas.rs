use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::services::QuotaAmount;
use crate::domain::{AsrVariant, QuotaEntry, QuotaOwner, UserId, WindowType};
use crate::presentation::state::AppState;

use super::envelope::{ErrorCode, RequestContext};

#[derive(Serialize)]
struct QuotaView {
    provider: String,
    variant: String,
    window_type: String,
    window_start: String,
    window_end: String,
    quota_seconds: f64,
    used_seconds: f64,
    status: String,
    scope: &'static str,
}

fn quota_view(entry: &QuotaEntry) -> QuotaView {
    QuotaView {
        provider: entry.provider.clone(),
        variant: entry.variant.as_str().to_string(),
        window_type: entry.window_type.as_str().to_string(),
        window_start: entry.window_start.to_rfc3339(),
        window_end: entry.window_end.to_rfc3339(),
        quota_seconds: entry.quota_seconds,
        used_seconds: entry.used_seconds,
        status: entry.status.as_str().to_string(),
        scope: match entry.owner {
            QuotaOwner::Global => "global",
            QuotaOwner::User(_) => "user",
        },
    }
}

/// Effective quota entries for the caller: own rows shadowing globals.
pub async fn query_quotas_handler(State(state): State<AppState>, ctx: RequestContext) -> Response {
    match state
        .quota
        .list_effective(Some(ctx.user_id), Utc::now())
        .await
    {
        Ok(entries) => ctx.ok(serde_json::json!({
            "quotas": entries.iter().map(quota_view).collect::<Vec<_>>(),
        })),
        Err(e) => {
            tracing::error!(error = %e, "Quota query failed");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}

#[derive(Deserialize)]
pub struct RefreshQuotaRequest {
    /// Absent = global entry.
    #[serde(default)]
    pub owner_user_id: Option<Uuid>,
    pub provider: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub window_type: String,
    #[serde(default)]
    pub quota_seconds: Option<f64>,
    #[serde(default)]
    pub quota_hours: Option<f64>,
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset: bool,
}

pub async fn refresh_quota_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<RefreshQuotaRequest>,
) -> Response {
    let window_type = match request.window_type.parse::<WindowType>() {
        Ok(window_type) => window_type,
        Err(_) => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("window_type")),
    };
    let variant = match request.variant.as_deref() {
        None => AsrVariant::File,
        Some(raw) => match raw.parse::<AsrVariant>() {
            Ok(variant) => variant,
            Err(_) => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("variant")),
        },
    };
    let amount = match (request.quota_seconds, request.quota_hours) {
        (Some(seconds), _) if seconds >= 0.0 => QuotaAmount::Seconds(seconds),
        (None, Some(hours)) if hours >= 0.0 => QuotaAmount::Hours(hours),
        _ => {
            return ctx.error_with_detail(
                ErrorCode::InvalidParameter,
                Some("quota_seconds or quota_hours"),
            );
        }
    };
    let window = match (request.window_start, request.window_end) {
        (Some(start), Some(end)) if start < end => Some((start, end)),
        (None, None) => None,
        _ => return ctx.error_with_detail(ErrorCode::InvalidParameter, Some("window bounds")),
    };
    let owner = match request.owner_user_id {
        Some(user_id) => QuotaOwner::User(UserId::from_uuid(user_id)),
        None => QuotaOwner::Global,
    };

    match state
        .quota
        .refresh(
            owner,
            &request.provider,
            variant,
            window_type,
            amount,
            window,
            request.reset,
        )
        .await
    {
        Ok(entry) => ctx.ok(quota_view(&entry)),
        Err(e) => {
            tracing::error!(error = %e, "Quota refresh failed");
            ctx.error(ErrorCode::DatabaseError)
        }
    }
}
