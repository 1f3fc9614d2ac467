use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::UserId;
use crate::infrastructure::observability::RequestId;
use crate::presentation::i18n::{self, Locale};

/// Identity header populated by the authenticating reverse proxy. Token
/// verification itself happens upstream; a missing header is the one case
/// that surfaces as a transport-level 401.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    InvalidParameter,
    UnsupportedFileFormat,
    FileTooLarge,
    InvalidToken,
    Forbidden,
    NotFound,
    TaskNotFound,
    DuplicateTask,
    AsrQuotaExceeded,
    AllAsrQuotasExhausted,
    InternalError,
    DatabaseError,
    AsrServiceFailed,
    LlmServiceFailed,
    StorageServiceFailed,
}

impl ErrorCode {
    pub fn value(&self) -> i64 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::InvalidParameter => 40000,
            ErrorCode::UnsupportedFileFormat => 40001,
            ErrorCode::FileTooLarge => 40002,
            ErrorCode::InvalidToken => 40100,
            ErrorCode::Forbidden => 40300,
            ErrorCode::NotFound => 40400,
            ErrorCode::TaskNotFound => 40401,
            ErrorCode::DuplicateTask => 40901,
            ErrorCode::AsrQuotaExceeded => 40910,
            ErrorCode::AllAsrQuotasExhausted => 40911,
            ErrorCode::InternalError => 50000,
            ErrorCode::DatabaseError => 50001,
            ErrorCode::AsrServiceFailed => 51001,
            ErrorCode::LlmServiceFailed => 51101,
            ErrorCode::StorageServiceFailed => 51201,
        }
    }
}

/// The uniform response body: business errors still ride on HTTP 200.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: i64,
    pub message: String,
    pub data: Option<T>,
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

/// Per-request context every handler starts from: caller identity,
/// negotiated locale, and the trace id the middleware assigned.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: UserId,
    pub locale: Locale,
    pub trace_id: String,
}

impl RequestContext {
    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        Json(Envelope {
            code: 0,
            message: i18n::message(ErrorCode::Success, self.locale).to_string(),
            data: Some(data),
            trace_id: self.trace_id.clone(),
        })
        .into_response()
    }

    pub fn error(&self, code: ErrorCode) -> Response {
        self.error_with_detail(code, None)
    }

    pub fn error_with_detail(&self, code: ErrorCode, detail: Option<&str>) -> Response {
        let base = i18n::message(code, self.locale);
        let message = match detail {
            Some(detail) => format!("{}: {}", base, detail),
            None => base.to_string(),
        };
        Json(Envelope::<serde_json::Value> {
            code: code.value(),
            message,
            data: None,
            trace_id: self.trace_id.clone(),
        })
        .into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_accept_language(
            parts
                .headers
                .get(axum::http::header::ACCEPT_LANGUAGE)
                .and_then(|value| value.to_str().ok()),
        );
        let trace_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(UserId::from_uuid)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self {
            user_id,
            locale,
            trace_id,
        })
    }
}
