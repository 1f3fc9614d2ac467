use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LENGTH: usize = 64;

/// Trace id carried through the request extensions; the same value ends
/// up in the response envelope's `traceId` field.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Accept a caller-supplied id when it is sane, otherwise mint one.
fn incoming_request_id(request: &Request) -> Option<String> {
    let raw = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?;
    if raw.is_empty() || raw.len() > MAX_REQUEST_ID_LENGTH {
        return None;
    }
    raw.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| raw.to_string())
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id =
        incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        trace_id = %request_id,
        method = %request.method(),
        uri = %request.uri().path()
    );
    let _guard = span.enter();

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
