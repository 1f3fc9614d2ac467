use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::application::services::ProgressEvent;
use crate::presentation::state::AppState;

use super::envelope::RequestContext;
use super::tasks::load_owned_task;

/// SSE progress stream: current snapshot first, then live events in
/// publish order. The stream ends when the task reaches a terminal state
/// and the broadcaster drops the topic.
pub async fn stream_progress_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(task_id): Path<String>,
) -> Response {
    let task = match load_owned_task(&state, &ctx, &task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };

    let (snapshot, receiver) = state.progress.subscribe(task.id);
    let trace_id = ctx.trace_id.clone();

    let initial = futures::stream::iter(snapshot.into_iter());
    let live = BroadcastStream::new(receiver).filter_map(|result| async move { result.ok() });
    let stream = initial.chain(live).map(move |event| sse_event(event, &trace_id));

    sse_response(stream).into_response()
}

fn sse_event(event: ProgressEvent, trace_id: &str) -> Result<Event, Infallible> {
    let envelope = serde_json::json!({
        "code": 0,
        "message": "ok",
        "data": event,
        "traceId": trace_id,
    });
    Ok(Event::default().data(envelope.to_string()))
}

fn sse_response<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
