use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use echoscribe::application::ports::{AsrEngine, AsrError, AsrRequest};
use echoscribe::infrastructure::asr::DeepgramEngine;

async fn start_mock_server(
    response_status: u16,
    response_body: &'static str,
) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new().route(
        "/v1/listen",
        post(move || async move {
            let status = axum::http::StatusCode::from_u16(response_status).unwrap();
            (status, response_body).into_response()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (base_url, shutdown_tx)
}

#[tokio::test]
async fn given_diarized_utterances_when_transcribing_then_speaker_tags_and_words_mapped() {
    let body = r#"{
        "metadata": {"duration": 20.0},
        "results": {
            "utterances": [
                {"start": 0.0, "end": 8.0, "transcript": "good morning everyone",
                 "confidence": 0.97, "speaker": 0,
                 "words": [{"word": "good", "start": 0.0, "end": 0.4, "confidence": 0.99}]},
                {"start": 8.5, "end": 20.0, "transcript": "let us begin",
                 "confidence": 0.91, "speaker": 1, "words": []}
            ],
            "channels": []
        }
    }"#;
    let (base_url, shutdown_tx) = start_mock_server(200, body).await;

    let engine = DeepgramEngine::new("test-key".to_string(), Some(base_url), None);
    let request = AsrRequest {
        enable_speaker_diarization: true,
        ..AsrRequest::default()
    };
    let result = engine.transcribe("https://bucket/audio.wav", &request).await.unwrap();

    assert_eq!(result.segments.len(), 2);
    assert_eq!(result.segments[0].speaker_id.as_deref(), Some("spk_0"));
    assert_eq!(result.segments[1].speaker_id.as_deref(), Some("spk_1"));
    assert_eq!(result.duration_seconds, 20.0);

    let words = result.segments[0].words.as_ref().unwrap();
    assert_eq!(words[0].word, "good");
    // Second utterance had no words; consumers must tolerate None.
    assert!(result.segments[1].words.is_none());
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_channel_alternatives_only_when_transcribing_then_single_segment_fallback() {
    let body = r#"{
        "metadata": {"duration": 6.0},
        "results": {
            "channels": [
                {"alternatives": [
                    {"transcript": "a plain transcript", "confidence": 0.88,
                     "words": [{"word": "plain", "start": 0.5, "end": 1.0, "confidence": 0.9},
                               {"word": "transcript", "start": 1.0, "end": 6.0, "confidence": 0.9}]}
                ]}
            ]
        }
    }"#;
    let (base_url, shutdown_tx) = start_mock_server(200, body).await;

    let engine = DeepgramEngine::new("test-key".to_string(), Some(base_url), None);
    let result = engine
        .transcribe("https://bucket/audio.wav", &AsrRequest::default())
        .await
        .unwrap();

    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].content, "a plain transcript");
    assert_eq!(result.segments[0].end_time, 6.0);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_payment_required_status_when_transcribing_then_quota_exceeded() {
    let (base_url, shutdown_tx) = start_mock_server(402, "credit exhausted").await;

    let engine = DeepgramEngine::new("test-key".to_string(), Some(base_url), None);
    let result = engine
        .transcribe("https://bucket/audio.wav", &AsrRequest::default())
        .await;

    assert!(matches!(result, Err(AsrError::QuotaExceeded(_))));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_server_error_when_transcribing_then_transient_unavailable() {
    let (base_url, shutdown_tx) = start_mock_server(503, "maintenance").await;

    let engine = DeepgramEngine::new("test-key".to_string(), Some(base_url), None);
    let result = engine
        .transcribe("https://bucket/audio.wav", &AsrRequest::default())
        .await;

    match result {
        Err(error) => assert!(error.is_transient()),
        Ok(_) => panic!("expected error"),
    }
    shutdown_tx.send(()).ok();
}
