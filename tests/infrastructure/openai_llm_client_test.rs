use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use echoscribe::application::ports::{ChatMessage, LlmClient, LlmError, LlmParams};
use echoscribe::infrastructure::llm::OpenAiChatClient;

async fn start_mock_server(
    response_status: u16,
    response_body: &'static str,
) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new().route(
        "/chat/completions",
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

fn client(base_url: String) -> OpenAiChatClient {
    OpenAiChatClient::new("test-key".to_string(), Some(base_url), "gpt-4o-mini".to_string(), 0.6)
}

#[tokio::test]
async fn given_chat_completion_response_when_chatting_then_first_choice_content_returned() {
    let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hello there"}}]}"#;
    let (base_url, shutdown_tx) = start_mock_server(200, body).await;

    let result = client(base_url)
        .chat(
            &[ChatMessage::system("be brief"), ChatMessage::user("hi")],
            &LlmParams::default(),
        )
        .await;

    assert_eq!(result.unwrap(), "hello there");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_empty_choices_when_chatting_then_invalid_response_error() {
    let (base_url, shutdown_tx) = start_mock_server(200, r#"{"choices": []}"#).await;

    let result = client(base_url)
        .chat(&[ChatMessage::user("hi")], &LlmParams::default())
        .await;

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_rate_limit_status_when_chatting_then_rate_limited_error() {
    let (base_url, shutdown_tx) = start_mock_server(429, "slow down").await;

    let result = client(base_url)
        .chat(&[ChatMessage::user("hi")], &LlmParams::default())
        .await;

    assert!(matches!(result, Err(LlmError::RateLimited)));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_generate_call_when_invoked_then_system_message_precedes_prompt() {
    let body = r#"{"choices": [{"message": {"role": "assistant", "content": "done"}}]}"#;
    let (base_url, shutdown_tx) = start_mock_server(200, body).await;

    let result = client(base_url)
        .generate("summarize this", Some("you are terse"), &LlmParams::default())
        .await;

    assert_eq!(result.unwrap(), "done");
    shutdown_tx.send(()).ok();
}

#[test]
fn given_pricing_when_estimating_cost_then_proportional_to_token_total() {
    let client = OpenAiChatClient::new("k".to_string(), None, "gpt-4o-mini".to_string(), 0.6);

    let cost = client.estimate_cost(500_000, 500_000);

    assert!((cost - 0.6).abs() < 1e-9);
    assert_eq!(client.model_name(), "gpt-4o-mini");
}
