/*!
 * Integration tests for the OpenAI-compatible client against a local server
 */

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::json;

use linebatch::app_config::TranslationConfig;
use linebatch::errors::ProviderError;
use linebatch::providers::openai::OpenAICompatible;
use linebatch::providers::{ChatRequest, CompletionContext, Provider};
use linebatch::translation::concurrency::RateLimiter;
use linebatch::translation::core::{build_prompt, BatchStatus, TranslationClient, STREAM_FINISHED};
use linebatch::translation::CancellationFlag;
use crate::common::mock_server::{MockResponse, MockServer};

fn config_for(server: &MockServer, stream: bool) -> TranslationConfig {
    TranslationConfig {
        base_url: server.base_url.clone(),
        api_key: "test-key".to_string(),
        stream,
        delay: 0.0,
        ..TranslationConfig::default()
    }
}

fn client_for(config: TranslationConfig) -> (TranslationClient, CancellationFlag) {
    let flag = CancellationFlag::new();
    let provider = Arc::new(OpenAICompatible::from_config(&config));
    let client = TranslationClient::new(provider, Arc::new(config), Arc::new(RateLimiter::new()), flag.clone());
    (client, flag)
}

fn batch(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// Whole JSON responses are reconciled and the request body is well formed
#[tokio::test]
async fn test_non_streamed_request_should_post_expected_body() -> Result<()> {
    let server = MockServer::start(MockResponse::completion("1:::Xin chao\n2:::The gioi")).await;
    let (client, _) = client_for(config_for(&server, false));

    let outcome = client.translate_batch(&batch(&["1:::Hello", "2:::World"]), &|_| {}).await;

    assert_eq!(outcome.status, BatchStatus::Translated);
    assert_eq!(outcome.lines, vec!["1:::Xin chao", "2:::The gioi"]);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.head.starts_with("POST /v1/chat/completions "));
    assert_eq!(request.header("authorization").as_deref(), Some("Bearer test-key"));

    let body = request.json();
    assert_eq!(body["model"], json!("mistral-large-latest"));
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["max_tokens"], json!(4096));
    assert_eq!(body["messages"][0]["role"], json!("system"));
    assert_eq!(
        body["messages"][1]["content"],
        json!("1:::Hello\n2:::World\n\nREMINDER: Format 'ID:::TranslatedText'.")
    );
    assert!(body.get("top_k").is_none());
    Ok(())
}

/// Positive top-k values are sent
#[tokio::test]
async fn test_request_with_positive_top_k_should_send_it() {
    let server = MockServer::start(MockResponse::completion("1:::x")).await;
    let mut config = config_for(&server, false);
    config.top_k = 25;
    let (client, _) = client_for(config);

    client.translate_batch(&batch(&["1:::a"]), &|_| {}).await;

    assert_eq!(server.requests()[0].json()["top_k"], json!(25));
}

/// Streamed deltas are forwarded and assembled, even when frames are cut
#[tokio::test]
async fn test_streamed_request_should_assemble_split_frames() {
    crate::common::init_test_logging();
    let response = MockResponse::stream(&["1:::Xin ", "chào\n2:::Thế ", "giới"]).split_every(9);
    let server = MockServer::start(response).await;
    let (client, _) = client_for(config_for(&server, true));
    let messages = Mutex::new(Vec::new());
    let log = |m: &str| messages.lock().push(m.to_string());

    let outcome = client.translate_batch(&batch(&["1:::Hello", "2:::World"]), &log).await;

    assert_eq!(outcome.status, BatchStatus::Translated);
    assert_eq!(outcome.lines, vec!["1:::Xin chào", "2:::Thế giới"]);
    assert_eq!(server.requests()[0].json()["stream"], json!(true));

    let messages = messages.lock();
    assert_eq!(messages.last().map(String::as_str), Some(STREAM_FINISHED));
    assert_eq!(messages[..messages.len() - 1].concat(), "1:::Xin chào\n2:::Thế giới");
}

/// Error statuses leave the batch unchanged and report the body
#[tokio::test]
async fn test_error_status_should_fail_batch_and_report_body() {
    let server = MockServer::start(MockResponse::error(429, r#"{"message":"Too many requests"}"#)).await;
    let (client, _) = client_for(config_for(&server, false));
    let messages = Mutex::new(Vec::new());
    let log = |m: &str| messages.lock().push(m.to_string());

    let outcome = client.translate_batch(&batch(&["1:::Hello", "plain"]), &log).await;

    assert_eq!(outcome.status, BatchStatus::Failed);
    assert_eq!(outcome.lines, vec!["1:::Hello", "plain"]);
    assert_eq!(
        messages.lock().as_slice(),
        ["API Error 429: {\"message\":\"Too many requests\"}".to_string()]
    );
}

/// The provider itself returns a typed API error
#[tokio::test]
async fn test_provider_with_error_status_should_return_api_error() {
    let server = MockServer::start(MockResponse::error(401, "unauthorized")).await;
    let provider = OpenAICompatible::from_config(&config_for(&server, false));
    let flag = CancellationFlag::new();
    let context = CompletionContext { cancellation: &flag, on_delta: &|_| {} };

    let result = provider.complete(&ChatRequest::new("m").add_message("user", "x"), context).await;

    match result {
        Err(ProviderError::ApiError { status_code, message }) => {
            assert_eq!(status_code, 401);
            assert_eq!(message, "unauthorized");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

/// A body that is not a completion is a parse error, and the batch fails
#[tokio::test]
async fn test_non_json_success_body_should_fail_batch() {
    let mut response = MockResponse::completion("unused");
    response.chunks = vec![b"<html>oops</html>".to_vec()];
    let server = MockServer::start(response).await;
    let (client, _) = client_for(config_for(&server, false));
    let messages = Mutex::new(Vec::new());
    let log = |m: &str| messages.lock().push(m.to_string());

    let outcome = client.translate_batch(&batch(&["1:::Hello"]), &log).await;

    assert_eq!(outcome.status, BatchStatus::Failed);
    assert!(messages.lock()[0].starts_with("Exception: "));
}

/// Nothing listening is a connection error, reported as a failed batch
#[tokio::test]
async fn test_unreachable_server_should_fail_batch() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let config = TranslationConfig {
        base_url: format!("http://{}/v1", addr),
        stream: false,
        delay: 0.0,
        ..TranslationConfig::default()
    };
    let provider = OpenAICompatible::from_config(&config);
    let flag = CancellationFlag::new();
    let context = CompletionContext { cancellation: &flag, on_delta: &|_| {} };

    let result = provider.complete(&ChatRequest::from_config(&config, build_prompt(&["1:::a"])), context).await;
    assert!(matches!(result, Err(ProviderError::ConnectionError(_))));

    let (client, _) = client_for(config);
    let outcome = client.translate_batch(&batch(&["1:::a"]), &|_| {}).await;
    assert_eq!(outcome.status, BatchStatus::Failed);
    assert_eq!(outcome.lines, vec!["1:::a"]);
    Ok(())
}

/// Cancelling mid-stream stops reading and discards the partial answer
#[tokio::test]
async fn test_cancel_during_stream_should_interrupt_and_write_nothing() {
    let server = MockServer::start(MockResponse::stream(&["1:::A\n", "2:::B\n", "3:::C"])).await;
    let (client, flag) = client_for(config_for(&server, true));
    let deltas = Mutex::new(Vec::new());
    let log = |m: &str| {
        deltas.lock().push(m.to_string());
        flag.cancel();
    };

    let outcome = client.translate_batch(&batch(&["1:::a", "2:::b", "3:::c"]), &log).await;

    assert_eq!(outcome.status, BatchStatus::Cancelled);
    assert_eq!(outcome.lines, vec!["1:::a", "2:::b", "3:::c"]);
    assert_eq!(deltas.lock().as_slice(), ["1:::A\n".to_string()]);
}
