//! Request executor against live local HTTP servers: 429 retry, timeout,
//! cancellation, error classification

use ai_agent_providers::resilience::RetryPolicy;
use ai_agent_providers::transport::{CallOptions, RequestExecutor, REQUEST_ID_HEADER};
use ai_agent_providers::Error;
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::integration::mock_server::{
    chat_completion, closed_port_url, scripted_server, silent_server, MockBackend, Scripted,
};

fn fast_executor(key: Option<&str>) -> RequestExecutor {
    RequestExecutor::new("test", key.map(String::from))
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_max_retries(2).with_delay_bounds(1, 50))
}

fn opts() -> CallOptions {
    CallOptions::new(Duration::from_secs(5))
}

#[tokio::test]
async fn retries_after_429_then_succeeds() {
    let (url, hits) = scripted_server(vec![
        Scripted::json(429, json!({"error": {"message": "Rate limit reached"}})).with_header("retry-after", "0"),
        Scripted::json(200, chat_completion(json!({"role": "assistant", "content": "ok"}))),
    ])
    .await;

    let body = fast_executor(None)
        .execute(&format!("{}/chat/completions", url), &json!({"model": "m"}), &opts())
        .await
        .unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn body_hint_drives_backoff() {
    let (url, hits) = scripted_server(vec![
        Scripted::json(
            429,
            json!({"error": {"message": "Please try again in 20ms."}}),
        ),
        Scripted::json(200, json!({"ok": true})),
    ])
    .await;

    let started = Instant::now();
    let executor = RequestExecutor::new("test", None)
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_delay_bounds(1, 10_000));
    executor
        .execute(&url, &json!({}), &opts())
        .await
        .unwrap();
    // The hint, not the 1s exponential base, decided the wait.
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_budget_is_rate_limit_exceeded() {
    let mut backend = MockBackend::new().await;
    let mock = backend
        .server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"error":{"message":"slow down"}}"#)
        .expect(3)
        .create_async()
        .await;

    let err = fast_executor(None)
        .execute(&format!("{}/chat/completions", backend.url()), &json!({}), &opts())
        .await
        .unwrap_err();
    match err {
        Error::RateLimitExceeded {
            attempts,
            retry_after_ms,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(retry_after_ms, Some(0));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn timeout_reports_configured_bound() {
    let url = silent_server().await;
    let err = fast_executor(None)
        .execute(&url, &json!({}), &CallOptions::new(Duration::from_millis(150)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestTimeout { timeout_ms: 150 }));
    assert_eq!(err.code(), "REQUEST_TIMEOUT");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() {
    let url = silent_server().await;
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = fast_executor(None)
        .execute(
            &url,
            &json!({}),
            &CallOptions::new(Duration::from_secs(30)).with_cancel(Some(token)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn sends_bearer_and_request_id() {
    let mut backend = MockBackend::new().await;
    let mock = backend
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header(REQUEST_ID_HEADER, Matcher::Regex("^[0-9a-f-]{36}$".into()))
        .match_body(Matcher::PartialJson(json!({"model": "glm-4.6"})))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let body = fast_executor(Some("sk-test"))
        .execute(
            &format!("{}/chat/completions", backend.url()),
            &json!({"model": "glm-4.6", "messages": []}),
            &opts(),
        )
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    mock.assert_async().await;
}

#[tokio::test]
async fn http_error_carries_descriptor() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            500,
            json!({"error": {"message": "upstream exploded", "type": "server_error", "code": 1234}}),
            1,
        )
        .await;

    let err = fast_executor(None)
        .execute(&format!("{}/chat/completions", backend.url()), &json!({}), &opts())
        .await
        .unwrap_err();
    match &err {
        Error::ProviderHttp {
            status,
            message,
            descriptor,
        } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "upstream exploded");
            let d = descriptor.as_ref().expect("descriptor");
            assert_eq!(d.code.as_deref(), Some("1234"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), "PROVIDER_HTTP_ERROR");
}

#[tokio::test]
async fn tool_use_failed_is_promoted() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            400,
            json!({"error": {"message": "bad call", "code": "tool_use_failed", "failed_generation": "hello"}}),
            1,
        )
        .await;

    let err = fast_executor(None)
        .execute(&format!("{}/chat/completions", backend.url()), &json!({}), &opts())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ToolUseFailed { status: 400, failed_generation: Some(ref g), .. } if g == "hello"
    ));
}

#[tokio::test]
async fn non_json_success_is_invalid_response() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let err = fast_executor(None)
        .execute(&format!("{}/chat/completions", backend.url()), &json!({}), &opts())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResponse { .. }));
}

#[tokio::test]
async fn probe_reports_reachability() {
    let mut backend = MockBackend::new().await;
    let _mock = backend.mock_probe("/models", 200, 1).await;
    let executor = fast_executor(None);
    let short = CallOptions::new(Duration::from_secs(2));

    assert!(executor.probe(&format!("{}/models", backend.url()), &short).await);
    assert!(!executor.probe(&format!("{}/models", closed_port_url()), &short).await);
}
