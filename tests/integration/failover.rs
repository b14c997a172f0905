//! Sticky host failover through the provider adapter

use ai_agent_providers::config::BackendKind;
use ai_agent_providers::types::{ChatOptions, ChatRequest, Message};
use ai_agent_providers::{ChatProvider, Error};
use serde_json::json;

use crate::integration::mock_server::{
    adapter, browser_tools, chat_completion, closed_port_url, config_for, tool_use_failed_body,
    MockBackend,
};

fn request() -> ChatRequest {
    ChatRequest::new(
        vec![Message::user("Open the pricing page")],
        vec![],
        ChatOptions::default(),
    )
}

fn answer() -> serde_json::Value {
    chat_completion(json!({"role": "assistant", "content": "Done."}))
}

#[tokio::test]
async fn alternate_host_becomes_sticky() {
    let mut primary = MockBackend::new().await;
    let mut alternate = MockBackend::new().await;
    let primary_mock = primary
        .mock_json("/chat/completions", 502, json!({"error": {"message": "bad gateway"}}), 1)
        .await;
    let alternate_mock = alternate.mock_json("/chat/completions", 200, answer(), 2).await;

    let config = config_for(BackendKind::Zhipu, &primary.url())
        .with_alternate_base_urls(vec![alternate.url()]);
    let zhipu = adapter("zhipu", config, Some("sk-zhipu"));

    let first = zhipu.chat(&request()).await.unwrap();
    assert_eq!(first.text, "Done.");
    assert_eq!(zhipu.preferred_base_url(), Some(alternate.url()));

    // The primary is not attempted again.
    let second = zhipu.chat(&request()).await.unwrap();
    assert_eq!(second.text, "Done.");
    assert_eq!(zhipu.current_base_url(), alternate.url());

    primary_mock.assert_async().await;
    alternate_mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_primary_fails_over() {
    let mut alternate = MockBackend::new().await;
    let _mock = alternate.mock_json("/chat/completions", 200, answer(), 1).await;

    let config = config_for(BackendKind::Moonshot, &closed_port_url())
        .with_alternate_base_urls(vec![alternate.url()]);
    let moonshot = adapter("moonshot", config, Some("sk-moon"));

    let result = moonshot.chat(&request()).await.unwrap();
    assert_eq!(result.text, "Done.");
    assert_eq!(moonshot.preferred_base_url(), Some(alternate.url()));
}

#[tokio::test]
async fn tool_use_failed_stays_on_host_and_recovers() {
    let mut primary = MockBackend::new().await;
    let mut alternate = MockBackend::new().await;
    let _primary = primary
        .mock_json(
            "/chat/completions",
            400,
            tool_use_failed_body(r##"[{"name":"click","parameters":{"target":"#submit"}}]"##),
            1,
        )
        .await;
    let alternate_mock = alternate.mock_json("/chat/completions", 200, answer(), 0).await;

    let config = config_for(BackendKind::Groq, &primary.url())
        .with_alternate_base_urls(vec![alternate.url()]);
    let groq = adapter("groq", config, Some("gsk-test"));
    let request = ChatRequest::new(
        vec![Message::user("Submit the form")],
        browser_tools(),
        ChatOptions::default(),
    );

    let result = groq.chat(&request).await.unwrap();
    assert!(result.text.is_empty());
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "click");
    assert_eq!(result.tool_calls[0].arguments["target"], "#submit");
    assert_eq!(groq.preferred_base_url(), None);
    alternate_mock.assert_async().await;
}

#[tokio::test]
async fn rate_limit_does_not_fail_over() {
    let mut primary = MockBackend::new().await;
    let mut alternate = MockBackend::new().await;
    let _primary = primary
        .server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body("{}")
        .create_async()
        .await;
    let alternate_mock = alternate.mock_json("/chat/completions", 200, answer(), 0).await;

    let config = config_for(BackendKind::Zhipu, &primary.url())
        .with_alternate_base_urls(vec![alternate.url()]);
    let zhipu = adapter("zhipu", config, Some("sk-zhipu"));

    let err = zhipu.chat(&request()).await.unwrap_err();
    assert!(matches!(err, Error::RateLimitExceeded { attempts: 5, .. }));
    alternate_mock.assert_async().await;
}

#[tokio::test]
async fn both_hosts_down_prefers_error_with_status() {
    let mut alternate = MockBackend::new().await;
    let _mock = alternate
        .mock_json("/chat/completions", 503, json!({"error": {"message": "overloaded"}}), 1)
        .await;

    let config = config_for(BackendKind::Zhipu, &closed_port_url())
        .with_alternate_base_urls(vec![alternate.url()]);
    let zhipu = adapter("zhipu", config, Some("sk-zhipu"));

    let err = zhipu.chat(&request()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(zhipu.preferred_base_url(), None);
}
