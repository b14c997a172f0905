//! End-to-end normalization: backend dialect in, validated tool calls out

use ai_agent_providers::config::BackendKind;
use ai_agent_providers::types::{ChatOptions, ChatRequest, ContentPart, Message, MessageContent, MessageRole};
use ai_agent_providers::{ChatProvider, Error};
use serde_json::json;

use crate::integration::mock_server::{
    adapter, browser_tools, chat_completion, config_for, tool_use_failed_body, MockBackend,
};

fn agent_request() -> ChatRequest {
    ChatRequest::new(
        vec![
            Message::system("You control a browser. Reply with exactly one tool call."),
            Message::user("Summarize what is visible."),
        ],
        browser_tools(),
        ChatOptions::default().max_tokens(512),
    )
}

#[tokio::test]
async fn empty_structured_call_repaired_from_reasoning() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            200,
            chat_completion(json!({
                "role": "assistant",
                "content": "",
                "reasoning_content": "I should read the visible part first.\n<arg_key>scope</arg_key><arg_value>viewport</arg_value>",
                "tool_calls": [{
                    "id": "call_7",
                    "type": "function",
                    "function": {"name": "read_page", "arguments": "{}"}
                }]
            })),
            1,
        )
        .await;

    let zhipu = adapter("zhipu", config_for(BackendKind::Zhipu, &backend.url()), Some("sk"));
    let result = zhipu.chat(&agent_request()).await.unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    let call = result.next_action().unwrap();
    assert_eq!(call.id, "call_7");
    assert_eq!(call.name, "read_page");
    assert_eq!(call.arguments.len(), 1);
    assert_eq!(call.arguments["scope"], "viewport");
    assert!(call.parse_error.is_none());
    assert_eq!(result.usage.total_tokens, 49);
    assert!(result.thinking.unwrap().contains("read the visible part"));
}

#[tokio::test]
async fn tag_soup_content_becomes_a_call() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            200,
            chat_completion(json!({
                "role": "assistant",
                "content": "<tool_call>navigate\n<arg_key>url</arg_key>\n<arg_value>https://example.com/pricing</arg_value>\n</tool_call>"
            })),
            1,
        )
        .await;

    let zhipu = adapter("zhipu", config_for(BackendKind::Zhipu, &backend.url()), Some("sk"));
    let result = zhipu.chat(&agent_request()).await.unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "navigate");
    assert_eq!(result.tool_calls[0].arguments["url"], "https://example.com/pricing");
    assert!(result.tool_calls[0].id.starts_with("fallback_"));
}

#[tokio::test]
async fn complete_structured_calls_pass_through() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            200,
            chat_completion(json!({
                "role": "assistant",
                "content": "<arg_key>url</arg_key><arg_value>https://wrong.example</arg_value>",
                "tool_calls": [
                    {"id": "a", "function": {"name": "navigate", "arguments": "{\"url\":\"https://right.example\"}"}},
                    {"id": "a", "function": {"name": "computer", "arguments": {"action": "screenshot"}}},
                    {"id": "b", "function": {"name": "rm -rf", "arguments": "{}"}}
                ]
            })),
            1,
        )
        .await;

    let openai = adapter("openai", config_for(BackendKind::OpenAi, &backend.url()), Some("sk"));
    let result = openai.chat(&agent_request()).await.unwrap();

    let names: Vec<_> = result.tool_calls.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["navigate", "computer"]);
    assert_eq!(result.tool_calls[0].arguments["url"], "https://right.example");
    assert_eq!(result.tool_calls[0].id, "a");
    assert_eq!(result.tool_calls[1].id, "a_2");
}

#[tokio::test]
async fn ollama_native_dialect() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json_matching(
            "/api/chat",
            r#""think":false"#,
            json!({
                "model": "qwen2.5:7b",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "find", "arguments": {"query": "search box"}}}]
                },
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 30,
                "eval_count": 12
            }),
        )
        .await;

    let ollama = adapter("ollama", config_for(BackendKind::Ollama, &backend.url()), None);
    let request = ChatRequest::new(
        vec![Message::user("Find the search box")],
        browser_tools(),
        ChatOptions::default().disable_thinking(true),
    );
    let result = ollama.chat(&request).await.unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "find");
    assert_eq!(result.tool_calls[0].arguments["query"], "search box");
    assert_eq!(result.usage.total_tokens, 42);
}

#[tokio::test]
async fn images_replaced_when_vision_is_off() {
    let mut backend = MockBackend::new().await;
    let mock = backend
        .mock_json_matching(
            "/chat/completions",
            "image omitted",
            chat_completion(json!({"role": "assistant", "content": "I cannot see images."})),
        )
        .await;

    let deepseek = adapter("deepseek", config_for(BackendKind::DeepSeek, &backend.url()), Some("sk"));
    let request = ChatRequest::new(
        vec![Message::with_content(
            MessageRole::User,
            MessageContent::parts(vec![
                ContentPart::text("What is on screen?"),
                ContentPart::image_base64("iVBORw0KGgo=", "image/png"),
            ]),
        )],
        vec![],
        ChatOptions::default(),
    );
    let result = deepseek.chat(&request).await.unwrap();
    assert_eq!(result.text, "I cannot see images.");
    assert!(result.tool_calls.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn failed_generation_text_becomes_answer() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            400,
            tool_use_failed_body("The cheapest plan is 9 USD per month."),
            1,
        )
        .await;

    let groq = adapter("groq", config_for(BackendKind::Groq, &backend.url()), Some("gsk"));
    let result = groq.chat(&agent_request()).await.unwrap();
    assert_eq!(result.text, "The cheapest plan is 9 USD per month.");
    assert!(result.tool_calls.is_empty());
}

#[tokio::test]
async fn error_object_in_success_body() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            200,
            json!({"error": {"message": "context length exceeded", "code": 413}}),
            1,
        )
        .await;

    let openrouter = adapter(
        "openrouter",
        config_for(BackendKind::OpenRouter, &backend.url()),
        Some("sk-or"),
    );
    let err = openrouter.chat(&agent_request()).await.unwrap_err();
    assert!(matches!(err, Error::ProviderHttp { status: 413, .. }));
}

#[tokio::test]
async fn tool_use_failed_in_success_body_is_recovered() {
    let mut backend = MockBackend::new().await;
    let mock = backend
        .mock_json(
            "/chat/completions",
            200,
            tool_use_failed_body(r##"[{"name":"click","parameters":{"target":"#submit"}}]"##),
            1,
        )
        .await;

    let openrouter = adapter(
        "openrouter",
        config_for(BackendKind::OpenRouter, &backend.url()),
        Some("sk-or"),
    );
    let result = openrouter.chat(&agent_request()).await.unwrap();
    assert!(result.text.is_empty());
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "click");
    assert_eq!(result.tool_calls[0].arguments["target"], "#submit");
    mock.assert_async().await;
}

#[tokio::test]
async fn plain_answer_has_no_calls() {
    let mut backend = MockBackend::new().await;
    let _mock = backend
        .mock_json(
            "/chat/completions",
            200,
            chat_completion(json!({"role": "assistant", "content": "<think>easy</think>The page lists three plans."})),
            1,
        )
        .await;

    let lmstudio = adapter("lmstudio", config_for(BackendKind::LmStudio, &backend.url()), None);
    let result = lmstudio.chat(&agent_request()).await.unwrap();
    assert_eq!(result.text, "The page lists three plans.");
    assert_eq!(result.thinking.as_deref(), Some("easy"));
    assert!(result.tool_calls.is_empty());
}
