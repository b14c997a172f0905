//! HTTP fixtures for integration tests

use ai_agent_providers::config::{BackendKind, ProviderConfig};
use ai_agent_providers::types::ToolDefinition;
use ai_agent_providers::{ProviderAdapter, ThrottledLogger};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A mockito server standing in for one backend host
pub struct MockBackend {
    pub server: ServerGuard,
}

impl MockBackend {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Mock a JSON response on a POST path, expected `hits` times
    pub async fn mock_json(&mut self, path: &str, status: usize, body: Value, hits: usize) -> Mock {
        self.server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(hits)
            .create_async()
            .await
    }

    /// Mock a JSON response on a POST path whose body matches `pattern`
    pub async fn mock_json_matching(&mut self, path: &str, pattern: &str, body: Value) -> Mock {
        self.server
            .mock("POST", path)
            .match_body(Matcher::Regex(pattern.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Mock the availability probe
    pub async fn mock_probe(&mut self, path: &str, status: usize, hits: usize) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(status)
            .with_body(r#"{"data":[]}"#)
            .expect(hits)
            .create_async()
            .await
    }
}

/// OpenAI-style chat completion body around one assistant message
pub fn chat_completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
    })
}

/// Groq-style `tool_use_failed` rejection
pub fn tool_use_failed_body(failed_generation: &str) -> Value {
    json!({
        "error": {
            "message": "Failed to call a function. Please adjust your prompt.",
            "type": "invalid_request_error",
            "code": "tool_use_failed",
            "failed_generation": failed_generation
        }
    })
}

pub fn browser_tools() -> Vec<ToolDefinition> {
    [
        ("computer", "Mouse and keyboard"),
        ("navigate", "Open a URL"),
        ("read_page", "Read the accessibility tree"),
        ("find", "Find an element"),
        ("done", "Report success"),
        ("fail", "Report failure"),
    ]
    .into_iter()
    .map(|(name, desc)| ToolDefinition::new(name, desc, json!({"type": "object", "properties": {}})))
    .collect()
}

pub fn adapter(name: &str, config: ProviderConfig, key: Option<&str>) -> ProviderAdapter {
    ProviderAdapter::new(
        name,
        config,
        key.map(String::from),
        Arc::new(ThrottledLogger::default()),
    )
    .expect("adapter")
}

/// Config for `kind` pointing at `base_url` with no alternates
pub fn config_for(kind: BackendKind, base_url: &str) -> ProviderConfig {
    ProviderConfig::for_kind(kind)
        .with_base_url(base_url)
        .with_timeout_ms(5_000)
}

/// URL of a local port nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// A server that accepts connections and never answers
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    url
}

/// One scripted HTTP response
#[derive(Clone)]
pub struct Scripted {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Scripted {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// A server answering successive requests with `script` in order, repeating
/// the last entry. Returns the base URL and a request counter.
pub async fn scripted_server(script: Vec<Scripted>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            if read_request(&mut stream).await.is_err() {
                continue;
            }
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let Some(resp) = script.get(n).or_else(|| script.last()) else {
                continue;
            };
            let mut out = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                resp.status,
                resp.body.len()
            );
            for (name, value) in &resp.headers {
                out.push_str(&format!("{}: {}\r\n", name, value));
            }
            out.push_str("\r\n");
            out.push_str(&resp.body);
            let _ = stream.write_all(out.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    (url, hits)
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return Ok(());
            }
        }
    }
}
