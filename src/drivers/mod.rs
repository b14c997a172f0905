//! 后端驱动抽象层：把统一的聊天请求翻译为各后端的请求体，并解析其响应。
//!
//! Backend driver layer. Each [`ProviderDriver`] is a thin, stateless mapping
//! between the unified [`ChatRequest`] and one backend's wire dialect:
//!
//! | Driver | Backends | Dialect specifics |
//! |--------|----------|-------------------|
//! | [`OpenAiDriver`] | openai, openrouter, deepseek, groq, moonshot | OpenAI chat completions |
//! | [`ZhipuDriver`] | zhipu | `thinking: {type}` flag, `auto`-only tool choice |
//! | [`LmStudioDriver`] | lmstudio | `<think>` blocks, `chat_template_kwargs` |
//! | [`OllamaDriver`] | ollama | native `/api/chat`, `images` array, object arguments |
//!
//! Transport, retries, failover and tool-call normalization are not a driver
//! concern; see [`crate::provider::ProviderAdapter`].

pub mod lmstudio;
pub mod ollama;
pub mod openai;
pub mod zhipu;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

use crate::config::{BackendKind, SamplingDefaults};
use crate::types::chat::{ChatRequest, Usage};
use crate::types::message::Message;
use crate::Result;

pub use lmstudio::LmStudioDriver;
pub use ollama::OllamaDriver;
pub use openai::OpenAiDriver;
pub use zhipu::ZhipuDriver;

/// Text substituted for image parts when the backend has no vision support.
pub const IMAGE_PLACEHOLDER: &str = "[image omitted: the current model does not support vision]";

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<think>(.*?)</think>").unwrap());

/// Per-call values resolved by the adapter from config and request options.
#[derive(Debug, Clone, Copy)]
pub struct RequestParams<'a> {
    pub model: &'a str,
    pub sampling: &'a SamplingDefaults,
    pub vision: bool,
}

/// A backend response split into the channels the normalization pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct DriverResponse {
    /// Primary text with any inline reasoning blocks removed.
    pub content: String,
    /// Secondary reasoning channel, if the backend produced one.
    pub reasoning: Option<String>,
    /// Assistant message object carrying the structured tool-call field.
    pub message: Value,
    pub usage: Usage,
    pub finish_reason: Option<String>,
}

/// Translation between the unified request/response and one backend dialect.
pub trait ProviderDriver: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Path appended to the base URL for chat calls.
    fn chat_path(&self) -> &'static str {
        "/chat/completions"
    }

    /// Path appended to the base URL for availability probes.
    fn probe_path(&self) -> &'static str {
        "/models"
    }

    /// Static headers sent with every chat call.
    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn build_request(&self, request: &ChatRequest, params: &RequestParams<'_>) -> Result<Value>;

    fn parse_response(&self, body: &Value) -> Result<DriverResponse>;
}

/// Pick the driver for a backend kind.
pub fn create_driver(kind: BackendKind) -> Box<dyn ProviderDriver> {
    match kind {
        BackendKind::OpenAi
        | BackendKind::OpenRouter
        | BackendKind::DeepSeek
        | BackendKind::Groq
        | BackendKind::Moonshot => Box::new(OpenAiDriver::new(kind)),
        BackendKind::Zhipu => Box::new(ZhipuDriver),
        BackendKind::LmStudio => Box::new(LmStudioDriver),
        BackendKind::Ollama => Box::new(OllamaDriver),
    }
}

/// Messages as they will be sent, with images replaced when vision is off.
pub fn prepare_messages(request: &ChatRequest, vision: bool) -> Vec<Message> {
    if vision || !request.has_images() {
        return request.messages.clone();
    }
    tracing::debug!("vision disabled, replacing image parts with placeholders");
    request
        .messages
        .iter()
        .map(|m| m.without_images(IMAGE_PLACEHOLDER))
        .collect()
}

/// Move `<think>...</think>` blocks out of `content`.
///
/// A leading unclosed `<think>` makes the rest reasoning; a `</think>` with no
/// opening tag (chat templates that inject the opener) makes everything before
/// it reasoning.
pub fn split_think_blocks(content: &str) -> (String, Option<String>) {
    let mut thoughts: Vec<String> = THINK_BLOCK
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let mut visible = THINK_BLOCK.replace_all(content, "").to_string();

    let lower = visible.to_ascii_lowercase();
    if let Some(idx) = lower.find("<think>") {
        let tail = visible[idx + "<think>".len()..].trim().to_string();
        if !tail.is_empty() {
            thoughts.push(tail);
        }
        visible.truncate(idx);
    } else if let Some(idx) = lower.find("</think>") {
        let head = visible[..idx].trim().to_string();
        if !head.is_empty() {
            thoughts.push(head);
        }
        visible = visible[idx + "</think>".len()..].to_string();
    }

    let reasoning = if thoughts.is_empty() {
        None
    } else {
        Some(thoughts.join("\n"))
    };
    (visible.trim().to_string(), reasoning)
}

/// Join two optional reasoning channels.
pub fn join_reasoning(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{}\n{}", a, b)),
        (a, b) => a.or(b),
    }
}
