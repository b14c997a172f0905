//! OpenAI chat-completions dialect, shared by every OpenAI-compatible backend.

use serde_json::{json, Map, Value};

use super::{join_reasoning, prepare_messages, split_think_blocks, DriverResponse, ProviderDriver, RequestParams};
use crate::config::BackendKind;
use crate::error::Error;
use crate::types::chat::{ChatRequest, Usage};
use crate::types::message::{ContentPart, Message, MessageContent, MessageRole};
use crate::types::tool::ToolChoice;
use crate::Result;

/// Optional sampling fields a backend accepts beyond the OpenAI core set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingSupport {
    pub top_k: bool,
    /// Wire name of the repetition control, when supported.
    pub repeat_penalty: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct OpenAiDriver {
    kind: BackendKind,
}

impl OpenAiDriver {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    fn sampling_support(&self) -> SamplingSupport {
        match self.kind {
            BackendKind::OpenRouter => SamplingSupport {
                top_k: true,
                repeat_penalty: Some("repetition_penalty"),
            },
            // Groq rejects both; OpenAI, DeepSeek and Moonshot ignore or reject them.
            _ => SamplingSupport::default(),
        }
    }
}

impl ProviderDriver for OpenAiDriver {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        match self.kind {
            BackendKind::OpenRouter => vec![
                ("HTTP-Referer".into(), "https://github.com/ai-agent-providers".into()),
                ("X-Title".into(), "ai-agent-providers".into()),
            ],
            _ => Vec::new(),
        }
    }

    fn build_request(&self, request: &ChatRequest, params: &RequestParams<'_>) -> Result<Value> {
        let mut body = build_chat_body(request, params, self.sampling_support());
        if self.kind == BackendKind::OpenRouter && request.options.disable_thinking {
            body["reasoning"] = json!({ "enabled": false });
        }
        Ok(body)
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse> {
        parse_chat_response(body)
    }
}

/// Encode one message as an OpenAI `messages[]` entry.
pub fn encode_message(message: &Message) -> Value {
    let content = match &message.content {
        MessageContent::Text(s) => Value::String(s.clone()),
        MessageContent::Parts(parts) => Value::Array(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { url } => {
                        json!({ "type": "image_url", "image_url": { "url": url } })
                    }
                })
                .collect(),
        ),
    };

    let mut obj = json!({ "role": message.role.as_str(), "content": content });
    if message.role == MessageRole::Tool {
        if let Some(id) = &message.tool_call_id {
            obj["tool_call_id"] = Value::String(id.clone());
        }
    }
    if !message.tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(message.tool_calls.iter().map(|c| c.to_openai_spec()).collect());
    }
    obj
}

/// Build an OpenAI chat-completions body. Request options override the
/// provider's sampling defaults.
pub fn build_chat_body(request: &ChatRequest, params: &RequestParams<'_>, support: SamplingSupport) -> Value {
    let messages: Vec<Value> = prepare_messages(request, params.vision)
        .iter()
        .map(encode_message)
        .collect();

    let mut body = Map::new();
    body.insert("model".into(), Value::String(params.model.to_string()));
    body.insert("messages".into(), Value::Array(messages));
    body.insert("stream".into(), Value::Bool(false));

    let opts = &request.options;
    let sampling = params.sampling;
    if let Some(v) = opts.max_tokens.or(sampling.max_tokens) {
        body.insert("max_tokens".into(), json!(v));
    }
    if let Some(v) = opts.temperature.or(sampling.temperature) {
        body.insert("temperature".into(), json!(v));
    }
    if let Some(v) = opts.top_p.or(sampling.top_p) {
        body.insert("top_p".into(), json!(v));
    }
    if let Some(v) = opts.presence_penalty.or(sampling.presence_penalty) {
        body.insert("presence_penalty".into(), json!(v));
    }
    if support.top_k {
        if let Some(v) = opts.top_k.or(sampling.top_k) {
            body.insert("top_k".into(), json!(v));
        }
    }
    if let Some(field) = support.repeat_penalty {
        if let Some(v) = opts.repeat_penalty.or(sampling.repeat_penalty) {
            body.insert(field.into(), json!(v));
        }
    }

    if !request.tools.is_empty() {
        body.insert(
            "tools".into(),
            Value::Array(request.tools.iter().map(|t| t.to_openai_spec()).collect()),
        );
        let choice = opts.tool_choice.clone().unwrap_or(ToolChoice::Auto);
        body.insert("tool_choice".into(), choice.to_openai_spec());
    }

    Value::Object(body)
}

/// Text of an OpenAI `content` field, which may be a string or a parts array.
pub fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

/// Reasoning side channel under any of the field names backends use.
pub fn reasoning_field(message: &Value) -> Option<String> {
    ["reasoning_content", "reasoning", "thinking"]
        .iter()
        .find_map(|k| message.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse an OpenAI chat-completions response body.
pub fn parse_chat_response(body: &Value) -> Result<DriverResponse> {
    let Some(choice) = body.pointer("/choices/0") else {
        // Some gateways answer 200 with an error object.
        if let Some(err) = body.get("error").filter(|e| e.is_object()) {
            let status = err
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok())
                .filter(|c| (400..600).contains(c))
                .unwrap_or(502);
            return Err(Error::from_http_response(status, &body.to_string()));
        }
        return Err(Error::invalid_response("response has no choices"));
    };
    let message = choice.get("message").cloned().unwrap_or_else(|| json!({}));

    let raw_content = content_text(message.get("content"));
    let (content, inline) = split_think_blocks(&raw_content);
    let reasoning = join_reasoning(reasoning_field(&message), inline);

    Ok(DriverResponse {
        content,
        reasoning,
        message,
        usage: Usage::from_openai(body.get("usage")),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(String::from),
    })
}
