//! Ollama native chat API (`/api/chat`).

use serde_json::{json, Map, Value};

use super::{join_reasoning, prepare_messages, split_think_blocks, DriverResponse, ProviderDriver, RequestParams};
use crate::config::BackendKind;
use crate::error::Error;
use crate::types::chat::{ChatRequest, Usage};
use crate::types::message::{ContentPart, Message, MessageContent, MessageRole};
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaDriver;

impl ProviderDriver for OllamaDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn chat_path(&self) -> &'static str {
        "/api/chat"
    }

    fn probe_path(&self) -> &'static str {
        "/api/tags"
    }

    fn build_request(&self, request: &ChatRequest, params: &RequestParams<'_>) -> Result<Value> {
        let messages: Vec<Value> = prepare_messages(request, params.vision)
            .iter()
            .map(encode_message)
            .collect();

        let opts = &request.options;
        let sampling = params.sampling;
        let mut options = Map::new();
        let fields = [
            ("temperature", opts.temperature.or(sampling.temperature).map(|v| json!(v))),
            ("top_p", opts.top_p.or(sampling.top_p).map(|v| json!(v))),
            ("top_k", opts.top_k.or(sampling.top_k).map(|v| json!(v))),
            ("num_predict", opts.max_tokens.or(sampling.max_tokens).map(|v| json!(v))),
            ("repeat_penalty", opts.repeat_penalty.or(sampling.repeat_penalty).map(|v| json!(v))),
            ("presence_penalty", opts.presence_penalty.or(sampling.presence_penalty).map(|v| json!(v))),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                options.insert(key.into(), v);
            }
        }

        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "stream": false,
        });
        if !options.is_empty() {
            body["options"] = Value::Object(options);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(|t| t.to_openai_spec()).collect());
        }
        if opts.disable_thinking {
            body["think"] = Value::Bool(false);
        }
        Ok(body)
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse> {
        if let Some(err) = body.get("error").and_then(Value::as_str) {
            return Err(Error::invalid_response(format!("ollama error: {}", err)));
        }
        let Some(message) = body.get("message").filter(|m| m.is_object()).cloned() else {
            return Err(Error::invalid_response("response has no message"));
        };

        let raw_content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (content, inline) = split_think_blocks(raw_content);
        let thinking = message
            .get("thinking")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let prompt = body["prompt_eval_count"].as_u64().unwrap_or(0);
        let completion = body["eval_count"].as_u64().unwrap_or(0);

        Ok(DriverResponse {
            content,
            reasoning: join_reasoning(thinking, inline),
            message,
            usage: Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            },
            finish_reason: body
                .get("done_reason")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }
}

/// Ollama message: plain-text content, base64 images in a separate array,
/// tool-call arguments as objects.
fn encode_message(message: &Message) -> Value {
    let mut images = Vec::new();
    let content = match &message.content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Parts(parts) => {
            let mut texts = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text { text } => texts.push(text.clone()),
                    ContentPart::Image { url } => match ContentPart::split_data_url(url) {
                        Some((_, data)) => images.push(Value::String(data.to_string())),
                        None => texts.push(format!("[image: {}]", url)),
                    },
                }
            }
            texts.join("\n")
        }
    };

    let mut obj = json!({ "role": message.role.as_str(), "content": content });
    if !images.is_empty() {
        obj["images"] = Value::Array(images);
    }
    if message.role == MessageRole::Tool {
        if let Some(id) = &message.tool_call_id {
            obj["tool_call_id"] = Value::String(id.clone());
        }
    }
    if !message.tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "function": {
                            "name": c.name,
                            "arguments": Value::Object(c.arguments.clone()),
                        }
                    })
                })
                .collect(),
        );
    }
    obj
}
