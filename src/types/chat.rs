//! Request and result types for one `chat` call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::message::Message;
use super::tool::{ToolCall, ToolChoice, ToolDefinition};

/// Per-call options recognized by every adapter. Options a backend does not
/// support are ignored by that backend's driver.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub repeat_penalty: Option<f64>,
    pub tool_choice: Option<ToolChoice>,
    pub disable_thinking: bool,
    /// Overrides the provider's configured request timeout for this call.
    pub timeout: Option<Duration>,
    /// Cancelling this token aborts the in-flight HTTP call and any backoff sleep.
    pub cancel: Option<CancellationToken>,
}

impl ChatOptions {
    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn repeat_penalty(mut self, penalty: f64) -> Self {
        self.repeat_penalty = Some(penalty);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn disable_thinking(mut self, disable: bool) -> Self {
        self.disable_thinking = disable;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One "send conversation, get next action" call. Immutable once built.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>, options: ChatOptions) -> Self {
        Self {
            messages,
            tools,
            options,
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(Message::contains_image)
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Read an OpenAI-style `usage` object.
    pub fn from_openai(usage: Option<&Value>) -> Self {
        let Some(u) = usage else {
            return Self::default();
        };
        let prompt = u["prompt_tokens"].as_u64().unwrap_or(0);
        let completion = u["completion_tokens"].as_u64().unwrap_or(0);
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: u["total_tokens"].as_u64().unwrap_or(prompt + completion),
        }
    }
}

/// Normalized result handed back to the agent loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatResult {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub thinking: Option<String>,
    pub usage: Usage,
    /// Opaque backend response body.
    pub raw: Value,
}

impl ChatResult {
    /// The designated next step: the first tool call, if any.
    pub fn next_action(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }
}
