//! 类型系统模块：定义代理与模型后端之间交换的核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that crosses the boundary between
//! the agent loop and a chat-completion backend.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`ToolDefinition`] | Tool offered to the model |
//! | [`ToolCall`] | Normalized tool invocation produced by the model |
//! | [`ChatRequest`] | One immutable "send conversation" call |
//! | [`ChatResult`] | Normalized result handed back to the agent loop |
//!
//! ## Example
//!
//! ```rust
//! use ai_agent_providers::types::{ChatOptions, ChatRequest, Message, ToolDefinition};
//!
//! let tool = ToolDefinition::new(
//!     "navigate",
//!     "Open a URL in the current tab",
//!     serde_json::json!({
//!         "type": "object",
//!         "properties": { "url": { "type": "string" } },
//!         "required": ["url"]
//!     }),
//! );
//!
//! let request = ChatRequest::new(
//!     vec![Message::system("You drive a browser."), Message::user("Open example.com")],
//!     vec![tool],
//!     ChatOptions::default().max_tokens(1024),
//! );
//! assert_eq!(request.tool_names(), vec!["navigate"]);
//! ```

pub mod chat;
pub mod message;
pub mod tool;

pub use chat::{ChatOptions, ChatRequest, ChatResult, Usage};
pub use message::{ContentPart, Message, MessageContent, MessageRole};
pub use tool::{ToolCall, ToolChoice, ToolDefinition};
