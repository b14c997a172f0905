//! # ai-agent-providers
//!
//! 自主浏览器代理的模型后端层：可靠地完成一次"发送对话、获取下一步动作"的调用，并把后端返回的任何形式的工具调用归一化为统一、已校验的列表。
//!
//! Provider resilience and tool-call normalization for an autonomous agent
//! loop talking to interchangeable chat-completion backends.
//!
//! ## Overview
//!
//! One logical `chat` call has to survive rate limiting, timeouts and the
//! wrong regional endpoint, and whatever comes back (a clean structured
//! function call, tag-soup imitation of one, or prose describing an action)
//! must become a validated list of tool invocations. This crate owns both
//! halves:
//!
//! - **Resilience**: bounded 429 retry with `Retry-After`-aware backoff,
//!   per-call timeout and cancellation, sticky failover between regional hosts.
//! - **Normalization**: canonical parse, free-text fallback extraction,
//!   merge/repair, validation, and recovery of `tool_use_failed` rejections.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ai_agent_providers::config::store::FileConfigStore;
//! use ai_agent_providers::{ChatOptions, ChatRequest, Message, ProviderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> ai_agent_providers::Result<()> {
//!     let store = Arc::new(FileConfigStore::new("providers.json"));
//!     let registry = ProviderRegistry::new(Some(store));
//!     registry.load().await;
//!     registry.set_primary("zhipu").await?;
//!
//!     let request = ChatRequest::new(
//!         vec![Message::user("Open example.com")],
//!         vec![],
//!         ChatOptions::default(),
//!     );
//!     let result = registry.chat(&request).await?;
//!     if let Some(call) = result.next_action() {
//!         println!("{} {:?}", call.name, call.arguments);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Messages, tools, requests and results |
//! | [`config`] | Backend profiles, provider configuration, credentials, config store |
//! | [`transport`] | HTTP request executor (timeout, 429 retry, cancellation) |
//! | [`resilience`] | Backoff policy and sticky host failover |
//! | [`drivers`] | Per-backend request/response dialects |
//! | [`toolcalls`] | Tool-call parse, extract, merge, validate, recover |
//! | [`provider`] | The per-backend adapter tying everything together |
//! | [`registry`] | Primary selection, status cache, persistence |
//! | [`telemetry`] | Throttled warning logger |

pub mod config;
pub mod drivers;
pub mod error_code;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod telemetry;
pub mod toolcalls;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::{BackendKind, ProviderConfig, ProvidersConfig};
pub use provider::{ChatProvider, ProviderAdapter};
pub use registry::{ProviderRegistry, ProviderStatus};
pub use telemetry::ThrottledLogger;
pub use types::{
    chat::{ChatOptions, ChatRequest, ChatResult, Usage},
    message::{Message, MessageRole},
    tool::{ToolCall, ToolDefinition},
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
