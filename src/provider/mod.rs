//! 提供商适配层：每个后端一个实现统一能力接口的适配器。
//!
//! # Provider Module
//!
//! [`ChatProvider`] is the capability set every backend exposes to the
//! registry: `chat` and `is_available`. [`ProviderAdapter`] is the single
//! implementation; per-backend differences live in its driver
//! ([`crate::drivers`]), and the shared retry, failover and normalization
//! logic lives in the components it composes.
//!
//! ```text
//! ChatRequest ─► driver.build_request ─► HostFailover ─► RequestExecutor ─► HTTP
//!                                                                          │
//! ChatResult ◄─ toolcalls::normalize_tool_calls ◄─ driver.parse_response ◄─┘
//!            ◄─ toolcalls::recover_tool_use_failed ◄─ ToolUseFailed
//! ```

pub mod adapter;

use async_trait::async_trait;

use crate::config::BackendKind;
use crate::types::chat::{ChatRequest, ChatResult};
use crate::Result;

pub use adapter::ProviderAdapter;

/// Capability set of one chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Registry name of this provider.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    fn model(&self) -> &str;

    /// Send one conversation and return the normalized result.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResult>;

    /// Cheap reachability probe. Never fails; unreachable is `false`.
    async fn is_available(&self) -> bool;
}
