//! 传输层模块：带超时、取消与限流重试的 HTTP 请求执行器。
//!
//! # Transport Module
//!
//! [`RequestExecutor`] issues one chat-completion call for a backend:
//!
//! - bearer-token auth when an API key is configured, plus a per-request
//!   correlation id header;
//! - a timeout on every HTTP exchange, surfaced as `RequestTimeout`;
//! - cancellation through a `CancellationToken`, which also interrupts
//!   backoff sleeps;
//! - up to four retries on HTTP 429 (see [`crate::resilience::backoff`]);
//! - non-success statuses mapped to `ProviderHttp` / `ToolUseFailed`.

pub mod executor;

pub use executor::{CallOptions, RequestExecutor, REQUEST_ID_HEADER};
