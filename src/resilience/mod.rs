//! 弹性模块：限流退避重试与多主机粘性故障转移。
//!
//! # Resilience Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`backoff`] | Delay selection for rate-limited (429) retries |
//! | [`failover`] | Sticky alternate-host failover for multi-region backends |
//!
//! Rate-limit retries happen inside one host attempt; failover wraps the
//! whole attempt. A request therefore sees at most `max_retries + 1` calls
//! per host and at most two hosts.
//!
//! ```rust
//! use ai_agent_providers::resilience::failover::HostFailover;
//!
//! let hosts = HostFailover::new(
//!     "https://api.z.ai/api/paas/v4",
//!     vec!["https://open.bigmodel.cn/api/paas/v4".to_string()],
//! );
//! assert_eq!(
//!     hosts.alternate_host("https://api.z.ai/api/paas/v4").as_deref(),
//!     Some("https://open.bigmodel.cn/api/paas/v4")
//! );
//! ```

pub mod backoff;
pub mod failover;

pub use backoff::RetryPolicy;
pub use failover::{should_failover, HostFailover};
