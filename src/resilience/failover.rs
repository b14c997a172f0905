//! Sticky host failover for backends with more than one regional endpoint.

use arc_swap::ArcSwapOption;
use std::future::Future;
use std::sync::Arc;

use crate::{Error, Result};

/// Whether an error from the current host justifies one attempt on an alternate.
///
/// Rate limits and tool-use rejections are answers from a healthy host, so
/// they are never failed over. Timeouts, network failures and other HTTP
/// errors are.
pub fn should_failover(err: &Error) -> bool {
    match err {
        Error::ToolUseFailed { .. } | Error::RateLimitExceeded { .. } => false,
        Error::RequestTimeout { .. }
        | Error::Transport(_)
        | Error::ProviderHttp { .. }
        | Error::InvalidResponse { .. } => true,
        _ => false,
    }
}

/// Ordered set of interchangeable base URLs with a sticky preference.
///
/// After a successful call on an alternate host, that host becomes the
/// preferred one for every later call. The preference never reverts on its own.
#[derive(Debug)]
pub struct HostFailover {
    hosts: Vec<String>,
    preferred: ArcSwapOption<String>,
}

impl HostFailover {
    pub fn new(primary: impl Into<String>, alternates: impl IntoIterator<Item = String>) -> Self {
        let mut hosts = vec![normalize(&primary.into())];
        for alt in alternates {
            let alt = normalize(&alt);
            if !alt.is_empty() && !hosts.contains(&alt) {
                hosts.push(alt);
            }
        }
        Self {
            hosts,
            preferred: ArcSwapOption::const_empty(),
        }
    }

    /// Base URL to use for the next call.
    pub fn current(&self) -> String {
        self.preferred
            .load_full()
            .map(|p| p.as_ref().clone())
            .unwrap_or_else(|| self.hosts[0].clone())
    }

    pub fn preferred(&self) -> Option<String> {
        self.preferred.load_full().map(|p| p.as_ref().clone())
    }

    /// Next configured host after `current`, wrapping around.
    pub fn alternate_host(&self, current: &str) -> Option<String> {
        let current = normalize(current);
        let start = self.hosts.iter().position(|h| *h == current).unwrap_or(0);
        (1..self.hosts.len())
            .map(|offset| &self.hosts[(start + offset) % self.hosts.len()])
            .find(|h| **h != current)
            .cloned()
    }

    pub fn prefer(&self, host: &str) {
        self.preferred.store(Some(Arc::new(normalize(host))));
    }

    /// Run `op` against the current host, then once against the alternate if
    /// the first error qualifies.
    ///
    /// When both fail, the alternate's error is returned only if it carries an
    /// HTTP status and the original does not.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let current = self.current();
        let err = match op(current.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !should_failover(&err) {
            return Err(err);
        }
        let Some(alternate) = self.alternate_host(&current) else {
            return Err(err);
        };

        tracing::warn!(
            from = current.as_str(),
            to = alternate.as_str(),
            error = %err,
            "failing over to alternate host"
        );
        match op(alternate.clone()).await {
            Ok(value) => {
                self.prefer(&alternate);
                tracing::info!(host = alternate.as_str(), "alternate host is now preferred");
                Ok(value)
            }
            Err(alt_err) => {
                if alt_err.status().is_some() && err.status().is_none() {
                    Err(alt_err)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
