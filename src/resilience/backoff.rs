//! Rate-limit backoff: how long to wait before retrying a 429.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

static TRY_AGAIN_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)try again in\s+(\d+(?:\.\d+)?)\s*(ms|s)\b").unwrap());

/// Retry policy for rate-limited responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Base for exponential backoff when the backend gives no hint.
    pub base_delay_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 1_000,
            min_delay_ms: 250,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay_bounds(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_delay_ms = min_ms;
        self.max_delay_ms = max_ms.max(min_ms);
        self
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Priority: `Retry-After` header, then a "try again in N s|ms" hint in the
    /// body, then `base * 2^attempt`. The result is clamped to the policy bounds.
    pub fn delay_for(&self, attempt: u32, headers: &HeaderMap, body: &str) -> Duration {
        let hinted = retry_after_header_ms(headers).or_else(|| body_hint_ms(body));
        Duration::from_millis(self.clamp(hinted.unwrap_or_else(|| self.exponential_ms(attempt))))
    }

    fn exponential_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.base_delay_ms.saturating_mul(factor)
    }

    fn clamp(&self, ms: u64) -> u64 {
        ms.clamp(self.min_delay_ms, self.max_delay_ms)
    }
}

/// `Retry-After` in seconds (fractional allowed). HTTP-date values are ignored.
pub fn retry_after_header_ms(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = raw.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

/// "Please try again in 1.5s" / "try again in 300ms" style hints.
pub fn body_hint_ms(body: &str) -> Option<u64> {
    let caps = TRY_AGAIN_IN.captures(body)?;
    let value: f64 = caps[1].parse().ok()?;
    let ms = if caps[2].eq_ignore_ascii_case("ms") {
        value
    } else {
        value * 1000.0
    };
    Some(ms.round() as u64)
}
