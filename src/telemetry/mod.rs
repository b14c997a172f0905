//! 遥测模块：按消息键限频的警告日志。
//!
//! # Telemetry Module
//!
//! [`ThrottledLogger`] keeps repeated warnings (an unreachable local server
//! probed every status refresh, a backend that keeps ignoring tool calls)
//! from flooding the log. It is constructed once and shared through an
//! `Arc` with every collaborator that emits such warnings.
//!
//! State lives only in memory: a process restart, or [`ThrottledLogger::reset`],
//! lets every key log again immediately.
//!
//! ```rust
//! use ai_agent_providers::telemetry::ThrottledLogger;
//! use std::time::Duration;
//!
//! let logger = ThrottledLogger::new(Duration::from_secs(60));
//! assert!(logger.warn("ollama.unreachable", "Ollama is not running"));
//! assert!(!logger.warn("ollama.unreachable", "Ollama is not running"));
//! logger.reset();
//! assert!(logger.warn("ollama.unreachable", "Ollama is not running"));
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Slot {
    last_emitted: Instant,
    suppressed: u64,
}

/// Rate-limited warning logger keyed by message key.
#[derive(Debug)]
pub struct ThrottledLogger {
    window: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for ThrottledLogger {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ThrottledLogger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Record an occurrence of `key`. Returns `Some(suppressed)` when it should
    /// be emitted now, with the number of occurrences swallowed since the last
    /// emission.
    fn admit(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get_mut(key) {
            Some(slot) if now.duration_since(slot.last_emitted) < self.window => {
                slot.suppressed += 1;
                None
            }
            Some(slot) => {
                let suppressed = slot.suppressed;
                slot.last_emitted = now;
                slot.suppressed = 0;
                Some(suppressed)
            }
            None => {
                slots.insert(
                    key.to_string(),
                    Slot {
                        last_emitted: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }

    /// Emit a `warn!` for `key` unless one was emitted within the window.
    /// Returns whether the message was emitted.
    pub fn warn(&self, key: &str, message: &str) -> bool {
        match self.admit(key) {
            Some(0) => {
                tracing::warn!(key, "{}", message);
                true
            }
            Some(suppressed) => {
                tracing::warn!(key, suppressed, "{}", message);
                true
            }
            None => false,
        }
    }

    /// Forget every key.
    pub fn reset(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
