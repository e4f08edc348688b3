//! Fixed-window request limiting, keyed by caller-chosen strings
//! (typically `"{operation}:{user_id}"`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 30 searches a minute per user.
        Self::new(30, 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// How long until the window resets; meaningful when denied.
    pub retry_after: Duration,
}

struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Per-key fixed-window counter. Windows are tracked lazily: a key's window
/// restarts on the first check after it has elapsed.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let window_len = chrono::Duration::seconds(self.config.window_seconds as i64);
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        let window = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= window_len {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.config.max_requests {
            let reset_at = window.started_at + window_len;
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after: (reset_at - now).to_std().unwrap_or(Duration::ZERO),
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: self.config.max_requests - window.count,
            retry_after: Duration::ZERO,
        }
    }
}
