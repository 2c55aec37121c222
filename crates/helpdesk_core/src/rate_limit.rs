//! Per (chat, user) message rate limiting.
//!
//! Each key owns a window that opens on its first hit and lasts
//! `decay_seconds`. Once `max_messages` hits land inside the window, further
//! attempts fail until the window expires. Expired windows are swept at
//! most once per window length.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{HelpdeskError, HelpdeskResult};
use crate::types::{ChatId, UserId};

/// Longest accepted window, one year.
pub const MAX_DECAY_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Rate limiting settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Messages allowed per window
    pub max_messages: u32,
    /// Window length in seconds, at most [`MAX_DECAY_SECONDS`]
    pub decay_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            decay_seconds: 60,
        }
    }
}

/// Counter key for one sender in one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl RateLimitKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat:{}:user:{}", self.chat_id, self.user_id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: DateTime<Utc>,
    hits: u32,
}

struct Windows {
    entries: HashMap<RateLimitKey, Window>,
    swept_at: DateTime<Utc>,
}

impl Windows {
    fn sweep(&mut self, now: DateTime<Utc>, decay: Duration) {
        if now < self.swept_at + decay {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, window| now < window.opened_at + decay);
        self.swept_at = now;
        tracing::trace!(evicted = before - self.entries.len(), "Swept expired rate limit windows");
    }
}

/// Keyed window counters with atomic check-and-hit.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let swept_at = clock.now();
        Self {
            config,
            clock,
            windows: Mutex::new(Windows {
                entries: HashMap::new(),
                swept_at,
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn decay_seconds(&self) -> u64 {
        self.config.decay_seconds.min(MAX_DECAY_SECONDS)
    }

    fn decay(&self) -> Duration {
        // bounded above, the cast cannot wrap
        Duration::seconds(self.decay_seconds() as i64)
    }

    /// Fail when the key is over its limit, otherwise record one hit.
    pub fn check_and_hit(&self, key: RateLimitKey) -> HelpdeskResult<()> {
        let now = self.clock.now();
        let decay = self.decay();
        let mut windows = self.windows.lock();
        windows.sweep(now, decay);

        let window = windows.entries.entry(key).or_insert(Window {
            opened_at: now,
            hits: 0,
        });
        if now >= window.opened_at + decay {
            *window = Window {
                opened_at: now,
                hits: 0,
            };
        }

        if window.hits >= self.config.max_messages {
            let left = (window.opened_at + decay) - now;
            let retry_after_secs = ceil_seconds(left).clamp(1, self.decay_seconds().max(1));
            tracing::debug!(%key, retry_after_secs, "Rate limit exceeded");
            return Err(HelpdeskError::RateLimited { retry_after_secs });
        }

        window.hits += 1;
        Ok(())
    }

    /// Attempts left in the current window.
    pub fn remaining(&self, key: RateLimitKey) -> u32 {
        let now = self.clock.now();
        let windows = self.windows.lock();
        match windows.entries.get(&key) {
            Some(window) if now < window.opened_at + self.decay() => {
                self.config.max_messages.saturating_sub(window.hits)
            }
            _ => self.config.max_messages,
        }
    }

    /// Forget the counter for a key.
    pub fn clear(&self, key: RateLimitKey) {
        self.windows.lock().entries.remove(&key);
    }

    /// Keys currently holding a window, expired ones not yet swept included.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().entries.len()
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
