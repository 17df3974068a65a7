//! Fixed-window request admission.
//!
//! A window opens on the first hit for a key and lasts `window_ms`. Hits
//! inside it increment the count; the first hit after it has elapsed opens a
//! new window with count 1. A hit is admitted while the count is within
//! `max_requests`. Rejected hits still count.
//!
//! Accuracy is best effort: under races at a window boundary a few hits may
//! land in either window.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};

/// What requests are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKey {
    ClientIp,
    /// One counter for every request the process sees.
    Global,
}

pub const GLOBAL_KEY: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    pub max_requests: u32,
    pub window_ms: i64,
}

impl FixedWindow {
    pub fn new(max_requests: u32, window_secs: i64) -> Self {
        Self {
            max_requests,
            window_ms: window_secs * 1000,
        }
    }

    fn admits(&self, count: u32) -> bool {
        count <= self.max_requests
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new(60, 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Hits in the current window, this one included.
    pub count: u32,
}

impl Admission {
    /// `Err(RateLimited)` when the hit was over the limit.
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::RateLimited)
        }
    }
}

pub trait RateLimiter: Send + Sync {
    /// Record a hit for `key` at `now_ms` and decide whether to admit it.
    fn hit(&self, key: &str, now_ms: i64) -> Result<Admission>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_ms: i64,
    count: u32,
}

/// Per-process counters. Suitable for a single instance.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    policy: FixedWindow,
    windows: Mutex<HashMap<String, Window>>,
}

/// Above this many tracked keys, lapsed windows are dropped on the next hit.
const PURGE_THRESHOLD: usize = 10_000;

impl InMemoryRateLimiter {
    pub fn new(policy: FixedWindow) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn hit(&self, key: &str, now_ms: i64) -> Result<Admission> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| AppError::Internal("rate limiter lock poisoned".into()))?;

        if windows.len() > PURGE_THRESHOLD {
            let window_ms = self.policy.window_ms;
            windows.retain(|_, w| now_ms - w.start_ms <= window_ms);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            start_ms: now_ms,
            count: 0,
        });
        if now_ms - window.start_ms > self.policy.window_ms {
            window.start_ms = now_ms;
            window.count = 1;
        } else {
            window.count = window.count.saturating_add(1);
        }

        Ok(Admission {
            allowed: self.policy.admits(window.count),
            count: window.count,
        })
    }
}

/// Counters in the shared database, for several instances behind one store.
#[derive(Clone)]
pub struct SqliteRateLimiter {
    policy: FixedWindow,
    db: DbPool,
}

impl SqliteRateLimiter {
    pub fn new(policy: FixedWindow, db: DbPool) -> Self {
        Self { policy, db }
    }
}

impl RateLimiter for SqliteRateLimiter {
    fn hit(&self, key: &str, now_ms: i64) -> Result<Admission> {
        let conn = self.db.get()?;
        let count = queries::rate_limit_hit(&conn, key, now_ms, self.policy.window_ms)?;
        Ok(Admission {
            allowed: self.policy.admits(count),
            count,
        })
    }
}
