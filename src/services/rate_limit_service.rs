//! Fixed-window rate limiting
//!
//! A hit increments the counter of (subject, action); the first hit of a
//! window starts its expiry. Over the limit the caller gets
//! [`AppError::TooManyRequests`] through [`RateLimitInfo::check`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};

/// Rate limit information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the window resets
    pub reset: u64,
    pub allowed: bool,
}

impl RateLimitInfo {
    /// Turn a denied hit into `TooManyRequests`
    pub fn check(self) -> AppResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(AppError::TooManyRequests {
                retry_after: self.reset.max(1),
            })
        }
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one hit of `action` by `subject`
    async fn hit(
        &self,
        subject: &str,
        action: &str,
        window_secs: u64,
        max: u64,
    ) -> AppResult<RateLimitInfo>;
}

fn validate_trigger(subject: &str, action: &str, window_secs: u64, max: u64) -> AppResult<()> {
    if subject.is_empty() || action.is_empty() {
        return Err(AppError::Validation(
            "Rate limit subject and action must not be empty".to_string(),
        ));
    }
    if window_secs == 0 || max == 0 {
        return Err(AppError::Validation(
            "Rate limit window and maximum must be positive".to_string(),
        ));
    }
    Ok(())
}

fn rate_key(subject: &str, action: &str) -> String {
    format!("rl:{}:{}", action, subject)
}

/// Redis counter per key, `INCR` and `EXPIRE NX` in one transaction
#[derive(Clone)]
pub struct RedisRateLimiter {
    redis: ConnectionManager,
}

impl RedisRateLimiter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(
        &self,
        subject: &str,
        action: &str,
        window_secs: u64,
        max: u64,
    ) -> AppResult<RateLimitInfo> {
        validate_trigger(subject, action, window_secs, max)?;
        let key = rate_key(subject, action);
        let mut conn = self.redis.clone();

        let (count, _, ttl): (u64, i64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(window_secs)
            .arg("NX")
            .cmd("TTL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        Ok(RateLimitInfo {
            limit: max,
            remaining: max.saturating_sub(count),
            reset: ttl.max(0) as u64,
            allowed: count <= max,
        })
    }
}

struct Window {
    started: Instant,
    length: Duration,
    count: u64,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Process-local limiter, used in tests and single-node setups
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn hit(
        &self,
        subject: &str,
        action: &str,
        window_secs: u64,
        max: u64,
    ) -> AppResult<RateLimitInfo> {
        validate_trigger(subject, action, window_secs, max)?;
        let window = Duration::from_secs(window_secs);
        let now = Instant::now();

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, w| !w.expired(now));
        let entry = windows
            .entry(rate_key(subject, action))
            .or_insert(Window {
                started: now,
                length: window,
                count: 0,
            });
        entry.count += 1;

        // whole seconds, rounded up
        let left = window.saturating_sub(now.duration_since(entry.started));
        let reset = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        Ok(RateLimitInfo {
            limit: max,
            remaining: max.saturating_sub(entry.count),
            reset,
            allowed: entry.count <= max,
        })
    }
}
