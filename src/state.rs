//! Application state management
//!
//! This module contains the shared application state that is passed
//! to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::{
    config::Config,
    db::{MemoryStore, ProblemStore},
    events::EventBus,
    services::{
        judge_queue::JudgeQueue,
        rate_limit_service::{MemoryRateLimiter, RateLimiter},
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Problems, records and counters
    store: Arc<dyn ProblemStore>,

    /// In-process publish/subscribe
    bus: EventBus,

    /// Fixed-window limiter for pretests and the API middleware
    limiter: Arc<dyn RateLimiter>,

    /// Outbound judge tasks
    judge: Arc<dyn JudgeQueue>,

    /// Application configuration
    config: Config,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        store: Arc<dyn ProblemStore>,
        limiter: Arc<dyn RateLimiter>,
        judge: Arc<dyn JudgeQueue>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                bus: EventBus::new(),
                limiter,
                judge,
                config,
            }),
        }
    }

    /// State backed by in-memory store and limiter
    pub fn in_memory(judge: Arc<dyn JudgeQueue>, config: Config) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRateLimiter::new()),
            judge,
            config,
        )
    }

    pub fn store(&self) -> &dyn ProblemStore {
        self.inner.store.as_ref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn limiter(&self) -> &dyn RateLimiter {
        self.inner.limiter.as_ref()
    }

    pub fn judge(&self) -> &dyn JudgeQueue {
        self.inner.judge.as_ref()
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
