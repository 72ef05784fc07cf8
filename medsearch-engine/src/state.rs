//! Process-wide keyed stores shared by every search.
//!
//! One [`SharedState`] is built per process and handed to the orchestrator.
//! Tests build a fresh one each, so nothing leaks between them.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::health::{HealthConfig, HealthTracker};
use crate::rate_limit::RateLimiter;

/// Rate limiter, result cache, and health table.
#[derive(Debug)]
pub struct SharedState {
    /// Per-source call budget.
    pub rate_limiter: RateLimiter,
    /// Successful result sets by (source, query).
    pub cache: ResultCache,
    /// Failure streaks and strategy preference.
    pub health: HealthTracker,
}

impl SharedState {
    /// Build the stores described by `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config.rate_limits.clone()),
            cache: ResultCache::new(
                Duration::from_secs(config.cache_ttl_seconds),
                config.cache_capacity,
            ),
            health: HealthTracker::new(HealthConfig::default()),
        }
    }

    /// Build the stores and wrap them for sharing.
    pub fn shared(config: &EngineConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }
}
