//! Per-source health tracking for adaptive strategy selection.
//!
//! Records consecutive failures per source and picks the fetch strategy for
//! the next attempt. Unlike a circuit breaker, an unhealthy source is never
//! blocked: failures only bias the choice toward the advanced fetch.
//!
//! # Strategy policy
//!
//! ```text
//! API configured and not degraded ──► Api
//! consecutive failures ≥ 2 ─────────► AdvancedProxy
//! otherwise ────────────────────────► Proxy
//! ```
//!
//! Any success resets the source to fully healthy.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::types::Strategy;

/// Health data for a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    /// False once the failure streak reaches the unavailability threshold.
    /// Informational only.
    pub available: bool,
    /// Failed attempts since the last success.
    pub consecutive_failures: u32,
    /// When the last outcome was recorded.
    pub last_checked_at: Option<Instant>,
    /// The source has an official API configuration.
    pub api_preferred: bool,
    /// API attempts have been failing; fall back to page fetches.
    pub api_degraded: bool,
    /// Failed API attempts since the last success.
    pub api_failures: u32,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            available: true,
            consecutive_failures: 0,
            last_checked_at: None,
            api_preferred: false,
            api_degraded: false,
            api_failures: 0,
        }
    }
}

/// Thresholds for health transitions.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Failure streak that switches page fetches to the advanced strategy.
    pub advanced_after: u32,
    /// Failure streak that marks a source unavailable.
    pub unavailable_after: u32,
    /// Failed API attempts that mark the API degraded.
    pub api_degraded_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            advanced_after: 2,
            unavailable_after: 3,
            api_degraded_after: 2,
        }
    }
}

/// Process-wide health table, one entry per source id.
#[derive(Debug, Default)]
pub struct HealthTracker {
    config: HealthConfig,
    sources: Mutex<HashMap<String, SourceHealth>>,
}

impl HealthTracker {
    /// Create a tracker with the given thresholds.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Mark `source_id` as having an official API.
    pub fn register_api(&self, source_id: &str) {
        let mut sources = self.lock();
        sources.entry(source_id.to_owned()).or_default().api_preferred = true;
    }

    /// Record the outcome of one attempt made with `strategy`.
    pub fn record_outcome(&self, source_id: &str, strategy: Strategy, success: bool) {
        let mut sources = self.lock();
        let health = sources.entry(source_id.to_owned()).or_default();
        health.last_checked_at = Some(Instant::now());

        if success {
            health.available = true;
            health.consecutive_failures = 0;
            health.api_failures = 0;
            health.api_degraded = false;
            return;
        }

        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        if strategy == Strategy::Api {
            health.api_failures = health.api_failures.saturating_add(1);
            if health.api_failures >= self.config.api_degraded_after {
                health.api_degraded = true;
            }
        }
        if health.consecutive_failures >= self.config.unavailable_after && health.available {
            health.available = false;
            tracing::warn!(
                source = source_id,
                failures = health.consecutive_failures,
                "source marked unavailable"
            );
        }
    }

    /// Strategy for the next attempt against `source_id`.
    pub fn best_strategy(&self, source_id: &str) -> Strategy {
        let sources = self.lock();
        let Some(health) = sources.get(source_id) else {
            return Strategy::Proxy;
        };
        if health.api_preferred && !health.api_degraded {
            Strategy::Api
        } else if health.consecutive_failures >= self.config.advanced_after {
            Strategy::AdvancedProxy
        } else {
            Strategy::Proxy
        }
    }

    /// Snapshot of one source's health.
    pub fn health(&self, source_id: &str) -> SourceHealth {
        self.lock().get(source_id).cloned().unwrap_or_default()
    }

    /// Snapshot of every tracked source.
    pub fn report(&self) -> Vec<(String, SourceHealth)> {
        self.lock()
            .iter()
            .map(|(id, health)| (id.clone(), health.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SourceHealth>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HealthTracker {
        HealthTracker::new(HealthConfig::default())
    }

    #[test]
    fn unknown_source_uses_proxy() {
        assert_eq!(tracker().best_strategy("nejm"), Strategy::Proxy);
        assert!(tracker().health("nejm").available);
    }

    #[test]
    fn api_source_prefers_api() {
        let t = tracker();
        t.register_api("fda-drugs");
        assert_eq!(t.best_strategy("fda-drugs"), Strategy::Api);
        assert!(t.health("fda-drugs").api_preferred);
    }

    #[test]
    fn two_failures_switch_to_advanced_then_success_restores_proxy() {
        let t = tracker();
        t.record_outcome("tga-cmi", Strategy::Proxy, false);
        assert_eq!(t.best_strategy("tga-cmi"), Strategy::Proxy);
        t.record_outcome("tga-cmi", Strategy::Proxy, false);
        assert_eq!(t.best_strategy("tga-cmi"), Strategy::AdvancedProxy);
        t.record_outcome("tga-cmi", Strategy::AdvancedProxy, true);
        assert_eq!(t.best_strategy("tga-cmi"), Strategy::Proxy);
    }

    #[test]
    fn three_failures_mark_unavailable() {
        let t = tracker();
        for _ in 0..2 {
            t.record_outcome("mhra", Strategy::Proxy, false);
        }
        assert!(t.health("mhra").available);
        t.record_outcome("mhra", Strategy::AdvancedProxy, false);
        let health = t.health("mhra");
        assert!(!health.available);
        assert_eq!(health.consecutive_failures, 3);
    }

    #[test]
    fn success_resets_everything() {
        let t = tracker();
        t.register_api("pubmed");
        for _ in 0..4 {
            t.record_outcome("pubmed", Strategy::Api, false);
        }
        t.record_outcome("pubmed", Strategy::Proxy, true);
        let health = t.health("pubmed");
        assert!(health.available);
        assert_eq!(health.consecutive_failures, 0);
        assert!(!health.api_degraded);
        assert!(health.last_checked_at.is_some());
        assert_eq!(t.best_strategy("pubmed"), Strategy::Api);
    }

    #[test]
    fn failing_api_degrades_to_page_fetch() {
        let t = tracker();
        t.register_api("ema-medicines");
        t.record_outcome("ema-medicines", Strategy::Api, false);
        assert_eq!(t.best_strategy("ema-medicines"), Strategy::Api);
        t.record_outcome("ema-medicines", Strategy::Api, false);
        // Two failures: API degraded and the streak already calls for advanced.
        assert_eq!(t.best_strategy("ema-medicines"), Strategy::AdvancedProxy);
    }

    #[test]
    fn failures_never_decrement() {
        let t = tracker();
        let mut previous = 0;
        for _ in 0..5 {
            t.record_outcome("who", Strategy::Proxy, false);
            let now = t.health("who").consecutive_failures;
            assert!(now > previous);
            previous = now;
        }
    }

    #[test]
    fn sources_are_independent() {
        let t = tracker();
        t.record_outcome("a", Strategy::Proxy, false);
        t.record_outcome("a", Strategy::Proxy, false);
        assert_eq!(t.best_strategy("a"), Strategy::AdvancedProxy);
        assert_eq!(t.best_strategy("b"), Strategy::Proxy);
    }

    #[test]
    fn report_includes_tracked_sources() {
        let t = tracker();
        t.record_outcome("a", Strategy::Proxy, false);
        t.record_outcome("b", Strategy::Proxy, true);
        let report = t.report();
        assert_eq!(report.len(), 2);
        let (_, a) = report.iter().find(|(id, _)| id == "a").expect("a tracked");
        assert_eq!(a.consecutive_failures, 1);
    }
}
