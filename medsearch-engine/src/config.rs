//! Engine configuration with sensible defaults.
//!
//! [`EngineConfig`] controls fan-out, timeouts, caching, retry behaviour,
//! per-source rate limits, and how HTML sources are addressed. Every field
//! has a default, so a partial TOML table deserializes cleanly.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::retry::RetryConfig;

/// Configuration for the search orchestrator and its providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Source tasks allowed in flight at once.
    pub max_concurrency: usize,
    /// Results kept per source after extraction.
    pub max_results_per_source: usize,
    /// How long successful result sets are cached. 0 disables caching.
    pub cache_ttl_seconds: u64,
    /// Maximum cached (source, query) entries.
    pub cache_capacity: u64,
    /// Timeout for the standard page fetch.
    pub standard_timeout_seconds: u64,
    /// Timeout for the advanced page fetch.
    pub advanced_timeout_seconds: u64,
    /// Timeout for each official API request.
    pub api_timeout_seconds: u64,
    /// Backoff for every source task.
    pub retry: RetryConfig,
    /// Calls per minute by source id. Unlisted sources are unlimited.
    pub rate_limits: HashMap<String, u32>,
    /// Sources that refuse automated access; answered with a placeholder.
    pub unsupported_sources: Vec<String>,
    /// Search page URL by source id, with a `{query}` placeholder.
    pub search_url_templates: HashMap<String, String>,
    /// `Cookie` header value by source id, sent by the advanced fetch.
    pub cookies: HashMap<String, String>,
    /// Override the rotating User-Agent pool with a fixed string.
    pub user_agent: Option<String>,
    /// Override an official API's base URL by source id.
    pub api_base_urls: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_results_per_source: 10,
            cache_ttl_seconds: 3_600,
            cache_capacity: 1_024,
            standard_timeout_seconds: 15,
            advanced_timeout_seconds: 30,
            api_timeout_seconds: 20,
            retry: RetryConfig::default(),
            rate_limits: default_rate_limits(),
            unsupported_sources: ["embase", "uptodate", "drugbank", "micromedex"]
                .into_iter()
                .map(String::from)
                .collect(),
            search_url_templates: HashMap::new(),
            cookies: HashMap::new(),
            user_agent: None,
            api_base_urls: HashMap::new(),
        }
    }
}

fn default_rate_limits() -> HashMap<String, u32> {
    [
        ("pubmed", 10),
        ("fda-drugs", 40),
        ("ema-medicines", 20),
        ("mhra", 15),
        ("tga", 8),
        ("tga-cmi", 8),
        ("chembl", 15),
        ("rxnav", 20),
        ("drugbank", 30),
    ]
    .into_iter()
    .map(|(id, limit)| (id.to_owned(), limit))
    .collect()
}

impl EngineConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_concurrency` and `max_results_per_source` must be greater than 0
    /// - every timeout must be greater than 0
    /// - `retry.backoff_factor` must be at least 1
    /// - `retry.jitter_factor` must lie in `[0, 1]`
    /// - `retry.initial_delay_ms` must be <= `retry.max_delay_ms`
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_concurrency == 0 {
            return Err(SearchError::Config(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if self.max_results_per_source == 0 {
            return Err(SearchError::Config(
                "max_results_per_source must be greater than 0".into(),
            ));
        }
        for (name, value) in [
            ("standard_timeout_seconds", self.standard_timeout_seconds),
            ("advanced_timeout_seconds", self.advanced_timeout_seconds),
            ("api_timeout_seconds", self.api_timeout_seconds),
        ] {
            if value == 0 {
                return Err(SearchError::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.retry.backoff_factor.is_nan() || self.retry.backoff_factor < 1.0 {
            return Err(SearchError::Config(
                "retry.backoff_factor must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(SearchError::Config(
                "retry.jitter_factor must be between 0 and 1".into(),
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(SearchError::Config(
                "retry.initial_delay_ms must be <= retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Whether `source_id` is answered with an "unsupported" placeholder.
    pub fn is_unsupported(&self, source_id: &str) -> bool {
        self.unsupported_sources.iter().any(|s| s == source_id)
    }

    /// Standard fetch timeout.
    pub fn standard_timeout(&self) -> Duration {
        Duration::from_secs(self.standard_timeout_seconds)
    }

    /// Advanced fetch timeout.
    pub fn advanced_timeout(&self) -> Duration {
        Duration::from_secs(self.advanced_timeout_seconds)
    }

    /// API request timeout.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }
}
