//! Fetch providers: the three interchangeable ways to retrieve a source.
//!
//! Every provider implements [`FetchProvider`]. The orchestrator picks one
//! per attempt from a [`ProviderSet`] according to the attempt's
//! [`Strategy`]. Providers never retry internally.

pub mod api;
pub mod page;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::apis::ApiRegistry;
use crate::config::EngineConfig;
use crate::error::{FetchError, SearchError};
use crate::http;
use crate::types::{SearchQuery, SourceDescriptor, Strategy};

pub use api::ApiProvider;
pub use page::{search_url, PageFetcher, PageMode};

/// Raw material handed to the extraction engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON document from an official API, parsed by the endpoint
    /// registered for `source_id`.
    Structured {
        /// Source whose parser should read `body`.
        source_id: String,
        /// The decoded response.
        body: serde_json::Value,
    },
    /// A fetched HTML page.
    Html {
        /// Raw markup.
        body: String,
        /// Base for resolving relative links.
        base_url: String,
        /// Whether the aggressive extraction pass may run.
        aggressive: bool,
    },
}

/// One way of retrieving a source for a query.
///
/// Implementations must honour `timeout` and must not retry; retry and
/// escalation belong to the orchestrator.
#[async_trait]
pub trait FetchProvider: Send + Sync {
    /// Retrieve `source` for `query`.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] describing why this attempt failed.
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<Payload, FetchError>;
}

/// The provider used for each strategy.
#[derive(Clone)]
pub struct ProviderSet {
    /// Official API calls.
    pub api: Arc<dyn FetchProvider>,
    /// Plain page fetch.
    pub proxy: Arc<dyn FetchProvider>,
    /// Advanced page fetch; may be replaced by a browser-automation backend.
    pub advanced: Arc<dyn FetchProvider>,
}

impl ProviderSet {
    /// Network-backed providers built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if an HTTP client cannot be built.
    pub fn http(config: &EngineConfig, apis: Arc<ApiRegistry>) -> Result<Self, SearchError> {
        let client = http::build_client()?;
        Ok(Self {
            api: Arc::new(ApiProvider::new(
                client.clone(),
                apis,
                config.max_results_per_source,
                config.user_agent.clone(),
            )),
            proxy: Arc::new(PageFetcher::new(client.clone(), PageMode::Standard, config)),
            advanced: Arc::new(PageFetcher::new(client, PageMode::Advanced, config)),
        })
    }

    /// The provider for `strategy`.
    pub fn for_strategy(&self, strategy: Strategy) -> &Arc<dyn FetchProvider> {
        match strategy {
            Strategy::Api => &self.api,
            Strategy::Proxy => &self.proxy,
            Strategy::AdvancedProxy => &self.advanced,
        }
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet").finish_non_exhaustive()
    }
}
