//! Search orchestrator: per-source tasks, bounded fan-out, progress stream.
//!
//! [`Orchestrator::search`] schedules one task per requested source, at most
//! `max_concurrency` in flight, and returns a [`SearchRun`] that streams a
//! [`SearchProgress`] per settled source. Each task:
//!
//! 1. answers known-unsupported sources with a placeholder
//! 2. serves a warm cache entry without fetching
//! 3. otherwise retries attempts with backoff; each attempt picks the
//!    stronger of the health-preferred strategy and the escalation floor,
//!    passes the rate limiter, fetches, and extracts
//! 4. caches a successful batch, or settles on a `{sourceId}-error`
//!    placeholder when attempts run out
//!
//! One failing source never aborts the others.

mod run;
mod task;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::apis::ApiRegistry;
use crate::config::EngineConfig;
use crate::error::{FetchError, SearchError};
use crate::extract::{Extractor, SiteRegistry};
use crate::fetch::ProviderSet;
use crate::state::SharedState;
use crate::types::{SearchProgress, SearchQuery, SearchResult, SourceBatch, SourceDescriptor, Strategy};

pub use run::SearchRun;

/// Coordinates searches across sources. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    state: Arc<SharedState>,
    providers: ProviderSet,
    extractor: Extractor,
}

impl Orchestrator {
    /// Build an orchestrator from explicit parts.
    ///
    /// Every source with a registered API endpoint is marked API-capable in
    /// the shared health table.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn new(
        config: EngineConfig,
        state: Arc<SharedState>,
        providers: ProviderSet,
        extractor: Extractor,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        for source_id in extractor.apis().source_ids() {
            state.health.register_api(source_id);
        }
        Ok(Self {
            config: Arc::new(config),
            state,
            providers,
            extractor,
        })
    }

    /// Build a network-backed orchestrator with the built-in API endpoints
    /// and site extractors.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the config is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: EngineConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let apis = Arc::new(ApiRegistry::builtin().with_base_urls(&config.api_base_urls));
        let providers = ProviderSet::http(&config, Arc::clone(&apis))?;
        let extractor = Extractor::new(SiteRegistry::builtin()?, apis, config.max_results_per_source)?;
        let state = SharedState::shared(&config);
        Self::new(config, state, providers, extractor)
    }

    /// The shared stores this orchestrator reads and updates.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a search over `sources`.
    ///
    /// Returns as soon as the tasks are scheduled. Cancelling `cancel` stops
    /// in-flight fetches and backoff sleeps; batches that already settled are
    /// kept and [`SearchRun::finish`] returns them.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for a malformed query or an
    /// empty source list. Nothing is scheduled in that case.
    pub fn search(
        &self,
        query: SearchQuery,
        sources: Vec<SourceDescriptor>,
        cancel: CancellationToken,
    ) -> Result<SearchRun, SearchError> {
        query.validate()?;
        if sources.is_empty() {
            return Err(SearchError::InvalidQuery("no sources selected".into()));
        }

        let total = sources.len();
        let (tx, rx) = mpsc::channel(total);
        let this = self.clone();
        tracing::info!(sources = total, "search started");
        let handle = tokio::spawn(async move { this.drive(query, sources, cancel, tx).await });
        Ok(SearchRun::new(rx, handle))
    }

    /// Run a single source again with its own cancellation token.
    ///
    /// Shares the cache, rate limiter and health table with every search,
    /// so a warm cache entry is returned without fetching.
    pub async fn retry_source(
        &self,
        query: &SearchQuery,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> SourceBatch {
        match self.run_source(query, source, cancel).await {
            Ok(batch) => batch,
            Err(error) => SourceBatch {
                source_id: source.id.clone(),
                results: vec![SearchResult::error_placeholder(source, &error.to_string())],
                from_cache: false,
                strategy: None,
            },
        }
    }

    async fn drive(
        self,
        query: SearchQuery,
        sources: Vec<SourceDescriptor>,
        cancel: CancellationToken,
        tx: mpsc::Sender<SearchProgress>,
    ) -> Vec<SearchResult> {
        let total = sources.len();
        let query = Arc::new(query);
        let mut tasks = futures::stream::iter(sources)
            .map(|source| {
                let this = self.clone();
                let query = Arc::clone(&query);
                let cancel = cancel.clone();
                async move { this.run_source(&query, &source, &cancel).await }
            })
            .buffer_unordered(self.config.max_concurrency);

        let mut results = Vec::new();
        let mut completed = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = tasks.next() => next,
            };
            match next {
                Some(Ok(batch)) => {
                    completed += 1;
                    results.extend(batch.results.iter().cloned());
                    tracing::debug!(
                        source = %batch.source_id,
                        count = batch.results.len(),
                        from_cache = batch.from_cache,
                        completed,
                        total,
                        "source settled"
                    );
                    let progress = SearchProgress {
                        batch,
                        completed,
                        total,
                        running_total: results.len(),
                    };
                    // The caller may have stopped listening; results are still returned.
                    let _ = tx.send(progress).await;
                }
                Some(Err(FetchError::Cancelled)) | None => break,
                Some(Err(error)) => {
                    tracing::warn!(%error, "source task ended without a batch");
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(completed, total, results = results.len(), "search cancelled");
        } else {
            tracing::info!(total, results = results.len(), "search finished");
        }
        results
    }

    fn timeout_for(&self, strategy: Strategy) -> Duration {
        match strategy {
            Strategy::Api => self.config.api_timeout(),
            Strategy::Proxy => self.config.standard_timeout(),
            Strategy::AdvancedProxy => self.config.advanced_timeout(),
        }
    }
}
