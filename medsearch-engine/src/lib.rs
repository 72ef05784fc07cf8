//! # medsearch-engine
//!
//! Multi-source search for pharmaceutical active ingredients.
//!
//! Sources are regulatory databases, drug-label sites, journals and a few
//! official APIs with no common protocol. The engine fans a query out to
//! every selected source, picks per attempt between an official API, a
//! plain page fetch and an advanced page fetch, extracts results from JSON
//! or arbitrary HTML, and streams per-source batches back as they settle.
//!
//! ## Design
//!
//! - Bounded fan-out: one task per source, at most `max_concurrency` in flight
//! - Exponential backoff with jitter and strategy escalation per source
//! - Sliding-window rate limits, a TTL result cache and a health table,
//!   shared across searches through [`SharedState`]
//! - Layered HTML extraction: site selectors, then generic heuristics
//! - A failing source settles as an `isError` placeholder; it never aborts
//!   the search
//! - External batch jobs relayed over a small line protocol
//!
//! ## Security
//!
//! - No network listeners; this is a library
//! - Query text is logged only at trace level

pub mod apis;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod health;
pub mod http;
pub mod orchestrator;
pub mod rate_limit;
pub mod retry;
pub mod state;
pub mod types;

pub use batch::{BatchEvent, BatchRunner};
pub use config::EngineConfig;
pub use error::{FetchError, Result, SearchError};
pub use orchestrator::{Orchestrator, SearchRun};
pub use state::SharedState;
pub use types::{
    DateRange, SearchProgress, SearchQuery, SearchResult, SourceBatch, SourceDescriptor, Strategy,
};

/// Search `sources` with a network-backed orchestrator and wait for every
/// source to settle.
///
/// Builds fresh shared state, so nothing is cached between calls. Long-lived
/// callers should keep an [`Orchestrator`] instead.
///
/// # Errors
///
/// Returns [`SearchError`] for invalid configuration or input. Per-source
/// failures appear as placeholder results, not errors.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> medsearch_engine::Result<()> {
/// use medsearch_engine::{EngineConfig, SearchQuery, SourceDescriptor};
///
/// let sources = vec![SourceDescriptor::new("pubmed", "PubMed", "https://pubmed.ncbi.nlm.nih.gov/")];
/// let results = medsearch_engine::search(SearchQuery::new("methotrexate"), sources, EngineConfig::default()).await?;
/// for result in &results {
///     println!("{}: {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    query: SearchQuery,
    sources: Vec<SourceDescriptor>,
    config: EngineConfig,
) -> Result<Vec<SearchResult>> {
    let orchestrator = Orchestrator::from_config(config)?;
    let run = orchestrator.search(query, sources, tokio_util::sync::CancellationToken::new())?;
    Ok(run.finish().await)
}
