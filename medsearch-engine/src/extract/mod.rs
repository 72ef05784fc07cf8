//! Extraction engine: raw payloads in, normalized [`SearchResult`]s out.
//!
//! # Pipeline
//!
//! Structured payloads go to the parser of the API endpoint registered for
//! the source. HTML payloads try, in order, until one yields a candidate:
//!
//! 1. the source's [`SiteExtractor`], if registered
//! 2. the aggressive pass, only when the payload authorizes it
//! 3. the standard passes: headings with links, result containers, long
//!    anchors
//!
//! Candidates are then finalized: titles and snippets normalized, dates
//! filtered against the query range (undated candidates are kept with
//! today's date), capped, and numbered `{sourceId}-{n}`.

pub mod date;
pub mod generic;
pub mod site;
pub mod text;
pub mod urls;

use std::sync::Arc;

use chrono::NaiveDate;
use scraper::Html;

use crate::apis::ApiRegistry;
use crate::error::{FetchError, SearchError};
use crate::fetch::Payload;
use crate::types::{SearchQuery, SearchResult, SourceDescriptor};

pub use generic::GenericExtractor;
pub use site::{SelectorProfile, SiteExtractor, SiteRegistry};

/// A result candidate before normalization and numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHit {
    /// Title text, possibly with stray whitespace.
    pub title: String,
    /// Absolute URL.
    pub url: String,
    /// Publication date, if one was found.
    pub date: Option<NaiveDate>,
    /// Excerpt, possibly long.
    pub snippet: String,
    /// Authors or holders.
    pub authors: Vec<String>,
    /// Pass-through relevance.
    pub relevance_score: Option<f64>,
}

/// Turns payloads into results for any source.
#[derive(Debug, Clone)]
pub struct Extractor {
    sites: Arc<SiteRegistry>,
    generic: Arc<GenericExtractor>,
    apis: Arc<ApiRegistry>,
    max_results: usize,
}

impl Extractor {
    /// Build an extractor over the given registries.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if a generic selector fails to compile.
    pub fn new(sites: SiteRegistry, apis: Arc<ApiRegistry>, max_results: usize) -> Result<Self, SearchError> {
        Ok(Self {
            sites: Arc::new(sites),
            generic: Arc::new(GenericExtractor::new()?),
            apis,
            max_results,
        })
    }

    /// The API registry consulted for structured payloads.
    pub fn apis(&self) -> &Arc<ApiRegistry> {
        &self.apis
    }

    /// Extract results for `source` from `payload`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::ExtractionFailure`] when every pass yields nothing
    /// - [`FetchError::EmptyOrInvalidContent`] when a structured payload has
    ///   no registered parser or an unexpected shape
    pub fn extract(
        &self,
        source: &SourceDescriptor,
        payload: &Payload,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, FetchError> {
        let hits = match payload {
            Payload::Structured { source_id, body } => {
                let endpoint = self.apis.get(source_id).ok_or_else(|| {
                    FetchError::EmptyOrInvalidContent(format!("no API parser for {source_id}"))
                })?;
                endpoint.parse(body)?
            }
            Payload::Html {
                body,
                base_url,
                aggressive,
            } => self.extract_html(source, body, base_url, *aggressive, query),
        };

        let hits: Vec<RawHit> = hits
            .into_iter()
            .filter(|hit| !text::normalize_whitespace(&hit.title).is_empty())
            .collect();
        if hits.is_empty() {
            return Err(FetchError::ExtractionFailure(format!(
                "no results found for {}",
                source.id
            )));
        }
        // Hits that parsed but fall outside the date range are a valid empty answer.
        let results = finalize(source, hits, query, self.max_results);
        if results.is_empty() {
            tracing::debug!(source = %source.id, "no results inside the date range");
        }
        Ok(results)
    }

    fn extract_html(
        &self,
        source: &SourceDescriptor,
        body: &str,
        base_url: &str,
        aggressive: bool,
        query: &SearchQuery,
    ) -> Vec<RawHit> {
        let document = Html::parse_document(body);

        if let Some(site) = self.sites.get(&source.id) {
            let hits = site.extract(&document, base_url);
            if !hits.is_empty() {
                tracing::debug!(source = %source.id, count = hits.len(), "site extractor matched");
                return hits;
            }
        }

        if aggressive {
            let hits = self.generic.aggressive(&document, base_url, query);
            if !hits.is_empty() {
                tracing::debug!(source = %source.id, count = hits.len(), "aggressive pass matched");
                return hits;
            }
        }

        let hits = self.generic.standard(&document, base_url, query);
        tracing::debug!(source = %source.id, count = hits.len(), "standard passes finished");
        hits
    }
}

/// Normalize, date-filter, cap, and number raw candidates.
pub fn finalize(
    source: &SourceDescriptor,
    hits: Vec<RawHit>,
    query: &SearchQuery,
    max_results: usize,
) -> Vec<SearchResult> {
    let range = query.date_range();
    let today = date::today_iso();
    hits.into_iter()
        .filter(|hit| !text::normalize_whitespace(&hit.title).is_empty())
        .filter(|hit| hit.date.is_none_or(|d| range.contains(d)))
        .take(max_results)
        .enumerate()
        .map(|(index, hit)| SearchResult {
            id: format!("{}-{}", source.id, index + 1),
            title: text::normalize_whitespace(&hit.title),
            url: hit.url,
            source: source.name.clone(),
            date: hit.date.map_or_else(|| today.clone(), date::iso),
            snippet: text::snippet(&hit.snippet),
            authors: hit
                .authors
                .iter()
                .map(|a| text::normalize_whitespace(a))
                .filter(|a| !a.is_empty())
                .collect(),
            relevance_score: hit.relevance_score.map(|s| s.clamp(0.0, 1.0)),
            is_error: false,
        })
        .collect()
}
