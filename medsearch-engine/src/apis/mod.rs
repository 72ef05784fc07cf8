//! Official API endpoints and their response parsers.
//!
//! Each endpoint knows how to build its search request and how to turn the
//! decoded JSON response into [`RawHit`]s. The [`ApiRegistry`] maps source
//! ids to endpoints and holds per-source base-URL overrides.

pub mod chembl;
pub mod ema;
pub mod openfda;
pub mod pubmed;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::FetchError;
use crate::extract::RawHit;
use crate::types::SearchQuery;

pub use chembl::ChemblEndpoint;
pub use ema::EmaEndpoint;
pub use openfda::OpenFdaEndpoint;
pub use pubmed::PubMedEndpoint;

/// An official search API for one source.
pub trait ApiEndpoint: Send + Sync {
    /// The catalog id this endpoint serves.
    fn source_id(&self) -> &'static str;

    /// Base URL used when no override is configured.
    fn default_base_url(&self) -> &'static str;

    /// The first (often only) request of a search.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the URL cannot be built.
    fn search_url(&self, base: &str, query: &SearchQuery, max_results: usize) -> Result<Url, FetchError>;

    /// A second request derived from the first response, if the API needs one.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the URL cannot be built.
    fn follow_up_url(&self, _base: &str, _first: &Value) -> Result<Option<Url>, FetchError> {
        Ok(None)
    }

    /// Whether HTTP 404 means "no matches" rather than an error.
    fn not_found_is_empty(&self) -> bool {
        false
    }

    /// Turn the final response into result candidates.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::EmptyOrInvalidContent`] when the document does
    /// not have the expected shape.
    fn parse(&self, body: &Value) -> Result<Vec<RawHit>, FetchError>;
}

/// Source id → endpoint, plus base-URL overrides.
#[derive(Clone, Default)]
pub struct ApiRegistry {
    endpoints: HashMap<String, Arc<dyn ApiEndpoint>>,
    base_urls: HashMap<String, String>,
}

impl ApiRegistry {
    /// A registry with no endpoints.
    pub fn empty() -> Self {
        Self::default()
    }

    /// PubMed, openFDA drug labels, EMA medicines, and ChEMBL.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PubMedEndpoint));
        registry.register(Arc::new(OpenFdaEndpoint));
        registry.register(Arc::new(EmaEndpoint));
        registry.register(Arc::new(ChemblEndpoint));
        registry
    }

    /// Add or replace an endpoint.
    pub fn register(&mut self, endpoint: Arc<dyn ApiEndpoint>) {
        self.endpoints.insert(endpoint.source_id().to_owned(), endpoint);
    }

    /// Point `source_id` at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, source_id: impl Into<String>, base: impl Into<String>) -> Self {
        self.base_urls.insert(source_id.into(), base.into());
        self
    }

    /// Apply every override in `overrides`.
    #[must_use]
    pub fn with_base_urls(mut self, overrides: &HashMap<String, String>) -> Self {
        self.base_urls
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// The endpoint for `source_id`.
    pub fn get(&self, source_id: &str) -> Option<&Arc<dyn ApiEndpoint>> {
        self.endpoints.get(source_id)
    }

    /// Whether `source_id` has an official API.
    pub fn contains(&self, source_id: &str) -> bool {
        self.endpoints.contains_key(source_id)
    }

    /// Effective base URL for `source_id`, without a trailing slash.
    pub fn base_url(&self, source_id: &str) -> Option<String> {
        let base = self
            .base_urls
            .get(source_id)
            .map(String::as_str)
            .or_else(|| self.get(source_id).map(|e| e.default_base_url()))?;
        Some(base.trim_end_matches('/').to_owned())
    }

    /// Registered source ids, sorted.
    pub fn source_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("endpoints", &self.source_ids())
            .field("base_urls", &self.base_urls)
            .finish()
    }
}

/// Build `{base}{path}` with query parameters.
pub(crate) fn endpoint_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
    Url::parse_with_params(&format!("{base}{path}"), params)
        .map_err(|e| FetchError::Transport(format!("invalid API URL {base}{path}: {e}")))
}

/// First string in a JSON array field, or the field itself if it is a string.
pub(crate) fn first_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    let non_empty = |s: &'a str| Some(s.trim()).filter(|s| !s.is_empty());
    match value.get(key)? {
        Value::String(s) => non_empty(s.as_str()),
        Value::Array(items) => items.iter().filter_map(Value::as_str).find_map(non_empty),
        _ => None,
    }
}
