//! Page fetchers: the standard and advanced proxy providers.
//!
//! Both fetch a source's own search page. The advanced mode sends a fuller
//! browser header profile with a same-site referer and configured cookies,
//! and marks its payload as authorizing the aggressive extraction pass.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use url::form_urlencoded;
use url::Url;

use super::{FetchProvider, Payload};
use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::http;
use crate::types::{SearchQuery, SourceDescriptor};

/// Known search page layouts by host suffix, with `{base}` (the source URL
/// with a trailing slash) and `{query}` placeholders.
const SITE_SEARCH_PATTERNS: &[(&str, &str)] = &[
    ("dailymed.nlm.nih.gov", "{base}dailymed/search.cfm?query={query}"),
    ("pubmed.ncbi.nlm.nih.gov", "{base}?term={query}"),
    ("products.mhra.gov.uk", "{base}search?query={query}"),
    ("mhra.gov.uk", "{base}?query={query}&page=1"),
    ("tga.gov.au", "{base}search?query={query}"),
    ("swissmedic.ch", "{base}search.html?query={query}"),
    ("ema.europa.eu", "{base}medicines/search?search_api_views_fulltext={query}"),
    ("medsafe.govt.nz", "{base}searchResults.asp?q={query}"),
    ("lakemedelsverket.se", "{base}search?q={query}"),
    ("fda.gov", "{base}search?search={query}"),
];

/// Which header profile a [`PageFetcher`] sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// Rotated User-Agent with basic headers.
    Standard,
    /// Full browser profile, referer, cookies; enables aggressive extraction.
    Advanced,
}

/// Fetches a source's search page over HTTP.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    mode: PageMode,
    templates: HashMap<String, String>,
    cookies: HashMap<String, String>,
    user_agent: Option<String>,
}

impl PageFetcher {
    /// Create a fetcher in `mode` using the URL templates, cookies and
    /// User-Agent override from `config`.
    pub fn new(client: reqwest::Client, mode: PageMode, config: &EngineConfig) -> Self {
        Self {
            client,
            mode,
            templates: config.search_url_templates.clone(),
            cookies: config.cookies.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// The mode this fetcher runs in.
    pub fn mode(&self) -> PageMode {
        self.mode
    }
}

#[async_trait]
impl FetchProvider for PageFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<Payload, FetchError> {
        let url = search_url(source, query, &self.templates);
        let ua = http::user_agent(self.user_agent.as_deref());
        let headers = match self.mode {
            PageMode::Standard => http::standard_headers(&ua),
            PageMode::Advanced => http::advanced_headers(
                &ua,
                &source.base_url,
                self.cookies.get(&source.id).map(String::as_str),
            ),
        };

        tracing::trace!(source = %source.id, mode = ?self.mode, url = %url, "fetching search page");
        let body = http::get_text(&self.client, &url, headers, timeout).await?;
        tracing::debug!(source = %source.id, bytes = body.len(), "page fetched");

        Ok(Payload::Html {
            body,
            base_url: source.base_url.clone(),
            aggressive: self.mode == PageMode::Advanced,
        })
    }
}

/// The search page URL for `source` and `query`.
///
/// A configured template for the source id wins. Otherwise a known host gets
/// its site-specific layout, and anything else gets a `q` parameter: appended
/// directly when the base path already ends in `search`, else on a
/// `search` path below the base.
pub fn search_url(source: &SourceDescriptor, query: &SearchQuery, templates: &HashMap<String, String>) -> String {
    let encoded: String = form_urlencoded::byte_serialize(query.expression().as_bytes()).collect();

    if let Some(template) = templates.get(&source.id) {
        return template.replace("{query}", &encoded);
    }

    let base = with_trailing_slash(&source.base_url);
    let host = Url::parse(&source.base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

    if let Some(host) = host.as_deref() {
        let known = SITE_SEARCH_PATTERNS
            .iter()
            .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")));
        if let Some((_, pattern)) = known {
            return pattern.replace("{base}", &base).replace("{query}", &encoded);
        }
    }

    match Url::parse(&source.base_url) {
        Ok(mut url) if url.path().trim_end_matches('/').ends_with("search") => {
            url.query_pairs_mut().append_pair("q", &query.expression());
            url.to_string()
        }
        _ => format!("{base}search?q={encoded}"),
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_owned()
    } else {
        format!("{base}/")
    }
}
