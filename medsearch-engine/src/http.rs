//! Shared HTTP client, header profiles, and block-page detection.
//!
//! One [`reqwest::Client`] is built per provider with a cookie store and no
//! global timeout; each request sets its own. The User-Agent is chosen per
//! request from a rotation pool unless the config pins one.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::error::{FetchError, SearchError};

/// Browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Lower-case phrases that identify a captcha or block page.
pub const BLOCK_SIGNATURES: &[&str] = &[
    "captcha",
    "access denied",
    "too many requests",
    "are you a robot",
    "unusual traffic",
    "request blocked",
];

/// Bodies longer than this are treated as real pages even if a signature
/// appears somewhere in them (captcha widgets embedded in search forms).
const BLOCK_PAGE_MAX_BYTES: usize = 64 * 1024;

/// Build a [`reqwest::Client`] for page and API fetches.
///
/// The client has a cookie store, brotli/gzip decompression, and at most ten
/// redirects. Timeouts are set per request.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client() -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array
        .unwrap_or(USER_AGENTS[0])
}

/// Pick the pinned User-Agent if configured, else a random one.
pub fn user_agent(pinned: Option<&str>) -> String {
    pinned.map_or_else(|| random_user_agent().to_owned(), str::to_owned)
}

/// Headers for the plain page fetch.
pub fn standard_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::USER_AGENT, user_agent);
    insert(
        &mut headers,
        header::ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    headers
}

/// Headers for the advanced page fetch: a fuller browser profile, a referer
/// on the source's own site, and any configured cookies.
pub fn advanced_headers(user_agent: &str, referer: &str, cookie: Option<&str>) -> HeaderMap {
    let mut headers = standard_headers(user_agent);
    insert(&mut headers, header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    insert(&mut headers, header::UPGRADE_INSECURE_REQUESTS, "1");
    insert(&mut headers, header::REFERER, referer);
    insert(&mut headers, header::CACHE_CONTROL, "no-cache");
    for (name, value) in [
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-user", "?1"),
    ] {
        insert(&mut headers, HeaderName::from_static(name), value);
    }
    if let Some(cookie) = cookie {
        insert(&mut headers, header::COOKIE, cookie);
    }
    headers
}

/// Headers for official API requests.
pub fn api_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::USER_AGENT, user_agent);
    insert(&mut headers, header::ACCEPT, "application/json, text/plain, */*");
    headers
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::debug!(header = %name, "skipping header with invalid value"),
    }
}

/// The block signature found in `body`, if it looks like a block page.
pub fn block_signature(body: &str) -> Option<&'static str> {
    if body.len() > BLOCK_PAGE_MAX_BYTES {
        return None;
    }
    let lowered = body.to_lowercase();
    BLOCK_SIGNATURES
        .iter()
        .copied()
        .find(|signature| lowered.contains(signature))
}

/// Issue a GET and return the body of a successful response.
///
/// # Errors
///
/// - [`FetchError::FetchBlocked`] on HTTP 403/429 or a block page
/// - [`FetchError::HttpError`] on any other non-success status
/// - [`FetchError::EmptyOrInvalidContent`] on a blank body
/// - [`FetchError::Timeout`] / [`FetchError::Transport`] on request failure
pub async fn get_text(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<String, FetchError> {
    tracing::trace!(url, "GET");
    let response = client
        .get(url)
        .headers(headers)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))?;

    if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let signature = block_signature(&body).unwrap_or("status");
        return Err(FetchError::FetchBlocked(format!("HTTP {} ({signature})", status.as_u16())));
    }
    if !status.is_success() {
        return Err(FetchError::HttpError(status.as_u16()));
    }
    if body.trim().is_empty() {
        return Err(FetchError::EmptyOrInvalidContent("empty response body".into()));
    }
    if let Some(signature) = block_signature(&body) {
        return Err(FetchError::FetchBlocked(signature.to_owned()));
    }
    Ok(body)
}
