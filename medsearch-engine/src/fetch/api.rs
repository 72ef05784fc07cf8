//! Official API provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{FetchProvider, Payload};
use crate::apis::ApiRegistry;
use crate::error::FetchError;
use crate::http;
use crate::types::{SearchQuery, SourceDescriptor};

/// Calls the [`ApiEndpoint`](crate::apis::ApiEndpoint) registered for a
/// source and returns its decoded JSON.
pub struct ApiProvider {
    client: reqwest::Client,
    registry: Arc<ApiRegistry>,
    max_results: usize,
    user_agent: Option<String>,
}

impl ApiProvider {
    /// Create a provider over `registry`.
    pub fn new(
        client: reqwest::Client,
        registry: Arc<ApiRegistry>,
        max_results: usize,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            client,
            registry,
            max_results,
            user_agent,
        }
    }

    async fn get_json(&self, url: &Url, not_found_is_empty: bool, timeout: Duration) -> Result<Value, FetchError> {
        tracing::trace!(url = %url, "API request");
        let headers = http::api_headers(&http::user_agent(self.user_agent.as_deref()));
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND && not_found_is_empty {
            return Ok(serde_json::json!({"error": {"code": "NOT_FOUND"}}));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!("API answered HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyOrInvalidContent("empty API response".into()));
        }
        serde_json::from_str(&body)
            .map_err(|e| FetchError::EmptyOrInvalidContent(format!("API response is not JSON: {e}")))
    }
}

#[async_trait]
impl FetchProvider for ApiProvider {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<Payload, FetchError> {
        let endpoint = self
            .registry
            .get(&source.id)
            .ok_or_else(|| FetchError::EmptyOrInvalidContent(format!("no official API for {}", source.id)))?;
        let base = self
            .registry
            .base_url(&source.id)
            .unwrap_or_else(|| endpoint.default_base_url().to_owned());

        let url = endpoint.search_url(&base, query, self.max_results)?;
        let mut body = self.get_json(&url, endpoint.not_found_is_empty(), timeout).await?;

        if let Some(next) = endpoint.follow_up_url(&base, &body)? {
            body = self.get_json(&next, endpoint.not_found_is_empty(), timeout).await?;
        }

        Ok(Payload::Structured {
            source_id: source.id.clone(),
            body,
        })
    }
}
