//! One (query, source) task: cache, attempts with escalation, placeholder.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::error::FetchError;
use crate::retry;
use crate::types::{SearchQuery, SearchResult, SourceBatch, SourceDescriptor, Strategy};

/// A failed attempt and the strategy it used.
#[derive(Debug)]
struct AttemptFailure {
    error: FetchError,
    strategy: Strategy,
}

impl AttemptFailure {
    /// Blocked even with the strongest strategy: no retry can help.
    fn is_permanent(&self) -> bool {
        self.strategy == Strategy::AdvancedProxy && matches!(self.error, FetchError::FetchBlocked(_))
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.strategy)
    }
}

impl Orchestrator {
    /// Run one source to completion.
    ///
    /// Always settles into a batch unless `cancel` fires first, in which case
    /// [`FetchError::Cancelled`] is returned and nothing is emitted.
    pub(crate) async fn run_source(
        &self,
        query: &SearchQuery,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<SourceBatch, FetchError> {
        if self.config.is_unsupported(&source.id) {
            tracing::debug!(source = %source.id, "source does not allow automated access");
            return Ok(SourceBatch {
                source_id: source.id.clone(),
                results: vec![SearchResult::unsupported(source)],
                from_cache: false,
                strategy: None,
            });
        }

        let key = query.cache_key();
        if let Some(results) = self.state.cache.get(&source.id, &key).await {
            tracing::debug!(source = %source.id, count = results.len(), "cache hit");
            return Ok(SourceBatch {
                source_id: source.id.clone(),
                results,
                from_cache: true,
                strategy: None,
            });
        }

        let floor = Mutex::new(Strategy::Api);
        let attempts = retry::execute_if(
            &self.config.retry,
            |attempt| self.attempt(query, source, &floor, attempt),
            |failure: &AttemptFailure| !failure.is_permanent(),
        );

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            outcome = attempts => outcome,
        };

        match outcome {
            Ok((results, strategy)) => {
                self.state.cache.put(&source.id, &key, &results).await;
                Ok(SourceBatch {
                    source_id: source.id.clone(),
                    results,
                    from_cache: false,
                    strategy: Some(strategy),
                })
            }
            Err(exhausted) => {
                let error = FetchError::RetryExhausted {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                };
                tracing::warn!(source = %source.id, %error, "source failed");
                Ok(SourceBatch {
                    source_id: source.id.clone(),
                    results: vec![SearchResult::error_placeholder(source, &error.to_string())],
                    from_cache: false,
                    strategy: None,
                })
            }
        }
    }

    async fn attempt(
        &self,
        query: &SearchQuery,
        source: &SourceDescriptor,
        floor: &Mutex<Strategy>,
        attempt: u32,
    ) -> Result<(Vec<SearchResult>, Strategy), AttemptFailure> {
        let current_floor = *floor.lock().unwrap_or_else(PoisonError::into_inner);
        let strategy = self.state.health.best_strategy(&source.id).max(current_floor);

        if !self.state.rate_limiter.allow(&source.id) {
            tracing::debug!(source = %source.id, attempt, "rate limit reached");
            return Err(AttemptFailure {
                error: FetchError::RateLimited(source.id.clone()),
                strategy,
            });
        }

        let timeout = self.timeout_for(strategy);
        tracing::trace!(source = %source.id, attempt, %strategy, query = %query.expression(), "attempt");

        let provider = self.providers.for_strategy(strategy);
        let fetched = match tokio::time::timeout(timeout, provider.fetch(source, query, timeout)).await {
            Ok(fetched) => fetched,
            Err(_) => Err(FetchError::Timeout(format!("{} after {timeout:?}", source.id))),
        };
        let outcome = fetched.and_then(|payload| self.extractor.extract(source, &payload, query));
        self.state.health.record_outcome(&source.id, strategy, outcome.is_ok());

        match outcome {
            Ok(results) => {
                tracing::debug!(source = %source.id, %strategy, count = results.len(), "attempt succeeded");
                Ok((results, strategy))
            }
            Err(error) => {
                if error.escalates() {
                    if let Some(next) = strategy.escalate() {
                        let mut floor = floor.lock().unwrap_or_else(PoisonError::into_inner);
                        *floor = (*floor).max(next);
                    }
                }
                tracing::warn!(source = %source.id, attempt, %strategy, %error, "attempt failed");
                Err(AttemptFailure { error, strategy })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_blocked_advanced_attempts_are_permanent() {
        let blocked = |strategy| AttemptFailure {
            error: FetchError::FetchBlocked("captcha".into()),
            strategy,
        };
        assert!(blocked(Strategy::AdvancedProxy).is_permanent());
        assert!(!blocked(Strategy::Proxy).is_permanent());
        assert!(!AttemptFailure {
            error: FetchError::Timeout("x".into()),
            strategy: Strategy::AdvancedProxy,
        }
        .is_permanent());
    }

    #[test]
    fn failure_display_names_strategy() {
        let failure = AttemptFailure {
            error: FetchError::HttpError(502),
            strategy: Strategy::Proxy,
        };
        assert_eq!(failure.to_string(), "HTTP status 502 (proxy)");
    }
}
