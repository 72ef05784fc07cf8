//! Error types for the medsearch-engine crate.
//!
//! [`SearchError`] covers failures that abort a call before any work is
//! scheduled (bad input, bad configuration). [`FetchError`] is the per-source
//! taxonomy used inside the orchestrator; apart from `RetryExhausted` and
//! `BatchJobFailed` these never reach a caller, they only drive retry and
//! strategy escalation.

/// Errors returned by the public entry points of the engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query or source selection is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error (batch artifacts, subprocess pipes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A per-source fetch failure surfaced to the caller.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Per-source failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The per-source call budget for the current window is spent.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The site answered with a captcha or block page.
    #[error("access blocked: {0}")]
    FetchBlocked(String),

    /// The request did not complete within its timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The site answered with a non-success status.
    #[error("HTTP status {0}")]
    HttpError(u16),

    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was empty or not the expected format.
    #[error("empty or invalid content: {0}")]
    EmptyOrInvalidContent(String),

    /// The payload parsed but yielded zero structured results.
    #[error("extraction yielded no results: {0}")]
    ExtractionFailure(String),

    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Display form of the final attempt's error.
        last_error: String,
    },

    /// An external batch job exited abnormally or left no usable artifact.
    #[error("batch job failed (exit code {code:?}): {reason}")]
    BatchJobFailed {
        /// Process exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// What went wrong.
        reason: String,
    },

    /// The caller cancelled the search.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether this error should move the source to a stronger strategy
    /// instead of repeating the same request.
    pub fn escalates(&self) -> bool {
        matches!(
            self,
            Self::FetchBlocked(_) | Self::EmptyOrInvalidContent(_) | Self::ExtractionFailure(_)
        )
    }

    /// Map a [`reqwest::Error`] onto the taxonomy.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpError(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            Self::EmptyOrInvalidContent(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, SearchError>;
