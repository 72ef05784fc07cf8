//! Error types for the medsearch application layer.

/// Top-level error type for configuration, catalog and CLI plumbing.
#[derive(Debug, thiserror::Error)]
pub enum MedSearchError {
    /// Configuration file could not be parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// Source catalog is malformed or a requested source is unknown.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Error raised by the search engine.
    #[error(transparent)]
    Search(#[from] medsearch_engine::SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MedSearchError>;
