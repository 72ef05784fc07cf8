//! # medsearch
//!
//! Command-line front end for `medsearch-engine`: configuration, the source
//! catalog and the batch-job protocol.
//!
//! The `medsearch search` subcommand is itself a batch job. It prints
//! progress and a `RESULTS:` line on stdout, writes a result artifact and
//! finishes with `DONE`, so another `medsearch relay` (or any other caller)
//! can drive it through [`medsearch_engine::BatchRunner`].

pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod job;

pub use catalog::Catalog;
pub use config::MedSearchConfig;
pub use error::{MedSearchError, Result};
pub use job::{relay_job, run_search_job};
