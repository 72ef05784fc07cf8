//! CLI binary for medsearch.
//!
//! Logs go to stderr; stdout carries the batch-job line protocol.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use medsearch::{Catalog, MedSearchConfig};
use medsearch_engine::{BatchRunner, DateRange, Orchestrator, SearchQuery};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Medsearch: search regulatory databases, drug labels and journals for an active ingredient.
#[derive(Parser)]
#[command(name = "medsearch", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to a JSON source catalog; overrides the config.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search the selected sources and print the line protocol.
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Write the result array to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an external batch job and relay its output.
    Relay {
        #[command(flatten)]
        query: QueryArgs,

        /// Executable to launch.
        #[arg(long)]
        program: PathBuf,

        /// Argument passed before the job arguments (repeatable).
        #[arg(long = "program-arg")]
        program_args: Vec<String>,
    },

    /// List the source catalog.
    Sources,
}

#[derive(Args)]
struct QueryArgs {
    /// Search term (repeatable).
    #[arg(short = 'q', long = "query", required = true)]
    terms: Vec<String>,

    /// Comma-separated source ids.
    #[arg(short, long, value_delimiter = ',', required = true)]
    sources: Vec<String>,

    /// Earliest publication date (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest publication date (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl QueryArgs {
    fn query(&self) -> SearchQuery {
        SearchQuery::with_terms(self.terms.iter().cloned()).with_date_range(DateRange {
            from: self.from,
            to: self.to,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medsearch=info,medsearch_engine=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MedSearchConfig::load(cli.config.as_deref())?;
    let catalog_path = cli.catalog.or_else(|| config.catalog.path.clone());
    let catalog = Catalog::load(catalog_path.as_deref())
        .with_context(|| format!("loading catalog {catalog_path:?}"))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Search { query, output } => {
            let sources = catalog.select(query.sources.as_slice())?;
            let orchestrator = Orchestrator::from_config(config.engine)?;
            let results = medsearch::run_search_job(
                &orchestrator,
                query.query(),
                sources,
                output.as_deref(),
                cancel,
                &mut stdout,
            )
            .await?;
            info!(results = results.len(), "search complete");
        }
        Command::Relay {
            query,
            program,
            program_args,
        } => {
            let runner = BatchRunner::new(program).with_program_args(program_args);
            let results =
                medsearch::relay_job(&runner, &query.query(), &query.sources, &cancel, &mut stdout)
                    .await?;
            info!(results = results.len(), "relay complete");
        }
        Command::Sources => {
            use std::io::Write;
            for source in catalog.sources() {
                writeln!(stdout, "{:<18} {:<20} {}", source.id, source.name, source.base_url)?;
            }
        }
    }
    Ok(())
}
