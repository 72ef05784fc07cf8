//! The two sides of a batch job.
//!
//! [`run_search_job`] is what a job does: search in-process and speak the
//! line protocol on a writer. [`relay_job`] launches an external job through
//! [`BatchRunner`] and re-emits its events on a writer.

use std::io::Write;
use std::path::Path;

use medsearch_engine::{
    BatchEvent, BatchRunner, FetchError, Orchestrator, SearchQuery, SearchResult,
    SourceDescriptor,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{MedSearchError, Result};

/// Search `sources`, writing one log line per settled source, an `ERROR:`
/// line per failed source, a `RESULTS:` line and finally `DONE`.
///
/// When `output` is set the result array is written there before `DONE`.
///
/// # Errors
///
/// Returns an error for an invalid query or when `out` or the artifact
/// cannot be written.
pub async fn run_search_job<W: Write>(
    orchestrator: &Orchestrator,
    query: SearchQuery,
    sources: Vec<SourceDescriptor>,
    output: Option<&Path>,
    cancel: CancellationToken,
    out: &mut W,
) -> Result<Vec<SearchResult>> {
    let names: Vec<(String, String)> = sources
        .iter()
        .map(|s| (s.id.clone(), s.name.clone()))
        .collect();
    let mut run = orchestrator.search(query, sources, cancel)?;

    while let Some(progress) = run.next_progress().await {
        let batch = &progress.batch;
        let name = names
            .iter()
            .find(|(id, _)| *id == batch.source_id)
            .map_or(batch.source_id.as_str(), |(_, name)| name.as_str());
        let line = if batch.is_error() {
            let reason = batch
                .results
                .first()
                .map_or("no results", |r| r.snippet.as_str());
            BatchEvent::Error(format!("{}: {reason}", batch.source_id))
        } else {
            let via = match (batch.from_cache, batch.strategy) {
                (true, _) => "cache".to_owned(),
                (false, Some(strategy)) => strategy.to_string(),
                (false, None) => "none".to_owned(),
            };
            BatchEvent::Log(format!(
                "[{}/{}] {name}: {} results via {via}",
                progress.completed,
                progress.total,
                batch.results.len()
            ))
        };
        emit(out, &line)?;
    }

    let results = run.finish().await;
    emit(out, &BatchEvent::Results(results.clone()))?;
    if let Some(path) = output {
        write_artifact(path, &results)?;
    }
    emit(out, &BatchEvent::Done)?;
    Ok(results)
}

/// Run an external job and copy its events to `out` as protocol lines.
///
/// # Errors
///
/// Returns an error when the job fails or `out` cannot be written. The
/// failure has already been written to `out` as an `ERROR:` line.
pub async fn relay_job<W: Write>(
    runner: &BatchRunner,
    query: &SearchQuery,
    sources: &[String],
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<Vec<SearchResult>> {
    let (tx, mut rx) = mpsc::channel(64);
    let job = runner.run(query, sources, tx, cancel);
    tokio::pin!(job);

    let mut outcome: Option<std::result::Result<Vec<SearchResult>, FetchError>> = None;
    loop {
        tokio::select! {
            result = &mut job, if outcome.is_none() => outcome = Some(result),
            event = rx.recv() => match event {
                Some(event) => emit(out, &event)?,
                None => break,
            },
        }
    }

    // The sender lives inside `job`, so the channel closes only after it resolved.
    let result = outcome.unwrap_or(Err(FetchError::BatchJobFailed {
        code: None,
        reason: "job ended without an outcome".into(),
    }));
    result.map_err(|e| MedSearchError::Search(e.into()))
}

fn emit<W: Write>(out: &mut W, event: &BatchEvent) -> Result<()> {
    let line = event.to_line()?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

fn write_artifact(path: &Path, results: &[SearchResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results)
        .map_err(|e| MedSearchError::Config(format!("cannot encode results: {e}")))?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), results = results.len(), "artifact written");
    Ok(())
}
