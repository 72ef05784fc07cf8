//! Launches an external batch job and relays its output.
//!
//! The job is invoked as
//!
//! ```text
//! <program> search --query <term> [--query <term>…] --sources a,b \
//!     --output <artifact> [--from YYYY-MM-DD] [--to YYYY-MM-DD]
//! ```
//!
//! Its stdout is decoded with the line protocol and its stderr relayed as
//! log lines while it runs. After exit the result artifact (a JSON array of
//! results) is read and forwarded, followed by [`BatchEvent::Done`]. The
//! artifact is removed whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::protocol::BatchEvent;
use crate::error::FetchError;
use crate::types::{SearchQuery, SearchResult};

/// Runs batch jobs through one executable.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    program: PathBuf,
    program_args: Vec<String>,
    artifact_dir: PathBuf,
}

impl BatchRunner {
    /// A runner for `program`, writing artifacts to the system temp dir.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            artifact_dir: std::env::temp_dir(),
        }
    }

    /// Arguments placed before the job arguments, such as a script path
    /// when `program` is an interpreter.
    #[must_use]
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Write artifacts under `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// The arguments passed to the job for `query` and `sources`.
    pub fn arguments(query: &SearchQuery, sources: &[String], artifact: &Path) -> Vec<String> {
        let mut args = vec!["search".to_owned()];
        for term in query.terms() {
            args.push("--query".to_owned());
            args.push(term.clone());
        }
        args.push("--sources".to_owned());
        args.push(sources.join(","));
        args.push("--output".to_owned());
        args.push(artifact.display().to_string());
        let range = query.date_range();
        if let Some(from) = range.from {
            args.push("--from".to_owned());
            args.push(from.to_string());
        }
        if let Some(to) = range.to {
            args.push("--to".to_owned());
            args.push(to.to_string());
        }
        args
    }

    /// Run the job to completion, sending events to `events`.
    ///
    /// On success the last two events are [`BatchEvent::Results`] and
    /// [`BatchEvent::Done`]. On failure the last event is a
    /// [`BatchEvent::Error`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::BatchJobFailed`] if the job cannot start, exits
    ///   non-zero, or leaves a missing or unparsable artifact
    /// - [`FetchError::Cancelled`] if `cancel` fires; the job is killed
    pub async fn run(
        &self,
        query: &SearchQuery,
        sources: &[String],
        events: mpsc::Sender<BatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, FetchError> {
        let artifact = self
            .artifact_dir
            .join(format!("medsearch-{}.json", uuid::Uuid::new_v4()));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = self.execute(query, sources, &artifact, &events) => outcome,
        };

        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => tracing::trace!(path = %artifact.display(), "artifact removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %artifact.display(), error = %e, "failed to remove artifact"),
        }

        match outcome {
            Ok(results) => {
                tracing::info!(results = results.len(), "batch job finished");
                let _ = events.send(BatchEvent::Results(results.clone())).await;
                let _ = events.send(BatchEvent::Done).await;
                Ok(results)
            }
            Err(error) => {
                tracing::warn!(%error, "batch job failed");
                let _ = events.send(BatchEvent::Error(error.to_string())).await;
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        sources: &[String],
        artifact: &Path,
        events: &mpsc::Sender<BatchEvent>,
    ) -> Result<Vec<SearchResult>, FetchError> {
        let mut child = Command::new(&self.program)
            .args(&self.program_args)
            .args(Self::arguments(query, sources, artifact))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::BatchJobFailed {
                code: None,
                reason: format!("failed to start {}: {e}", self.program.display()),
            })?;
        tracing::debug!(program = %self.program.display(), sources = sources.len(), "batch job started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, (), ()) = tokio::join!(
            child.wait(),
            relay(stdout, events.clone(), true),
            relay(stderr, events.clone(), false),
        );
        let status = status.map_err(|e| FetchError::BatchJobFailed {
            code: None,
            reason: format!("failed to wait for job: {e}"),
        })?;

        if !status.success() {
            return Err(FetchError::BatchJobFailed {
                code: status.code(),
                reason: "job exited with failure status".into(),
            });
        }

        let raw = tokio::fs::read_to_string(artifact)
            .await
            .map_err(|e| FetchError::BatchJobFailed {
                code: status.code(),
                reason: format!("result artifact missing: {e}"),
            })?;
        serde_json::from_str(&raw).map_err(|e| FetchError::BatchJobFailed {
            code: status.code(),
            reason: format!("result artifact unparsable: {e}"),
        })
    }
}

/// Forward lines from one pipe. Stdout lines are decoded; results and the
/// completion marker are withheld because the artifact is authoritative.
async fn relay<R>(pipe: Option<R>, events: mpsc::Sender<BatchEvent>, decode: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return;
    };
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let event = if decode {
                    BatchEvent::parse(&line)
                } else {
                    BatchEvent::Log(line)
                };
                if matches!(event, BatchEvent::Results(_) | BatchEvent::Done) {
                    continue;
                }
                // A dropped receiver must not stall the pipe.
                let _ = events.send(event).await;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "stopped reading job output");
                break;
            }
        }
    }
}
