//! Line protocol spoken by batch jobs on stdout.
//!
//! ```text
//! searching pubmed            plain line: a log message
//! ERROR: tga: gave up         diagnostic, not fatal by itself
//! RESULTS: [{...}, ...]       JSON array of results
//! DONE                        normal end of the stream
//! ```
//!
//! A stream that closes without `DONE` ended abnormally.

use crate::error::{FetchError, SearchError};
use crate::types::SearchResult;

/// Prefix of the line carrying the result array.
pub const RESULTS_PREFIX: &str = "RESULTS:";
/// Prefix of diagnostic lines.
pub const ERROR_PREFIX: &str = "ERROR:";
/// Completion marker.
pub const DONE_MARKER: &str = "DONE";

/// One decoded protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Free-form progress output.
    Log(String),
    /// A diagnostic.
    Error(String),
    /// The job's results.
    Results(Vec<SearchResult>),
    /// The job finished normally.
    Done,
}

impl BatchEvent {
    /// Decode one line. A `RESULTS:` line whose payload is not a result
    /// array decodes as an [`BatchEvent::Error`].
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == DONE_MARKER {
            return Self::Done;
        }
        if let Some(payload) = line.strip_prefix(RESULTS_PREFIX) {
            return match serde_json::from_str::<Vec<SearchResult>>(payload.trim()) {
                Ok(results) => Self::Results(results),
                Err(e) => Self::Error(format!("malformed results line: {e}")),
            };
        }
        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return Self::Error(message.trim().to_owned());
        }
        Self::Log(line.to_owned())
    }

    /// Encode as a single line without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if results cannot be serialized.
    pub fn to_line(&self) -> Result<String, SearchError> {
        Ok(match self {
            Self::Log(message) => message.replace('\n', " "),
            Self::Error(message) => format!("{ERROR_PREFIX} {}", message.replace('\n', " ")),
            Self::Results(results) => {
                let json = serde_json::to_string(results)
                    .map_err(|e| SearchError::Parse(format!("cannot encode results: {e}")))?;
                format!("{RESULTS_PREFIX} {json}")
            }
            Self::Done => DONE_MARKER.to_owned(),
        })
    }
}

/// Accumulates a protocol stream line by line.
#[derive(Debug, Default)]
pub struct ProtocolReader {
    logs: Vec<String>,
    results: Vec<SearchResult>,
    errors: Vec<String>,
    done: bool,
}

/// What a stream carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    /// Plain log lines, in order.
    pub logs: Vec<String>,
    /// Results from every `RESULTS:` line, in order.
    pub results: Vec<SearchResult>,
    /// Every diagnostic seen.
    pub errors: Vec<String>,
    /// Whether the stream ended with `DONE`.
    pub done: bool,
}

impl ProtocolReader {
    /// An empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and record one line, returning the decoded event.
    pub fn feed(&mut self, line: &str) -> BatchEvent {
        let event = BatchEvent::parse(line);
        match &event {
            BatchEvent::Results(results) => self.results.extend(results.iter().cloned()),
            BatchEvent::Error(message) => self.errors.push(message.clone()),
            BatchEvent::Done => self.done = true,
            BatchEvent::Log(message) => self.logs.push(message.clone()),
        }
        event
    }

    /// Whether `DONE` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Close the stream.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BatchJobFailed`] if `DONE` never arrived; the
    /// reason includes the last diagnostic, if any.
    pub fn finish(self) -> Result<Transcript, FetchError> {
        if !self.done {
            let reason = match self.errors.last() {
                Some(last) => format!("stream closed without {DONE_MARKER} (last error: {last})"),
                None => format!("stream closed without {DONE_MARKER}"),
            };
            return Err(FetchError::BatchJobFailed { code: None, reason });
        }
        Ok(self.into_partial())
    }

    /// Everything seen so far, whether or not `DONE` arrived.
    pub fn into_partial(self) -> Transcript {
        Transcript {
            logs: self.logs,
            results: self.results,
            errors: self.errors,
            done: self.done,
        }
    }
}

/// Read a whole stream of lines.
///
/// # Errors
///
/// Same as [`ProtocolReader::finish`].
pub fn read_transcript<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Transcript, FetchError> {
    let mut reader = ProtocolReader::new();
    for line in lines {
        reader.feed(line);
    }
    reader.finish()
}
