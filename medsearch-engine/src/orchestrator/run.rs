//! Handle to a running search.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::{SearchProgress, SearchResult};

/// A search in flight.
///
/// Yields one [`SearchProgress`] per settled source, in completion order,
/// either through [`SearchRun::next_progress`] or as a [`Stream`].
/// [`SearchRun::finish`] waits for every task (or the cancellation) and
/// returns the flattened results, placeholders included.
pub struct SearchRun {
    events: ReceiverStream<SearchProgress>,
    handle: JoinHandle<Vec<SearchResult>>,
}

impl SearchRun {
    pub(crate) fn new(events: mpsc::Receiver<SearchProgress>, handle: JoinHandle<Vec<SearchResult>>) -> Self {
        Self {
            events: ReceiverStream::new(events),
            handle,
        }
    }

    /// The next progress event, or `None` once every source has settled.
    pub async fn next_progress(&mut self) -> Option<SearchProgress> {
        self.events.as_mut().recv().await
    }

    /// Wait for the search to end and return every accumulated result.
    ///
    /// Progress events not yet consumed are discarded.
    pub async fn finish(self) -> Vec<SearchResult> {
        drop(self.events);
        match self.handle.await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "search driver task failed");
                Vec::new()
            }
        }
    }
}

impl Stream for SearchRun {
    type Item = SearchProgress;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl std::fmt::Debug for SearchRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRun")
            .field("finished", &self.handle.is_finished())
            .finish_non_exhaustive()
    }
}
