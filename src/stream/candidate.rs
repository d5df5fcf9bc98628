use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::protocol::NormalizedEvent;

/// A lazy, cancellable sequence of normalized events for one candidate.
///
/// Owned exclusively by the caller. Dropping it releases the underlying
/// connection.
pub struct CandidateStream {
    index: usize,
    cancel: CancellationToken,
    inner: BoxStream<'static, Result<NormalizedEvent, StreamError>>,
}

impl CandidateStream {
    pub fn new<S>(index: usize, cancel: CancellationToken, inner: S) -> Self
    where
        S: Stream<Item = Result<NormalizedEvent, StreamError>> + Send + 'static,
    {
        Self {
            index,
            cancel,
            inner: inner.boxed(),
        }
    }

    /// Position of this candidate in the requested candidate list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stop this candidate. Events already yielded are unaffected; the next
    /// poll returns `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drain the stream and concatenate the text of every event's first choice.
    ///
    /// # Errors
    ///
    /// Returns the first transport error the stream yields.
    pub async fn collect_text(mut self) -> Result<String, StreamError> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            if let Some(chunk) = event?.text() {
                text.push_str(chunk);
            }
        }
        Ok(text)
    }
}

impl std::fmt::Debug for CandidateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateStream")
            .field("index", &self.index)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for CandidateStream {
    type Item = Result<NormalizedEvent, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
