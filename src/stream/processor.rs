//! Per-connection decode → parse → adapt pipeline.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::decoder::LineDecoder;
use super::event::{parse_event_line, LineEvent};
use crate::error::StreamError;
use crate::protocol::{
    adapt_payload, AdaptedPayload, ChatChoice, CompletionChoice, EndpointKind, NormalizedEvent,
    UpstreamPayload,
};

/// Lifecycle of one connection's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Pulling chunks from the transport.
    Reading,
    /// No further chunks will be pulled; carried state is being flushed.
    Draining,
    /// Nothing more will be emitted.
    Closed,
}

/// Synchronous core of the stream processor.
///
/// Owns the connection's line buffer exclusively. Feed it chunks in arrival
/// order; normalized events are appended to the caller's queue in the same
/// order their bytes arrived.
#[derive(Debug)]
pub struct StreamProcessor {
    endpoint: EndpointKind,
    decoder: LineDecoder,
    phase: StreamPhase,
    lines: Vec<String>,
}

impl StreamProcessor {
    #[must_use]
    pub fn new(endpoint: EndpointKind) -> Self {
        Self {
            endpoint,
            decoder: LineDecoder::new(),
            phase: StreamPhase::Reading,
            lines: Vec::with_capacity(8),
        }
    }

    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    #[must_use]
    pub fn endpoint(&self) -> EndpointKind {
        self.endpoint
    }

    /// Process one transport chunk.
    ///
    /// A `[DONE]` line closes the connection: the lines before it are still
    /// processed, everything after it is discarded.
    pub fn push_chunk(&mut self, chunk: &[u8], out: &mut VecDeque<NormalizedEvent>) {
        if self.phase != StreamPhase::Reading {
            return;
        }

        let mut lines = std::mem::take(&mut self.lines);
        self.decoder.decode_into(chunk, &mut lines);
        for line in lines.drain(..) {
            if self.phase != StreamPhase::Reading {
                break;
            }
            match parse_event_line(&line) {
                LineEvent::Noise | LineEvent::Malformed => {}
                LineEvent::Done => {
                    tracing::debug!(endpoint = self.endpoint.as_str(), "stream sentinel received");
                    self.phase = StreamPhase::Draining;
                    self.decoder.clear();
                }
                LineEvent::Payload(payload) => {
                    if let Some(event) = self.normalize(payload) {
                        out.push_back(event);
                    }
                }
            }
        }
        self.lines = lines;

        if self.phase == StreamPhase::Draining {
            self.phase = StreamPhase::Closed;
        }
    }

    /// The transport ended without more chunks.
    ///
    /// A non-empty trailing partial line gets one final parse and adaptation
    /// attempt before the connection closes.
    pub fn finish(&mut self, out: &mut VecDeque<NormalizedEvent>) {
        if self.phase == StreamPhase::Closed {
            return;
        }
        self.phase = StreamPhase::Draining;
        if let Some(tail) = self.decoder.finish() {
            if let LineEvent::Payload(payload) = parse_event_line(&tail) {
                if let Some(event) = self.normalize(payload) {
                    out.push_back(event);
                }
            }
        }
        self.phase = StreamPhase::Closed;
    }

    /// Stop processing immediately and drop carried state.
    pub fn close(&mut self) {
        self.decoder.clear();
        self.phase = StreamPhase::Closed;
    }

    fn normalize(&self, payload: UpstreamPayload) -> Option<NormalizedEvent> {
        if let Some(error) = &payload.error {
            tracing::warn!(
                code = ?error.code,
                message = error.message.as_deref().unwrap_or_default(),
                "upstream reported an error inside the stream"
            );
        }
        let Some(adapted) = adapt_payload(payload, self.endpoint) else {
            tracing::trace!(endpoint = self.endpoint.as_str(), "dropping unrecognized payload shape");
            return None;
        };
        let event = complete_event(adapted, self.endpoint);
        if event.is_none() {
            tracing::trace!(endpoint = self.endpoint.as_str(), "dropping incomplete event");
        }
        event
    }
}

/// Turn an adapted payload into a [`NormalizedEvent`] if it is complete.
///
/// Chat events need a first choice with both `delta` and `index`; completion
/// events need a first choice with `text`. Later choices missing an index take
/// their position in the list.
#[must_use]
pub fn complete_event(adapted: AdaptedPayload, endpoint: EndpointKind) -> Option<NormalizedEvent> {
    let first = adapted.choices.first()?;
    match endpoint {
        EndpointKind::Chat => {
            if first.delta.is_none() || first.index.is_none() {
                return None;
            }
            let choices = adapted
                .choices
                .into_iter()
                .enumerate()
                .map(|(position, choice)| ChatChoice {
                    index: choice.index.unwrap_or(position_index(position)),
                    delta: choice.delta.unwrap_or_default(),
                    finish_reason: choice.finish_reason,
                })
                .collect();
            Some(NormalizedEvent::Chat {
                id: adapted.id,
                model: adapted.model,
                choices,
            })
        }
        EndpointKind::Completions => {
            first.text.as_ref()?;
            let choices = adapted
                .choices
                .into_iter()
                .enumerate()
                .map(|(position, choice)| CompletionChoice {
                    index: choice.index.unwrap_or(position_index(position)),
                    text: choice.text.unwrap_or_default(),
                    finish_reason: choice.finish_reason,
                })
                .collect();
            Some(NormalizedEvent::Completion {
                id: adapted.id,
                model: adapted.model,
                choices,
            })
        }
    }
}

#[inline]
fn position_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

/// Drive a response body through a [`StreamProcessor`], yielding normalized
/// events lazily.
///
/// The only suspension point is waiting for the next chunk, and it races the
/// cancellation token. Once the token fires nothing more is emitted and no
/// further chunks are pulled. A body read error is yielded once and ends the
/// stream.
pub fn process_stream<S, E>(
    endpoint: EndpointKind,
    body: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<NormalizedEvent, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        (
            Box::pin(body),
            StreamProcessor::new(endpoint),
            VecDeque::<NormalizedEvent>::with_capacity(8),
            cancel,
        ),
        move |(mut body, mut processor, mut pending, cancel)| async move {
            loop {
                if cancel.is_cancelled() {
                    processor.close();
                    tracing::debug!(endpoint = endpoint.as_str(), "stream cancelled");
                    return None;
                }
                if let Some(event) = pending.pop_front() {
                    return Some((Ok(event), (body, processor, pending, cancel)));
                }
                if processor.phase() == StreamPhase::Closed {
                    tracing::debug!(endpoint = endpoint.as_str(), "stream closed");
                    return None;
                }

                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => continue,
                    chunk = body.next() => chunk,
                };
                match next {
                    Some(Ok(bytes)) => processor.push_chunk(&bytes, &mut pending),
                    Some(Err(err)) => {
                        processor.close();
                        let err = StreamError::Transport(format!("stream read failed: {err}"));
                        return Some((Err(err), (body, processor, pending, cancel)));
                    }
                    None => processor.finish(&mut pending),
                }
            }
        },
    )
}
