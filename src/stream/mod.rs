//! Event-stream processing for upstream response bodies.
//!
//! Bytes flow through [`decoder::LineDecoder`] (chunk → lines),
//! [`event::parse_event_line`] (line → payload or sentinel) and the protocol
//! adapter (payload → canonical shape), driven per connection by
//! [`processor::process_stream`].

pub mod candidate;
pub mod decoder;
pub mod event;
pub mod processor;

pub use candidate::CandidateStream;
pub use decoder::LineDecoder;
pub use event::{parse_event_line, LineEvent, DONE_SENTINEL};
pub use processor::{complete_event, process_stream, StreamPhase, StreamProcessor};
