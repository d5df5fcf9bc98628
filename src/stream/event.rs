use crate::protocol::UpstreamPayload;

/// Payload that marks the end of an event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_FIELD: &str = "data:";

/// Classification of a single event-stream line.
#[derive(Debug)]
pub enum LineEvent {
    /// Blank lines, comments (`: OPENROUTER PROCESSING`) and non-data fields.
    Noise,
    /// `data: [DONE]`.
    Done,
    /// A data line whose payload is not valid JSON for a completion chunk.
    Malformed,
    Payload(UpstreamPayload),
}

/// Return the payload of a `data:` line, with the optional single space after
/// the colon and surrounding whitespace removed.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let value = trimmed.strip_prefix(DATA_FIELD)?;
    Some(value.trim())
}

/// Classify one line of an upstream event stream.
///
/// A payload that fails to parse is logged and reported as
/// [`LineEvent::Malformed`]; it never aborts the stream.
#[must_use]
pub fn parse_event_line(line: &str) -> LineEvent {
    let Some(data) = data_payload(line) else {
        return LineEvent::Noise;
    };
    if data == DONE_SENTINEL {
        return LineEvent::Done;
    }
    match serde_json::from_str::<UpstreamPayload>(data) {
        Ok(payload) => LineEvent::Payload(payload),
        Err(err) => {
            tracing::warn!(error = %err, line = %data, "dropping unparseable stream line");
            LineEvent::Malformed
        }
    }
}
