//! Incremental byte-to-line decoding for event-stream response bodies.
//!
//! Chunks arrive with no alignment to line boundaries or to UTF-8 character
//! boundaries. [`LineDecoder`] carries both the trailing partial line and any
//! incomplete multi-byte sequence across chunks.

use memchr::memchr_iter;
use smallvec::SmallVec;

/// Per-connection line decoder state.
#[derive(Debug, Default)]
pub struct LineDecoder {
    partial: String,
    pending_bytes: SmallVec<[u8; 4]>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk and return the lines it completed.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        self.decode_into(chunk, &mut out);
        out
    }

    /// Decode a chunk, appending completed lines into a caller-provided buffer.
    ///
    /// Lines are split on `\n` with one trailing `\r` removed. Invalid byte
    /// sequences are replaced with U+FFFD; an incomplete sequence at the end of
    /// the chunk is held back until the next chunk completes it.
    pub fn decode_into(&mut self, chunk: &[u8], out: &mut Vec<String>) {
        let scan_from = self.partial.len();

        if self.pending_bytes.is_empty() {
            let consumed = decode_utf8_lossy_into(chunk, &mut self.partial);
            self.pending_bytes.extend_from_slice(&chunk[consumed..]);
        } else {
            self.pending_bytes.extend_from_slice(chunk);
            let consumed = decode_utf8_lossy_into(&self.pending_bytes, &mut self.partial);
            self.pending_bytes.drain(..consumed);
        }

        let mut line_start = 0usize;
        let bytes = self.partial.as_bytes();
        for rel_pos in memchr_iter(b'\n', &bytes[scan_from..]) {
            let line_end = scan_from + rel_pos;
            let mut line = &self.partial[line_start..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            out.push(line.to_string());
            line_start = line_end + 1;
        }

        if line_start > 0 {
            self.partial.drain(..line_start);
        }
    }

    /// Text received after the last line break.
    #[must_use]
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Take the trailing partial line at end of input.
    ///
    /// Bytes of an unfinished multi-byte sequence are decoded lossily.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.partial.push_str(&tail);
            self.pending_bytes.clear();
        }
        if self.partial.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.partial))
    }

    /// Drop all carried state.
    pub fn clear(&mut self) {
        self.partial.clear();
        self.pending_bytes.clear();
    }
}

/// Append the decodable prefix of `input` to `out`, returning how many bytes
/// were consumed. Only an incomplete trailing sequence is left unconsumed.
fn decode_utf8_lossy_into(input: &[u8], out: &mut String) -> usize {
    let mut offset = 0usize;
    loop {
        let rest = &input[offset..];
        match std::str::from_utf8(rest) {
            Ok(text) => {
                out.push_str(text);
                return input.len();
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&rest[..valid_up_to]) {
                    out.push_str(text);
                }
                match err.error_len() {
                    Some(invalid_len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        offset += valid_up_to + invalid_len;
                    }
                    None => return offset + valid_up_to,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"data: a\n\ndata: b\n");
        assert_eq!(lines, vec!["data: a", "", "data: b"]);
        assert_eq!(decoder.partial(), "");
    }

    #[test]
    fn test_partial_line_carried_over() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(b"data: hel").is_empty());
        assert_eq!(decoder.partial(), "data: hel");
        let lines = decoder.decode(b"lo\ndata: ne");
        assert_eq!(lines, vec!["data: hello"]);
        assert_eq!(decoder.partial(), "data: ne");
    }

    #[test]
    fn test_crlf_stripped() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"data: a\r\n\r\n");
        assert_eq!(lines, vec!["data: a", ""]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "data: 世界\n".as_bytes();
        // split inside the first CJK character (3 bytes, starts at 6)
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(&text[..7]).is_empty());
        assert_eq!(decoder.partial(), "data: ");
        assert!(decoder.decode(&text[7..8]).is_empty());
        let lines = decoder.decode(&text[8..]);
        assert_eq!(lines, vec!["data: 世界"]);
    }

    #[test]
    fn test_every_single_byte_split() {
        let text = "data: héllo 🌲\ndata: end\n".as_bytes();
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for byte in text {
            decoder.decode_into(std::slice::from_ref(byte), &mut lines);
        }
        assert_eq!(lines, vec!["data: héllo 🌲", "data: end"]);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"data: a\xffb\n");
        assert_eq!(lines, vec!["data: a\u{FFFD}b"]);
    }

    #[test]
    fn test_finish_flushes_partial_and_pending_bytes() {
        let mut decoder = LineDecoder::new();
        decoder.decode(b"data: x\xe4\xb8");
        assert_eq!(decoder.finish().as_deref(), Some("data: x\u{FFFD}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_clear_drops_state() {
        let mut decoder = LineDecoder::new();
        decoder.decode(b"data: partial\xe4");
        decoder.clear();
        assert_eq!(decoder.finish(), None);
    }
}
