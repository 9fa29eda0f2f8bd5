//! Incremental frame decoder for the streaming answer endpoint.
//!
//! The server frames its stream as blank-line-delimited records, each
//! carrying a `data: ` field marker followed by a JSON payload:
//!
//! ```text
//! data: {"type":"thinking","content":"..."}\n\n
//! data: {"type":"heartbeat"}\n\n
//! ```
//!
//! Network chunk boundaries are arbitrary — a record can be split anywhere,
//! including inside a multi-byte UTF-8 sequence — so the decoder buffers
//! bytes and only yields complete records. It knows nothing about event
//! semantics; classification happens in [`crate::stream::frame`].

/// Field marker that starts every well-formed record.
pub const FIELD_MARKER: &str = "data: ";

/// Record separator in the wire format.
const RECORD_SEPARATOR: &[u8] = b"\n\n";

/// Stateful decoder turning arbitrary byte chunks into frame payloads.
///
/// Records that do not start with the `data: ` marker are dropped (and
/// counted): partial corruption of one record must never abort the session.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Carry-over bytes of the trailing incomplete record
    buffer: Vec<u8>,
    /// Records dropped for not conforming to the framing or not parsing
    dropped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the payloads of every record it completed.
    ///
    /// The payload is the record text with the `data: ` marker stripped.
    /// The trailing incomplete record (if any) stays buffered for the next
    /// chunk, so any chunking of the same byte stream yields the same
    /// payload sequence.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = find_separator(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..pos + RECORD_SEPARATOR.len()).collect();
            let record = &record[..pos];
            if record.is_empty() {
                // Padding between records, not a frame
                continue;
            }
            let text = String::from_utf8_lossy(record);
            match text.strip_prefix(FIELD_MARKER) {
                Some(payload) => payloads.push(payload.to_string()),
                None => {
                    self.dropped += 1;
                    tracing::warn!(record = %text, "dropping record without data marker");
                }
            }
        }
        payloads
    }

    /// Count of records dropped so far (framing violations plus payloads the
    /// classifier reported back via [`FrameDecoder::note_dropped`]).
    pub fn dropped_records(&self) -> u64 {
        self.dropped
    }

    /// Record that a decoded payload was discarded downstream (bad JSON).
    pub fn note_dropped(&mut self) {
        self.dropped += 1;
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(RECORD_SEPARATOR.len())
        .position(|window| window == RECORD_SEPARATOR)
}
