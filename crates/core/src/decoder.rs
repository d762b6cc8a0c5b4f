use std::fmt::{self, Display};

use serde::Deserialize;
use serde_json::{Map, Value};

/// The literal prefix of an event record.
pub const EVENT_PREFIX: &str = "data: ";

/// Splits a chunked byte stream into newline-terminated records.
///
/// Chunks may end anywhere, including in the middle of a UTF-8 sequence.
/// Incomplete trailing bytes are kept until the next chunk completes them,
/// and an unterminated record stays buffered until its newline arrives.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    // Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    pending: Vec<u8>,
    buf: String,
    // Length of the prefix of `buf` known to hold no newline.
    scanned: usize,
}

impl RecordDecoder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, pushing every record it completes into `records`.
    pub fn feed(&mut self, chunk: &[u8], records: &mut Vec<String>) {
        self.decode(chunk);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(eol) = self.buf[from..].find('\n') {
            let end = from + eol;
            let line = &self.buf[start..end];
            records.push(line.strip_suffix('\r').unwrap_or(line).to_owned());
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
    }

    /// Returns the number of bytes waiting for more data.
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.pending.len() + self.buf.len()
    }

    fn decode(&mut self, chunk: &[u8]) {
        let Self { pending, buf, .. } = self;
        pending.extend_from_slice(chunk);

        let mut start = 0;
        loop {
            match std::str::from_utf8(&pending[start..]) {
                Ok(s) => {
                    buf.push_str(s);
                    start = pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    buf.push_str(&String::from_utf8_lossy(
                        &pending[start..valid_end],
                    ));
                    match err.error_len() {
                        Some(len) => {
                            buf.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            // The sequence may be completed by the next chunk.
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        pending.drain(..start);
    }
}

#[derive(Deserialize)]
struct EventPayload {
    token: Option<String>,
}

/// Error for a record that carries the event prefix but no valid payload.
#[derive(Debug)]
pub struct MalformedRecord(serde_json::Error);

impl Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed event payload: {}", self.0)
    }
}

/// Extracts the text token of a record.
///
/// Returns `Ok(None)` for records that contribute no text: empty lines,
/// lines without the event prefix, and payloads without a `token` key.
pub fn parse_record(record: &str) -> Result<Option<String>, MalformedRecord> {
    let Some(payload) = record.strip_prefix(EVENT_PREFIX) else {
        return Ok(None);
    };
    // Derived struct impls also accept arrays, so require an object first.
    let payload = serde_json::from_str::<Map<String, Value>>(payload)
        .map_err(MalformedRecord)?;
    let payload = EventPayload::deserialize(Value::Object(payload))
        .map_err(MalformedRecord)?;
    Ok(payload.token)
}
