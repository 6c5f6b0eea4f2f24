//! Decoder for `text/event-stream` bodies.
//!
//! The decoder is incremental: feed it whatever chunks arrive from the
//! network and it yields complete events once their terminating blank line
//! has been seen. Bytes belonging to an unfinished line stay in the buffer.

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Maximum length of a single unterminated line (1 MiB).
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

/// Event type assigned when the stream does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Protocol errors that can occur while decoding an event stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A line grew past [`MAX_LINE_SIZE`] without a line ending.
    #[error("Line size {0} exceeds maximum {MAX_LINE_SIZE}")]
    LineTooLong(usize),
}

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type, `"message"` unless an `event:` field set it.
    pub event_type: String,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
    /// Last event ID seen on the stream at dispatch time.
    pub id: Option<String>,
}

impl Event {
    /// Whether this event is delivered through the default message handler.
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    data: String,
    event_type: String,
    last_event_id: Option<String>,
    retry: Option<u64>,
    // The previous chunk ended in CR; a leading LF belongs to that line ending.
    skip_lf: bool,
    bom_checked: bool,
}

impl EventStreamDecoder {
    /// Create a decoder positioned at the start of a stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnection time in milliseconds announced by the last `retry:` field.
    #[must_use]
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Try to decode the next event from a buffer, advancing it past every
    /// line consumed.
    ///
    /// Returns `Ok(Some(event))` when an event was dispatched, `Ok(None)` if
    /// more data is needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::LineTooLong`] if an unterminated line exceeds
    /// [`MAX_LINE_SIZE`].
    pub fn decode_from(&mut self, buf: &mut BytesMut) -> Result<Option<Event>, ProtocolError> {
        loop {
            if self.skip_lf && !buf.is_empty() {
                if buf[0] == b'\n' {
                    buf.advance(1);
                }
                self.skip_lf = false;
            }

            if !self.bom_checked {
                if buf.len() < BOM.len() && BOM.starts_with(&buf[..]) {
                    return Ok(None);
                }
                if buf.starts_with(BOM) {
                    buf.advance(BOM.len());
                }
                self.bom_checked = true;
            }

            let Some(pos) = buf.iter().position(|&b| b == b'\n' || b == b'\r') else {
                if buf.len() > MAX_LINE_SIZE {
                    return Err(ProtocolError::LineTooLong(buf.len()));
                }
                return Ok(None);
            };

            let line = buf.split_to(pos);
            let terminator = buf[0];
            buf.advance(1);
            if terminator == b'\r' {
                if buf.is_empty() {
                    self.skip_lf = true;
                } else if buf[0] == b'\n' {
                    buf.advance(1);
                }
            }

            if let Some(event) = self.process_line(&line) {
                return Ok(Some(event));
            }
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line[0] == b':' {
            return None;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(i) => {
                let mut value = &line[i + 1..];
                if value.first() == Some(&b' ') {
                    value = &value[1..];
                }
                (&line[..i], value)
            }
            None => (line, &[][..]),
        };
        let value = String::from_utf8_lossy(value);

        match field {
            b"data" => {
                self.data.push_str(&value);
                self.data.push('\n');
            }
            b"event" => self.event_type = value.into_owned(),
            b"id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.into_owned());
                }
            }
            b"retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<Event> {
        if self.data.is_empty() {
            self.event_type.clear();
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        let event_type = match std::mem::take(&mut self.event_type) {
            t if t.is_empty() => DEFAULT_EVENT_TYPE.to_string(),
            t => t,
        };

        Some(Event {
            event_type,
            data,
            id: self.last_event_id.clone(),
        })
    }
}
