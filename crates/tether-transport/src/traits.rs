//! Transport abstraction traits for Tether.
//!
//! These traits define the contract every client transport provides, so the
//! connection manager above can drive a WebSocket, an event stream or a
//! long-polling loop without knowing which one it holds.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::handler::{HandlerError, TransportHandler};
use crate::http::HttpError;

/// A message payload, carried exactly as the endpoint produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Binary(Bytes),
}

impl Payload {
    /// Build a payload from an HTTP response body.
    ///
    /// Bodies that are valid UTF-8 become [`Payload::Text`].
    #[must_use]
    pub fn from_body(body: Bytes) -> Self {
        match std::str::from_utf8(&body) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::Binary(body),
        }
    }

    /// Get the raw bytes of the payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Convert the payload into bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(data) => data,
        }
    }

    /// Get the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the payload as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

/// Lifecycle state of a transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Created, `connect` not yet called.
    Idle,
    /// `connect` is in flight.
    Connecting,
    /// Usable: data may be sent and received.
    Open,
    /// Terminal. Reached by remote closure, failure or `stop`.
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `connect` was called more than once.
    #[error("Transport has already been started")]
    AlreadyStarted,

    /// The transport was stopped before or during the operation.
    #[error("Transport was stopped")]
    Stopped,

    /// The channel is not currently usable.
    #[error("{0}")]
    NotOpen(&'static str),

    /// The environment cannot provide this transport.
    #[error("{0}")]
    Unsupported(String),

    /// Establishing the connection failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The socket closed with anything but a clean normal closure.
    #[error("Websocket closed with status code: {code} ({reason})")]
    Closed {
        /// Close code reported by the peer, or 1006 if none was received.
        code: u16,
        /// Close reason text.
        reason: String,
    },

    /// The event stream failed after it was opened.
    #[error("{0}")]
    EventStream(String),

    /// A poll returned a status other than 200 or 204.
    #[error("Status: {status}, Message: {message}")]
    PollStatus {
        /// HTTP status code.
        status: u16,
        /// Response text.
        message: String,
    },

    /// A poll request failed at the network level.
    #[error("Sending HTTP request failed.")]
    RequestFailed(#[source] HttpError),

    /// Failed to send data over the socket.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// An HTTP operation failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The registered data handler rejected a payload.
    #[error("Data handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// Event-stream framing error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] tether_protocol::ProtocolError),
}

/// A client transport to a single remote endpoint.
///
/// An instance serves exactly one connection attempt: `connect` once, `send`
/// any number of times while open, until the instance reaches
/// [`TransportState::Closed`]. Inbound data and the terminal closure are
/// reported to the registered [`TransportHandler`]; `on_closed` fires at
/// most once, and never after [`stop`](Transport::stop) has returned.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the channel to `url`, appending `query` when non-empty.
    ///
    /// Resolves once the channel can send and receive. Establishment
    /// failures are reported here only, never through `on_closed`.
    async fn connect(&self, url: &str, query: &str) -> Result<(), TransportError>;

    /// Transmit one message.
    ///
    /// Fails if the channel is not open. Messages are never queued.
    async fn send(&self, data: Payload) -> Result<(), TransportError>;

    /// Tear the transport down.
    ///
    /// Idempotent. Once this returns, no handler callback runs for this
    /// instance.
    fn stop(&self);

    /// Register the handler receiving inbound data and the closure.
    fn set_handler(&self, handler: Arc<dyn TransportHandler>);

    /// Remove the registered handler. Later deliveries are dropped.
    fn clear_handler(&self);

    /// Get the current lifecycle state.
    fn state(&self) -> TransportState;

    /// Get the transport name (e.g., "websockets", "longpolling").
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_utf8_body() {
        let payload = Payload::from_body(Bytes::from_static(b"hello"));
        assert_eq!(payload, Payload::Text("hello".into()));
    }

    #[test]
    fn test_payload_from_binary_body() {
        let payload = Payload::from_body(Bytes::from_static(&[0xff, 0xfe]));
        assert_eq!(payload.as_text(), None);
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_error_messages() {
        let err = TransportError::Closed {
            code: 1006,
            reason: "gone".into(),
        };
        assert_eq!(
            err.to_string(),
            "Websocket closed with status code: 1006 (gone)"
        );

        let err = TransportError::PollStatus {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Status: 500, Message: boom");
    }
}
