//! Transport kinds.
//!
//! Deciding which kind to try, and in what order, belongs to the connection
//! manager. This module only names the kinds and builds instances of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::http::HttpClient;
use crate::long_polling::LongPollingTransport;
use crate::server_sent_events::ServerSentEventsTransport;
use crate::traits::{Transport, TransportError};

/// The available transport kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    /// Full-duplex WebSocket.
    #[serde(rename = "websockets", alias = "websocket", alias = "ws")]
    WebSockets,
    /// Server push over `text/event-stream`, posts for outbound.
    #[serde(rename = "serversentevents", alias = "sse")]
    ServerSentEvents,
    /// Repeated GET requests, posts for outbound.
    #[serde(rename = "longpolling", alias = "long-polling", alias = "poll")]
    LongPolling,
}

impl TransportType {
    /// All kinds, in no particular preference order.
    pub const ALL: [TransportType; 3] = [
        TransportType::WebSockets,
        TransportType::ServerSentEvents,
        TransportType::LongPolling,
    ];

    /// Get the canonical name, as reported by [`Transport::name`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransportType::WebSockets => "websockets",
            TransportType::ServerSentEvents => "serversentevents",
            TransportType::LongPolling => "longpolling",
        }
    }

    /// Build an unconnected transport of this kind.
    ///
    /// The HTTP-based kinds post and poll through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] if the kind was compiled out.
    pub fn create(self, client: Arc<dyn HttpClient>) -> Result<Box<dyn Transport>, TransportError> {
        match self {
            #[cfg(feature = "websocket")]
            TransportType::WebSockets => {
                drop(client);
                Ok(Box::new(crate::websocket::WebSocketTransport::new()))
            }
            #[cfg(not(feature = "websocket"))]
            TransportType::WebSockets => {
                drop(client);
                Err(TransportError::Unsupported(
                    "WebSockets support not compiled in".into(),
                ))
            }
            TransportType::ServerSentEvents => Ok(Box::new(ServerSentEventsTransport::new(client))),
            TransportType::LongPolling => Ok(Box::new(LongPollingTransport::new(client))),
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportType::WebSockets => "WebSockets",
            TransportType::ServerSentEvents => "ServerSentEvents",
            TransportType::LongPolling => "LongPolling",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unknown transport name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown transport type: {0}")]
pub struct ParseTransportTypeError(String);

impl FromStr for TransportType {
    type Err = ParseTransportTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websockets" | "websocket" | "ws" => Ok(TransportType::WebSockets),
            "serversentevents" | "sse" => Ok(TransportType::ServerSentEvents),
            "longpolling" | "long-polling" | "poll" => Ok(TransportType::LongPolling),
            _ => Err(ParseTransportTypeError(s.to_string())),
        }
    }
}
