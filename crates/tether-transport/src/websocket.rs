//! WebSocket transport implementation.
//!
//! This module provides a full-duplex client transport using tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::CloseFrame, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::endpoint;
use crate::handler::TransportHandler;
use crate::lifecycle::Lifecycle;
use crate::metrics;
use crate::traits::{Payload, Transport, TransportError, TransportState};

const NAME: &str = "websockets";

/// Close code of a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the peer closed without a status (1005).
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

const NOT_OPEN: &str = "WebSocket is not in the OPEN state";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a socket ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
    /// Whether a closing handshake was received.
    pub was_clean: bool,
}

impl CloseEvent {
    /// A close frame was received from the peer.
    #[must_use]
    pub fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self {
                code: u16::from(frame.code),
                reason: frame.reason.into_owned(),
                was_clean: true,
            },
            None => Self {
                code: NO_STATUS_RECEIVED,
                reason: String::new(),
                was_clean: true,
            },
        }
    }

    /// The connection dropped without a closing handshake.
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: reason.into(),
            was_clean: false,
        }
    }

    /// The error reported to the handler, or `None` for a clean normal closure.
    #[must_use]
    pub fn into_error(self) -> Option<TransportError> {
        if self.was_clean && self.code == NORMAL_CLOSURE {
            None
        } else {
            Some(TransportError::Closed {
                code: self.code,
                reason: self.reason,
            })
        }
    }
}

struct Shared {
    lifecycle: Lifecycle,
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    cancel: CancellationToken,
}

/// WebSocket transport.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
}

impl WebSocketTransport {
    /// Create a new, unconnected WebSocket transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: Lifecycle::new(NAME),
                sink: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str, query: &str) -> Result<(), TransportError> {
        self.shared.lifecycle.begin_connect()?;

        let connect_url = endpoint::full_url(&endpoint::socket_url(url), query);

        let (stream, _response) = match connect_async(connect_url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                error!(url = %connect_url, error = %e, "WebSocket connect failed");
                self.shared.lifecycle.fail_connect();
                return Err(TransportError::Connect(e.to_string()));
            }
        };

        let (sink, stream) = stream.split();
        *self.shared.sink.lock().await = Some(sink);

        if !self.shared.lifecycle.mark_open() {
            debug!(url = %connect_url, "Stopped while connecting, dropping socket");
            if let Some(mut sink) = self.shared.sink.lock().await.take() {
                let _ = sink.close().await;
            }
            return Err(TransportError::Stopped);
        }

        info!(url = %connect_url, "WebSocket connected");

        tokio::spawn(read_loop(Arc::clone(&self.shared), stream));
        Ok(())
    }

    async fn send(&self, data: Payload) -> Result<(), TransportError> {
        if !self.shared.lifecycle.is_open() {
            return Err(TransportError::NotOpen(NOT_OPEN));
        }

        let mut guard = self.shared.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(TransportError::NotOpen(NOT_OPEN));
        };

        let len = data.len();
        let message = match data {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data.to_vec()),
        };

        sink.send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        metrics::record_message(NAME, "outbound", len);
        Ok(())
    }

    fn stop(&self) {
        if self.shared.lifecycle.stop() != TransportState::Closed {
            debug!("WebSocket transport stopped");
        }
        self.shared.cancel.cancel();
    }

    fn set_handler(&self, handler: Arc<dyn TransportHandler>) {
        self.shared.lifecycle.set_handler(handler);
    }

    fn clear_handler(&self) {
        self.shared.lifecycle.clear_handler();
    }

    fn state(&self) -> TransportState {
        self.shared.lifecycle.state()
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: SplitStream<WsStream>) {
    let outcome = loop {
        let msg = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break None,
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "WebSocket data received");
                if shared.lifecycle.deliver(Payload::Text(text)).is_break() {
                    break None;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "WebSocket data received");
                if shared
                    .lifecycle
                    .deliver(Payload::Binary(Bytes::from(data)))
                    .is_break()
                {
                    break None;
                }
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                // Pongs are queued by tungstenite and flushed on the next write
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Received close frame");
                break Some(CloseEvent::from_frame(frame));
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                break Some(CloseEvent::abnormal(e.to_string()));
            }
            None => {
                debug!("WebSocket stream ended");
                break Some(CloseEvent::abnormal("connection closed without a close frame"));
            }
        }
    };

    if let Some(event) = outcome {
        shared.lifecycle.close(event.into_error());
    }

    if let Some(mut sink) = shared.sink.lock().await.take() {
        if let Err(e) = sink.close().await {
            debug!(error = %e, "Closing WebSocket sink failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn test_clean_normal_closure_has_no_error() {
        let event = CloseEvent::from_frame(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }));
        assert_eq!(event.code, NORMAL_CLOSURE);
        assert!(event.into_error().is_none());
    }

    #[test]
    fn test_other_close_code_is_error() {
        let event = CloseEvent::from_frame(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restart".into(),
        }));
        match event.into_error() {
            Some(TransportError::Closed { code, reason }) => {
                assert_eq!(code, 1001);
                assert_eq!(reason, "restart");
            }
            other => panic!("Expected Closed error, got {:?}", other),
        }
    }

    #[test]
    fn test_unclean_normal_code_is_error() {
        let event = CloseEvent {
            code: NORMAL_CLOSURE,
            reason: String::new(),
            was_clean: false,
        };
        assert!(event.into_error().is_some());
    }

    #[test]
    fn test_missing_close_frame() {
        let event = CloseEvent::from_frame(None);
        assert_eq!(event.code, NO_STATUS_RECEIVED);
        assert!(event.into_error().is_some());

        let event = CloseEvent::abnormal("reset");
        assert_eq!(event.code, ABNORMAL_CLOSURE);
        assert!(!event.was_clean);
    }

    #[tokio::test]
    async fn test_send_before_connect_rejects() {
        let transport = WebSocketTransport::new();
        assert!(matches!(
            transport.send("ping".into()).await,
            Err(TransportError::NotOpen(NOT_OPEN))
        ));
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_reported_as_closure() {
        let transport = WebSocketTransport::new();
        let (handler, mut events) = crate::handler::channel();
        transport.set_handler(handler);

        // Port 9 (discard) on localhost is not expected to accept WebSocket clients.
        let result = transport.connect("http://127.0.0.1:9/chat", "").await;
        assert!(result.is_err());
        assert_eq!(transport.state(), TransportState::Closed);
        assert!(events.try_recv().is_err());
    }
}
