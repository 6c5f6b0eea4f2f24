//! Server-Sent Events transport implementation.
//!
//! Inbound messages arrive on a `text/event-stream` response; outbound
//! messages are independent HTTP posts to the same URL.

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use tether_protocol::EventStreamDecoder;

use crate::endpoint;
use crate::handler::TransportHandler;
use crate::http::{self, EventStream, HttpClient, HttpError};
use crate::lifecycle::Lifecycle;
use crate::metrics;
use crate::traits::{Payload, Transport, TransportError, TransportState};

const NAME: &str = "serversentevents";

const NOT_OPEN: &str = "Event stream is not open";

/// Message used when the stream fails without saying why.
pub const GENERIC_ERROR: &str = "Error occurred";

struct Shared {
    lifecycle: Lifecycle,
    cancel: CancellationToken,
}

/// Server-Sent Events transport.
pub struct ServerSentEventsTransport {
    client: Arc<dyn HttpClient>,
    full_url: OnceLock<String>,
    shared: Arc<Shared>,
}

impl ServerSentEventsTransport {
    /// Create a new, unconnected transport posting through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            full_url: OnceLock::new(),
            shared: Arc::new(Shared {
                lifecycle: Lifecycle::new(NAME),
                cancel: CancellationToken::new(),
            }),
        }
    }
}

fn stream_error(message: String) -> TransportError {
    if message.is_empty() {
        TransportError::EventStream(GENERIC_ERROR.to_string())
    } else {
        TransportError::EventStream(message)
    }
}

#[async_trait]
impl Transport for ServerSentEventsTransport {
    async fn connect(&self, url: &str, query: &str) -> Result<(), TransportError> {
        self.shared.lifecycle.begin_connect()?;

        let full_url = endpoint::full_url(url, query);
        let _ = self.full_url.set(full_url.clone());

        let stream = match self.client.open_event_stream(&full_url).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(url = %full_url, error = %e, "Event stream failed to open");
                self.shared.lifecycle.fail_connect();
                return Err(match e {
                    HttpError::Unsupported(_) => TransportError::Unsupported(e.to_string()),
                    e => TransportError::Http(e),
                });
            }
        };

        if !self.shared.lifecycle.mark_open() {
            debug!(url = %full_url, "Stopped while connecting, dropping event stream");
            return Err(TransportError::Stopped);
        }

        info!(url = %full_url, "SSE connected");

        tokio::spawn(read_loop(Arc::clone(&self.shared), stream));
        Ok(())
    }

    async fn send(&self, data: Payload) -> Result<(), TransportError> {
        if !self.shared.lifecycle.is_open() {
            return Err(TransportError::NotOpen(NOT_OPEN));
        }
        let url = self.full_url.get().ok_or(TransportError::NotOpen(NOT_OPEN))?;

        let len = data.len();
        http::post_message(self.client.as_ref(), url, data).await?;
        metrics::record_message(NAME, "outbound", len);
        Ok(())
    }

    fn stop(&self) {
        if self.shared.lifecycle.stop() != TransportState::Closed {
            debug!("SSE transport stopped");
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

impl Drop for ServerSentEventsTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: EventStream) {
    let mut decoder = EventStreamDecoder::new();
    let mut buf = BytesMut::new();

    let error = 'read: loop {
        let chunk = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                buf.extend_from_slice(&bytes);
                loop {
                    match decoder.decode_from(&mut buf) {
                        Ok(Some(event)) if event.is_message() => {
                            debug!(len = event.data.len(), "SSE data received");
                            if shared.lifecycle.deliver(Payload::Text(event.data)).is_break() {
                                return;
                            }
                        }
                        Ok(Some(event)) => {
                            trace!(event_type = %event.event_type, "Skipping non-message event");
                        }
                        Ok(None) => break,
                        Err(e) => break 'read TransportError::Protocol(e),
                    }
                }
            }
            Some(Err(e)) => break stream_error(e.to_string()),
            None => {
                debug!("Event stream ended");
                break stream_error(String::new());
            }
        }
    };

    shared.lifecycle.close(Some(error));
}
