//! Long-polling transport implementation.
//!
//! A duplex channel built from a loop of GET requests: each poll waits for
//! the server to answer or for the poll timeout to elapse, then the next
//! poll is issued. Outbound messages are independent HTTP posts.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::endpoint;
use crate::handler::TransportHandler;
use crate::http::{self, HttpClient, HttpError, HttpResponse};
use crate::lifecycle::Lifecycle;
use crate::metrics;
use crate::traits::{Payload, Transport, TransportError, TransportState};

const NAME: &str = "longpolling";

const NOT_OPEN: &str = "Long polling is not running";

/// Default client-side timeout of a single poll (110 seconds).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(110);

/// What a finished poll means for the loop.
#[derive(Debug)]
enum PollOutcome {
    /// 200: deliver the body, then poll again.
    Data(Payload),
    /// The poll timed out: poll again.
    Timeout,
    /// Terminal: 204 is clean, anything else carries an error.
    Closed(Option<TransportError>),
}

impl PollOutcome {
    fn from_result(result: Result<HttpResponse, HttpError>) -> Self {
        match result {
            Ok(resp) if resp.status == 200 => PollOutcome::Data(resp.into_payload()),
            Ok(resp) if resp.status == 204 => PollOutcome::Closed(None),
            Ok(resp) => PollOutcome::Closed(Some(TransportError::PollStatus {
                status: resp.status,
                message: resp.text(),
            })),
            Err(HttpError::Timeout) => PollOutcome::Timeout,
            Err(e) => PollOutcome::Closed(Some(TransportError::RequestFailed(e))),
        }
    }
}

struct Shared {
    lifecycle: Lifecycle,
    cancel: CancellationToken,
}

/// Long-polling transport.
pub struct LongPollingTransport {
    client: Arc<dyn HttpClient>,
    poll_timeout: Duration,
    full_url: OnceLock<String>,
    shared: Arc<Shared>,
}

impl LongPollingTransport {
    /// Create a new, unconnected transport polling through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            full_url: OnceLock::new(),
            shared: Arc::new(Shared {
                lifecycle: Lifecycle::new(NAME),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Set the client-side timeout of each poll.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Get the client-side timeout of each poll.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }
}

#[async_trait]
impl Transport for LongPollingTransport {
    async fn connect(&self, url: &str, query: &str) -> Result<(), TransportError> {
        self.shared.lifecycle.begin_connect()?;

        let full_url = endpoint::full_url(url, query);
        let _ = self.full_url.set(full_url.clone());

        if !self.shared.lifecycle.mark_open() {
            return Err(TransportError::Stopped);
        }

        info!(url = %full_url, "Long polling started");

        tokio::spawn(poll_loop(
            Arc::clone(&self.client),
            Arc::clone(&self.shared),
            full_url,
            self.poll_timeout,
        ));
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
            debug!("Long polling stopped");
        }
        // Dropping the in-flight poll future aborts the request
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

impl Drop for LongPollingTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    client: Arc<dyn HttpClient>,
    shared: Arc<Shared>,
    url: String,
    poll_timeout: Duration,
) {
    loop {
        if !shared.lifecycle.is_open() {
            break;
        }

        let result = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            result = client.get(&url, poll_timeout) => result,
        };

        // stop() may have landed while the response was in flight
        if !shared.lifecycle.is_open() {
            break;
        }

        match PollOutcome::from_result(result) {
            PollOutcome::Data(payload) => {
                debug!(len = payload.len(), "Long polling data received");
                if shared.lifecycle.deliver(payload).is_break() {
                    break;
                }
            }
            PollOutcome::Timeout => trace!("Poll timed out, polling again"),
            PollOutcome::Closed(error) => {
                shared.lifecycle.close(error);
                break;
            }
        }
    }

    debug!("Poll loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_ok_delivers_body() {
        let outcome = PollOutcome::from_result(Ok(HttpResponse::new(200, "pong")));
        match outcome {
            PollOutcome::Data(payload) => assert_eq!(payload, Payload::Text("pong".into())),
            other => panic!("Expected Data, got {:?}", other),
        }
    }

    #[test]
    fn test_no_content_is_clean_close() {
        let outcome = PollOutcome::from_result(Ok(HttpResponse::new(204, Bytes::new())));
        assert!(matches!(outcome, PollOutcome::Closed(None)));
    }

    #[test]
    fn test_other_status_carries_status_and_text() {
        let outcome = PollOutcome::from_result(Ok(HttpResponse::new(404, "No Connection")));
        match outcome {
            PollOutcome::Closed(Some(err)) => {
                assert_eq!(err.to_string(), "Status: 404, Message: No Connection");
            }
            other => panic!("Expected Closed with error, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_keeps_polling() {
        let outcome = PollOutcome::from_result(Err(HttpError::Timeout));
        assert!(matches!(outcome, PollOutcome::Timeout));
    }

    #[test]
    fn test_network_failure_is_generic() {
        let outcome = PollOutcome::from_result(Err(HttpError::Request("refused".into())));
        match outcome {
            PollOutcome::Closed(Some(err)) => {
                assert_eq!(err.to_string(), "Sending HTTP request failed.");
            }
            other => panic!("Expected Closed with error, got {:?}", other),
        }
    }
}
