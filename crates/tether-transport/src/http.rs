//! HTTP capability consumed by the HTTP-based transports.
//!
//! The transports never talk to an HTTP stack directly. They take an
//! [`HttpClient`], which keeps them portable and lets tests script the
//! request/response cycles of a long-polling loop.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

use tether_protocol::ENDPOINT_MESSAGES_CONTENT_TYPE;

use crate::traits::Payload;

#[cfg(feature = "reqwest")]
mod reqwest_client;

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestHttpClient;

/// Headers sent with every outbound message post.
pub static MESSAGE_HEADERS: &[(&str, &str)] = &[("Content-Type", ENDPOINT_MESSAGES_CONTENT_TYPE)];

/// A stream of event-stream body chunks.
pub type EventStream = BoxStream<'static, Result<Bytes, HttpError>>;

/// HTTP errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be completed.
    #[error("HTTP request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The server answered with an unexpected status.
    #[error("HTTP request returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response text.
        body: String,
    },

    /// The request did not complete within its timeout.
    #[error("HTTP request timed out")]
    Timeout,

    /// The client cannot perform this kind of request.
    #[error("{0} not supported by the HTTP client")]
    Unsupported(&'static str),

    /// The response was not what the transport expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response body bytes.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The body decoded as text, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert the body into a payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        Payload::from_body(self.body)
    }
}

/// A minimal async HTTP client.
///
/// Implementations handle the mechanics of making requests (TLS,
/// connection pooling, etc.) while this trait exposes only what the
/// transports need.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a POST request. Non-success statuses are errors.
    async fn post(
        &self,
        url: &str,
        body: Payload,
        headers: &[(&str, &str)],
    ) -> Result<(), HttpError>;

    /// Send a GET request bounded by `timeout` and return the response,
    /// whatever its status.
    ///
    /// Must return [`HttpError::Timeout`] when the timeout elapses.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError>;

    /// Open a `text/event-stream` GET and return its body chunks.
    ///
    /// Resolves once the response head has been accepted. The default
    /// implementation reports that server push is unsupported.
    async fn open_event_stream(&self, url: &str) -> Result<EventStream, HttpError> {
        let _ = url;
        Err(HttpError::Unsupported("Server-sent events"))
    }
}

/// POST one message to `url` with [`MESSAGE_HEADERS`].
///
/// # Errors
///
/// Returns the client's error unchanged. There is no retry.
pub async fn post_message(
    client: &dyn HttpClient,
    url: &str,
    payload: Payload,
) -> Result<(), HttpError> {
    client.post(url, payload, MESSAGE_HEADERS).await
}
