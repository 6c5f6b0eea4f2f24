//! [`reqwest`]-backed implementation of [`HttpClient`].

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use std::time::Duration;

use tether_protocol::EVENT_STREAM_CONTENT_TYPE;

use super::{EventStream, HttpClient, HttpError, HttpResponse};
use crate::traits::Payload;

/// A [`reqwest`]-backed implementation of [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
    request_timeout: Option<Duration>,
}

impl ReqwestHttpClient {
    /// Create a new reqwest-backed HTTP client with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_client(reqwest::Client::new())
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self {
            inner,
            request_timeout: None,
        }
    }

    /// Bound every POST by `timeout`.
    ///
    /// Polls carry their own timeout and event streams are unbounded.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn request_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Request(Box::new(e))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(
        &self,
        url: &str,
        body: Payload,
        headers: &[(&str, &str)],
    ) -> Result<(), HttpError> {
        let mut builder = self.inner.post(url);
        for &(name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder
            .body(body.into_bytes())
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let resp = self
            .inner
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(request_error)?;

        Ok(HttpResponse { status, body })
    }

    async fn open_event_stream(&self, url: &str) -> Result<EventStream, HttpError> {
        let resp = self
            .inner
            .get(url)
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(HttpError::Status { status, body });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(EVENT_STREAM_CONTENT_TYPE) {
            return Err(HttpError::InvalidResponse(format!(
                "expected {EVENT_STREAM_CONTENT_TYPE}, got `{content_type}`"
            )));
        }

        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(request_error))
            .boxed())
    }
}
