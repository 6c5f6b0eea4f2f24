//! Shared helpers for the transport integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tether_transport::{
    HandlerError, HttpClient, HttpError, HttpResponse, Payload, TransportError, TransportEvent,
    TransportHandler,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const WAIT: Duration = Duration::from_secs(5);

/// Quiet period used to assert that nothing else happens.
pub const SETTLE: Duration = Duration::from_millis(200);

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Wait for the next transport event.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

/// Assert no event arrives within [`SETTLE`].
pub async fn assert_no_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) {
    tokio::time::sleep(SETTLE).await;
    if let Ok(event) = events.try_recv() {
        panic!("unexpected event: {:?}", event);
    }
}

/// One scripted answer to a poll.
pub enum Step {
    /// Answer immediately.
    Respond(Result<HttpResponse, HttpError>),
    /// Answer once the sender fires.
    Gate(oneshot::Receiver<Result<HttpResponse, HttpError>>),
}

impl Step {
    pub fn status(status: u16, body: &'static str) -> Self {
        Step::Respond(Ok(HttpResponse::new(status, body)))
    }

    pub fn timeout() -> Self {
        Step::Respond(Err(HttpError::Timeout))
    }
}

/// An [`HttpClient`] answering polls from a script.
///
/// Once the script runs out, polls stay outstanding forever.
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    polls_tx: mpsc::UnboundedSender<(String, Duration)>,
    pub posts: Mutex<Vec<(String, Payload, Vec<(String, String)>)>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> (Self, mpsc::UnboundedReceiver<(String, Duration)>) {
        let (polls_tx, polls_rx) = mpsc::unbounded_channel();
        let client = Self {
            steps: Mutex::new(steps.into()),
            polls_tx,
            posts: Mutex::new(Vec::new()),
        };
        (client, polls_rx)
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn post(
        &self,
        url: &str,
        body: Payload,
        headers: &[(&str, &str)],
    ) -> Result<(), HttpError> {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.posts.lock().push((url.to_string(), body, headers));
        Ok(())
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let _ = self.polls_tx.send((url.to_string(), timeout));
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Gate(rx)) => match rx.await {
                Ok(result) => result,
                Err(_) => std::future::pending().await,
            },
            None => std::future::pending().await,
        }
    }
}

/// Wait for the next poll to be issued.
pub async fn next_poll(polls: &mut mpsc::UnboundedReceiver<(String, Duration)>) -> (String, Duration) {
    tokio::time::timeout(WAIT, polls.recv())
        .await
        .expect("timed out waiting for poll")
        .expect("poll channel closed")
}

/// A handler that fails every delivery and reports each closure.
pub struct RejectingHandler {
    closed: mpsc::UnboundedSender<Option<TransportError>>,
}

impl RejectingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Option<TransportError>>) {
        let (closed, closed_rx) = mpsc::unbounded_channel();
        (Arc::new(Self { closed }), closed_rx)
    }
}

impl TransportHandler for RejectingHandler {
    fn on_data(&self, _payload: Payload) -> Result<(), HandlerError> {
        Err("cannot parse payload".into())
    }

    fn on_closed(&self, error: Option<TransportError>) {
        let _ = self.closed.send(error);
    }
}

/// Wait for the closure reported to a [`RejectingHandler`].
pub async fn next_closure(
    closed: &mut mpsc::UnboundedReceiver<Option<TransportError>>,
) -> Option<TransportError> {
    tokio::time::timeout(WAIT, closed.recv())
        .await
        .expect("timed out waiting for closure")
        .expect("closure channel closed")
}
