//! Handler registration for inbound data and closure.

use tokio::sync::mpsc;

use std::sync::Arc;

use crate::traits::{Payload, TransportError};

/// Error returned by a handler that cannot accept a payload.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receives what a transport observes on the wire.
///
/// Callbacks run on the transport's reader task and should return quickly.
/// A handler may call [`Transport::stop`](crate::Transport::stop) from
/// inside either callback.
pub trait TransportHandler: Send + Sync {
    /// Called once per inbound message, in arrival order.
    ///
    /// Returning an error closes the transport: `on_closed` is invoked with
    /// [`TransportError::Handler`] and no further data is delivered.
    fn on_data(&self, payload: Payload) -> Result<(), HandlerError>;

    /// Called exactly once when an open transport terminates.
    ///
    /// `None` means the closure was clean.
    fn on_closed(&self, error: Option<TransportError>);
}

/// An event produced by a [`ChannelHandler`].
#[derive(Debug)]
pub enum TransportEvent {
    /// An inbound payload.
    Data(Payload),
    /// The terminal closure.
    Closed(Option<TransportError>),
}

/// A handler that forwards every callback into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportHandler for ChannelHandler {
    fn on_data(&self, payload: Payload) -> Result<(), HandlerError> {
        self.tx
            .send(TransportEvent::Data(payload))
            .map_err(|_| "event receiver dropped".into())
    }

    fn on_closed(&self, error: Option<TransportError>) {
        let _ = self.tx.send(TransportEvent::Closed(error));
    }
}

/// Create a channel-backed handler and the receiver observing it.
///
/// Dropping the receiver makes the next `on_data` fail, which closes the
/// transport.
#[must_use]
pub fn channel() -> (Arc<ChannelHandler>, mpsc::UnboundedReceiver<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelHandler { tx }), rx)
}
