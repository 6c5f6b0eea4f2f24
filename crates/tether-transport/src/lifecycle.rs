//! Shared lifecycle state machine for the transports.
//!
//! Every transport owns one [`Lifecycle`]. It holds the explicit
//! [`TransportState`] and the registered handler, and is the only place
//! callbacks are invoked from. Callbacks run under a re-entrant dispatch
//! lock which `stop` also takes, so `stop` returning means no callback is
//! running and none will run.

use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::handler::TransportHandler;
use crate::metrics;
use crate::traits::{Payload, TransportError, TransportState};

/// Whether a reader loop should keep going after a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Break,
}

impl Flow {
    pub(crate) fn is_break(self) -> bool {
        self == Flow::Break
    }
}

enum HandlerSlot {
    Unassigned,
    Registered(Arc<dyn TransportHandler>),
    Cleared,
}

impl HandlerSlot {
    fn current(&self) -> Option<Arc<dyn TransportHandler>> {
        match self {
            HandlerSlot::Registered(handler) => Some(Arc::clone(handler)),
            HandlerSlot::Unassigned | HandlerSlot::Cleared => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            HandlerSlot::Unassigned => "unassigned",
            HandlerSlot::Registered(_) => "registered",
            HandlerSlot::Cleared => "cleared",
        }
    }
}

struct Inner {
    state: TransportState,
    handler: HandlerSlot,
}

pub(crate) struct Lifecycle {
    transport: &'static str,
    dispatch: ReentrantMutex<()>,
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub(crate) fn new(transport: &'static str) -> Self {
        Self {
            transport,
            dispatch: ReentrantMutex::new(()),
            inner: Mutex::new(Inner {
                state: TransportState::Idle,
                handler: HandlerSlot::Unassigned,
            }),
        }
    }

    pub(crate) fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }

    pub(crate) fn set_handler(&self, handler: Arc<dyn TransportHandler>) {
        self.inner.lock().handler = HandlerSlot::Registered(handler);
    }

    pub(crate) fn clear_handler(&self) {
        self.inner.lock().handler = HandlerSlot::Cleared;
    }

    /// Move `Idle -> Connecting`. A transport connects at most once.
    pub(crate) fn begin_connect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        match inner.state {
            TransportState::Idle => {
                inner.state = TransportState::Connecting;
                Ok(())
            }
            TransportState::Closed => Err(TransportError::Stopped),
            TransportState::Connecting | TransportState::Open => {
                Err(TransportError::AlreadyStarted)
            }
        }
    }

    /// Move `Connecting -> Open`. Returns `false` if `stop` won the race.
    pub(crate) fn mark_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != TransportState::Connecting {
            return false;
        }
        inner.state = TransportState::Open;
        true
    }

    /// Establishment failed. The caller reports it through `connect` only.
    pub(crate) fn fail_connect(&self) {
        let mut inner = self.inner.lock();
        if inner.state == TransportState::Connecting {
            inner.state = TransportState::Closed;
        }
    }

    /// Hand an inbound payload to the handler.
    ///
    /// A handler error becomes the fatal closure of the transport.
    pub(crate) fn deliver(&self, payload: Payload) -> Flow {
        let _dispatch = self.dispatch.lock();

        let handler = {
            let inner = self.inner.lock();
            if inner.state != TransportState::Open {
                return Flow::Break;
            }
            match inner.handler.current() {
                Some(handler) => handler,
                None => {
                    trace!(
                        transport = self.transport,
                        handler = inner.handler.describe(),
                        "Dropping payload, no handler"
                    );
                    return Flow::Continue;
                }
            }
        };

        metrics::record_message(self.transport, "inbound", payload.len());

        match handler.on_data(payload) {
            Ok(()) if self.is_open() => Flow::Continue,
            Ok(()) => Flow::Break,
            Err(e) => {
                self.close(Some(TransportError::Handler(e)));
                Flow::Break
            }
        }
    }

    /// Report the terminal closure of an open transport.
    ///
    /// Fires `on_closed` at most once; does nothing unless the state is
    /// `Open`. Returns whether this call performed the closure.
    pub(crate) fn close(&self, error: Option<TransportError>) -> bool {
        let _dispatch = self.dispatch.lock();

        let handler = {
            let mut inner = self.inner.lock();
            if inner.state != TransportState::Open {
                return false;
            }
            inner.state = TransportState::Closed;
            inner.handler.current()
        };

        match &error {
            Some(e) => warn!(transport = self.transport, error = %e, "Transport closed with error"),
            None => debug!(transport = self.transport, "Transport closed"),
        }
        metrics::record_closure(self.transport, error.is_none());

        if let Some(handler) = handler {
            handler.on_closed(error);
        }
        true
    }

    /// Silence the transport. Returns the state it was in.
    pub(crate) fn stop(&self) -> TransportState {
        let _dispatch = self.dispatch.lock();
        let mut inner = self.inner.lock();
        std::mem::replace(&mut inner.state, TransportState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        data: AtomicUsize,
        closed: AtomicUsize,
        fail_data: bool,
    }

    impl TransportHandler for Counting {
        fn on_data(&self, _payload: Payload) -> Result<(), HandlerError> {
            self.data.fetch_add(1, Ordering::SeqCst);
            if self.fail_data {
                return Err("rejected".into());
            }
            Ok(())
        }

        fn on_closed(&self, _error: Option<TransportError>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open_lifecycle(handler: Arc<Counting>) -> Lifecycle {
        let lifecycle = Lifecycle::new("test");
        lifecycle.set_handler(handler);
        lifecycle.begin_connect().unwrap();
        assert!(lifecycle.mark_open());
        lifecycle
    }

    #[test]
    fn test_connect_only_once() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.begin_connect().unwrap();
        assert!(matches!(
            lifecycle.begin_connect(),
            Err(TransportError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_close_fires_at_most_once() {
        let handler = Arc::new(Counting::default());
        let lifecycle = open_lifecycle(Arc::clone(&handler));

        assert!(lifecycle.close(None));
        assert!(!lifecycle.close(Some(TransportError::RequestFailed(
            crate::http::HttpError::Timeout
        ))));
        assert_eq!(handler.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_before_open_is_silent() {
        let handler = Arc::new(Counting::default());
        let lifecycle = Lifecycle::new("test");
        lifecycle.set_handler(handler.clone());
        lifecycle.begin_connect().unwrap();

        assert!(!lifecycle.close(Some(TransportError::Connect("refused".into()))));
        lifecycle.fail_connect();

        assert_eq!(lifecycle.state(), TransportState::Closed);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_silences_deliveries() {
        let handler = Arc::new(Counting::default());
        let lifecycle = open_lifecycle(Arc::clone(&handler));

        assert_eq!(lifecycle.stop(), TransportState::Open);
        assert_eq!(lifecycle.deliver("late".into()), Flow::Break);
        assert!(!lifecycle.close(None));

        assert_eq!(handler.data.load(Ordering::SeqCst), 0);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_during_connect_prevents_open() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.begin_connect().unwrap();
        lifecycle.stop();
        assert!(!lifecycle.mark_open());
    }

    #[test]
    fn test_handler_error_closes_transport() {
        let handler = Arc::new(Counting {
            fail_data: true,
            ..Default::default()
        });
        let lifecycle = open_lifecycle(Arc::clone(&handler));

        assert_eq!(lifecycle.deliver("bad".into()), Flow::Break);
        assert_eq!(lifecycle.deliver("more".into()), Flow::Break);

        assert_eq!(handler.data.load(Ordering::SeqCst), 1);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), TransportState::Closed);
    }

    #[test]
    fn test_cleared_handler_drops_data() {
        let handler = Arc::new(Counting::default());
        let lifecycle = open_lifecycle(Arc::clone(&handler));
        lifecycle.clear_handler();

        assert_eq!(lifecycle.deliver("dropped".into()), Flow::Continue);
        assert_eq!(handler.data.load(Ordering::SeqCst), 0);
    }

    struct StopsOnData {
        lifecycle: Arc<Lifecycle>,
    }

    impl TransportHandler for StopsOnData {
        fn on_data(&self, _payload: Payload) -> Result<(), HandlerError> {
            self.lifecycle.stop();
            Ok(())
        }

        fn on_closed(&self, _error: Option<TransportError>) {
            panic!("closure must not be reported after stop");
        }
    }

    #[test]
    fn test_stop_from_inside_callback() {
        let lifecycle = Arc::new(Lifecycle::new("test"));
        lifecycle.set_handler(Arc::new(StopsOnData {
            lifecycle: Arc::clone(&lifecycle),
        }));
        lifecycle.begin_connect().unwrap();
        assert!(lifecycle.mark_open());

        assert_eq!(lifecycle.deliver("bye".into()), Flow::Break);
        assert!(!lifecycle.close(None));
    }
}
