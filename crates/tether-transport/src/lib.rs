//! # tether-transport
//!
//! Client transports for the Tether realtime client.
//!
//! This crate lets a connection manager exchange messages with a remote
//! endpoint over one of three interchangeable mechanisms:
//!
//! - **WebSockets** - one full-duplex socket
//! - **Server-Sent Events** - a server-push stream plus HTTP posts
//! - **Long polling** - a loop of GET requests plus HTTP posts
//!
//! ## Transport Abstraction
//!
//! All transports implement the [`Transport`] trait. Inbound payloads and
//! the terminal closure are reported to a registered [`TransportHandler`];
//! [`handler::channel`] turns them into a stream of [`TransportEvent`]s.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_transport::{handler, ReqwestHttpClient, TransportEvent, TransportType};
//!
//! async fn run() -> Result<(), tether_transport::TransportError> {
//!     let client = Arc::new(ReqwestHttpClient::new());
//!     let transport = TransportType::LongPolling.create(client)?;
//!
//!     let (handler, mut events) = handler::channel();
//!     transport.set_handler(handler);
//!     transport.connect("http://localhost:5000/chat", "id=42").await?;
//!     transport.send("ping".into()).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             TransportEvent::Data(payload) => println!("{:?}", payload),
//!             TransportEvent::Closed(_) => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod endpoint;
pub mod handler;
pub mod http;
pub mod kind;
pub mod long_polling;
pub mod metrics;
pub mod server_sent_events;
pub mod traits;

mod lifecycle;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use handler::{ChannelHandler, HandlerError, TransportEvent, TransportHandler};
pub use http::{HttpClient, HttpError, HttpResponse, MESSAGE_HEADERS};
pub use kind::TransportType;
pub use long_polling::LongPollingTransport;
pub use server_sent_events::ServerSentEventsTransport;
pub use traits::{Payload, Transport, TransportError, TransportState};

#[cfg(feature = "reqwest")]
pub use http::ReqwestHttpClient;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
