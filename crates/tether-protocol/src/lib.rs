//! # tether-protocol
//!
//! Wire-level definitions shared by the Tether client transports.
//!
//! The transports themselves do not frame messages; payloads travel exactly
//! as the endpoint sent them. What lives here is the framing of the
//! underlying channels:
//!
//! - `sse` - incremental decoder for `text/event-stream` bodies
//! - [`ENDPOINT_MESSAGES_CONTENT_TYPE`] - media type of outbound posts
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use tether_protocol::sse::EventStreamDecoder;
//!
//! let mut decoder = EventStreamDecoder::new();
//! let mut buf = BytesMut::from(&b"data: hello\n\n"[..]);
//!
//! let event = decoder.decode_from(&mut buf).unwrap().unwrap();
//! assert_eq!(event.data, "hello");
//! ```

pub mod sse;

pub use sse::{Event, EventStreamDecoder, ProtocolError};

/// Media type sent with every outbound message post.
pub const ENDPOINT_MESSAGES_CONTENT_TYPE: &str =
    "application/vnd.microsoft.aspnetcore.endpoint-messages.v1+text";

/// Media type of a server-push event stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
