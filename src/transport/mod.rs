//! Transport engine seam.
//!
//! # Data Flow
//! ```text
//! QUIC engine (packets, TLS, QPACK, frames)
//!     → event.rs (QuicEvent / HttpEvent)
//!     → net::Connection::handle_event
//!     → http handlers → application task
//!
//! handler send()
//!     → Transport primitives (headers, data, datagrams, pushes)
//!     → Transport::transmit
//! ```
//!
//! # Design Decisions
//! - The engine is external; this trait is the whole contract with it
//! - Primitives only buffer frames, `transmit` drains them
//! - One engine per connection, shared by every handler behind a mutex

pub mod event;

use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

pub use event::{
    HeaderField, HttpEvent, HttpVariant, QuicEvent, StreamId, H0_ALPN, H3_ALPN, QUACK, QUACK_ACK,
    SIDUCK_ALPN,
};

/// HTTP/3 application error codes (RFC 9114 Section 8.1).
pub mod error_code {
    pub const H3_NO_ERROR: u64 = 0x100;
    pub const H3_INTERNAL_ERROR: u64 = 0x102;
    pub const H3_ID_ERROR: u64 = 0x108;
}

/// Errors raised by the transport engine.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream {0} is not writable")]
    StreamNotWritable(StreamId),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("no HTTP layer has been negotiated")]
    NoHttpLayer,

    #[error("transport error: {0}")]
    Other(String),
}

/// Errors raised when promising a push.
#[derive(Debug, Error)]
pub enum PushError {
    /// The peer's MAX_PUSH_ID has been reached.
    #[error("no push id available")]
    NoAvailablePushId,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The primitives a QUIC/HTTP-3 engine exposes to the bridge.
///
/// Implementations buffer frames; nothing leaves the engine until
/// [`Transport::transmit`] is called.
pub trait Transport: Send + 'static {
    /// Switch the engine's HTTP layer after ALPN negotiation.
    fn set_http_variant(&mut self, variant: HttpVariant);

    /// Address of the peer on the active network path.
    fn peer_addr(&self) -> Option<SocketAddr>;

    fn send_headers(
        &mut self,
        stream_id: StreamId,
        headers: &[HeaderField],
        end_stream: bool,
    ) -> Result<(), TransportError>;

    fn send_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), TransportError>;

    /// Send an HTTP datagram tagged with a session's flow id.
    fn send_datagram(&mut self, flow_id: StreamId, data: Bytes) -> Result<(), TransportError>;

    /// Write raw bytes on a QUIC stream, bypassing HTTP framing.
    fn send_stream_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), TransportError>;

    /// Promise a push on `stream_id`, returning the push stream id.
    fn send_push_promise(
        &mut self,
        stream_id: StreamId,
        headers: &[HeaderField],
    ) -> Result<StreamId, PushError>;

    /// Send a QUIC DATAGRAM frame outside any HTTP session.
    fn send_datagram_frame(&mut self, data: Bytes) -> Result<(), TransportError>;

    fn reset_stream(&mut self, stream_id: StreamId, error_code: u64) -> Result<(), TransportError>;

    /// Close the whole connection.
    fn close(&mut self, error_code: u64, reason: &str);

    /// Flush buffered frames. Cheap and safe to call repeatedly.
    fn transmit(&mut self);
}
