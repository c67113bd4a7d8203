//! Events delivered by the QUIC/HTTP-3 engine.
//!
//! The engine decodes frames itself; the bridge only ever sees these typed
//! events, each tagged with the identifier used to route it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// QUIC stream identifier. Session and flow ids share the same space.
pub type StreamId = u64;

/// ALPN identifiers that select the HTTP/3 layer.
pub const H3_ALPN: &[&str] = &["h3"];

/// ALPN identifiers that select the HTTP/0.9 layer.
pub const H0_ALPN: &[&str] = &["hq-interop"];

/// ALPN identifier of the datagram liveness check.
pub const SIDUCK_ALPN: &str = "siduck";

/// Quack payload and its acknowledgement.
pub const QUACK: &[u8] = b"quack";
pub const QUACK_ACK: &[u8] = b"quack-ack";

/// A single header or pseudo-header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True for `:method`, `:path` and the other request-line fields.
    pub fn is_pseudo(&self) -> bool {
        self.name.first() == Some(&b':')
    }
}

/// HTTP layer selected after protocol negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVariant {
    /// HTTP/3 with WebTransport and server push.
    Http3,
    /// HTTP/0.9 over QUIC, request/response only.
    Http09,
}

impl HttpVariant {
    /// Map a negotiated ALPN identifier to an HTTP layer.
    pub fn from_alpn(alpn: &str) -> Option<Self> {
        if H3_ALPN.contains(&alpn) {
            Some(Self::Http3)
        } else if H0_ALPN.contains(&alpn) {
            Some(Self::Http09)
        } else {
            None
        }
    }

    pub fn supports_push(self) -> bool {
        matches!(self, Self::Http3)
    }

    pub fn supports_webtransport(self) -> bool {
        matches!(self, Self::Http3)
    }

    /// Value exposed as `http_version` in the scope.
    pub fn http_version(self) -> &'static str {
        match self {
            Self::Http3 => "3",
            Self::Http09 => "0.9",
        }
    }
}

impl std::fmt::Display for HttpVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http3 => write!(f, "HTTP/3"),
            Self::Http09 => write!(f, "HTTP/0.9"),
        }
    }
}

/// Connection-level events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuicEvent {
    /// The TLS handshake settled on an application protocol.
    ProtocolNegotiated { alpn_protocol: Option<String> },
    /// A raw QUIC DATAGRAM frame, outside any HTTP session.
    DatagramFrameReceived { data: Bytes },
    /// An event produced by the negotiated HTTP layer.
    Http(HttpEvent),
}

/// Events produced by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpEvent {
    HeadersReceived {
        stream_id: StreamId,
        headers: Vec<HeaderField>,
        stream_ended: bool,
    },
    DataReceived {
        stream_id: StreamId,
        data: Bytes,
        stream_ended: bool,
    },
    DatagramReceived {
        flow_id: StreamId,
        data: Bytes,
    },
    WebTransportStreamDataReceived {
        session_id: StreamId,
        stream_id: StreamId,
        data: Bytes,
        stream_ended: bool,
    },
}

impl HttpEvent {
    /// Identifier of the handler this event belongs to.
    pub fn routing_id(&self) -> StreamId {
        match self {
            Self::HeadersReceived { stream_id, .. } | Self::DataReceived { stream_id, .. } => {
                *stream_id
            }
            Self::DatagramReceived { flow_id, .. } => *flow_id,
            Self::WebTransportStreamDataReceived { session_id, .. } => *session_id,
        }
    }

    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HeadersReceived { .. } => "headers",
            Self::DataReceived { .. } => "data",
            Self::DatagramReceived { .. } => "datagram",
            Self::WebTransportStreamDataReceived { .. } => "webtransport_stream",
        }
    }
}

impl From<HttpEvent> for QuicEvent {
    fn from(event: HttpEvent) -> Self {
        QuicEvent::Http(event)
    }
}
