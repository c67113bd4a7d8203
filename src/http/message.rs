//! Messages exchanged with the application.
//!
//! Serialized with the ASGI `type` tag so they can cross a language boundary
//! unchanged.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::transport::{HeaderField, StreamId};

/// Messages returned by `receive()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "http.request")]
    HttpRequest {
        #[serde(default)]
        body: Bytes,
        #[serde(default)]
        more_body: bool,
    },

    #[serde(rename = "webtransport.connect")]
    WebTransportConnect,

    #[serde(rename = "webtransport.datagram.receive")]
    WebTransportDatagramReceive { data: Bytes },

    #[serde(rename = "webtransport.stream.receive")]
    WebTransportStreamReceive { data: Bytes, stream: StreamId },
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpRequest { .. } => "http.request",
            Self::WebTransportConnect => "webtransport.connect",
            Self::WebTransportDatagramReceive { .. } => "webtransport.datagram.receive",
            Self::WebTransportStreamReceive { .. } => "webtransport.stream.receive",
        }
    }
}

/// Messages accepted by `send()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "http.response.start")]
    HttpResponseStart {
        status: u16,
        #[serde(default)]
        headers: Vec<HeaderField>,
    },

    #[serde(rename = "http.response.body")]
    HttpResponseBody {
        #[serde(default)]
        body: Bytes,
        #[serde(default)]
        more_body: bool,
    },

    #[serde(rename = "http.response.push")]
    HttpResponsePush {
        path: String,
        #[serde(default)]
        headers: Vec<HeaderField>,
    },

    #[serde(rename = "webtransport.accept")]
    WebTransportAccept,

    #[serde(rename = "webtransport.close")]
    WebTransportClose,

    #[serde(rename = "webtransport.datagram.send")]
    WebTransportDatagramSend { data: Bytes },

    #[serde(rename = "webtransport.stream.send")]
    WebTransportStreamSend { data: Bytes, stream: StreamId },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpResponseStart { .. } => "http.response.start",
            Self::HttpResponseBody { .. } => "http.response.body",
            Self::HttpResponsePush { .. } => "http.response.push",
            Self::WebTransportAccept => "webtransport.accept",
            Self::WebTransportClose => "webtransport.close",
            Self::WebTransportDatagramSend { .. } => "webtransport.datagram.send",
            Self::WebTransportStreamSend { .. } => "webtransport.stream.send",
        }
    }

    pub fn response_start(status: u16, headers: Vec<HeaderField>) -> Self {
        Self::HttpResponseStart { status, headers }
    }

    /// A final body chunk.
    pub fn response_body(body: impl Into<Bytes>) -> Self {
        Self::HttpResponseBody {
            body: body.into(),
            more_body: false,
        }
    }

    /// A body chunk with more to follow.
    pub fn response_chunk(body: impl Into<Bytes>) -> Self {
        Self::HttpResponseBody {
            body: body.into(),
            more_body: true,
        }
    }

    pub fn push(path: impl Into<String>, headers: Vec<HeaderField>) -> Self {
        Self::HttpResponsePush {
            path: path.into(),
            headers,
        }
    }
}
