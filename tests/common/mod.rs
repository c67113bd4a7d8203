//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use h3_bridge::config::HttpConfig;
use h3_bridge::http::{AppError, Application, MessageReceiver, MessageSender, Scope};
use h3_bridge::transport::{
    HeaderField, HttpEvent, HttpVariant, PushError, QuicEvent, StreamId, Transport, TransportError,
};
use h3_bridge::Connection;

/// One call made on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Headers {
        stream_id: StreamId,
        headers: Vec<(String, String)>,
        end_stream: bool,
    },
    Data {
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    },
    Datagram {
        flow_id: StreamId,
        data: Bytes,
    },
    StreamData {
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    },
    PushPromise {
        stream_id: StreamId,
        push_stream_id: StreamId,
        headers: Vec<(String, String)>,
    },
    DatagramFrame(Bytes),
    Reset {
        stream_id: StreamId,
        error_code: u64,
    },
    Close {
        error_code: u64,
        reason: String,
    },
}

impl Frame {
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Frame::Headers { stream_id, .. }
            | Frame::Data { stream_id, .. }
            | Frame::StreamData { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::Reset { stream_id, .. } => Some(*stream_id),
            Frame::Datagram { flow_id, .. } => Some(*flow_id),
            Frame::DatagramFrame(_) | Frame::Close { .. } => None,
        }
    }

    /// Value of a header in a `Headers` frame.
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            Frame::Headers { headers, .. } | Frame::PushPromise { headers, .. } => headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Recording {
    frames: Vec<Frame>,
    variant: Option<HttpVariant>,
    push_budget: usize,
    next_push_id: StreamId,
    transmits: usize,
    closed: bool,
    peer: Option<SocketAddr>,
}

/// Test double that records every transport call.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_push_budget(8)
    }

    /// Allow `budget` push promises before reporting exhaustion.
    pub fn with_push_budget(budget: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                frames: Vec::new(),
                variant: None,
                push_budget: budget,
                next_push_id: 3,
                transmits: 0,
                closed: false,
                peer: "[::1]:50000".parse().ok(),
            })),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.inner.lock().frames.clone()
    }

    pub fn frames_for(&self, stream_id: StreamId) -> Vec<Frame> {
        self.frames()
            .into_iter()
            .filter(|f| f.stream_id() == Some(stream_id))
            .collect()
    }

    pub fn variant(&self) -> Option<HttpVariant> {
        self.inner.lock().variant
    }

    pub fn transmits(&self) -> usize {
        self.inner.lock().transmits
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn record(&self, frame: Frame) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::ConnectionClosed);
        }
        inner.frames.push(frame);
        Ok(())
    }
}

fn pairs(headers: &[HeaderField]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| {
            (
                String::from_utf8_lossy(&h.name).into_owned(),
                String::from_utf8_lossy(&h.value).into_owned(),
            )
        })
        .collect()
}

impl Transport for RecordingTransport {
    fn set_http_variant(&mut self, variant: HttpVariant) {
        self.inner.lock().variant = Some(variant);
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().peer
    }

    fn send_headers(
        &mut self,
        stream_id: StreamId,
        headers: &[HeaderField],
        end_stream: bool,
    ) -> Result<(), TransportError> {
        self.record(Frame::Headers {
            stream_id,
            headers: pairs(headers),
            end_stream,
        })
    }

    fn send_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), TransportError> {
        self.record(Frame::Data {
            stream_id,
            data,
            end_stream,
        })
    }

    fn send_datagram(&mut self, flow_id: StreamId, data: Bytes) -> Result<(), TransportError> {
        self.record(Frame::Datagram { flow_id, data })
    }

    fn send_stream_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), TransportError> {
        self.record(Frame::StreamData {
            stream_id,
            data,
            end_stream,
        })
    }

    fn send_push_promise(
        &mut self,
        stream_id: StreamId,
        headers: &[HeaderField],
    ) -> Result<StreamId, PushError> {
        let push_stream_id = {
            let mut inner = self.inner.lock();
            if inner.push_budget == 0 {
                return Err(PushError::NoAvailablePushId);
            }
            inner.push_budget -= 1;
            let id = inner.next_push_id;
            inner.next_push_id += 4;
            id
        };
        self.record(Frame::PushPromise {
            stream_id,
            push_stream_id,
            headers: pairs(headers),
        })?;
        Ok(push_stream_id)
    }

    fn send_datagram_frame(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.record(Frame::DatagramFrame(data))
    }

    fn reset_stream(&mut self, stream_id: StreamId, error_code: u64) -> Result<(), TransportError> {
        self.record(Frame::Reset {
            stream_id,
            error_code,
        })
    }

    fn close(&mut self, error_code: u64, reason: &str) {
        let mut inner = self.inner.lock();
        inner.frames.push(Frame::Close {
            error_code,
            reason: reason.to_string(),
        });
        inner.closed = true;
    }

    fn transmit(&mut self) {
        self.inner.lock().transmits += 1;
    }
}

/// Wrap a closure as an application.
pub fn app<F, Fut>(f: F) -> Arc<dyn Application>
where
    F: Fn(Arc<Scope>, MessageReceiver, MessageSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    Arc::new(f)
}

/// A connection that already negotiated `alpn`.
pub fn connect(
    transport: &RecordingTransport,
    app: Arc<dyn Application>,
    config: HttpConfig,
    alpn: &str,
) -> Connection {
    let connection = Connection::new(transport.clone(), app, config);
    connection
        .handle_event(QuicEvent::ProtocolNegotiated {
            alpn_protocol: Some(alpn.to_string()),
        })
        .unwrap();
    connection
}

/// A connection that negotiated HTTP/3 with default settings.
pub fn connect_h3(transport: &RecordingTransport, app: Arc<dyn Application>) -> Connection {
    connect(transport, app, HttpConfig::default(), "h3")
}

pub fn request_headers(method: &'static str, path: &'static str) -> Vec<HeaderField> {
    vec![
        HeaderField::new(":method", method),
        HeaderField::new(":scheme", "https"),
        HeaderField::new(":authority", "localhost"),
        HeaderField::new(":path", path),
        HeaderField::new("user-agent", "h3-bridge-tests"),
    ]
}

pub fn connect_headers(path: &'static str) -> Vec<HeaderField> {
    vec![
        HeaderField::new(":method", "CONNECT"),
        HeaderField::new(":protocol", "webtransport"),
        HeaderField::new(":scheme", "https"),
        HeaderField::new(":authority", "localhost"),
        HeaderField::new(":path", path),
    ]
}

pub fn headers_event(stream_id: StreamId, headers: Vec<HeaderField>, stream_ended: bool) -> QuicEvent {
    HttpEvent::HeadersReceived {
        stream_id,
        headers,
        stream_ended,
    }
    .into()
}

pub fn data_event(stream_id: StreamId, data: &'static [u8], stream_ended: bool) -> QuicEvent {
    HttpEvent::DataReceived {
        stream_id,
        data: Bytes::from_static(data),
        stream_ended,
    }
    .into()
}

pub fn datagram_event(flow_id: StreamId, data: &'static [u8]) -> QuicEvent {
    HttpEvent::DatagramReceived {
        flow_id,
        data: Bytes::from_static(data),
    }
    .into()
}

pub fn wt_stream_event(session_id: StreamId, stream_id: StreamId, data: &'static [u8]) -> QuicEvent {
    HttpEvent::WebTransportStreamDataReceived {
        session_id,
        stream_id,
        data: Bytes::from_static(data),
        stream_ended: false,
    }
    .into()
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
