//! WebTransport session exchange.
//!
//! # Session States
//! ```text
//! Pending ──accept──▶ Accepted ──close──▶ Closed
//!    │                                      ▲
//!    └──────────────close (403)─────────────┘
//! ```
//!
//! # Design Decisions
//! - Events arriving while Pending are kept in a backlog, not delivered
//! - Accept is the only transition that drains the backlog, in arrival order
//! - Nothing is delivered or sent once Closed; sends fail with
//!   `InvalidSessionTransition`

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::HttpConfig;
use crate::error::SendError;
use crate::http::exchange::MessageReceiver;
use crate::http::message::{InboundMessage, OutboundMessage};
use crate::http::response::{session_accept_headers, session_reject_headers};
use crate::net::connection::{Dispatcher, SharedTransport};
use crate::observability::metrics;
use crate::transport::{HttpEvent, StreamId, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Accepted,
    Closed,
}

impl SessionState {
    fn as_str(self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Accepted => "accepted",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct SessionInner {
    state: SessionState,
    backlog: VecDeque<HttpEvent>,
}

/// One WebTransport session, keyed by its CONNECT stream id.
pub struct SessionHandler {
    session_id: StreamId,
    config: Arc<HttpConfig>,
    queue: mpsc::UnboundedSender<InboundMessage>,
    inner: Mutex<SessionInner>,
    transport: SharedTransport,
    dispatcher: Weak<Dispatcher>,
}

impl SessionHandler {
    pub(crate) fn new(
        session_id: StreamId,
        config: Arc<HttpConfig>,
        transport: SharedTransport,
        dispatcher: Weak<Dispatcher>,
    ) -> (Arc<Self>, MessageReceiver) {
        let (queue, receiver) = MessageReceiver::channel();
        let _ = queue.send(InboundMessage::WebTransportConnect);

        let handler = Arc::new(Self {
            session_id,
            config,
            queue,
            inner: Mutex::new(SessionInner {
                state: SessionState::Pending,
                backlog: VecDeque::new(),
            }),
            transport,
            dispatcher,
        });
        (handler, receiver)
    }

    pub fn session_id(&self) -> StreamId {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Number of events waiting for `webtransport.accept`.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().backlog.len()
    }

    pub(crate) fn http_event_received(&self, event: &HttpEvent) {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Closed => {
                tracing::trace!(session_id = self.session_id, kind = event.kind(), "Session closed, dropping event");
            }
            SessionState::Accepted => self.deliver(event),
            SessionState::Pending => inner.backlog.push_back(event.clone()),
        }
    }

    fn deliver(&self, event: &HttpEvent) {
        let message = match event {
            HttpEvent::DatagramReceived { data, .. } => {
                metrics::record_datagram("received");
                InboundMessage::WebTransportDatagramReceive { data: data.clone() }
            }
            HttpEvent::WebTransportStreamDataReceived {
                stream_id, data, ..
            } => InboundMessage::WebTransportStreamReceive {
                data: data.clone(),
                stream: *stream_id,
            },
            HttpEvent::HeadersReceived { .. } | HttpEvent::DataReceived { .. } => return,
        };
        if self.queue.send(message).is_err() {
            tracing::trace!(session_id = self.session_id, "Application no longer receiving");
        }
    }

    pub(crate) fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let (result, closed) = {
            let mut inner = self.inner.lock();
            let mut transport = self.transport.lock();
            let result = self.apply(&mut inner, &mut *transport, message);
            transport.transmit();
            (result, inner.state == SessionState::Closed)
        };

        if closed {
            if let Some(dispatcher) = self.dispatcher.upgrade() {
                dispatcher.retire(self.session_id);
            }
        }
        result
    }

    fn apply(
        &self,
        inner: &mut SessionInner,
        transport: &mut dyn Transport,
        message: OutboundMessage,
    ) -> Result<(), SendError> {
        let kind = message.kind();
        if inner.state == SessionState::Closed {
            return Err(self.invalid_transition(inner.state, kind));
        }

        match message {
            OutboundMessage::WebTransportAccept => {
                if inner.state != SessionState::Pending {
                    return Err(self.invalid_transition(inner.state, kind));
                }
                let headers =
                    session_accept_headers(&self.config.server_name, &self.config.webtransport_draft);
                transport.send_headers(self.session_id, &headers, false)?;
                self.transition(inner, SessionState::Accepted);

                let backlog = std::mem::take(&mut inner.backlog);
                tracing::debug!(session_id = self.session_id, replayed = backlog.len(), "Session accepted");
                for event in &backlog {
                    self.deliver(event);
                }
                Ok(())
            }
            OutboundMessage::WebTransportClose => {
                let rejected = inner.state == SessionState::Pending;
                let result = if rejected {
                    transport.send_headers(self.session_id, &session_reject_headers(), false)
                } else {
                    Ok(())
                };
                let result =
                    result.and_then(|()| transport.send_data(self.session_id, Bytes::new(), true));

                inner.backlog.clear();
                self.transition(inner, SessionState::Closed);
                tracing::debug!(session_id = self.session_id, rejected, "Session closed");
                result.map_err(SendError::from)
            }
            OutboundMessage::WebTransportDatagramSend { data } => {
                transport.send_datagram(self.session_id, data)?;
                metrics::record_datagram("sent");
                Ok(())
            }
            OutboundMessage::WebTransportStreamSend { data, stream } => {
                transport.send_stream_data(stream, data, false)?;
                Ok(())
            }
            other => Err(SendError::UnexpectedMessage {
                message: other.kind(),
                exchange: "webtransport",
            }),
        }
    }

    fn transition(&self, inner: &mut SessionInner, next: SessionState) {
        tracing::trace!(session_id = self.session_id, from = %inner.state, to = %next, "Session transition");
        inner.state = next;
        metrics::record_session_transition(next.as_str());
    }

    fn invalid_transition(&self, state: SessionState, message: &'static str) -> SendError {
        SendError::InvalidSessionTransition {
            session_id: self.session_id,
            state,
            message,
        }
    }
}
