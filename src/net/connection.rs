//! Connection dispatcher.
//!
//! # Responsibilities
//! - Select the HTTP layer once ALPN is negotiated
//! - Answer the `siduck` quack datagram
//! - Open a handler for every new request or session
//! - Route later events to the handler that owns their id
//! - Tear down every exchange when the connection ends
//!
//! # Design Decisions
//! - Events are handled one at a time by the caller; no internal queue
//! - The registry lock is never held while the transport lock is taken
//! - Unknown ids follow `UnknownStreamPolicy`, aborting the connection by default

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::config::{HttpConfig, UnknownStreamPolicy};
use crate::error::ConnectionError;
use crate::http::exchange::{self, Application, Handler};
use crate::http::request::RequestHandler;
use crate::http::scope::{RequestHead, Scope};
use crate::http::webtransport::SessionHandler;
use crate::net::registry::Registry;
use crate::observability::metrics;
use crate::transport::{
    error_code, HeaderField, HttpEvent, HttpVariant, QuicEvent, StreamId, Transport, QUACK,
    QUACK_ACK,
};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough, only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No HTTP layer selected yet.
    Negotiating,
    /// HTTP layer selected, exchanges are dispatched.
    Active,
    /// Torn down; every event is rejected.
    Closed,
}

/// The engine shared by the dispatcher and every handler of a connection.
pub(crate) type SharedTransport = Arc<Mutex<dyn Transport>>;

/// One QUIC connection bridged to an application.
///
/// Dropping the connection aborts every application task still running.
pub struct Connection {
    dispatcher: Arc<Dispatcher>,
}

impl Connection {
    /// Application tasks are spawned on the runtime current at this call,
    /// so events may later be fed from any thread.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<T: Transport>(transport: T, app: Arc<dyn Application>, config: HttpConfig) -> Self {
        let id = ConnectionId::new();
        let transport: SharedTransport = Arc::new(Mutex::new(transport));
        let dispatcher = Arc::new_cyclic(|this| Dispatcher {
            id,
            runtime: Handle::current(),
            app,
            config: Arc::new(config),
            transport,
            state: Mutex::new(DispatchState {
                variant: None,
                registry: Registry::new(),
            }),
            this: this.clone(),
        });

        tracing::debug!(connection_id = %id, "Connection opened");
        Self { dispatcher }
    }

    pub fn id(&self) -> ConnectionId {
        self.dispatcher.id
    }

    /// Feed one event from the transport engine.
    ///
    /// An error means the connection is unusable and has been closed.
    pub fn handle_event(&self, event: QuicEvent) -> Result<(), ConnectionError> {
        match event {
            QuicEvent::ProtocolNegotiated { alpn_protocol } => {
                self.dispatcher.protocol_negotiated(alpn_protocol.as_deref())
            }
            QuicEvent::DatagramFrameReceived { data } => {
                self.dispatcher.datagram_frame_received(&data);
                Ok(())
            }
            QuicEvent::Http(event) => self.dispatcher.dispatch_http(event),
        }
    }

    pub fn state(&self) -> ConnectionState {
        let state = self.dispatcher.state.lock();
        if state.registry.is_terminated() {
            ConnectionState::Closed
        } else if state.variant.is_some() {
            ConnectionState::Active
        } else {
            ConnectionState::Negotiating
        }
    }

    pub fn http_variant(&self) -> Option<HttpVariant> {
        self.dispatcher.state.lock().variant
    }

    /// Handlers still receiving events.
    pub fn active_handlers(&self) -> usize {
        self.dispatcher.state.lock().registry.len()
    }

    /// Application tasks that have not finished yet.
    pub fn running_tasks(&self) -> usize {
        self.dispatcher.state.lock().registry.running_tasks()
    }

    /// The transport connection ended: abort every application task.
    pub fn shutdown(&self) {
        self.dispatcher.terminate();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispatcher.terminate();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.dispatcher.id)
            .field("state", &self.state())
            .finish()
    }
}

struct DispatchState {
    variant: Option<HttpVariant>,
    registry: Registry<Handler>,
}

pub(crate) struct Dispatcher {
    id: ConnectionId,
    runtime: Handle,
    app: Arc<dyn Application>,
    config: Arc<HttpConfig>,
    transport: SharedTransport,
    state: Mutex<DispatchState>,
    this: Weak<Dispatcher>,
}

impl Dispatcher {
    fn protocol_negotiated(&self, alpn: Option<&str>) -> Result<(), ConnectionError> {
        let variant = alpn.and_then(HttpVariant::from_alpn);
        {
            let mut state = self.state.lock();
            if state.registry.is_terminated() {
                return Err(ConnectionError::Terminated);
            }
            if variant.is_some() {
                state.variant = variant;
            }
        }

        match variant {
            Some(variant) => {
                self.transport.lock().set_http_variant(variant);
                tracing::info!(connection_id = %self.id, alpn, %variant, "HTTP layer selected");
            }
            None => {
                tracing::debug!(connection_id = %self.id, alpn, "No HTTP layer for negotiated protocol");
            }
        }
        Ok(())
    }

    fn datagram_frame_received(&self, data: &Bytes) {
        if data.as_ref() != QUACK {
            return;
        }
        let mut transport = self.transport.lock();
        if let Err(error) = transport.send_datagram_frame(Bytes::from_static(QUACK_ACK)) {
            tracing::debug!(connection_id = %self.id, error = %error, "Failed to answer quack");
        }
        transport.transmit();
    }

    pub(crate) fn dispatch_http(&self, event: HttpEvent) -> Result<(), ConnectionError> {
        let client = match &event {
            HttpEvent::HeadersReceived { .. } => self.transport.lock().peer_addr(),
            _ => None,
        };

        let mut state = self.state.lock();
        if state.registry.is_terminated() {
            return Err(ConnectionError::Terminated);
        }
        let Some(variant) = state.variant else {
            tracing::debug!(connection_id = %self.id, kind = event.kind(), "HTTP event before negotiation, dropping");
            return Ok(());
        };

        if let HttpEvent::HeadersReceived {
            stream_id,
            headers,
            stream_ended,
        } = &event
        {
            if state.registry.is_vacant(*stream_id) {
                self.open_exchange(
                    &mut state.registry,
                    variant,
                    *stream_id,
                    headers,
                    *stream_ended,
                    client,
                );
                return Ok(());
            }
        }

        let id = event.routing_id();
        if let Some(handler) = state.registry.get(id) {
            tracing::trace!(connection_id = %self.id, stream_id = id, kind = event.kind(), "Routing event");
            handler.http_event_received(&event);
            return Ok(());
        }

        let retired = state.registry.is_retired(id);
        drop(state);

        if retired {
            tracing::trace!(connection_id = %self.id, stream_id = id, kind = event.kind(), "Event for retired stream dropped");
            return Ok(());
        }
        self.unknown_stream(id, event.kind())
    }

    fn open_exchange(
        &self,
        registry: &mut Registry<Handler>,
        variant: HttpVariant,
        stream_id: StreamId,
        headers: &[HeaderField],
        stream_ended: bool,
        client: Option<SocketAddr>,
    ) {
        let head = RequestHead::parse(headers);
        let scope = Arc::new(Scope::new(&head, variant, client, self.config.push_enabled));
        tracing::info!(
            connection_id = %self.id,
            stream_id,
            method = %scope.method,
            path = %scope.path,
            "HTTP request"
        );

        let (handler, receive) = if scope.is_webtransport() {
            let (session, receive) = SessionHandler::new(
                stream_id,
                Arc::clone(&self.config),
                Arc::clone(&self.transport),
                self.this.clone(),
            );
            (Handler::Session(session), receive)
        } else {
            let (request, receive) = RequestHandler::new(
                stream_id,
                head.authority.clone().unwrap_or_default(),
                variant,
                stream_ended,
                Arc::clone(&self.config),
                Arc::clone(&self.transport),
                self.this.clone(),
            );
            (Handler::Request(request), receive)
        };

        metrics::record_handler_opened(handler.kind());
        let task = exchange::spawn(
            &self.runtime,
            handler.clone(),
            Arc::clone(&self.app),
            scope,
            receive,
            self.this.clone(),
        );
        registry.register(stream_id, handler, task);
    }

    fn unknown_stream(&self, stream_id: StreamId, kind: &'static str) -> Result<(), ConnectionError> {
        match self.config.unknown_stream_policy {
            UnknownStreamPolicy::Ignore => {
                tracing::warn!(connection_id = %self.id, stream_id, kind, "Event for unknown stream ignored");
                Ok(())
            }
            UnknownStreamPolicy::Abort => {
                tracing::warn!(connection_id = %self.id, stream_id, kind, "Event for unknown stream, closing connection");
                {
                    let mut transport = self.transport.lock();
                    transport.close(error_code::H3_ID_ERROR, "event for unknown stream");
                    transport.transmit();
                }
                self.terminate();
                Err(ConnectionError::UnknownStream { stream_id })
            }
        }
    }

    /// Stop routing events to `stream_id`.
    pub(crate) fn retire(&self, stream_id: StreamId) {
        let retired = self.state.lock().registry.retire(stream_id);
        if let Some(handler) = retired {
            metrics::record_handler_retired(handler.kind());
            tracing::trace!(connection_id = %self.id, stream_id, "Handler retired");
        }
    }

    /// The application task for `stream_id` has ended.
    pub(crate) fn task_finished(&self, stream_id: StreamId) {
        let retired = self.state.lock().registry.task_finished(stream_id);
        if let Some(handler) = retired {
            metrics::record_handler_retired(handler.kind());
            tracing::trace!(connection_id = %self.id, stream_id, "Handler retired");
        }
    }

    fn terminate(&self) {
        let (handlers, tasks) = self.state.lock().registry.terminate();
        if handlers.is_empty() && tasks.is_empty() {
            return;
        }
        for handler in &handlers {
            metrics::record_handler_retired(handler.kind());
        }
        for task in &tasks {
            task.abort();
        }
        tracing::debug!(
            connection_id = %self.id,
            retired = handlers.len(),
            aborted = tasks.len(),
            "Connection terminated"
        );
    }
}
