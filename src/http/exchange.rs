//! The application contract and the per-exchange task.
//!
//! # Responsibilities
//! - Define [`Application`], the single entry point called per exchange
//! - Hand the application its receive and send halves
//! - Supervise the application task and finalize the exchange however it ends
//!
//! # Design Decisions
//! - The application runs in its own task; a supervisor task awaits it so
//!   panics and cancellation are observed the same way as returned errors
//! - Only the application task's abort handle is kept by the registry, so
//!   aborting it still lets the supervisor clean up

use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::SendError;
use crate::http::message::{InboundMessage, OutboundMessage};
use crate::http::request::RequestHandler;
use crate::http::scope::Scope;
use crate::http::webtransport::{SessionHandler, SessionState};
use crate::net::connection::Dispatcher;
use crate::observability::metrics;
use crate::transport::{HttpEvent, StreamId};

/// Error type returned by applications.
pub type AppError = Box<dyn std::error::Error + Send + Sync>;

/// An ASGI-style application, called once per request or session.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    async fn call(
        &self,
        scope: Arc<Scope>,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError>;
}

#[async_trait]
impl<F, Fut> Application for F
where
    F: Fn(Arc<Scope>, MessageReceiver, MessageSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    async fn call(
        &self,
        scope: Arc<Scope>,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        (self)(scope, receive, send).await
    }
}

/// Inbound half of an exchange. Owned by exactly one application task.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl MessageReceiver {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<InboundMessage>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next message, in arrival order.
    pub async fn receive(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_receive(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }
}

/// Outbound half of an exchange.
///
/// Every call emits its frames and flushes the transport before returning.
#[derive(Clone)]
pub struct MessageSender {
    handler: Handler,
}

impl MessageSender {
    pub fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        self.handler.send(message)
    }

    /// Stream or session id of the exchange.
    pub fn stream_id(&self) -> StreamId {
        self.handler.stream_id()
    }
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("kind", &self.handler.kind())
            .field("stream_id", &self.handler.stream_id())
            .finish()
    }
}

/// A registered exchange.
#[derive(Clone)]
pub(crate) enum Handler {
    Request(Arc<RequestHandler>),
    Session(Arc<SessionHandler>),
}

impl Handler {
    pub(crate) fn stream_id(&self) -> StreamId {
        match self {
            Handler::Request(request) => request.stream_id(),
            Handler::Session(session) => session.session_id(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Handler::Request(_) => "http",
            Handler::Session(_) => "webtransport",
        }
    }

    pub(crate) fn http_event_received(&self, event: &HttpEvent) {
        match self {
            Handler::Request(request) => request.http_event_received(event),
            Handler::Session(session) => session.http_event_received(event),
        }
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        match self {
            Handler::Request(request) => request.send(message),
            Handler::Session(session) => session.send(message),
        }
    }

    fn finish(&self, outcome: Outcome) {
        match self {
            Handler::Request(request) => {
                if outcome != Outcome::Completed {
                    request.fail();
                }
            }
            Handler::Session(session) => {
                if session.state() != SessionState::Closed {
                    if let Err(error) = session.send(OutboundMessage::WebTransportClose) {
                        tracing::debug!(
                            session_id = session.session_id(),
                            error = %error,
                            "Failed to close session after application exit"
                        );
                    }
                }
            }
        }
    }
}

/// How an application task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

/// Start the application for `handler` and return the handle used to abort it.
pub(crate) fn spawn(
    runtime: &RuntimeHandle,
    handler: Handler,
    app: Arc<dyn Application>,
    scope: Arc<Scope>,
    receive: MessageReceiver,
    dispatcher: Weak<Dispatcher>,
) -> AbortHandle {
    let send = MessageSender {
        handler: handler.clone(),
    };
    let task = runtime.spawn(async move { app.call(scope, receive, send).await });
    let abort = task.abort_handle();
    runtime.spawn(supervise(handler, task, dispatcher));
    abort
}

async fn supervise(
    handler: Handler,
    task: JoinHandle<Result<(), AppError>>,
    dispatcher: Weak<Dispatcher>,
) {
    let stream_id = handler.stream_id();
    let kind = handler.kind();

    let outcome = match task.await {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(error)) => {
            tracing::warn!(stream_id, kind, error = %error, "Application failed");
            Outcome::Failed
        }
        Err(error) if error.is_panic() => {
            tracing::warn!(stream_id, kind, "Application panicked");
            Outcome::Failed
        }
        Err(_) => {
            tracing::debug!(stream_id, kind, "Application task cancelled");
            Outcome::Cancelled
        }
    };

    if outcome == Outcome::Failed {
        metrics::record_app_failure(kind);
    }
    handler.finish(outcome);

    if let Some(dispatcher) = dispatcher.upgrade() {
        dispatcher.task_finished(stream_id);
    }
}
