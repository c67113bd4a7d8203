//! HTTP request/response exchange.
//!
//! # Responsibilities
//! - Turn body chunks into `http.request` messages
//! - Turn `http.response.*` messages into header and data frames
//! - Promise pushes and feed the pushed request back to the dispatcher
//!
//! # Response States
//! ```text
//! AwaitingStart → Streaming → Complete
//! ```
//!
//! # Design Decisions
//! - Exactly one terminal `http.request` is delivered; later chunks are dropped
//! - An exhausted push-id pool silently skips the push
//! - The transport is flushed after every send, even a rejected one

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::HttpConfig;
use crate::error::SendError;
use crate::http::exchange::MessageReceiver;
use crate::http::message::{InboundMessage, OutboundMessage};
use crate::http::response::{push_request_headers, response_headers};
use crate::net::connection::{Dispatcher, SharedTransport};
use crate::observability::metrics;
use crate::transport::{error_code, HeaderField, HttpEvent, HttpVariant, PushError, StreamId};

/// Progress of the response on a request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// No `http.response.start` yet.
    AwaitingStart,
    /// Headers sent, body in progress.
    Streaming,
    /// Final body chunk sent, or the stream was reset.
    Complete,
}

impl std::fmt::Display for ResponseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseState::AwaitingStart => write!(f, "awaiting start"),
            ResponseState::Streaming => write!(f, "streaming"),
            ResponseState::Complete => write!(f, "complete"),
        }
    }
}

/// One HTTP request and its response.
pub struct RequestHandler {
    stream_id: StreamId,
    authority: Bytes,
    variant: HttpVariant,
    config: Arc<HttpConfig>,
    queue: mpsc::UnboundedSender<InboundMessage>,
    body_complete: AtomicBool,
    response: Mutex<ResponseState>,
    transport: SharedTransport,
    dispatcher: Weak<Dispatcher>,
}

impl RequestHandler {
    pub(crate) fn new(
        stream_id: StreamId,
        authority: Bytes,
        variant: HttpVariant,
        stream_ended: bool,
        config: Arc<HttpConfig>,
        transport: SharedTransport,
        dispatcher: Weak<Dispatcher>,
    ) -> (Arc<Self>, MessageReceiver) {
        let (queue, receiver) = MessageReceiver::channel();
        let handler = Arc::new(Self {
            stream_id,
            authority,
            variant,
            config,
            queue,
            body_complete: AtomicBool::new(false),
            response: Mutex::new(ResponseState::AwaitingStart),
            transport,
            dispatcher,
        });

        // Body-less request: nothing else will ever arrive.
        if stream_ended {
            handler.enqueue_body(Bytes::new(), false);
        }

        (handler, receiver)
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn response_state(&self) -> ResponseState {
        *self.response.lock()
    }

    pub(crate) fn http_event_received(&self, event: &HttpEvent) {
        match event {
            HttpEvent::DataReceived {
                data, stream_ended, ..
            } => self.enqueue_body(data.clone(), !stream_ended),
            HttpEvent::HeadersReceived {
                stream_ended: true, ..
            } => self.enqueue_body(Bytes::new(), false),
            _ => {}
        }
    }

    fn enqueue_body(&self, body: Bytes, more_body: bool) {
        if self.body_complete.load(Ordering::Acquire) {
            tracing::trace!(stream_id = self.stream_id, "Request body already complete, dropping chunk");
            return;
        }
        if !more_body {
            self.body_complete.store(true, Ordering::Release);
        }
        if self
            .queue
            .send(InboundMessage::HttpRequest { body, more_body })
            .is_err()
        {
            tracing::trace!(stream_id = self.stream_id, "Application no longer receiving");
        }
    }

    pub(crate) fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let result = self.apply(message);
        self.transport.lock().transmit();
        result
    }

    fn apply(&self, message: OutboundMessage) -> Result<(), SendError> {
        let kind = message.kind();
        let mut response = self.response.lock();

        match message {
            OutboundMessage::HttpResponseStart { status, headers } => {
                self.expect_state(&response, ResponseState::AwaitingStart, kind)?;
                let headers = response_headers(status, &self.config.server_name, headers);
                self.transport
                    .lock()
                    .send_headers(self.stream_id, &headers, false)?;
                *response = ResponseState::Streaming;
                Ok(())
            }
            OutboundMessage::HttpResponseBody { body, more_body } => {
                self.expect_state(&response, ResponseState::Streaming, kind)?;
                self.transport
                    .lock()
                    .send_data(self.stream_id, body, !more_body)?;
                if !more_body {
                    *response = ResponseState::Complete;
                }
                Ok(())
            }
            OutboundMessage::HttpResponsePush { path, headers } => {
                if *response == ResponseState::Complete {
                    return Err(self.invalid_state(ResponseState::Complete, kind));
                }
                drop(response);
                self.push(&path, headers)
            }
            other => Err(SendError::UnexpectedMessage {
                message: other.kind(),
                exchange: "http",
            }),
        }
    }

    fn push(&self, path: &str, headers: Vec<HeaderField>) -> Result<(), SendError> {
        if !(self.variant.supports_push() && self.config.push_enabled) {
            tracing::debug!(stream_id = self.stream_id, path, "Push not supported, ignoring");
            return Ok(());
        }

        let request_headers = push_request_headers(&self.authority, path, headers);
        let promised = self
            .transport
            .lock()
            .send_push_promise(self.stream_id, &request_headers);

        let push_stream_id = match promised {
            Ok(push_stream_id) => push_stream_id,
            Err(PushError::NoAvailablePushId) => {
                tracing::debug!(stream_id = self.stream_id, path, "No push id available, skipping push");
                metrics::record_push("exhausted");
                return Ok(());
            }
            Err(PushError::Transport(error)) => return Err(error.into()),
        };
        metrics::record_push("promised");

        let Some(dispatcher) = self.dispatcher.upgrade() else {
            return Ok(());
        };
        dispatcher.dispatch_http(HttpEvent::HeadersReceived {
            stream_id: push_stream_id,
            headers: request_headers,
            stream_ended: true,
        })?;
        Ok(())
    }

    /// Best-effort cleanup after the application failed.
    pub(crate) fn fail(&self) {
        let mut response = self.response.lock();
        let mut transport = self.transport.lock();

        let result = match *response {
            ResponseState::AwaitingStart => {
                let headers = response_headers(500, &self.config.server_name, []);
                transport
                    .send_headers(self.stream_id, &headers, false)
                    .and_then(|()| transport.send_data(self.stream_id, Bytes::new(), true))
            }
            ResponseState::Streaming => {
                transport.reset_stream(self.stream_id, error_code::H3_INTERNAL_ERROR)
            }
            ResponseState::Complete => Ok(()),
        };
        *response = ResponseState::Complete;
        transport.transmit();

        if let Err(error) = result {
            tracing::debug!(stream_id = self.stream_id, error = %error, "Failed to abort response");
        }
    }

    fn expect_state(
        &self,
        current: &ResponseState,
        expected: ResponseState,
        message: &'static str,
    ) -> Result<(), SendError> {
        if *current == expected {
            Ok(())
        } else {
            Err(self.invalid_state(*current, message))
        }
    }

    fn invalid_state(&self, state: ResponseState, message: &'static str) -> SendError {
        SendError::InvalidResponseState {
            stream_id: self.stream_id,
            state,
            message,
        }
    }
}
