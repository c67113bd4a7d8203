//! Error types surfaced by the bridge.

use thiserror::Error;

use crate::http::request::ResponseState;
use crate::http::webtransport::SessionState;
use crate::transport::{StreamId, TransportError};

/// Errors returned to an application from `send()`.
///
/// All of them are local to the handler that produced them.
#[derive(Debug, Error)]
pub enum SendError {
    /// Accept twice, or any message after the session closed.
    #[error("session {session_id}: {message} is not allowed while {state}")]
    InvalidSessionTransition {
        session_id: StreamId,
        state: SessionState,
        message: &'static str,
    },

    /// Response messages out of order, or after the response completed.
    #[error("stream {stream_id}: {message} is not allowed while the response is {state}")]
    InvalidResponseState {
        stream_id: StreamId,
        state: ResponseState,
        message: &'static str,
    },

    /// A message that belongs to the other kind of exchange.
    #[error("{message} is not valid on a {exchange} exchange")]
    UnexpectedMessage {
        message: &'static str,
        exchange: &'static str,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Errors that end a whole connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// An event referenced a stream or session that was never opened.
    #[error("event references unknown stream {stream_id}")]
    UnknownStream { stream_id: StreamId },

    /// The connection was already torn down.
    #[error("connection has been terminated")]
    Terminated,
}
