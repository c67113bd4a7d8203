//! Demonstration application.
//!
//! `GET /` answers `Server is running`. A WebTransport session on `/` is
//! accepted, echoes datagrams and answers a stream `ping` with `pong`.
//! Every other HTTP path is a 404; other sessions are rejected.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::http::{AppError, Application, InboundMessage, MessageReceiver, MessageSender};
use crate::http::{OutboundMessage, Scope};
use crate::transport::HeaderField;

#[derive(Debug, Clone, Copy, Default)]
pub struct PingPongApp;

#[async_trait]
impl Application for PingPongApp {
    async fn call(
        &self,
        scope: Arc<Scope>,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        match (scope.is_webtransport(), scope.path.as_str()) {
            (true, "/") => echo(receive, send).await,
            (true, _) => Ok(()),
            (false, "/") => respond(&send, 200, "Server is running"),
            (false, _) => respond(&send, 404, "Not Found"),
        }
    }
}

fn respond(send: &MessageSender, status: u16, body: &'static str) -> Result<(), AppError> {
    let headers = vec![HeaderField::new(
        Bytes::from_static(b"content-length"),
        body.len().to_string(),
    )];
    send.send(OutboundMessage::response_start(status, headers))?;
    send.send(OutboundMessage::response_body(Bytes::from_static(body.as_bytes())))?;
    Ok(())
}

async fn echo(mut receive: MessageReceiver, send: MessageSender) -> Result<(), AppError> {
    match receive.receive().await {
        Some(InboundMessage::WebTransportConnect) => {}
        other => {
            tracing::debug!(received = ?other.as_ref().map(InboundMessage::kind), "Expected webtransport.connect");
            return Ok(());
        }
    }
    send.send(OutboundMessage::WebTransportAccept)?;

    while let Some(message) = receive.receive().await {
        match message {
            InboundMessage::WebTransportDatagramReceive { data } => {
                send.send(OutboundMessage::WebTransportDatagramSend { data })?;
            }
            InboundMessage::WebTransportStreamReceive { data, stream } if data.as_ref() == b"ping" => {
                send.send(OutboundMessage::WebTransportStreamSend {
                    data: Bytes::from_static(b"pong"),
                    stream,
                })?;
            }
            _ => {}
        }
    }
    Ok(())
}
