//! Connection-level dispatch: negotiation, quack datagrams, unknown ids and teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use h3_bridge::config::{HttpConfig, UnknownStreamPolicy};
use h3_bridge::demo::PingPongApp;
use h3_bridge::error::ConnectionError;
use h3_bridge::http::{AppError, OutboundMessage};
use h3_bridge::net::ConnectionState;
use h3_bridge::transport::{error_code, HttpVariant, QuicEvent};
use h3_bridge::Connection;

mod common;
use common::{Frame, RecordingTransport};

/// Sets its flag when dropped, i.e. when the owning task is aborted.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn never_finishing(dropped: Arc<AtomicBool>) -> Arc<dyn h3_bridge::Application> {
    common::app(move |_scope, _receive, _send| {
        let guard = DropFlag(dropped.clone());
        async move {
            let _guard = guard;
            std::future::pending::<()>().await;
            Ok::<(), AppError>(())
        }
    })
}

#[tokio::test]
async fn negotiation_selects_http_layer() {
    let transport = RecordingTransport::new();
    let connection = Connection::new(transport.clone(), Arc::new(PingPongApp), HttpConfig::default());
    assert_eq!(connection.state(), ConnectionState::Negotiating);

    connection
        .handle_event(QuicEvent::ProtocolNegotiated {
            alpn_protocol: Some("h3".into()),
        })
        .unwrap();

    assert_eq!(connection.state(), ConnectionState::Active);
    assert_eq!(connection.http_variant(), Some(HttpVariant::Http3));
    assert_eq!(transport.variant(), Some(HttpVariant::Http3));
}

#[tokio::test]
async fn http_events_before_negotiation_are_ignored() {
    let transport = RecordingTransport::new();
    let connection = Connection::new(transport.clone(), Arc::new(PingPongApp), HttpConfig::default());

    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();
    connection.handle_event(common::data_event(4, b"orphan", true)).unwrap();

    tokio::task::yield_now().await;
    assert_eq!(connection.active_handlers(), 0);
    assert!(transport.frames().is_empty());
}

#[tokio::test]
async fn siduck_quack_is_answered() {
    let transport = RecordingTransport::new();
    let connection = common::connect(
        &transport,
        Arc::new(PingPongApp),
        HttpConfig::default(),
        "siduck",
    );
    assert_eq!(connection.http_variant(), None);

    connection
        .handle_event(QuicEvent::DatagramFrameReceived {
            data: Bytes::from_static(b"quack"),
        })
        .unwrap();
    connection
        .handle_event(QuicEvent::DatagramFrameReceived {
            data: Bytes::from_static(b"moo"),
        })
        .unwrap();

    assert_eq!(
        transport.frames(),
        vec![Frame::DatagramFrame(Bytes::from_static(b"quack-ack"))]
    );
    assert!(transport.transmits() >= 1);
}

#[tokio::test]
async fn unknown_stream_aborts_connection_by_default() {
    let dropped = Arc::new(AtomicBool::new(false));
    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, never_finishing(dropped.clone()));

    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();
    // Let the application start so there is something to abort.
    tokio::task::yield_now().await;
    assert_eq!(connection.running_tasks(), 1);

    let err = connection
        .handle_event(common::data_event(8, b"who?", false))
        .unwrap_err();
    assert!(matches!(err, ConnectionError::UnknownStream { stream_id: 8 }));
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(transport.frames().contains(&Frame::Close {
        error_code: error_code::H3_ID_ERROR,
        reason: "event for unknown stream".into(),
    }));

    common::wait_until("abort", || dropped.load(Ordering::SeqCst)).await;
    assert_eq!(connection.running_tasks(), 0);

    let after = connection.handle_event(common::datagram_event(0, b"x"));
    assert!(matches!(after, Err(ConnectionError::Terminated)));
}

#[tokio::test]
async fn unknown_stream_ignored_when_configured() {
    let transport = RecordingTransport::new();
    let config = HttpConfig {
        unknown_stream_policy: UnknownStreamPolicy::Ignore,
        ..HttpConfig::default()
    };
    let connection = common::connect(&transport, Arc::new(PingPongApp), config, "h3");

    connection.handle_event(common::data_event(8, b"who?", false)).unwrap();
    connection.handle_event(common::datagram_event(12, b"who?")).unwrap();

    assert_eq!(connection.state(), ConnectionState::Active);
    assert!(!transport.is_closed());

    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();
    common::wait_until("response", || transport.frames_for(0).len() == 2).await;
}

#[tokio::test]
async fn retired_ids_are_not_reopened() {
    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, Arc::new(PingPongApp));

    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();
    common::wait_until("retirement", || connection.running_tasks() == 0).await;
    assert_eq!(connection.active_handlers(), 0);

    connection.handle_event(common::data_event(0, b"late", true)).unwrap();
    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();

    tokio::task::yield_now().await;
    assert_eq!(connection.active_handlers(), 0);
    assert_eq!(transport.frames_for(0).len(), 2);
    assert!(!transport.is_closed());
}

#[tokio::test]
async fn concurrent_exchanges_are_independent() {
    let app = common::app(|scope, mut receive, send| async move {
        let mut body = Vec::new();
        while let Some(h3_bridge::InboundMessage::HttpRequest { body: chunk, more_body }) =
            receive.receive().await
        {
            body.extend_from_slice(&chunk);
            if !more_body {
                break;
            }
        }
        send.send(OutboundMessage::response_start(200, vec![]))?;
        let reply = format!("{} {}", scope.path, String::from_utf8_lossy(&body));
        send.send(OutboundMessage::response_body(reply))?;
        Ok::<(), AppError>(())
    });

    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, app);

    connection
        .handle_event(common::headers_event(0, common::request_headers("POST", "/a"), false))
        .unwrap();
    connection
        .handle_event(common::headers_event(4, common::request_headers("POST", "/b"), false))
        .unwrap();
    connection.handle_event(common::data_event(4, b"second", true)).unwrap();
    connection.handle_event(common::data_event(0, b"first", true)).unwrap();
    assert_eq!(connection.active_handlers(), 2);

    common::wait_until("both responses", || {
        transport.frames_for(0).len() == 2 && transport.frames_for(4).len() == 2
    })
    .await;
    assert!(matches!(&transport.frames_for(0)[1], Frame::Data { data, .. } if data.as_ref() == b"/a first"));
    assert!(matches!(&transport.frames_for(4)[1], Frame::Data { data, .. } if data.as_ref() == b"/b second"));
}

#[tokio::test]
async fn shutdown_aborts_running_applications() {
    let dropped = Arc::new(AtomicBool::new(false));
    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, never_finishing(dropped.clone()));

    connection
        .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
        .unwrap();
    tokio::task::yield_now().await;
    assert_eq!(connection.running_tasks(), 1);

    connection.shutdown();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(connection.running_tasks(), 0);
    common::wait_until("abort", || dropped.load(Ordering::SeqCst)).await;
}

#[tokio::test]
async fn dropping_connection_aborts_applications() {
    let dropped = Arc::new(AtomicBool::new(false));
    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, never_finishing(dropped.clone()));

    connection
        .handle_event(common::headers_event(0, common::connect_headers("/"), false))
        .unwrap();
    tokio::task::yield_now().await;
    drop(connection);

    common::wait_until("abort", || dropped.load(Ordering::SeqCst)).await;
    common::wait_until("session close", || transport.frames_for(0).len() == 2).await;
    assert_eq!(transport.frames_for(0)[0].header(":status"), Some("403"));
}

#[tokio::test]
async fn dropping_before_first_poll_still_rejects_session() {
    let dropped = Arc::new(AtomicBool::new(false));
    let transport = RecordingTransport::new();
    let connection = common::connect_h3(&transport, never_finishing(dropped.clone()));

    connection
        .handle_event(common::headers_event(0, common::connect_headers("/"), false))
        .unwrap();
    drop(connection);

    common::wait_until("session close", || transport.frames_for(0).len() == 2).await;
    let frames = transport.frames_for(0);
    assert_eq!(frames[0].header(":status"), Some("403"));
    assert_eq!(
        frames[1],
        Frame::Data {
            stream_id: 0,
            data: Bytes::new(),
            end_stream: true,
        }
    );
}

#[test]
fn events_may_come_from_threads_outside_the_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let transport = RecordingTransport::new();
    let connection = runtime.block_on(async { common::connect_h3(&transport, Arc::new(PingPongApp)) });

    // The engine's own thread has no runtime context.
    std::thread::scope(|scope| {
        scope.spawn(|| {
            connection
                .handle_event(common::headers_event(0, common::request_headers("GET", "/"), true))
                .unwrap();
        });
    });

    runtime.block_on(common::wait_until("response", || transport.frames_for(0).len() == 2));
    assert_eq!(transport.frames_for(0)[0].header(":status"), Some("200"));
    drop(connection);
}

#[tokio::test]
async fn connection_ids_are_unique() {
    let transport = RecordingTransport::new();
    let a = Connection::new(transport.clone(), Arc::new(PingPongApp), HttpConfig::default());
    let b = Connection::new(transport, Arc::new(PingPongApp), HttpConfig::default());
    assert_ne!(a.id(), b.id());
    assert!(a.id().to_string().starts_with("conn-"));
}
