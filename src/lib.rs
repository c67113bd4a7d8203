//! HTTP/3 and WebTransport bridge for ASGI-style applications.
//!
//! # Architecture Overview
//!
//! ```text
//!     QUIC engine                    ┌──────────────────────────────────────────────┐
//!     (external)                     │                  h3-bridge                    │
//!                                    │                                               │
//!     QuicEvent ─────────────────────┼─▶ net::Connection ──▶ registry               │
//!                                    │        │  (ALPN, quack, routing)              │
//!                                    │        ▼                                      │
//!                                    │   http::request / http::webtransport          │
//!                                    │        │  receive()        ▲ send()           │
//!                                    │        ▼                   │                  │
//!                                    │   Application task (one per exchange)         │
//!                                    │        │                                      │
//!     Transport primitives ◀─────────┼────────┘  headers, data, datagrams, pushes    │
//!                                    │                                               │
//!                                    │   config · observability · ticket store      │
//!                                    └──────────────────────────────────────────────┘
//! ```
//!
//! The engine owns packets, TLS and QPACK. It calls
//! [`Connection::handle_event`] for every event and implements
//! [`Transport`] for the frames the bridge sends back.

pub mod config;
pub mod demo;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod ticket;
pub mod transport;

pub use config::BridgeConfig;
pub use error::{ConnectionError, SendError};
pub use http::{Application, InboundMessage, MessageReceiver, MessageSender, OutboundMessage, Scope};
pub use net::Connection;
pub use ticket::{SessionTicket, SessionTicketStore};
pub use transport::{HttpEvent, QuicEvent, Transport};
