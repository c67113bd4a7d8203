//! Connection layer.
//!
//! # Data Flow
//! ```text
//! QuicEvent (from the transport engine)
//!     → connection.rs (ALPN selection, quack reply, routing)
//!     → registry.rs (stream/session id → handler, task handles)
//!     → http handlers → application task
//!
//! Connection States:
//!     Negotiating → Active → Closed
//! ```
//!
//! # Design Decisions
//! - One `Connection` per QUIC connection, driven by the engine's event loop
//! - Ids are retired, never reused; late events for them are dropped
//! - Tearing the connection down aborts every application task

pub mod connection;
pub(crate) mod registry;

pub use connection::{Connection, ConnectionId, ConnectionState};
