//! HTTP exchange handling.
//!
//! # Data Flow
//! ```text
//! HttpEvent (from net::connection)
//!     → scope.rs (request head → immutable Scope)
//!     → request.rs (HTTP request/response, push)
//!       webtransport.rs (session state machine, backlog)
//!     → message.rs (InboundMessage) → application receive()
//!
//! application send() → message.rs (OutboundMessage)
//!     → response.rs (header blocks)
//!     → Transport primitives, then transmit
//! ```

pub mod exchange;
pub mod message;
pub mod request;
pub mod response;
pub mod scope;
pub mod webtransport;

pub use exchange::{AppError, Application, MessageReceiver, MessageSender};
pub use message::{InboundMessage, OutboundMessage};
pub use request::ResponseState;
pub use scope::{Extensions, RequestHead, Scope, ScopeType};
pub use webtransport::SessionState;
