//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, handlers, supervisors produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder it is a no-op
//! - `connection_id` and `stream_id` fields correlate events of one exchange

pub mod logging;
pub mod metrics;
