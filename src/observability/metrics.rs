//! Metrics collection and exposition.
//!
//! # Metrics
//! - `h3_bridge_handlers_opened_total` (counter): handlers created, by kind
//! - `h3_bridge_handlers_retired_total` (counter): handlers retired, by kind
//! - `h3_bridge_active_handlers` (gauge): handlers currently routed to
//! - `h3_bridge_push_total` (counter): push attempts, by outcome
//! - `h3_bridge_session_transitions_total` (counter): session states entered
//! - `h3_bridge_datagrams_total` (counter): session datagrams, by direction
//! - `h3_bridge_app_failures_total` (counter): failed application tasks, by kind

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_handler_opened(kind: &'static str) {
    ::metrics::counter!("h3_bridge_handlers_opened_total", "kind" => kind).increment(1);
    ::metrics::gauge!("h3_bridge_active_handlers").increment(1.0);
}

pub fn record_handler_retired(kind: &'static str) {
    ::metrics::counter!("h3_bridge_handlers_retired_total", "kind" => kind).increment(1);
    ::metrics::gauge!("h3_bridge_active_handlers").decrement(1.0);
}

/// `outcome` is `promised` or `exhausted`.
pub fn record_push(outcome: &'static str) {
    ::metrics::counter!("h3_bridge_push_total", "outcome" => outcome).increment(1);
}

pub fn record_session_transition(state: &'static str) {
    ::metrics::counter!("h3_bridge_session_transitions_total", "state" => state).increment(1);
}

/// `direction` is `sent` or `received`.
pub fn record_datagram(direction: &'static str) {
    ::metrics::counter!("h3_bridge_datagrams_total", "direction" => direction).increment(1);
}

pub fn record_app_failure(kind: &'static str) {
    ::metrics::counter!("h3_bridge_app_failures_total", "kind" => kind).increment(1);
}
