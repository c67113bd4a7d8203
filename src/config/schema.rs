//! Configuration schema definitions.
//!
//! All types derive Serde traits and default every field, so an empty file
//! is a valid (if certificate-less) configuration.

use serde::{Deserialize, Serialize};

use crate::transport::{H0_ALPN, H3_ALPN, SIDUCK_ALPN};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// QUIC endpoint settings, consumed by the embedding transport.
    pub server: ServerConfig,

    /// HTTP adaptation settings.
    pub http: HttpConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// QUIC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen host (e.g., "::").
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Path to the TLS certificate (PEM).
    pub certificate: Option<String>,

    /// Path to the TLS private key (PEM).
    pub private_key: Option<String>,

    /// Directory for qlog output.
    pub quic_log_dir: Option<String>,

    /// ALPN protocols offered, in preference order.
    pub alpn_protocols: Vec<String>,

    /// Largest DATAGRAM frame accepted.
    pub max_datagram_frame_size: u64,

    /// Send a Retry packet for address validation.
    pub retry: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "::".to_string(),
            port: 4433,
            certificate: None,
            private_key: None,
            quic_log_dir: None,
            alpn_protocols: H3_ALPN
                .iter()
                .chain(H0_ALPN)
                .chain([&SIDUCK_ALPN])
                .map(|alpn| alpn.to_string())
                .collect(),
            max_datagram_frame_size: 65536,
            retry: true,
        }
    }
}

/// What the dispatcher does with an event for an id it never opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStreamPolicy {
    /// Close the connection with H3_ID_ERROR.
    #[default]
    Abort,
    /// Log and drop the event.
    Ignore,
}

/// HTTP adaptation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Value of the `server` response header.
    pub server_name: String,

    /// Value of `sec-webtransport-http3-draft` on accepted sessions.
    pub webtransport_draft: String,

    /// Honor `http.response.push` on HTTP/3.
    pub push_enabled: bool,

    pub unknown_stream_policy: UnknownStreamPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: concat!("h3-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
            webtransport_draft: "draft02".to_string(),
            push_enabled: true,
            unknown_stream_policy: UnknownStreamPolicy::Abort,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
