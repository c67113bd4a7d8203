//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that TLS material is complete
//! - Validate value ranges (port, datagram size, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BridgeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("server.certificate is required")]
    MissingCertificate,

    #[error("server.private_key requires server.certificate")]
    KeyWithoutCertificate,

    #[error("server.alpn_protocols must not be empty")]
    NoAlpnProtocols,

    #[error("server.max_datagram_frame_size must be non-zero")]
    ZeroDatagramFrameSize,

    #[error("http.server_name must not be empty")]
    EmptyServerName,

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    match (&server.certificate, &server.private_key) {
        (None, Some(_)) => errors.push(ValidationError::KeyWithoutCertificate),
        (None, None) => errors.push(ValidationError::MissingCertificate),
        _ => {}
    }
    if server.alpn_protocols.is_empty() {
        errors.push(ValidationError::NoAlpnProtocols);
    }
    if server.max_datagram_frame_size == 0 {
        errors.push(ValidationError::ZeroDatagramFrameSize);
    }
    if config.http.server_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
