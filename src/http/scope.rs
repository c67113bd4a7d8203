//! Scope construction from a request header block.
//!
//! # Responsibilities
//! - Pull the request line out of the pseudo-headers
//! - Split `:path` into path and query string
//! - Decide between an `http` and a `webtransport` exchange
//!
//! # Design Decisions
//! - Malformed or missing pseudo-headers degrade to empty values, never fail
//! - Non-UTF-8 method and path bytes are decoded lossily
//! - The scope is built once and shared read-only behind an `Arc`

use std::net::SocketAddr;

use bytes::Bytes;
use serde::Serialize;

use crate::transport::{HeaderField, HttpVariant};

/// Kind of exchange described by a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Http,
    #[serde(rename = "webtransport")]
    WebTransport,
}

/// Optional capabilities advertised to the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extensions {
    /// `http.response.push` may be sent.
    #[serde(rename = "http.response.push", skip_serializing_if = "std::ops::Not::not")]
    pub http_response_push: bool,
}

/// Immutable description of one request or session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    pub method: String,
    pub path: String,
    pub raw_path: Bytes,
    pub query_string: Bytes,
    pub headers: Vec<HeaderField>,
    pub http_version: String,
    pub scheme: String,
    pub client: Option<SocketAddr>,
    pub root_path: String,
    pub extensions: Extensions,
}

impl Scope {
    /// Build the scope for a freshly opened exchange.
    pub fn new(
        head: &RequestHead,
        variant: HttpVariant,
        client: Option<SocketAddr>,
        push_enabled: bool,
    ) -> Self {
        let (path, query_string) = head.split_path();
        let scope_type = if head.is_webtransport() && variant.supports_webtransport() {
            ScopeType::WebTransport
        } else {
            ScopeType::Http
        };
        let extensions = Extensions {
            http_response_push: scope_type == ScopeType::Http
                && push_enabled
                && variant.supports_push(),
        };

        Self {
            scope_type,
            method: head.method.clone(),
            path,
            raw_path: head.raw_path.clone(),
            query_string,
            headers: head.headers.clone(),
            http_version: variant.http_version().to_string(),
            scheme: "https".to_string(),
            client,
            root_path: String::new(),
            extensions,
        }
    }

    pub fn is_webtransport(&self) -> bool {
        self.scope_type == ScopeType::WebTransport
    }

    /// First value of a regular header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name.as_bytes()))
            .map(|h| &h.value)
    }
}

/// Request line and regular headers extracted from a header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub raw_path: Bytes,
    pub authority: Option<Bytes>,
    pub protocol: Option<String>,
    /// Regular headers in arrival order, with `host` standing in for `:authority`.
    pub headers: Vec<HeaderField>,
}

impl RequestHead {
    pub fn parse(fields: &[HeaderField]) -> Self {
        let mut head = RequestHead::default();

        for field in fields {
            match field.name.as_ref() {
                b":authority" => {
                    head.authority = Some(field.value.clone());
                    head.headers
                        .push(HeaderField::new(Bytes::from_static(b"host"), field.value.clone()));
                }
                b":method" => head.method = String::from_utf8_lossy(&field.value).into_owned(),
                b":path" => head.raw_path = field.value.clone(),
                b":protocol" => {
                    head.protocol = Some(String::from_utf8_lossy(&field.value).into_owned())
                }
                name if !name.is_empty() && !field.is_pseudo() => head.headers.push(field.clone()),
                _ => {}
            }
        }

        if head.method.is_empty() || head.raw_path.is_empty() {
            tracing::debug!(
                method = %head.method,
                has_path = !head.raw_path.is_empty(),
                "Request head missing pseudo-headers"
            );
        }

        head
    }

    /// Extended CONNECT for a WebTransport session.
    pub fn is_webtransport(&self) -> bool {
        self.method == "CONNECT" && self.protocol.as_deref() == Some("webtransport")
    }

    /// Split `:path` on the first `?` into the decoded path and raw query.
    pub fn split_path(&self) -> (String, Bytes) {
        match self.raw_path.iter().position(|&b| b == b'?') {
            Some(index) => (
                String::from_utf8_lossy(&self.raw_path[..index]).into_owned(),
                self.raw_path.slice(index + 1..),
            ),
            None => (
                String::from_utf8_lossy(&self.raw_path).into_owned(),
                Bytes::new(),
            ),
        }
    }
}
