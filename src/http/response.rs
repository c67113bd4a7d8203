//! Response header synthesis.
//!
//! # Responsibilities
//! - Build `:status` / `server` / `date` header blocks
//! - Build the WebTransport accept and reject blocks
//! - Build request headers for promised pushes

use bytes::Bytes;
use chrono::Utc;

use crate::transport::HeaderField;

/// Header advertising the WebTransport draft to the client.
pub const WEBTRANSPORT_DRAFT_HEADER: &str = "sec-webtransport-http3-draft";

/// Status sent when a session is closed before being accepted.
pub const SESSION_REJECTED_STATUS: u16 = 403;

/// Current time as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `:status`, `server` and `date` followed by `extra` in order.
pub fn response_headers(
    status: u16,
    server_name: &str,
    extra: impl IntoIterator<Item = HeaderField>,
) -> Vec<HeaderField> {
    let mut headers = vec![
        HeaderField::new(Bytes::from_static(b":status"), status.to_string()),
        HeaderField::new(Bytes::from_static(b"server"), server_name.to_owned()),
        HeaderField::new(Bytes::from_static(b"date"), http_date()),
    ];
    headers.extend(extra);
    headers
}

pub fn session_accept_headers(server_name: &str, draft: &str) -> Vec<HeaderField> {
    response_headers(
        200,
        server_name,
        [HeaderField::new(
            Bytes::from_static(WEBTRANSPORT_DRAFT_HEADER.as_bytes()),
            draft.to_owned(),
        )],
    )
}

pub fn session_reject_headers() -> Vec<HeaderField> {
    vec![HeaderField::new(
        Bytes::from_static(b":status"),
        SESSION_REJECTED_STATUS.to_string(),
    )]
}

/// Request headers of a pushed `GET`, followed by `extra` in order.
pub fn push_request_headers(
    authority: &Bytes,
    path: &str,
    extra: impl IntoIterator<Item = HeaderField>,
) -> Vec<HeaderField> {
    let mut headers = vec![
        HeaderField::new(Bytes::from_static(b":method"), Bytes::from_static(b"GET")),
        HeaderField::new(Bytes::from_static(b":scheme"), Bytes::from_static(b"https")),
        HeaderField::new(Bytes::from_static(b":authority"), authority.clone()),
        HeaderField::new(Bytes::from_static(b":path"), path.to_owned()),
    ];
    headers.extend(extra);
    headers
}
