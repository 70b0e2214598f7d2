//! Request preparation for forwarding.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers before the request leaves for the upstream
//! - Record the client address in `X-Forwarded-For`
//! - Normalize the protocol version towards the upstream
//!
//! # Design Decisions
//! - The client's `Host` header is forwarded unchanged

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use axum::http::{Request, Version};
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only make sense on a single hop.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any header listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Append `client` to the `X-Forwarded-For` chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let client_ip = client.ip().to_string();
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{}, {}", prior, client_ip),
        _ => client_ip,
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Make a downstream request fit to send upstream.
pub fn prepare_upstream_request<B>(request: &mut Request<B>, client: Option<SocketAddr>) {
    strip_hop_by_hop(request.headers_mut());
    if let Some(addr) = client {
        append_forwarded_for(request.headers_mut(), addr);
    }
    *request.version_mut() = Version::HTTP_11;
}
