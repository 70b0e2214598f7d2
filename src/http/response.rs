//! Response handling.
//!
//! # Responsibilities
//! - Turn the upstream response into a client response
//! - Strip hop-by-hop headers coming from the upstream
//! - Map upstream failures to 502 Bad Gateway
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Upstream `Connection` headers never reach the client; only the
//!   recycling hook decides whether the downstream connection closes

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use crate::http::request::strip_hop_by_hop;

/// Convert an upstream response for the downstream client.
pub fn from_upstream(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Response sent when the upstream could not be reached.
pub fn bad_gateway() -> Response<Body> {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}
