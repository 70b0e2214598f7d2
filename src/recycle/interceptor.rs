//! Request and response hooks around the upstream call.

use axum::body::Body;
use axum::http::header::{HeaderValue, CONNECTION};
use axum::http::{Request, Response};

use crate::net::ConnectionContext;
use crate::observability::metrics;
use crate::recycle::RecyclePolicy;
use crate::upstream::Target;

/// Runs before a request is forwarded.
///
/// Points the request at the target and counts it against its connection.
/// The close decision is left to [`ResponseInterceptor`], so the request that
/// crosses the threshold is still served in full.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    target: Target,
}

impl RequestInterceptor {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    /// Rewrite the destination and bump the connection's counter.
    ///
    /// Returns the new count, or `None` when the request did not come through
    /// the counting acceptor. In that case nothing is counted.
    pub fn intercept(&self, request: &mut Request<Body>) -> Option<u64> {
        let uri = self.target.rewrite(request.uri());
        *request.uri_mut() = uri;

        let context = request.extensions().get::<ConnectionContext>()?;
        let served = context.counter().increment();

        tracing::trace!(
            connection_id = %context.id(),
            requests = served,
            "Request counted"
        );
        Some(served)
    }
}

/// Runs on the upstream response before it is returned to the client.
#[derive(Debug, Clone, Copy)]
pub struct ResponseInterceptor {
    policy: RecyclePolicy,
}

impl ResponseInterceptor {
    pub fn new(policy: RecyclePolicy) -> Self {
        Self { policy }
    }

    /// Mark the response `Connection: close` once the originating connection
    /// has served at least the threshold. Returns true if the header was set.
    ///
    /// An HTTP/1.0 client that asked for keep-alive sees
    /// `connection: close, keep-alive` because hyper adds its own token on
    /// write. The connection still closes after this response.
    pub fn intercept(&self, connection: Option<&ConnectionContext>, response: &mut Response<Body>) -> bool {
        let Some(context) = connection else {
            return false;
        };

        let served = context.counter().current();
        if !self.policy.should_recycle(served) {
            return false;
        }

        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));

        if context.mark_closing() {
            metrics::record_connection_recycled();
            tracing::debug!(
                connection_id = %context.id(),
                peer_addr = %context.peer_addr(),
                requests = served,
                threshold = self.policy.threshold(),
                "Recycling connection"
            );
        }
        true
    }
}
