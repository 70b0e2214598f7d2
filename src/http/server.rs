//! HTTP server setup and the accept loop.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy handler
//! - Accept connections and serve each one over HTTP/1.1 in its own task
//! - Attach each connection's context to every request it carries
//! - Run the recycling interceptors around the upstream call
//! - Drain open connections on shutdown

use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
    Router,
};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tower::Layer;
use tower_http::{add_extension::AddExtensionLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::{request::prepare_upstream_request, response};
use crate::net::{AcceptedConnection, Acceptor, ConnectionContext, ConnectionTracker, ListenerError};
use crate::observability::metrics;
use crate::recycle::{RecyclePolicy, RequestInterceptor, ResponseInterceptor};
use crate::upstream::{Target, TargetError, UpstreamClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub request_interceptor: RequestInterceptor,
    pub response_interceptor: ResponseInterceptor,
    pub upstream: UpstreamClient,
}

/// HTTP server for the recycling proxy.
pub struct HttpServer {
    router: Router,
    target: Target,
    policy: RecyclePolicy,
    drain_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, TargetError> {
        let target = Target::from_config(&config.upstream)?;
        let policy = RecyclePolicy::from_config(&config.recycling);

        let state = AppState {
            request_interceptor: RequestInterceptor::new(target.clone()),
            response_interceptor: ResponseInterceptor::new(policy),
            upstream: UpstreamClient::new(&config.upstream),
        };

        Ok(Self {
            router: Self::build_router(state),
            target,
            policy,
            drain_timeout: Duration::from_secs(config.listener.drain_timeout_secs),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Accept connections until `shutdown` fires or accepting fails.
    ///
    /// An accept failure stops the loop and is returned after open
    /// connections have drained.
    pub async fn run<A: Acceptor>(
        self,
        acceptor: A,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = acceptor.local_addr() {
            tracing::info!(
                address = %addr,
                target = %self.target,
                requests_per_conn = self.policy.threshold(),
                "HTTP server starting"
            );
        }

        let tracker = ConnectionTracker::new();

        let outcome = loop {
            let accepted = tokio::select! {
                res = acceptor.accept() => res,
                _ = shutdown.recv() => break Ok(()),
            };

            match accepted {
                Ok(connection) => {
                    tokio::spawn(serve_connection(
                        connection,
                        self.router.clone(),
                        tracker.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed, stopping server");
                    break Err(e);
                }
            }
        };

        drop(acceptor);
        tracker.begin_drain();
        if !tracker.wait_for_idle(self.drain_timeout).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Drain deadline passed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        outcome
    }
}

/// Serve one client connection until it closes or the server drains.
async fn serve_connection(accepted: AcceptedConnection, router: Router, tracker: ConnectionTracker) {
    let AcceptedConnection {
        stream,
        context,
        permit,
    } = accepted;
    let _guard = tracker.track(&context);
    let mut drain = tracker.drain_receiver();

    let service = TowerToHyperService::new(AddExtensionLayer::new(context.clone()).layer(router));
    let connection = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        res = connection.as_mut() => res,
        _ = drain.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %context.id(), error = %e, "Connection ended with error");
    }
    drop(permit);
}

/// Main proxy handler.
/// Counts the request, forwards it to the target and marks the response for
/// closure once the connection has reached its request threshold.
async fn proxy_handler(State(state): State<AppState>, mut request: Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let connection = request.extensions().get::<ConnectionContext>().cloned();

    let served = state.request_interceptor.intercept(&mut request);
    prepare_upstream_request(&mut request, connection.as_ref().map(ConnectionContext::peer_addr));

    tracing::debug!(
        connection_id = ?connection.as_ref().map(ConnectionContext::id),
        requests = ?served,
        method = %method,
        uri = %request.uri(),
        "Proxying request"
    );

    match state.upstream.forward(request).await {
        Ok(upstream_response) => {
            let mut response: Response<Body> = response::from_upstream(upstream_response);
            state
                .response_interceptor
                .intercept(connection.as_ref(), &mut response);
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            tracing::error!(
                connection_id = ?connection.as_ref().map(ConnectionContext::id),
                error = %e,
                "Upstream error"
            );
            metrics::record_upstream_error();
            metrics::record_request(&method, 502, start_time);
            response::bad_gateway()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ConnectionState;
    use axum::http::{header::CONNECTION, StatusCode};
    use tower::ServiceExt;

    async fn unreachable_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn server(upstream_port: u16, requests_per_conn: u64) -> HttpServer {
        let mut config = ProxyConfig::default();
        config.upstream.host = "127.0.0.1".to_string();
        config.upstream.port = upstream_port;
        config.upstream.connect_timeout_secs = 2;
        config.recycling.requests_per_conn = requests_per_conn;
        HttpServer::new(&config).unwrap()
    }

    fn request_on(context: &ConnectionContext) -> Request {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(context.clone());
        request
    }

    #[tokio::test]
    async fn upstream_failure_at_threshold_counts_without_closing() {
        let server = server(unreachable_port().await, 1);
        let context = ConnectionContext::new(
            "127.0.0.1:50000".parse().unwrap(),
            "127.0.0.1:1616".parse().unwrap(),
        );

        for served in 1..=2 {
            let response = server.router.clone().oneshot(request_on(&context)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
            assert!(response.headers().get(CONNECTION).is_none());
            assert_eq!(context.counter().current(), served);
            assert_eq!(context.state(), ConnectionState::Open);
        }
    }

    #[tokio::test]
    async fn request_without_context_is_still_answered() {
        let server = server(unreachable_port().await, 1);
        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let response = server.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(CONNECTION).is_none());
    }
}
