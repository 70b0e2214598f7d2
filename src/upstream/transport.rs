//! Pooled HTTP client towards the upstream target.
//!
//! # Responsibilities
//! - Dial the target with a connect timeout and TCP keep-alive
//! - Pool idle upstream connections
//!
//! # Design Decisions
//! - Timeouts live here as transport configuration; the recycling logic has none
//! - Upstream pooling is independent from downstream recycling
//! - The target is dialed directly; `HTTP_PROXY`-style environment settings
//!   are not consulted

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client, Error as ClientError},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::config::UpstreamConfig;

/// Delivers requests to the upstream target over pooled connections.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_keepalive(Some(Duration::from_secs(config.tcp_keepalive_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Self { client }
    }

    /// Send a request whose URI already points at the target.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Incoming>, ClientError> {
        self.client.request(request).await
    }
}
