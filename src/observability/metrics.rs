//! Metrics collection and exposition.
//!
//! # Metrics
//! - `recycler_connections_accepted_total` (counter): accepted client connections
//! - `recycler_active_connections` (gauge): currently open client connections
//! - `recycler_connections_recycled_total` (counter): connections told to close
//! - `recycler_requests_total` (counter): requests by method, status
//! - `recycler_request_duration_seconds` (histogram): latency distribution
//! - `recycler_upstream_errors_total` (counter): failed upstream calls
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so tests and
//!   library users pay nothing

use axum::http::Method;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    counter!("recycler_connections_accepted_total").increment(1);
}

pub fn record_connection_opened() {
    gauge!("recycler_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("recycler_active_connections").decrement(1.0);
}

pub fn record_connection_recycled() {
    counter!("recycler_connections_recycled_total").increment(1);
}

pub fn record_request(method: &Method, status: u16, start: Instant) {
    counter!(
        "recycler_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("recycler_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    counter!("recycler_upstream_errors_total").increment(1);
}
