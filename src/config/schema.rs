//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the recycling proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// The single upstream service and its transport settings.
    pub upstream: UpstreamConfig,

    /// Connection recycling threshold.
    pub recycling: RecyclingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1616").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long shutdown waits for open connections to finish.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1616".to_string(),
            max_connections: 10_000,
            drain_timeout_secs: 30,
        }
    }
}

/// Upstream target and transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream host name or IP.
    pub host: String,

    /// Upstream port.
    pub port: u16,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// TCP keep-alive interval for upstream sockets in seconds.
    pub tcp_keepalive_secs: u64,

    /// How long an idle pooled upstream connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections to the upstream. There is a single
    /// upstream host, so this is also the overall idle cap.
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            connect_timeout_secs: 30,
            tcp_keepalive_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 100,
        }
    }
}

/// Connection recycling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RecyclingConfig {
    /// Requests served on one connection before it is closed.
    pub requests_per_conn: u64,
}

impl Default for RecyclingConfig {
    fn default() -> Self {
        Self {
            requests_per_conn: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
