//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("upstream.host must not be empty")]
    EmptyUpstreamHost,

    #[error("upstream.port must not be zero")]
    ZeroUpstreamPort,

    #[error("upstream.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    let upstream = &config.upstream;
    if upstream.host.trim().is_empty() {
        errors.push(ValidationError::EmptyUpstreamHost);
    }
    if upstream.port == 0 {
        errors.push(ValidationError::ZeroUpstreamPort);
    }
    for (name, secs) in [
        ("connect_timeout_secs", upstream.connect_timeout_secs),
        ("tcp_keepalive_secs", upstream.tcp_keepalive_secs),
        ("pool_idle_timeout_secs", upstream.pool_idle_timeout_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
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
