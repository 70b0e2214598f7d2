//! The fixed upstream address every request is forwarded to.

use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::Uri;
use thiserror::Error;

use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Upstream host is empty")]
    EmptyHost,

    #[error("Invalid upstream authority {authority:?}: {source}")]
    InvalidAuthority {
        authority: String,
        #[source]
        source: InvalidUri,
    },
}

/// Upstream scheme and authority. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: Scheme,
    authority: Authority,
}

impl Target {
    /// Build a plain-HTTP target from a host and port.
    pub fn http(host: &str, port: u16) -> Result<Self, TargetError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TargetError::EmptyHost);
        }

        // Bare IPv6 literals need brackets inside an authority.
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        let parsed = authority
            .parse::<Authority>()
            .map_err(|source| TargetError::InvalidAuthority { authority, source })?;

        Ok(Self {
            scheme: Scheme::HTTP,
            authority: parsed,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, TargetError> {
        Self::http(&config.host, config.port)
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Point `uri` at this target, keeping its path and query.
    pub fn rewrite(&self, uri: &Uri) -> Uri {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
