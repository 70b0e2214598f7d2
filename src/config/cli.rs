//! Command-line flags.
//!
//! Flags override values read from the optional config file.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::loader::{read_config, validated, ConfigError};
use crate::config::schema::ProxyConfig;

#[derive(Debug, Parser)]
#[command(name = "recycling-proxy", version)]
#[command(about = "Reverse proxy that closes client connections after a fixed number of requests", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Upstream host requests are forwarded to.
    #[arg(long = "target-service-host", alias = "target_service_host")]
    pub target_host: Option<String>,

    /// Upstream port requests are forwarded to.
    #[arg(long = "target-service-port", alias = "target_service_port")]
    pub target_port: Option<u16>,

    /// Local port to listen on (all interfaces unless the config file says otherwise).
    #[arg(long = "listen-port", alias = "listen_port")]
    pub listen_port: Option<u16>,

    /// Maximum requests served per client connection.
    #[arg(long = "requests-per-conn", alias = "requests_per_conn")]
    pub requests_per_conn: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the final configuration: file (or defaults), then flags, then validation.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        validated(self.apply(base))
    }

    /// Apply flag overrides to `config`.
    pub fn apply(self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(host) = self.target_host {
            config.upstream.host = host;
        }
        if let Some(port) = self.target_port {
            config.upstream.port = port;
        }
        if let Some(port) = self.listen_port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }
        if let Some(limit) = self.requests_per_conn {
            config.recycling.requests_per_conn = limit;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        config
    }
}
