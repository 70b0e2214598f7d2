use clap::Parser;

use recycling_proxy::config::Cli;
use recycling_proxy::http::HttpServer;
use recycling_proxy::lifecycle::{signals, Shutdown};
use recycling_proxy::net::CountingAcceptor;
use recycling_proxy::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("recycling-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_host = %config.upstream.host,
        upstream_port = config.upstream.port,
        requests_per_conn = config.recycling.requests_per_conn,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(&config)?;
    let acceptor = CountingAcceptor::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let mut server_task = tokio::spawn(server.run(acceptor, server_shutdown));

    let outcome = tokio::select! {
        joined = &mut server_task => joined,
        _ = signals::shutdown_signal() => {
            shutdown.trigger();
            server_task.await
        }
    };
    outcome??;

    tracing::info!("Shutdown complete");
    Ok(())
}
