//! wirecall - RPC server
//!
//! Hosts the built-in `echo` service over the wirecall wire protocol and
//! advertises it through the configured service registry.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wirecall_server::{echo_service, run_metrics_server, Config, Metrics, Server, ECHO_SERVICE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if WIRECALL_CONFIG is set, then env overrides)
    let config_path = std::env::var("WIRECALL_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::warn!("Invalid environment configuration ({}), using defaults", e);
            Config::default()
        }
    };

    tracing::info!("Starting wirecall server");
    tracing::info!("  Listen: {}:{}", config.network.host, config.network.port);
    tracing::info!("  Advertise host: {}", config.network.advertised_host());
    tracing::info!("  Read timeout: {}ms", config.network.read_timeout_ms);
    tracing::info!(
        "  Rate limit: {}/s (burst {}, wait {}ms)",
        config.rate_limit.rate,
        config.rate_limit.burst,
        config.rate_limit.timeout_ms
    );
    tracing::info!("  Registry: {}", config.registry.backend);

    let registry = config.registry.create_client().map_err(|e| {
        tracing::error!("Failed to create registry client: {}", e);
        e
    })?;

    let mut server_config = config.server_config();
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(metrics.clone());
        tracing::info!("  Metrics: enabled on {}", config.metrics.bind_addr);
        Some(metrics)
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let mut server = Server::bind(server_config, registry.clone()).await?;
    server.register(ECHO_SERVICE, echo_service()).await?;
    let server = Arc::new(server);

    let metrics_handle = metrics.map(|metrics| {
        let addr = config.metrics.bind_addr;
        let shutdown = server.subscribe_shutdown();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                tracing::error!("Metrics server error: {}", e);
            }
        })
    });

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    if let Err(e) = registry.close().await {
        tracing::warn!("Failed to close registry client: {}", e);
    }

    tracing::info!("Server stopped");
    Ok(())
}
