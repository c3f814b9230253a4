//! wirecall-cli - Command-line caller for wirecall services
//!
//! Resolves the target service through the configured registry and makes
//! one proxied call per invocation.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wirecall_client::{ClientOptions, ClientProxy};
use wirecall_protocol::{CompressType, SerializeType};
use wirecall_registry::config::split_endpoints;
use wirecall_registry::{RegistryBackend, RegistryConfig};

#[derive(Parser)]
#[command(name = "wirecall-cli")]
#[command(about = "Call methods on wirecall services")]
#[command(version)]
struct Cli {
    /// Registry backend (static, etcd, nacos)
    #[arg(short, long, env = "WIRECALL_REGISTRY", default_value = "static")]
    registry: RegistryBackend,

    /// Comma-separated registry endpoints
    #[arg(short, long, env = "WIRECALL_REGISTRY_ENDPOINTS")]
    endpoints: Option<String>,

    /// Server address used by the static registry
    #[arg(short, long, env = "WIRECALL_ADDRESS", default_value = "127.0.0.1:9222")]
    address: String,

    /// Nacos namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Nacos group
    #[arg(long)]
    group: Option<String>,

    /// Payload serializer (msgpack, protobuf)
    #[arg(short, long, default_value = "msgpack")]
    serializer: SerializeType,

    /// Body compressor (gzip, none)
    #[arg(short, long, default_value = "gzip")]
    compressor: CompressType,

    /// Attempts per call
    #[arg(long, default_value_t = wirecall_client::options::DEFAULT_RETRIES)]
    retries: usize,

    /// Connection timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Call a method
    Call {
        /// Service name
        service: String,

        /// Method name
        method: String,

        /// Arguments as JSON values (@file.json reads from file; anything
        /// that is not JSON is sent as a string)
        args: Vec<String>,
    },

    /// Ping the server hosting a service
    Ping {
        /// Service name
        service: String,
    },
}

impl Cli {
    fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::fixed(self.address.clone()).with_backend(self.registry);
        if let Some(ref endpoints) = self.endpoints {
            config = config.with_endpoints(split_endpoints(endpoints));
        }
        config.namespace = self.namespace.clone();
        config.group = self.group.clone();
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let registry = cli.registry_config().create_client().map_err(|e| {
        eprintln!("{}: {}", "Registry setup failed".red(), e);
        e
    })?;
    let options = ClientOptions::new()
        .with_registry(registry.clone())
        .with_serialize_type(cli.serializer)
        .with_compress_type(cli.compressor)
        .with_retries(cli.retries)
        .with_connect_timeout(Duration::from_millis(cli.connect_timeout_ms))
        .with_request_timeout(Duration::from_millis(cli.timeout_ms));
    let proxy = ClientProxy::new(options);

    let result = commands::execute(&proxy, cli.command).await;
    if let Err(e) = registry.close().await {
        tracing::debug!("Registry close failed: {}", e);
    }

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  {}: {}", "caused by".dimmed(), cause);
                source = cause.source();
            }
            std::process::exit(1);
        }
    }
}
