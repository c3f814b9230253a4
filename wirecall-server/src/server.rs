//! TCP server implementation.

use crate::connection::{handle_connection, ConnectionContext};
use crate::error::ServerError;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::service::{Service, ServiceMap};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use wirecall_registry::ServiceRegistry;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Host to listen on.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Host written to the registry.
    pub advertise_host: String,
    /// Tokens per second admitted by the rate limiter.
    pub rate_limit: f64,
    /// Rate limiter bucket capacity.
    pub rate_burst: u32,
    /// Longest a connection waits for admission.
    pub rate_limit_timeout: Duration,
    /// Longest a connection may take to deliver its request frame.
    pub read_timeout: Duration,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("advertise_host", &self.advertise_host)
            .field("rate_limit", &self.rate_limit)
            .field("rate_burst", &self.rate_burst)
            .field("rate_limit_timeout", &self.rate_limit_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", wirecall_protocol::DEFAULT_PORT)
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            advertise_host: host.clone(),
            host,
            port,
            rate_limit: 1000.0,
            rate_burst: 1000,
            rate_limit_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(30),
            metrics: None,
        }
    }

    pub fn with_advertise_host(mut self, host: impl Into<String>) -> Self {
        self.advertise_host = host.into();
        self
    }

    /// Sets the token rate and bucket capacity.
    pub fn with_rate_limit(mut self, rate: f64, burst: u32) -> Self {
        self.rate_limit = rate;
        self.rate_burst = burst;
        self
    }

    pub fn with_rate_limit_timeout(mut self, timeout: Duration) -> Self {
        self.rate_limit_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub rate_limited_total: AtomicU64,
}

/// RPC server.
///
/// Services are registered between [`Server::bind`] and [`Server::run`];
/// the dispatch table is frozen once the server runs.
pub struct Server {
    config: ServerConfig,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    registry: Arc<dyn ServiceRegistry>,
    services: ServiceMap,
    limiter: Arc<RateLimiter>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(
        config: ServerConfig,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_burst));

        Ok(Self {
            config,
            listener: Mutex::new(Some(listener)),
            local_addr,
            registry,
            services: ServiceMap::new(),
            limiter,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        })
    }

    /// Advertises `name` through the registry and adds it to the
    /// dispatch table.
    pub async fn register(
        &mut self,
        name: impl Into<String>,
        service: Service,
    ) -> Result<(), ServerError> {
        let name = name.into();
        if self.services.contains(&name) {
            return Err(ServerError::AlreadyRegistered(name));
        }

        self.registry
            .register_service(&name, &self.config.advertise_host, self.local_addr.port())
            .await?;
        tracing::info!(
            "Registered service '{}' ({} methods) at {}:{} via {}",
            name,
            service.len(),
            self.config.advertise_host,
            self.local_addr.port(),
            self.registry.backend()
        );
        self.services.insert(name, service);
        Ok(())
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn services(&self) -> &ServiceMap {
        &self.services
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals [`Server::run`] to stop accepting connections.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns a receiver notified on shutdown.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Accepts connections until [`Server::shutdown`] is called. The
    /// listening socket is closed when this returns.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or(ServerError::AlreadyRunning)?;
        let mut shutdown_rx = self.shutdown.subscribe();
        self.running.store(true, Ordering::SeqCst);

        let ctx = Arc::new(ConnectionContext {
            services: Arc::new(self.services.clone()),
            limiter: self.limiter.clone(),
            admission_timeout: self.config.rate_limit_timeout,
            read_timeout: self.config.read_timeout,
            stats: self.stats.clone(),
            metrics: self.config.metrics.clone(),
        });

        tracing::info!(
            "Server listening on {} ({} services)",
            self.local_addr,
            self.services.len()
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let ctx = ctx.clone();
                            tokio::spawn(async move {
                                let stats = ctx.stats.clone();
                                let metrics = ctx.metrics.clone();

                                if let Err(e) = handle_connection(stream, addr, ctx).await {
                                    tracing::warn!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(metrics) = metrics {
                                    metrics.connections_active.dec();
                                }
                                tracing::debug!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
