//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via WIRECALL_CONFIG)
//! 3. Environment variables

use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wirecall_registry::RegistryConfig;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Admission control.
    pub rate_limit: RateLimitConfig,
    /// Where services are advertised.
    pub registry: RegistryConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("WIRECALL_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.rate_limit.apply_env_overrides();
        self.registry.apply_env_overrides();
        self.metrics.apply_env_overrides();
    }

    /// Checks values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.rate <= 0.0 || !self.rate_limit.rate.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "rate_limit.rate must be positive, got {}",
                self.rate_limit.rate
            )));
        }
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.burst must be at least 1".to_string(),
            ));
        }
        if self.network.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "network.read_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.network.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "network.host must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Builds the runtime server configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.network.host.clone(), self.network.port)
            .with_advertise_host(self.network.advertised_host().to_string())
            .with_rate_limit(self.rate_limit.rate, self.rate_limit.burst)
            .with_rate_limit_timeout(self.rate_limit.timeout())
            .with_read_timeout(self.network.read_timeout())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host to listen on.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Host advertised to the registry, when it differs from `host`.
    pub advertise_host: Option<String>,
    /// Longest a connection may take to send its request, in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: wirecall_protocol::DEFAULT_PORT,
            advertise_host: None,
            read_timeout_ms: 30_000,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("WIRECALL_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var("WIRECALL_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }

        if let Ok(host) = std::env::var("WIRECALL_ADVERTISE_HOST") {
            if !host.is_empty() {
                self.advertise_host = Some(host);
            }
        }

        if let Ok(timeout) = std::env::var("WIRECALL_READ_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.read_timeout_ms = ms;
            }
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Host written to the registry.
    pub fn advertised_host(&self) -> &str {
        self.advertise_host.as_deref().unwrap_or(&self.host)
    }
}

/// Token-bucket admission control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub rate: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// Longest a connection waits for a token, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: 1000.0,
            burst: 1000,
            timeout_ms: 1000,
        }
    }
}

impl RateLimitConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(rate) = std::env::var("WIRECALL_RATE_LIMIT") {
            if let Ok(parsed) = rate.parse() {
                self.rate = parsed;
            }
        }

        if let Ok(burst) = std::env::var("WIRECALL_RATE_BURST") {
            if let Ok(parsed) = burst.parse() {
                self.burst = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("WIRECALL_RATE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.timeout_ms = ms;
            }
        }
    }

    /// Returns the admission wait as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("WIRECALL_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }
        if let Ok(addr) = std::env::var("WIRECALL_METRICS_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializes SocketAddr as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
