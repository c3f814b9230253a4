//! Registry configuration shared by servers and clients.

use crate::{
    EtcdRegistry, MemoryRegistry, NacosRegistry, RegistryError, ServiceRegistry, StaticRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which registry implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Memory,
    #[default]
    Static,
    Etcd,
    Nacos,
}

impl RegistryBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryBackend::Memory => "memory",
            RegistryBackend::Static => "static",
            RegistryBackend::Etcd => "etcd",
            RegistryBackend::Nacos => "nacos",
        }
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            RegistryBackend::Etcd => Some("127.0.0.1:2379"),
            RegistryBackend::Nacos => Some("127.0.0.1:8848"),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(RegistryBackend::Memory),
            "static" => Ok(RegistryBackend::Static),
            "etcd" => Ok(RegistryBackend::Etcd),
            "nacos" => Ok(RegistryBackend::Nacos),
            other => Err(format!("unknown registry backend '{}'", other)),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Backend to use.
    pub backend: RegistryBackend,
    /// Gateway endpoints (`host:port` or `http://host:port`) for etcd and Nacos.
    pub endpoints: Vec<String>,
    /// Timeout per remote registry operation, in milliseconds.
    pub timeout_ms: u64,
    /// Fixed service addresses for the static backend.
    pub addresses: HashMap<String, String>,
    /// Address the static backend returns for unlisted services.
    pub default_address: Option<String>,
    /// Nacos namespace id.
    pub namespace: Option<String>,
    /// Nacos group name.
    pub group: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Static,
            endpoints: Vec::new(),
            timeout_ms: 1000,
            addresses: HashMap::new(),
            default_address: Some("127.0.0.1:9222".to_string()),
            namespace: None,
            group: None,
        }
    }
}

impl RegistryConfig {
    /// A static configuration resolving every service to `address`.
    pub fn fixed(address: impl Into<String>) -> Self {
        Self {
            default_address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: RegistryBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Returns the operation timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Applies `WIRECALL_REGISTRY` and `WIRECALL_REGISTRY_ENDPOINTS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("WIRECALL_REGISTRY") {
            if let Ok(parsed) = backend.parse() {
                self.backend = parsed;
            }
        }

        if let Ok(endpoints) = std::env::var("WIRECALL_REGISTRY_ENDPOINTS") {
            self.endpoints = split_endpoints(&endpoints);
        }
    }

    fn effective_endpoints(&self) -> Vec<String> {
        if self.endpoints.is_empty() {
            self.backend
                .default_endpoint()
                .map(|e| vec![e.to_string()])
                .unwrap_or_default()
        } else {
            self.endpoints.clone()
        }
    }

    /// Builds the configured registry client.
    pub fn create_client(&self) -> Result<Arc<dyn ServiceRegistry>, RegistryError> {
        let client: Arc<dyn ServiceRegistry> = match self.backend {
            RegistryBackend::Memory => Arc::new(MemoryRegistry::new()),
            RegistryBackend::Static => {
                let mut registry = StaticRegistry::new().with_services(self.addresses.clone());
                if let Some(addr) = &self.default_address {
                    registry = registry.with_default(addr.clone());
                }
                Arc::new(registry)
            }
            RegistryBackend::Etcd => Arc::new(EtcdRegistry::with_timeout(
                &self.effective_endpoints(),
                self.timeout(),
            )?),
            RegistryBackend::Nacos => {
                let mut registry =
                    NacosRegistry::with_timeout(&self.effective_endpoints(), self.timeout())?;
                if let Some(ns) = &self.namespace {
                    registry = registry.with_namespace(ns.clone())?;
                }
                if let Some(group) = &self.group {
                    registry = registry.with_group(group.clone())?;
                }
                Arc::new(registry)
            }
        };
        Ok(client)
    }
}

/// Splits a comma-separated endpoint list.
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
