//! # wirecall-registry
//!
//! Service registry clients for wirecall.
//!
//! A registry maps a service name to the `host:port` of the server that
//! hosts it. Servers advertise themselves with
//! [`ServiceRegistry::register_service`]; clients resolve a target with
//! [`ServiceRegistry::get_address`] before every call.
//!
//! Backends:
//! - [`MemoryRegistry`]: process-local map, for embedding and tests
//! - [`StaticRegistry`]: fixed addresses from configuration
//! - [`EtcdRegistry`]: etcd v3 through its JSON gateway
//! - [`NacosRegistry`]: Nacos naming open API

pub mod config;
pub mod error;
pub mod etcd;
mod http;
pub mod memory;
pub mod nacos;
pub mod static_map;

pub use config::{RegistryBackend, RegistryConfig};
pub use error::RegistryError;
pub use etcd::EtcdRegistry;
pub use memory::MemoryRegistry;
pub use nacos::NacosRegistry;
pub use static_map::StaticRegistry;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Timeout applied to every remote registry operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Registers services and resolves service names to addresses.
#[async_trait]
pub trait ServiceRegistry: Send + Sync + fmt::Debug {
    /// Advertises `name` as reachable at `host:port`.
    async fn register_service(&self, name: &str, host: &str, port: u16)
        -> Result<(), RegistryError>;

    /// Resolves `name` to a `host:port` address.
    async fn get_address(&self, name: &str) -> Result<String, RegistryError>;

    /// Releases the client. Later operations fail with [`RegistryError::Closed`].
    async fn close(&self) -> Result<(), RegistryError>;

    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;
}

/// Rejects names that cannot be used verbatim as a key or query value.
pub(crate) fn validate_service_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidServiceName(name.to_string()))
    }
}
