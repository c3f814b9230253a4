//! Fixed addresses from configuration.

use crate::{RegistryError, ServiceRegistry};
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves services from a fixed map, falling back to a default address.
///
/// Registration is accepted and ignored: the addresses are owned by
/// whoever wrote the configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    addresses: HashMap<String, String>,
    default_address: Option<String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every service resolves to `address`.
    pub fn single(address: impl Into<String>) -> Self {
        Self::new().with_default(address)
    }

    pub fn with_default(mut self, address: impl Into<String>) -> Self {
        self.default_address = Some(address.into());
        self
    }

    pub fn with_service(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.addresses.insert(name.into(), address.into());
        self
    }

    pub fn with_services(mut self, addresses: HashMap<String, String>) -> Self {
        self.addresses.extend(addresses);
        self
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RegistryError> {
        tracing::debug!("static registry ignores registration of {} at {}:{}", name, host, port);
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String, RegistryError> {
        self.addresses
            .get(name)
            .or(self.default_address.as_ref())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn close(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "static"
    }
}
