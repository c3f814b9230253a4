//! In-process registry.

use crate::{validate_service_name, RegistryError, ServiceRegistry};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A registry held entirely in memory.
///
/// Share one instance (behind an `Arc`) between servers and clients in the
/// same process.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: DashMap<String, String>,
    closed: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_open(&self) -> Result<(), RegistryError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RegistryError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ServiceRegistry for MemoryRegistry {
    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RegistryError> {
        self.check_open()?;
        validate_service_name(name)?;
        self.entries
            .insert(name.to_string(), format!("{}:{}", host, port));
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String, RegistryError> {
        self.check_open()?;
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = MemoryRegistry::new();
        registry
            .register_service("goods", "127.0.0.1", 9222)
            .await
            .unwrap();
        assert_eq!(registry.get_address("goods").await.unwrap(), "127.0.0.1:9222");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reregister_overwrites() {
        let registry = MemoryRegistry::new();
        registry.register_service("goods", "10.0.0.1", 1).await.unwrap();
        registry.register_service("goods", "10.0.0.2", 2).await.unwrap();
        assert_eq!(registry.get_address("goods").await.unwrap(), "10.0.0.2:2");
    }

    #[tokio::test]
    async fn test_missing_service() {
        let registry = MemoryRegistry::new();
        let err = registry.get_address("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_closed() {
        let registry = MemoryRegistry::new();
        registry.close().await.unwrap();
        assert!(matches!(
            registry.get_address("goods").await,
            Err(RegistryError::Closed)
        ));
    }
}
