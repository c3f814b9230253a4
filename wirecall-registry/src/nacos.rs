//! Nacos naming backend over the v1 open API.

use crate::http::HttpClient;
use crate::{validate_service_name, RegistryError, ServiceRegistry, DEFAULT_OPERATION_TIMEOUT};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const INSTANCE_PATH: &str = "/nacos/v1/ns/instance";
const INSTANCE_LIST_PATH: &str = "/nacos/v1/ns/instance/list";

/// Registry backed by a Nacos naming service.
///
/// Instances are registered as persistent (`ephemeral=false`) so no
/// heartbeat is required to keep them listed.
#[derive(Debug)]
pub struct NacosRegistry {
    http: HttpClient,
    namespace: Option<String>,
    group: Option<String>,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    hosts: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    ip: String,
    port: u16,
    #[serde(default = "default_true")]
    healthy: bool,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_true() -> bool {
    true
}

impl NacosRegistry {
    pub fn new(endpoints: &[String]) -> Result<Self, RegistryError> {
        Self::with_timeout(endpoints, DEFAULT_OPERATION_TIMEOUT)
    }

    pub fn with_timeout(endpoints: &[String], timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            http: HttpClient::new(endpoints, timeout)?,
            namespace: None,
            group: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Scopes all operations to a namespace id.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        validate_service_name(&namespace)?;
        self.namespace = Some(namespace);
        Ok(self)
    }

    /// Scopes all operations to a group.
    pub fn with_group(mut self, group: impl Into<String>) -> Result<Self, RegistryError> {
        let group = group.into();
        validate_service_name(&group)?;
        self.group = Some(group);
        Ok(self)
    }

    fn scope_query(&self) -> String {
        let mut query = String::new();
        if let Some(ns) = &self.namespace {
            query.push_str("&namespaceId=");
            query.push_str(ns);
        }
        if let Some(group) = &self.group {
            query.push_str("&groupName=");
            query.push_str(group);
        }
        query
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
impl ServiceRegistry for NacosRegistry {
    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RegistryError> {
        self.check_open()?;
        validate_service_name(name)?;
        validate_service_name(host)?;
        let path = format!(
            "{}?serviceName={}&ip={}&port={}&ephemeral=false{}",
            INSTANCE_PATH,
            name,
            host,
            port,
            self.scope_query()
        );
        self.http.post_empty("register", &path).await?.success()?;
        tracing::debug!("nacos: registered {} at {}:{}", name, host, port);
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String, RegistryError> {
        self.check_open()?;
        validate_service_name(name)?;
        let path = format!(
            "{}?serviceName={}&healthyOnly=true{}",
            INSTANCE_LIST_PATH,
            name,
            self.scope_query()
        );
        let body = self.http.get("select", &path).await?.success()?;
        first_healthy(name, &body)
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "nacos"
    }
}

fn first_healthy(name: &str, body: &[u8]) -> Result<String, RegistryError> {
    let list: InstanceList = serde_json::from_slice(body)?;
    list.hosts
        .into_iter()
        .find(|i| i.healthy && i.enabled)
        .map(|i| format!("{}:{}", i.ip, i.port))
        .ok_or_else(|| RegistryError::NotFound(name.to_string()))
}
