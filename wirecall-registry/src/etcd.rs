//! etcd v3 backend over the JSON gateway.
//!
//! The key is the service name and the value is `host:port`, both
//! base64-encoded as the gateway requires.

use crate::http::HttpClient;
use crate::{validate_service_name, RegistryError, ServiceRegistry, DEFAULT_OPERATION_TIMEOUT};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const PUT_PATH: &str = "/v3/kv/put";
const RANGE_PATH: &str = "/v3/kv/range";

/// Registry backed by an etcd cluster.
#[derive(Debug)]
pub struct EtcdRegistry {
    http: HttpClient,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
}

impl EtcdRegistry {
    /// Creates a client for the given endpoints with the default
    /// per-operation timeout.
    pub fn new(endpoints: &[String]) -> Result<Self, RegistryError> {
        Self::with_timeout(endpoints, DEFAULT_OPERATION_TIMEOUT)
    }

    pub fn with_timeout(endpoints: &[String], timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            http: HttpClient::new(endpoints, timeout)?,
            closed: AtomicBool::new(false),
        })
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
impl ServiceRegistry for EtcdRegistry {
    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<(), RegistryError> {
        self.check_open()?;
        validate_service_name(name)?;
        let address = format!("{}:{}", host, port);
        let body = json!({
            "key": STANDARD.encode(name),
            "value": STANDARD.encode(&address),
        });
        self.http.post_json("put", PUT_PATH, &body).await?.success()?;
        tracing::debug!("etcd: registered {} at {}", name, address);
        Ok(())
    }

    async fn get_address(&self, name: &str) -> Result<String, RegistryError> {
        self.check_open()?;
        validate_service_name(name)?;
        let body = json!({ "key": STANDARD.encode(name) });
        let reply = self.http.post_json("range", RANGE_PATH, &body).await?.success()?;
        decode_range(name, &reply)
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "etcd"
    }
}

fn decode_range(name: &str, body: &[u8]) -> Result<String, RegistryError> {
    let range: RangeResponse = serde_json::from_slice(body)?;
    let kv = range
        .kvs
        .into_iter()
        .next()
        .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
    let raw = STANDARD
        .decode(kv.value.as_bytes())
        .map_err(|e| RegistryError::InvalidResponse(format!("value is not base64: {}", e)))?;
    String::from_utf8(raw)
        .map_err(|_| RegistryError::InvalidResponse("value is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::serve_once;

    #[test]
    fn test_decode_range() {
        // "goods" -> "127.0.0.1:9222"
        let body = br#"{"header":{},"kvs":[{"key":"Z29vZHM=","value":"MTI3LjAuMC4xOjkyMjI="}],"count":"1"}"#;
        assert_eq!(decode_range("goods", body).unwrap(), "127.0.0.1:9222");
    }

    #[test]
    fn test_decode_range_empty() {
        let err = decode_range("goods", br#"{"header":{}}"#).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decode_range_bad_value() {
        let body = br#"{"kvs":[{"value":"%%%"}]}"#;
        assert!(matches!(
            decode_range("goods", body),
            Err(RegistryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_register_sends_put() {
        let (addr, request) = serve_once(200, "{}").await;
        let registry = EtcdRegistry::new(&[addr]).unwrap();
        registry
            .register_service("goods", "127.0.0.1", 9222)
            .await
            .unwrap();

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /v3/kv/put HTTP/1.1"));
        assert!(raw.contains(r#""key":"Z29vZHM=""#));
        assert!(raw.contains(r#""value":"MTI3LjAuMC4xOjkyMjI=""#));
    }

    #[tokio::test]
    async fn test_get_address_over_gateway() {
        let (addr, _request) = serve_once(
            200,
            r#"{"kvs":[{"key":"Z29vZHM=","value":"MTI3LjAuMC4xOjkyMjI="}]}"#,
        )
        .await;
        let registry = EtcdRegistry::new(&[addr]).unwrap();
        assert_eq!(registry.get_address("goods").await.unwrap(), "127.0.0.1:9222");
    }

    #[tokio::test]
    async fn test_closed_client() {
        let registry = EtcdRegistry::new(&["127.0.0.1:2379".to_string()]).unwrap();
        registry.close().await.unwrap();
        assert!(matches!(
            registry.get_address("goods").await,
            Err(RegistryError::Closed)
        ));
    }
}
