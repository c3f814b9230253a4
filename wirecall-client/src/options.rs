//! Client configuration.

use crate::id::RequestIdGenerator;
use std::sync::Arc;
use std::time::Duration;
use wirecall_protocol::{CompressType, SerializeType};
use wirecall_registry::{ServiceRegistry, StaticRegistry};

/// Default number of attempts made by [`crate::ClientProxy`].
pub const DEFAULT_RETRIES: usize = 3;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Attempts per proxied call (at least one is always made).
    pub retries: usize,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Longest wait for the response frame.
    pub request_timeout: Duration,
    pub serialize_type: SerializeType,
    pub compress_type: CompressType,
    /// Resolves service names to addresses.
    pub registry: Arc<dyn ServiceRegistry>,
    pub ids: Arc<RequestIdGenerator>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let addr = format!("127.0.0.1:{}", wirecall_protocol::DEFAULT_PORT);
        Self {
            retries: DEFAULT_RETRIES,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            serialize_type: SerializeType::default(),
            compress_type: CompressType::default(),
            registry: Arc::new(StaticRegistry::single(addr)),
            ids: Arc::new(RequestIdGenerator::new()),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every service to `addr`.
    pub fn with_address(self, addr: impl Into<String>) -> Self {
        self.with_registry(Arc::new(StaticRegistry::single(addr)))
    }

    pub fn with_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_serialize_type(mut self, serialize_type: SerializeType) -> Self {
        self.serialize_type = serialize_type;
        self
    }

    pub fn with_compress_type(mut self, compress_type: CompressType) -> Self {
        self.compress_type = compress_type;
        self
    }

    /// Shares a request id generator with other clients.
    pub fn with_id_generator(mut self, ids: Arc<RequestIdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}
