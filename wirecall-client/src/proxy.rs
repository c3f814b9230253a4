//! Retrying call proxy.

use crate::client::TcpClient;
use crate::error::ClientError;
use crate::options::ClientOptions;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use wirecall_protocol::StatusCode;

/// Makes calls through a fresh [`TcpClient`] per attempt.
///
/// Every attempt resolves the service, connects, invokes and closes.
/// Registry, transport, protocol and timeout failures and a 700 (rate
/// limited) answer move on to the next attempt immediately; once `retries`
/// attempts have failed the call returns [`ClientError::RetriesExhausted`]
/// carrying the last failure. A 500 means the method was dispatched (or
/// can never be), so it is returned at once as [`ClientError::Server`].
#[derive(Debug, Clone, Default)]
pub struct ClientProxy {
    options: ClientOptions,
}

impl ClientProxy {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Calls `service.method(args)` and returns the method's result.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ClientError> {
        let attempts = self.options.retries.max(1);
        let mut attempt = 1;

        loop {
            let client = TcpClient::new(service, self.options.clone());
            let result = Self::attempt(&client, method, args.clone()).await;
            if let Err(e) = client.close().await {
                tracing::debug!("Close after {}.{} failed: {}", service, method, e);
            }

            match result {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "{}.{} attempt {}/{} failed: {}",
                        service,
                        method,
                        attempt,
                        attempts,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!("{}.{} failed after {} attempts: {}", service, method, attempts, e);
                    return Err(ClientError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
            }
        }
    }

    /// Like [`ClientProxy::call`], deserializing the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, ClientError> {
        let value = self.call(service, method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Pings the server hosting `service` once, without retries.
    pub async fn ping(&self, service: &str) -> Result<Duration, ClientError> {
        let client = TcpClient::new(service, self.options.clone());
        let result = async {
            client.connect().await?;
            client.ping().await
        }
        .await;
        client.close().await?;
        result
    }

    async fn attempt(client: &TcpClient, method: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        client.connect().await?;
        let rsp = client.invoke(method, args).await?;
        if rsp.is_ok() {
            Ok(rsp.data.unwrap_or(Value::Null))
        } else {
            Err(ClientError::Server {
                code: rsp.code,
                msg: rsp.msg,
            })
        }
    }
}

fn is_retryable(e: &ClientError) -> bool {
    match e {
        ClientError::Server { code, .. } => *code == StatusCode::RATE_LIMITED,
        _ => true,
    }
}
