//! Client error types.

use std::time::Duration;
use thiserror::Error;
use wirecall_protocol::StatusCode;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] wirecall_registry::RegistryError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect to {addr} timed out after {after:?}")]
    ConnectTimeout { addr: String, after: Duration },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("response id {actual} does not match request id {expected}")]
    RequestIdMismatch { expected: u64, actual: u64 },

    #[error("server error: {code} - {msg}")]
    Server { code: StatusCode, msg: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("all retries failed")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// Returns the status code when the server answered with an error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            ClientError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Returns whether the server rejected the call through admission control.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::RATE_LIMITED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_retries_exhausted() {
        let err = ClientError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ClientError::Server {
                code: StatusCode::RATE_LIMITED,
                msg: "rate limited".to_string(),
            }),
        };
        assert_eq!(err.to_string(), "all retries failed");
        assert!(err.is_rate_limited());
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "server error: 700 - rate limited");
    }
}
