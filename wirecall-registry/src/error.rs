//! Registry error types.

use std::time::Duration;
use thiserror::Error;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no address registered for service '{0}'")]
    NotFound(String),

    #[error("invalid service name '{0}'")]
    InvalidServiceName(String),

    #[error("invalid registry endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("no registry endpoints configured")]
    NoEndpoints,

    #[error("registry {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("registry returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("registry transport error: {0}")]
    Transport(String),

    #[error("unexpected registry response: {0}")]
    InvalidResponse(String),

    #[error("registry client closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<hyper::Error> for RegistryError {
    fn from(e: hyper::Error) -> Self {
        RegistryError::Transport(e.to_string())
    }
}

impl RegistryError {
    /// Returns whether the lookup simply found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}
