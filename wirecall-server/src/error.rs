//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] wirecall_registry::RegistryError),

    #[error("service '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("server is already running")]
    AlreadyRunning,
}

/// Why a request could not produce a result.
///
/// The display text becomes the `msg` of the status 500 response.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no service found")]
    NoService(String),

    #[error("no service method found")]
    NoMethod { service: String, method: String },

    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("invalid argument {index}: {source}")]
    InvalidArgument {
        index: usize,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Method(String),

    #[error("result is not serializable: {0}")]
    Result(serde_json::Error),

    #[error("method panicked: {0}")]
    Panicked(String),
}

impl InvokeError {
    /// Returns whether the request never reached a method.
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            InvokeError::NoService(_)
                | InvokeError::NoMethod { .. }
                | InvokeError::ArgumentCount { .. }
                | InvokeError::InvalidArgument { .. }
        )
    }
}
