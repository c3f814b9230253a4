//! # wirecall-server
//!
//! RPC server for wirecall.
//!
//! This crate provides:
//! - Service definitions with typed async methods
//! - Token-bucket admission control
//! - One-request-per-connection TCP handling
//! - Service advertisement through a [`wirecall_registry::ServiceRegistry`]
//! - Prometheus metrics and YAML/environment configuration

pub mod config;
mod connection;
pub mod echo;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod server;
pub mod service;

pub use config::{Config, ConfigError};
pub use echo::{echo_service, ECHO_SERVICE};
pub use error::{InvokeError, ServerError};
pub use limiter::RateLimiter;
pub use metrics::{run_metrics_server, Metrics};
pub use server::{Server, ServerConfig, ServerStats};
pub use service::{Handler, InvokeFuture, Service, ServiceMap};
