//! # wirecall-client
//!
//! Client library for wirecall.
//!
//! This crate provides:
//! - [`TcpClient`]: one connection, one request, one response
//! - [`ClientProxy`]: registry resolution and bounded retries around
//!   a fresh client per attempt
//! - [`RequestIdGenerator`]: injectable correlation-id source

pub mod client;
pub mod error;
pub mod id;
pub mod options;
pub mod proxy;

pub use client::TcpClient;
pub use error::ClientError;
pub use id::RequestIdGenerator;
pub use options::ClientOptions;
pub use proxy::ClientProxy;
