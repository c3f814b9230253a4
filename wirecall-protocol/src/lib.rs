//! # wirecall-protocol
//!
//! Wire protocol implementation for wirecall.
//!
//! This crate provides:
//! - The fixed 17-byte frame header and its big-endian layout
//! - Frame encoding/decoding over buffers and async streams
//! - Pluggable payload serializers (MessagePack, protocol buffers)
//! - Pluggable body compressors (gzip, identity)
//! - Request/Response payload types and stable status codes

pub mod codec;
pub mod compress;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;
pub mod serialize;

pub use codec::{Decoder, Encoder};
pub use compress::{Compressor, GzipCompressor, IdentityCompressor};
pub use error::ProtocolError;
pub use frame::{read_frame, write_frame, Frame};
pub use header::{CompressType, Header, MessageType, SerializeType, HEADER_SIZE, MAGIC_NUMBER};
pub use message::{Message, Request, Response, StatusCode};
pub use serialize::{MsgPackSerializer, ProtobufSerializer, Serializer};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Default port for wirecall servers.
pub const DEFAULT_PORT: u16 = 9222;

/// Maximum full frame length, header included (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;
