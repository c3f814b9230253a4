//! Fixed-size frame header.
//!
//! Header layout (17 bytes, multi-byte fields big-endian):
//!
//! ```text
//! +-------+---------+-------------+----------+----------+-----------+------------+
//! | magic | version | full_length | msg_type | compress | serialize | request_id |
//! | 1 byte| 1 byte  |   4 bytes   |  1 byte  |  1 byte  |  1 byte   |  8 bytes   |
//! +-------+---------+-------------+----------+----------+-----------+------------+
//! ```
//!
//! `full_length` counts the header itself plus the (compressed) body.

use crate::error::ProtocolError;
use crate::{MAX_FRAME_SIZE, PROTOCOL_VERSION};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading byte of every frame.
pub const MAGIC_NUMBER: u8 = 0x1d;

/// Size of the fixed frame header in bytes (1+1+4+1+1+1+8 = 17).
pub const HEADER_SIZE: usize = 17;

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request = 0,
    Response = 1,
    Ping = 2,
    Pong = 3,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::Ping),
            3 => Ok(MessageType::Pong),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression applied to the serialized body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    #[default]
    Gzip = 0,
    None = 1,
}

impl TryFrom<u8> for CompressType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressType::Gzip),
            1 => Ok(CompressType::None),
            other => Err(ProtocolError::UnknownCompressType(other)),
        }
    }
}

impl std::str::FromStr for CompressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gzip" => Ok(CompressType::Gzip),
            "none" | "identity" => Ok(CompressType::None),
            other => Err(format!("unknown compress type '{}'", other)),
        }
    }
}

/// Encoding used for the request/response payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializeType {
    #[default]
    MsgPack = 0,
    Protobuf = 1,
}

impl TryFrom<u8> for SerializeType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SerializeType::MsgPack),
            1 => Ok(SerializeType::Protobuf),
            other => Err(ProtocolError::UnknownSerializeType(other)),
        }
    }
}

impl std::str::FromStr for SerializeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "msgpack" | "binary" => Ok(SerializeType::MsgPack),
            "protobuf" | "proto" => Ok(SerializeType::Protobuf),
            other => Err(format!("unknown serialize type '{}'", other)),
        }
    }
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version.
    pub version: u8,
    /// Length of the whole frame, header included.
    pub full_length: u32,
    pub message_type: MessageType,
    pub compress_type: CompressType,
    pub serialize_type: SerializeType,
    /// Correlation id shared by a request and its response.
    pub request_id: u64,
}

impl Header {
    /// Creates a header for a frame whose length is not yet known.
    pub fn new(
        message_type: MessageType,
        compress_type: CompressType,
        serialize_type: SerializeType,
        request_id: u64,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            full_length: HEADER_SIZE as u32,
            message_type,
            compress_type,
            serialize_type,
            request_id,
        }
    }

    /// Length of the body that follows the header.
    pub fn body_len(&self) -> usize {
        self.full_length as usize - HEADER_SIZE
    }

    /// Writes the 17 header bytes.
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_u8(MAGIC_NUMBER);
        buf.put_u8(self.version);
        buf.put_u32(self.full_length);
        buf.put_u8(self.message_type as u8);
        buf.put_u8(self.compress_type as u8);
        buf.put_u8(self.serialize_type as u8);
        buf.put_u64(self.request_id);
    }

    /// Parses and validates the 17 header bytes.
    pub fn parse(raw: &[u8; HEADER_SIZE]) -> Result<Self, ProtocolError> {
        if raw[0] != MAGIC_NUMBER {
            return Err(ProtocolError::InvalidMagic {
                expected: MAGIC_NUMBER,
                actual: raw[0],
            });
        }

        let version = raw[1];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let full_length = u32::from_be_bytes([raw[2], raw[3], raw[4], raw[5]]);
        if (full_length as usize) < HEADER_SIZE {
            return Err(ProtocolError::InvalidLength(full_length));
        }
        if full_length > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: full_length,
                max: MAX_FRAME_SIZE,
            });
        }

        let message_type = MessageType::try_from(raw[6])?;
        let compress_type = CompressType::try_from(raw[7])?;
        let serialize_type = SerializeType::try_from(raw[8])?;

        let mut id = [0u8; 8];
        id.copy_from_slice(&raw[9..17]);
        let request_id = u64::from_be_bytes(id);

        Ok(Self {
            version,
            full_length,
            message_type,
            compress_type,
            serialize_type,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(header: &Header) -> [u8; HEADER_SIZE] {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        header.put(&mut buf);
        buf.try_into().unwrap()
    }

    #[test]
    fn test_header_layout() {
        let mut header = Header::new(
            MessageType::Response,
            CompressType::None,
            SerializeType::Protobuf,
            0x0102_0304_0506_0708,
        );
        header.full_length = 0x0000_0120;

        let bytes = raw(&header);
        assert_eq!(bytes[0], MAGIC_NUMBER);
        assert_eq!(bytes[1], PROTOCOL_VERSION);
        assert_eq!(&bytes[2..6], &[0x00, 0x00, 0x01, 0x20]);
        assert_eq!(bytes[6], 1);
        assert_eq!(bytes[7], 1);
        assert_eq!(bytes[8], 1);
        assert_eq!(&bytes[9..17], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_request_id_keeps_all_64_bits() {
        let header = Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            u64::MAX - 1,
        );
        let parsed = Header::parse(&raw(&header)).unwrap();
        assert_eq!(parsed.request_id, u64::MAX - 1);
    }

    #[test]
    fn test_invalid_magic() {
        let header = Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            1,
        );
        let mut bytes = raw(&header);
        bytes[0] = 0xAB;
        let result = Header::parse(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidMagic { actual: 0xAB, .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = raw(&Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            1,
        ));
        bytes[1] = 0x63;
        assert!(matches!(
            Header::parse(&bytes),
            Err(ProtocolError::UnsupportedVersion(0x63))
        ));
    }

    #[test]
    fn test_length_shorter_than_header() {
        let mut header = Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            1,
        );
        header.full_length = 4;
        assert!(matches!(
            Header::parse(&raw(&header)),
            Err(ProtocolError::InvalidLength(4))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let mut header = Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            1,
        );
        header.full_length = MAX_FRAME_SIZE + 1;
        assert!(matches!(
            Header::parse(&raw(&header)),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_unknown_kinds() {
        let base = raw(&Header::new(
            MessageType::Request,
            CompressType::Gzip,
            SerializeType::MsgPack,
            1,
        ));

        let mut bytes = base;
        bytes[6] = 9;
        assert!(matches!(
            Header::parse(&bytes),
            Err(ProtocolError::UnknownMessageType(9))
        ));

        let mut bytes = base;
        bytes[7] = 4;
        assert!(matches!(
            Header::parse(&bytes),
            Err(ProtocolError::UnknownCompressType(4))
        ));

        let mut bytes = base;
        bytes[8] = 2;
        assert!(matches!(
            Header::parse(&bytes),
            Err(ProtocolError::UnknownSerializeType(2))
        ));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("gzip".parse::<CompressType>().unwrap(), CompressType::Gzip);
        assert_eq!("none".parse::<CompressType>().unwrap(), CompressType::None);
        assert_eq!(
            "protobuf".parse::<SerializeType>().unwrap(),
            SerializeType::Protobuf
        );
        assert!("lz4".parse::<CompressType>().is_err());
    }

    fn message_type() -> impl Strategy<Value = MessageType> {
        prop_oneof![
            Just(MessageType::Request),
            Just(MessageType::Response),
            Just(MessageType::Ping),
            Just(MessageType::Pong),
        ]
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(
            msg in message_type(),
            gzip in any::<bool>(),
            proto in any::<bool>(),
            id in any::<u64>(),
            body_len in 0u32..1024 * 1024,
        ) {
            let compress = if gzip { CompressType::Gzip } else { CompressType::None };
            let serialize = if proto { SerializeType::Protobuf } else { SerializeType::MsgPack };
            let mut header = Header::new(msg, compress, serialize, id);
            header.full_length = HEADER_SIZE as u32 + body_len;

            let parsed = Header::parse(&raw(&header)).unwrap();
            prop_assert_eq!(parsed, header);
            prop_assert_eq!(parsed.body_len(), body_len as usize);
        }
    }
}
