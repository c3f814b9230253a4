//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing, compressing or serializing messages.
///
/// Every variant is connection-fatal: a peer that produces one of these
/// is not sent a response frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic number: expected {expected:#04x}, got {actual:#04x}")]
    InvalidMagic { expected: u8, actual: u8 },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid frame length: {0} bytes is shorter than the header")]
    InvalidLength(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("unknown compress type: {0}")]
    UnknownCompressType(u8),

    #[error("unknown serialize type: {0}")]
    UnknownSerializeType(u8),

    #[error("unexpected {actual} message, expected {expected}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("compression error: {0}")]
    Compression(std::io::Error),

    #[error("decompressed body exceeds {max} bytes")]
    DecompressedTooLarge { max: u32 },

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("protobuf encode error: {0}")]
    ProtobufEncode(#[from] prost::EncodeError),

    #[error("protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("value not representable in protobuf: {0}")]
    UnrepresentableValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error was caused by a malformed frame prefix
    /// (as opposed to a malformed body or a failing socket).
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidMagic { .. }
                | ProtocolError::InvalidLength(_)
                | ProtocolError::FrameTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidMagic {
            expected: 0x1d,
            actual: 0xff,
        };
        let msg = err.to_string();
        assert!(msg.contains("magic"));
        assert!(msg.contains("0x1d"));
        assert!(msg.contains("0xff"));

        let err = ProtocolError::UnsupportedVersion(9);
        assert!(err.to_string().contains('9'));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::UnknownCompressType(7);
        assert!(err.to_string().contains("compress"));
    }

    #[test]
    fn test_is_framing() {
        assert!(ProtocolError::InvalidMagic {
            expected: 0x1d,
            actual: 0
        }
        .is_framing());
        assert!(ProtocolError::InvalidLength(3).is_framing());
        assert!(!ProtocolError::UnknownSerializeType(5).is_framing());
        assert!(!ProtocolError::UnsupportedVersion(2).is_framing());
    }
}
