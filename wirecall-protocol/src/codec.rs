//! Encoder and decoder between messages and frames.
//!
//! Encoding serializes the payload first and compresses the result;
//! decoding decompresses first and deserializes the result. Ping and pong
//! frames carry an empty body.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::header::{CompressType, Header, MessageType, SerializeType};
use crate::message::{Message, Request, Response};
use bytes::{Bytes, BytesMut};

/// Encodes messages into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request with the given encodings.
    pub fn encode_request(
        request: &Request,
        compress: CompressType,
        serialize: SerializeType,
    ) -> Result<Frame, ProtocolError> {
        let header = Header::new(MessageType::Request, compress, serialize, request.request_id);
        let body = serialize.serializer().serialize_request(request)?;
        Self::finish(header, body)
    }

    /// Encodes a response with the encodings recorded in the response.
    pub fn encode_response(response: &Response) -> Result<Frame, ProtocolError> {
        let header = Header::new(
            MessageType::Response,
            response.compress_type,
            response.serialize_type,
            response.request_id,
        );
        let body = response
            .serialize_type
            .serializer()
            .serialize_response(response)?;
        Self::finish(header, body)
    }

    /// Encodes a ping or pong frame.
    pub fn encode_heartbeat(message_type: MessageType, request_id: u64) -> Frame {
        let header = Header::new(
            message_type,
            CompressType::None,
            SerializeType::default(),
            request_id,
        );
        Frame::new(header, Bytes::new())
    }

    /// Encodes any message. `request_id` is only used for ping/pong,
    /// requests and responses carry their own.
    pub fn encode_message(
        message: &Message,
        compress: CompressType,
        serialize: SerializeType,
        request_id: u64,
    ) -> Result<Frame, ProtocolError> {
        match message {
            Message::Request(req) => Self::encode_request(req, compress, serialize),
            Message::Response(rsp) => Self::encode_response(rsp),
            Message::Ping => Ok(Self::encode_heartbeat(MessageType::Ping, request_id)),
            Message::Pong => Ok(Self::encode_heartbeat(MessageType::Pong, request_id)),
        }
    }

    fn finish(header: Header, serialized: Vec<u8>) -> Result<Frame, ProtocolError> {
        let body = header.compress_type.compressor().compress(&serialized)?;
        Ok(Frame::new(header, Bytes::from(body)))
    }
}

/// Decodes frames into messages.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next message from the buffer.
    pub fn decode_next(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(Self::decode_message(&frame)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the payload of a complete frame.
    pub fn decode_message(frame: &Frame) -> Result<Message, ProtocolError> {
        let header = &frame.header;
        match header.message_type {
            MessageType::Ping => return Ok(Message::Ping),
            MessageType::Pong => return Ok(Message::Pong),
            MessageType::Request | MessageType::Response => {}
        }

        let body = header.compress_type.compressor().decompress(&frame.body)?;
        let serializer = header.serialize_type.serializer();

        match header.message_type {
            MessageType::Request => Ok(Message::Request(serializer.deserialize_request(&body)?)),
            _ => Ok(Message::Response(serializer.deserialize_response(&body)?)),
        }
    }

    /// Decodes a frame that must hold a request.
    pub fn decode_request(frame: &Frame) -> Result<Request, ProtocolError> {
        match Self::decode_message(frame)? {
            Message::Request(req) => Ok(req),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: MessageType::Request.as_str(),
                actual: other.message_type().as_str(),
            }),
        }
    }

    /// Decodes a frame that must hold a response.
    pub fn decode_response(frame: &Frame) -> Result<Response, ProtocolError> {
        match Self::decode_message(frame)? {
            Message::Response(rsp) => Ok(rsp),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: MessageType::Response.as_str(),
                actual: other.message_type().as_str(),
            }),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
