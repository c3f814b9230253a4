//! Request and response payloads.

use crate::header::{CompressType, MessageType, SerializeType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Numeric response status carried in every response payload.
///
/// These values are part of the protocol contract and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i16);

impl StatusCode {
    /// The method ran and returned a value.
    pub const OK: StatusCode = StatusCode(200);
    /// Dispatch or invocation failed.
    pub const INTERNAL_ERROR: StatusCode = StatusCode(500);
    /// The request was rejected by admission control.
    pub const RATE_LIMITED: StatusCode = StatusCode(700);

    pub fn is_ok(&self) -> bool {
        *self == StatusCode::OK
    }

    pub fn as_i16(&self) -> i16 {
        self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A call of `method_name` on the service registered as `service_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: u64,
    pub service_name: String,
    pub method_name: String,
    /// Positional arguments, converted to the method's parameter types
    /// by the server.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(
        request_id: u64,
        service_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            service_name: service_name.into(),
            method_name: method_name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub code: StatusCode,
    /// Human-readable status message; the error text on failure.
    #[serde(default)]
    pub msg: String,
    pub compress_type: CompressType,
    pub serialize_type: SerializeType,
    /// Return value of the method; only present on success.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
}

/// A present `data` key is always `Some`, even when its value is nil;
/// only a missing key decodes to `None`.
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// Creates a successful response.
    pub fn ok(request_id: u64, data: Value) -> Self {
        Self {
            request_id,
            code: StatusCode::OK,
            msg: "success".to_string(),
            compress_type: CompressType::default(),
            serialize_type: SerializeType::default(),
            data: Some(data),
        }
    }

    /// Creates an error response.
    pub fn error(request_id: u64, code: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            request_id,
            code,
            msg: msg.into(),
            compress_type: CompressType::default(),
            serialize_type: SerializeType::default(),
            data: None,
        }
    }

    /// Sets the encoding the response will be written with.
    pub fn with_encoding(mut self, compress: CompressType, serialize: SerializeType) -> Self {
        self.compress_type = compress;
        self.serialize_type = serialize;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    pub fn is_error(&self) -> bool {
        !self.code.is_ok()
    }
}

/// A decoded frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Ping,
    Pong,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Request(_) => MessageType::Request,
            Message::Response(_) => MessageType::Response,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::OK.as_i16(), 200);
        assert_eq!(StatusCode::INTERNAL_ERROR.as_i16(), 500);
        assert_eq!(StatusCode::RATE_LIMITED.as_i16(), 700);
        assert!(StatusCode::OK.is_ok());
        assert!(!StatusCode::RATE_LIMITED.is_ok());
        assert_eq!(StatusCode::RATE_LIMITED.to_string(), "700");
    }

    #[test]
    fn test_response_constructors() {
        let ok = Response::ok(3, json!("hello"));
        assert!(ok.is_ok());
        assert_eq!(ok.data, Some(json!("hello")));

        let err = Response::error(4, StatusCode::INTERNAL_ERROR, "no service found");
        assert!(err.is_error());
        assert_eq!(err.msg, "no service found");
        assert!(err.data.is_none());
    }

    #[test]
    fn test_request_builder() {
        let req = Request::new(1, "echo", "Echo").with_args(vec![json!("hi")]);
        assert_eq!(req.service_name, "echo");
        assert_eq!(req.method_name, "Echo");
        assert_eq!(req.args, vec![json!("hi")]);
    }

    #[test]
    fn test_message_type() {
        assert_eq!(Message::Ping.message_type(), MessageType::Ping);
        assert_eq!(
            Message::Request(Request::new(1, "a", "b")).message_type(),
            MessageType::Request
        );
    }
}
