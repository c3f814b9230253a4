//! Payload serializers.
//!
//! Two encodings are supported, selected by the header's serialize type:
//!
//! - [`MsgPackSerializer`]: self-describing MessagePack. Arguments and
//!   results travel as arbitrary values, no schema needed.
//! - [`ProtobufSerializer`]: protocol buffers. Requests and responses use
//!   dedicated message shapes ([`PbRequest`], [`PbResponse`]) whose
//!   arguments are `google.protobuf.Value` lists.
//!
//! Both decode to the same logical [`Request`] / [`Response`].

use crate::error::ProtocolError;
use crate::header::{CompressType, SerializeType};
use crate::message::{Request, Response, StatusCode};
use prost::Message as _;
use prost_types::value::Kind;
use serde_json::{Map, Number, Value};

/// Encodes and decodes request/response payloads.
pub trait Serializer: Send + Sync {
    fn serialize_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError>;
    fn deserialize_request(&self, data: &[u8]) -> Result<Request, ProtocolError>;
    fn serialize_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError>;
    fn deserialize_response(&self, data: &[u8]) -> Result<Response, ProtocolError>;
}

/// MessagePack serializer using `rmp-serde`.
///
/// Structs are written as maps (`to_vec_named`) so optional fields can be
/// skipped without shifting positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn serialize_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec_named(request)?)
    }

    fn deserialize_request(&self, data: &[u8]) -> Result<Request, ProtocolError> {
        Ok(rmp_serde::from_slice(data)?)
    }

    fn serialize_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec_named(response)?)
    }

    fn deserialize_response(&self, data: &[u8]) -> Result<Response, ProtocolError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

/// Protobuf request shape.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PbRequest {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(string, tag = "2")]
    pub service_name: String,
    #[prost(string, tag = "3")]
    pub method_name: String,
    #[prost(message, repeated, tag = "4")]
    pub args: Vec<prost_types::Value>,
}

/// Protobuf response shape.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PbResponse {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(int32, tag = "2")]
    pub code: i32,
    #[prost(string, tag = "3")]
    pub msg: String,
    #[prost(int32, tag = "4")]
    pub compress_type: i32,
    #[prost(int32, tag = "5")]
    pub serialize_type: i32,
    #[prost(message, optional, tag = "6")]
    pub data: Option<prost_types::Value>,
}

/// Protocol buffer serializer using `prost`.
///
/// Numbers travel as doubles (the `google.protobuf.Value` model); integral
/// doubles decode back to integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufSerializer;

impl Serializer for ProtobufSerializer {
    fn serialize_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError> {
        let args = request
            .args
            .iter()
            .map(json_to_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let msg = PbRequest {
            request_id: request.request_id,
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            args,
        };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf)?;
        Ok(buf)
    }

    fn deserialize_request(&self, data: &[u8]) -> Result<Request, ProtocolError> {
        let msg = PbRequest::decode(data)?;
        Ok(Request {
            request_id: msg.request_id,
            service_name: msg.service_name,
            method_name: msg.method_name,
            args: msg.args.into_iter().map(proto_to_json).collect(),
        })
    }

    fn serialize_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError> {
        let data = response.data.as_ref().map(json_to_proto).transpose()?;
        let msg = PbResponse {
            request_id: response.request_id,
            code: i32::from(response.code.as_i16()),
            msg: response.msg.clone(),
            compress_type: response.compress_type as i32,
            serialize_type: response.serialize_type as i32,
            data,
        };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf)?;
        Ok(buf)
    }

    fn deserialize_response(&self, data: &[u8]) -> Result<Response, ProtocolError> {
        let msg = PbResponse::decode(data)?;
        let code = i16::try_from(msg.code)
            .map_err(|_| ProtocolError::UnrepresentableValue(format!("status code {}", msg.code)))?;
        let compress_type = u8::try_from(msg.compress_type)
            .map_err(|_| ProtocolError::UnknownCompressType(u8::MAX))
            .and_then(CompressType::try_from)?;
        let serialize_type = u8::try_from(msg.serialize_type)
            .map_err(|_| ProtocolError::UnknownSerializeType(u8::MAX))
            .and_then(SerializeType::try_from)?;
        Ok(Response {
            request_id: msg.request_id,
            code: StatusCode(code),
            msg: msg.msg,
            compress_type,
            serialize_type,
            data: msg.data.map(proto_to_json),
        })
    }
}

static MSGPACK: MsgPackSerializer = MsgPackSerializer;
static PROTOBUF: ProtobufSerializer = ProtobufSerializer;

impl SerializeType {
    /// Returns the serializer selected by this header value.
    pub fn serializer(self) -> &'static dyn Serializer {
        match self {
            SerializeType::MsgPack => &MSGPACK,
            SerializeType::Protobuf => &PROTOBUF,
        }
    }
}

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn json_to_proto(value: &Value) -> Result<prost_types::Value, ProtocolError> {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| ProtocolError::UnrepresentableValue(n.to_string()))?;
            if (n.is_i64() || n.is_u64()) && f.abs() > MAX_SAFE_INTEGER {
                return Err(ProtocolError::UnrepresentableValue(format!(
                    "integer {} exceeds double precision",
                    n
                )));
            }
            Kind::NumberValue(f)
        }
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_proto).collect::<Result<_, _>>()?,
        }),
        Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map
                .iter()
                .map(|(k, v)| Ok((k.clone(), json_to_proto(v)?)))
                .collect::<Result<_, ProtocolError>>()?,
        }),
    };
    Ok(prost_types::Value { kind: Some(kind) })
}

fn proto_to_json(value: prost_types::Value) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::NumberValue(f)) => {
            if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                Value::from(f as i64)
            } else {
                Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
            }
        }
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(proto_to_json).collect())
        }
        Some(Kind::StructValue(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, proto_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> Request {
        Request::new(12, "goods", "Find").with_args(vec![
            json!(1000),
            json!("name"),
            json!({"id": 7, "tags": ["a", "b"], "active": true, "note": null}),
        ])
    }

    #[test]
    fn test_msgpack_request_roundtrip() {
        let req = sample_request();
        let bytes = MsgPackSerializer.serialize_request(&req).unwrap();
        assert_eq!(MsgPackSerializer.deserialize_request(&bytes).unwrap(), req);
    }

    #[test]
    fn test_msgpack_response_without_data() {
        let rsp = Response::error(3, StatusCode::INTERNAL_ERROR, "no service found");
        let bytes = MsgPackSerializer.serialize_response(&rsp).unwrap();
        let decoded = MsgPackSerializer.deserialize_response(&bytes).unwrap();
        assert_eq!(decoded, rsp);
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_msgpack_response_with_null_data() {
        let rsp = Response::ok(4, json!(null));
        let bytes = MsgPackSerializer.serialize_response(&rsp).unwrap();
        let decoded = MsgPackSerializer.deserialize_response(&bytes).unwrap();
        assert_eq!(decoded.data, Some(json!(null)));
    }

    #[test]
    fn test_protobuf_request_roundtrip() {
        let req = sample_request();
        let bytes = ProtobufSerializer.serialize_request(&req).unwrap();
        assert_eq!(ProtobufSerializer.deserialize_request(&bytes).unwrap(), req);
    }

    #[test]
    fn test_protobuf_response_roundtrip() {
        let rsp = Response::ok(99, json!({"id": 1000, "name": "goods"}))
            .with_encoding(CompressType::None, SerializeType::Protobuf);
        let bytes = ProtobufSerializer.serialize_response(&rsp).unwrap();
        assert_eq!(ProtobufSerializer.deserialize_response(&bytes).unwrap(), rsp);
    }

    #[test]
    fn test_protobuf_numbers() {
        assert_eq!(proto_to_json(json_to_proto(&json!(-42)).unwrap()), json!(-42));
        assert_eq!(proto_to_json(json_to_proto(&json!(2.5)).unwrap()), json!(2.5));
        assert!(json_to_proto(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_protobuf_rejects_bad_status() {
        let msg = PbResponse {
            request_id: 1,
            code: 100_000,
            ..Default::default()
        };
        let mut buf = Vec::new();
        msg.encode(&mut buf).unwrap();
        assert!(ProtobufSerializer.deserialize_response(&buf).is_err());
    }

    #[test]
    fn test_protobuf_rejects_garbage() {
        let result = ProtobufSerializer.deserialize_request(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(ProtocolError::ProtobufDecode(_))));
    }

    #[test]
    fn test_selection_by_header_value() {
        let req = sample_request();
        let a = SerializeType::MsgPack.serializer().serialize_request(&req).unwrap();
        let b = SerializeType::Protobuf.serializer().serialize_request(&req).unwrap();
        assert_ne!(a, b);
    }
}
