//! Single-call TCP client.

use crate::error::ClientError;
use crate::options::ClientOptions;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use wirecall_protocol::{
    read_frame, write_frame, Decoder, Encoder, Frame, MessageType, ProtocolError, Request,
    Response,
};

/// A client for one service over one connection.
///
/// The server answers exactly one frame per connection, so a client is
/// good for a single [`TcpClient::invoke`] or [`TcpClient::ping`].
pub struct TcpClient {
    service: String,
    options: ClientOptions,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpClient {
    /// Creates a client (not yet connected).
    pub fn new(service: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            service: service.into(),
            options,
            stream: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Resolves the service through the registry and connects to it.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let addr = self.options.registry.get_address(&self.service).await?;
        tracing::debug!("Connecting to {} for service '{}'", addr, self.service);

        let stream = tokio::time::timeout(self.options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                addr: addr.clone(),
                after: self.options.connect_timeout,
            })??;
        stream.set_nodelay(true).ok();

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    /// Returns whether the client holds an open connection.
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Sends one request and waits for its response.
    ///
    /// Error statuses are returned as a [`Response`]; only transport,
    /// protocol and timeout failures are errors here.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Response, ClientError> {
        let request_id = self.options.ids.next_id();
        let request = Request::new(request_id, self.service.as_str(), method).with_args(args);
        let frame = Encoder::encode_request(
            &request,
            self.options.compress_type,
            self.options.serialize_type,
        )?;

        tracing::debug!(
            "Invoking {}.{} id={} ({} bytes)",
            self.service,
            method,
            request_id,
            frame.header.full_length
        );
        let reply = self.exchange(frame).await?;
        Ok(Decoder::decode_response(&reply)?)
    }

    /// Sends a ping and returns the round-trip time.
    ///
    /// A server that rejects the ping through admission control answers
    /// with a 700 response, surfaced as [`ClientError::Server`].
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let request_id = self.options.ids.next_id();
        let started = Instant::now();
        let reply = self
            .exchange(Encoder::encode_heartbeat(MessageType::Ping, request_id))
            .await?;
        if reply.header.message_type == MessageType::Response {
            let rsp = Decoder::decode_response(&reply)?;
            if rsp.is_error() {
                return Err(ClientError::Server {
                    code: rsp.code,
                    msg: rsp.msg,
                });
            }
        }
        if reply.header.message_type != MessageType::Pong {
            return Err(ProtocolError::UnexpectedMessage {
                expected: MessageType::Pong.as_str(),
                actual: reply.header.message_type.as_str(),
            }
            .into());
        }
        Ok(started.elapsed())
    }

    /// Closes the connection. Closing an unconnected client is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            match stream.shutdown().await {
                Ok(()) => {}
                // The server may already have closed its side.
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
            tracing::debug!("Closed connection for service '{}'", self.service);
        }
        Ok(())
    }

    /// Writes `frame`, then reads exactly one frame on a spawned task.
    async fn exchange(&self, frame: Frame) -> Result<Frame, ClientError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.take().ok_or(ClientError::NotConnected)?;
        let (mut reader, mut writer) = stream.into_split();

        write_frame(&mut writer, &frame).await?;

        let (tx, rx) = oneshot::channel();
        let read_task = tokio::spawn(async move {
            let result = read_frame(&mut reader).await;
            let _ = tx.send((result, reader));
        });

        let timeout = self.options.request_timeout;
        let (result, reader) = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(received)) => received,
            Ok(Err(_)) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                read_task.abort();
                return Err(ClientError::Timeout(timeout));
            }
        };

        // Keep the socket so that close() shuts it down.
        if let Ok(stream) = reader.reunite(writer) {
            *guard = Some(stream);
        }

        let reply = result.map_err(closed_on_eof)?;
        let expected = frame.header.request_id;
        if reply.header.request_id != expected {
            return Err(ClientError::RequestIdMismatch {
                expected,
                actual: reply.header.request_id,
            });
        }
        Ok(reply)
    }
}

fn closed_on_eof(e: ProtocolError) -> ClientError {
    match e {
        ProtocolError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            ClientError::ConnectionClosed
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use wirecall_protocol::{CompressType, SerializeType, StatusCode};
    use wirecall_registry::{MemoryRegistry, ServiceRegistry};

    /// Accepts one connection and answers its frame with `reply`.
    async fn one_shot_server<F>(reply: F) -> String
    where
        F: FnOnce(Frame) -> Option<Frame> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let frame = read_frame(&mut stream).await.unwrap();
            match reply(frame) {
                Some(out) => write_frame(&mut stream, &out).await.unwrap(),
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        });
        addr
    }

    fn echo_reply(frame: Frame) -> Option<Frame> {
        let req = Decoder::decode_request(&frame).unwrap();
        let rsp = Response::ok(req.request_id, json!(req.args))
            .with_encoding(frame.header.compress_type, frame.header.serialize_type);
        Some(Encoder::encode_response(&rsp).unwrap())
    }

    #[tokio::test]
    async fn test_invoke() {
        let addr = one_shot_server(echo_reply).await;
        let options = ClientOptions::new()
            .with_address(addr)
            .with_compress_type(CompressType::None)
            .with_serialize_type(SerializeType::Protobuf);
        let client = TcpClient::new("echo", options);

        client.connect().await.unwrap();
        assert!(client.is_connected().await);
        let rsp = client.invoke("Echo", vec![json!("hello")]).await.unwrap();
        assert_eq!(rsp.code, StatusCode::OK);
        assert_eq!(rsp.data, Some(json!(["hello"])));
        assert_eq!(rsp.serialize_type, SerializeType::Protobuf);

        client.close().await.unwrap();
        assert!(!client.is_connected().await);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_without_connect() {
        let client = TcpClient::new("echo", ClientOptions::new());
        let err = client.invoke("Echo", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_resolves_through_registry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let registry = Arc::new(MemoryRegistry::new());
        registry.register_service("goods", "127.0.0.1", port).await.unwrap();

        let client = TcpClient::new("goods", ClientOptions::new().with_registry(registry.clone()));
        client.connect().await.unwrap();
        assert!(listener.accept().await.is_ok());

        let missing = TcpClient::new("orders", ClientOptions::new().with_registry(registry));
        let err = missing.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Registry(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let addr = one_shot_server(|_| None).await;
        let options = ClientOptions::new()
            .with_address(addr)
            .with_request_timeout(Duration::from_millis(50));
        let client = TcpClient::new("slow", options);
        client.connect().await.unwrap();

        let err = client.invoke("Wait", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_closed_without_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream).await;
        });

        let client = TcpClient::new("echo", ClientOptions::new().with_address(addr));
        client.connect().await.unwrap();
        let err = client.invoke("Echo", vec![json!("x")]).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed), "{err:?}");
    }

    #[tokio::test]
    async fn test_request_id_mismatch() {
        let addr = one_shot_server(|frame| {
            let rsp = Response::ok(frame.header.request_id + 1, json!(null));
            Some(Encoder::encode_response(&rsp).unwrap())
        })
        .await;
        let client = TcpClient::new("echo", ClientOptions::new().with_address(addr));
        client.connect().await.unwrap();

        let err = client.invoke("Echo", vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestIdMismatch { .. }));
    }

    #[tokio::test]
    async fn test_ping() {
        let addr = one_shot_server(|frame| {
            assert_eq!(frame.header.message_type, MessageType::Ping);
            Some(Encoder::encode_heartbeat(MessageType::Pong, frame.header.request_id))
        })
        .await;
        let client = TcpClient::new("echo", ClientOptions::new().with_address(addr));
        client.connect().await.unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_rate_limited() {
        let addr = one_shot_server(|frame| {
            let rsp = Response::error(
                frame.header.request_id,
                StatusCode::RATE_LIMITED,
                "rate limited",
            );
            Some(Encoder::encode_response(&rsp).unwrap())
        })
        .await;
        let client = TcpClient::new("echo", ClientOptions::new().with_address(addr));
        client.connect().await.unwrap();

        let err = client.ping().await.unwrap_err();
        assert!(err.is_rate_limited(), "{err:?}");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind and drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = TcpClient::new("echo", ClientOptions::new().with_address(addr));
        assert!(matches!(client.connect().await, Err(ClientError::Io(_))));
    }
}
