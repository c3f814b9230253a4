//! Minimal HTTP/1 client for registry gateways.
//!
//! One connection per request. Endpoints are tried in order until one
//! accepts the connection; the whole exchange is bounded by a timeout.

use crate::RegistryError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    /// `host:port` authorities.
    endpoints: Vec<String>,
    timeout: Duration,
}

/// Status and body of a completed exchange.
#[derive(Debug)]
pub(crate) struct HttpReply {
    pub status: u16,
    pub body: Bytes,
}

impl HttpReply {
    /// Turns non-2xx replies into [`RegistryError::Http`].
    pub fn success(self) -> Result<Bytes, RegistryError> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(RegistryError::Http {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }
}

impl HttpClient {
    pub fn new(endpoints: &[String], timeout: Duration) -> Result<Self, RegistryError> {
        if endpoints.is_empty() {
            return Err(RegistryError::NoEndpoints);
        }
        let endpoints = endpoints
            .iter()
            .map(|e| parse_endpoint(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { endpoints, timeout })
    }

    pub async fn post_json(
        &self,
        operation: &'static str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, RegistryError> {
        let body = serde_json::to_vec(body)?;
        self.send(operation, Method::POST, path, Some(("application/json", body)))
            .await
    }

    pub async fn post_empty(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<HttpReply, RegistryError> {
        self.send(operation, Method::POST, path, None).await
    }

    pub async fn get(&self, operation: &'static str, path: &str) -> Result<HttpReply, RegistryError> {
        self.send(operation, Method::GET, path, None).await
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> Result<HttpReply, RegistryError> {
        let attempt = async {
            let (stream, authority) = self.connect().await?;
            exchange(stream, authority, method, path, body).await
        };
        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| RegistryError::Timeout {
                operation,
                after: self.timeout,
            })?
    }

    async fn connect(&self) -> Result<(TcpStream, &str), RegistryError> {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            match TcpStream::connect(endpoint.as_str()).await {
                Ok(stream) => return Ok((stream, endpoint)),
                Err(e) => {
                    tracing::debug!("registry endpoint {} unreachable: {}", endpoint, e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(RegistryError::Io(e)),
            None => Err(RegistryError::NoEndpoints),
        }
    }
}

async fn exchange(
    stream: TcpStream,
    authority: &str,
    method: Method,
    path: &str,
    body: Option<(&'static str, Vec<u8>)>,
) -> Result<HttpReply, RegistryError> {
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("registry connection error: {}", e);
        }
    });

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(hyper::header::HOST, authority);
    let payload = match body {
        Some((content_type, bytes)) => {
            builder = builder.header(hyper::header::CONTENT_TYPE, content_type);
            Bytes::from(bytes)
        }
        None => Bytes::new(),
    };
    let request = builder
        .body(Full::new(payload))
        .map_err(|e| RegistryError::Transport(e.to_string()))?;

    let response = sender.send_request(request).await?;
    let status = response.status().as_u16();
    let body = response.into_body().collect().await?.to_bytes();
    Ok(HttpReply { status, body })
}

/// Accepts `host:port` or `http://host:port[/]`.
fn parse_endpoint(endpoint: &str) -> Result<String, RegistryError> {
    let trimmed = endpoint.trim();
    let rest = match trimmed.split_once("://") {
        Some(("http", rest)) => rest,
        Some(_) => return Err(RegistryError::InvalidEndpoint(endpoint.to_string())),
        None => trimmed,
    };
    let authority = rest.trim_end_matches('/');
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(authority.to_string())
        }
        _ => Err(RegistryError::InvalidEndpoint(endpoint.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A one-shot HTTP responder for exercising the gateways.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves a single canned reply and hands back the raw request text.
    pub async fn serve_once(status: u16, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {} X\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
        });

        (addr, rx)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + content_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(parse_endpoint("127.0.0.1:2379").unwrap(), "127.0.0.1:2379");
        assert_eq!(parse_endpoint("http://etcd:2379/").unwrap(), "etcd:2379");
        assert!(parse_endpoint("https://etcd:2379").is_err());
        assert!(parse_endpoint("etcd").is_err());
        assert!(parse_endpoint(":2379").is_err());
    }

    #[test]
    fn test_no_endpoints() {
        assert!(matches!(
            HttpClient::new(&[], Duration::from_secs(1)),
            Err(RegistryError::NoEndpoints)
        ));
    }

    #[tokio::test]
    async fn test_get_roundtrip() {
        let (addr, request) = testing::serve_once(200, "pong").await;
        let client = HttpClient::new(&[addr], Duration::from_secs(1)).unwrap();

        let reply = client.get("lookup", "/ping?x=1").await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(&reply.body[..], b"pong");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("GET /ping?x=1 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let (addr, _request) = testing::serve_once(503, "busy").await;
        let client = HttpClient::new(&[addr], Duration::from_secs(1)).unwrap();

        let err = client.get("lookup", "/").await.unwrap().success().unwrap_err();
        assert!(matches!(err, RegistryError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        // Accepts but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _hold = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = HttpClient::new(&[addr], Duration::from_millis(100)).unwrap();
        let err = client.get("lookup", "/").await.unwrap_err();
        assert!(matches!(err, RegistryError::Timeout { operation: "lookup", .. }));
    }
}
