//! Per-connection handling.
//!
//! Each accepted socket carries exactly one request. A read task admits,
//! decodes and dispatches it, then hands at most one response frame to a
//! write task through a single-slot channel. The write task sends the
//! frame (if any) and closes the connection on every path.

use crate::error::{InvokeError, ServerError};
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::server::ServerStats;
use crate::service::ServiceMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use wirecall_protocol::{
    read_frame, write_frame, Decoder, Encoder, Frame, Header, Message, MessageType, ProtocolError,
    Request, Response, StatusCode, MAX_FRAME_SIZE,
};

/// Shared state every connection needs.
pub(crate) struct ConnectionContext {
    pub services: Arc<ServiceMap>,
    pub limiter: Arc<RateLimiter>,
    pub admission_timeout: Duration,
    pub read_timeout: Duration,
    pub stats: Arc<ServerStats>,
    pub metrics: Option<Arc<Metrics>>,
}

/// Serves one connection to completion.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
) -> Result<(), ServerError> {
    tracing::debug!("Client connected: {}", addr);
    let (reader, writer) = stream.into_split();
    let (slot_tx, slot_rx) = oneshot::channel::<Frame>();

    let read = tokio::spawn(read_request(reader, addr, ctx, slot_tx));
    let write = tokio::spawn(write_response(writer, addr, slot_rx));

    let read_result = read.await.unwrap_or_else(|e| Err(join_error(e)));
    let write_result = write.await.unwrap_or_else(|e| Err(join_error(e)));

    read_result.and(write_result)
}

fn join_error(e: tokio::task::JoinError) -> ServerError {
    ServerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn read_request(
    mut reader: OwnedReadHalf,
    addr: SocketAddr,
    ctx: Arc<ConnectionContext>,
    slot: oneshot::Sender<Frame>,
) -> Result<(), ServerError> {
    let admitted = ctx.limiter.acquire(ctx.admission_timeout).await;

    // Framing and protocol errors end the connection without a response.
    let frame = match tokio::time::timeout(ctx.read_timeout, read_frame(&mut reader)).await {
        Ok(frame) => frame?,
        Err(_) => {
            tracing::debug!(
                "[{}] no request within {:?}, closing",
                addr,
                ctx.read_timeout
            );
            return Ok(());
        }
    };
    let header = frame.header;
    tracing::debug!(
        "[{}] {} frame id={} ({} bytes)",
        addr,
        header.message_type,
        header.request_id,
        header.full_length
    );

    let reply = if !admitted {
        tracing::warn!("[{}] request {} rejected by rate limiter", addr, header.request_id);
        ctx.stats.rate_limited_total.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = ctx.metrics {
            metrics.rate_limited_total.inc();
        }
        let rsp = Response::error(header.request_id, StatusCode::RATE_LIMITED, "rate limited");
        encode_reply(&header, rsp, &ctx)?
    } else {
        match Decoder::decode_message(&frame)? {
            Message::Request(request) => {
                let rsp = dispatch(request, &header, addr, &ctx).await;
                encode_reply(&header, rsp, &ctx)?
            }
            Message::Ping => Encoder::encode_heartbeat(MessageType::Pong, header.request_id),
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    expected: MessageType::Request.as_str(),
                    actual: other.message_type().as_str(),
                }
                .into())
            }
        }
    };

    if slot.send(reply).is_err() {
        tracing::debug!("[{}] writer gone before response", addr);
    }
    Ok(())
}

async fn dispatch(
    request: Request,
    header: &Header,
    addr: SocketAddr,
    ctx: &ConnectionContext,
) -> Response {
    let Request {
        service_name,
        method_name,
        args,
        ..
    } = request;
    ctx.stats.requests_total.fetch_add(1, Ordering::Relaxed);

    let started = Instant::now();
    let result = ctx.services.dispatch(&service_name, &method_name, args).await;
    let elapsed = started.elapsed();

    let routed = !matches!(
        result,
        Err(InvokeError::NoService(_)) | Err(InvokeError::NoMethod { .. })
    );
    if let (true, Some(metrics)) = (routed, ctx.metrics.as_ref()) {
        metrics
            .requests_total
            .with_label_values(&[&service_name, &method_name])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&service_name, &method_name])
            .observe(elapsed.as_secs_f64());
    }

    match result {
        Ok(value) => Response::ok(header.request_id, value),
        Err(e) => {
            tracing::warn!(
                "[{}] {}.{} failed: {}",
                addr,
                service_name,
                method_name,
                e
            );
            ctx.stats.errors_total.fetch_add(1, Ordering::Relaxed);
            Response::error(header.request_id, StatusCode::INTERNAL_ERROR, e.to_string())
        }
    }
}

/// Encodes a response with the request's encodings, falling back to a
/// status 500 when the result itself cannot be encoded.
fn encode_reply(
    header: &Header,
    rsp: Response,
    ctx: &ConnectionContext,
) -> Result<Frame, ServerError> {
    let rsp = rsp.with_encoding(header.compress_type, header.serialize_type);
    let (frame, code) = match Encoder::encode_response(&rsp).and_then(within_limit) {
        Ok(frame) => (frame, rsp.code),
        Err(e) => {
            tracing::warn!("response {} could not be encoded: {}", rsp.request_id, e);
            let fallback = Response::error(
                rsp.request_id,
                StatusCode::INTERNAL_ERROR,
                format!("response could not be encoded: {}", e),
            )
            .with_encoding(header.compress_type, header.serialize_type);
            (Encoder::encode_response(&fallback)?, fallback.code)
        }
    };
    if let Some(ref metrics) = ctx.metrics {
        metrics.record_response(code.as_i16());
    }
    Ok(frame)
}

fn within_limit(frame: Frame) -> Result<Frame, ProtocolError> {
    if frame.header.full_length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.header.full_length,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(frame)
}

async fn write_response(
    mut writer: OwnedWriteHalf,
    addr: SocketAddr,
    slot: oneshot::Receiver<Frame>,
) -> Result<(), ServerError> {
    let result = match slot.await {
        Ok(frame) => write_frame(&mut writer, &frame).await.map_err(ServerError::from),
        Err(_) => {
            tracing::debug!("[{}] closing without response", addr);
            Ok(())
        }
    };
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("[{}] shutdown error: {}", addr, e);
    }
    result
}
