//! Client and server talking over loopback.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wirecall_client::{ClientError, ClientOptions, ClientProxy, RequestIdGenerator, TcpClient};
use wirecall_protocol::{CompressType, SerializeType, StatusCode};
use wirecall_registry::MemoryRegistry;
use wirecall_server::{echo_service, Server, ServerConfig, Service};

async fn start(config: ServerConfig, registry: Arc<MemoryRegistry>) -> Arc<Server> {
    let mut server = Server::bind(config, registry).await.unwrap();
    server.register("echo", echo_service()).await.unwrap();
    server
        .register(
            "math",
            Service::new()
                .method("Add", |a: i64, b: i64| async move { Ok::<_, String>(a + b) })
                .method("Div", |a: i64, b: i64| async move {
                    if b == 0 {
                        return Err("division by zero".to_string());
                    }
                    Ok(a / b)
                }),
        )
        .await
        .unwrap();

    let server = Arc::new(server);
    let runner = server.clone();
    tokio::spawn(async move { runner.run().await });
    server
}

fn local() -> ServerConfig {
    ServerConfig::new("127.0.0.1", 0)
}

#[tokio::test]
async fn test_echo_hello() {
    let registry = Arc::new(MemoryRegistry::new());
    let _server = start(local(), registry.clone()).await;

    let proxy = ClientProxy::new(ClientOptions::new().with_registry(registry));
    let value = proxy.call("echo", "Echo", vec![json!("hello")]).await.unwrap();
    assert_eq!(value, json!("hello"));
}

#[tokio::test]
async fn test_every_encoding() {
    let registry = Arc::new(MemoryRegistry::new());
    let _server = start(local(), registry.clone()).await;

    for compress in [CompressType::Gzip, CompressType::None] {
        for serialize in [SerializeType::MsgPack, SerializeType::Protobuf] {
            let options = ClientOptions::new()
                .with_registry(registry.clone())
                .with_compress_type(compress)
                .with_serialize_type(serialize);
            let proxy = ClientProxy::new(options);

            let echoed = proxy.call("echo", "Echo", vec![json!("hello")]).await.unwrap();
            assert_eq!(echoed, json!("hello"));

            let sum: i64 = proxy
                .call_as("math", "Add", vec![json!(40), json!(2)])
                .await
                .unwrap();
            assert_eq!(sum, 42);
        }
    }
}

#[tokio::test]
async fn test_method_error() {
    let registry = Arc::new(MemoryRegistry::new());
    let _server = start(local(), registry.clone()).await;

    let client = TcpClient::new("math", ClientOptions::new().with_registry(registry));
    client.connect().await.unwrap();
    let rsp = client.invoke("Div", vec![json!(1), json!(0)]).await.unwrap();
    client.close().await.unwrap();

    assert_eq!(rsp.code, StatusCode::INTERNAL_ERROR);
    assert_eq!(rsp.msg, "division by zero");
    assert!(rsp.data.is_none());
}

#[tokio::test]
async fn test_unknown_method_is_not_retried() {
    let registry = Arc::new(MemoryRegistry::new());
    let server = start(local(), registry.clone()).await;

    let proxy = ClientProxy::new(ClientOptions::new().with_registry(registry).with_retries(3));
    let err = proxy.call("echo", "Shout", vec![]).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Server { code: StatusCode::INTERNAL_ERROR, ref msg } if msg == "no service method found"
    ));
    assert_eq!(
        server
            .stats()
            .requests_total
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_rate_limited_call() {
    let registry = Arc::new(MemoryRegistry::new());
    let config = local()
        .with_rate_limit(1.0, 1)
        .with_rate_limit_timeout(Duration::from_millis(10));
    let _server = start(config, registry.clone()).await;

    let proxy = ClientProxy::new(ClientOptions::new().with_registry(registry).with_retries(1));
    assert!(proxy.call("echo", "Echo", vec![json!("a")]).await.is_ok());
    let err = proxy.call("echo", "Echo", vec![json!("b")]).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn test_ping_and_shared_ids() {
    let registry = Arc::new(MemoryRegistry::new());
    let _server = start(local(), registry.clone()).await;

    let ids = Arc::new(RequestIdGenerator::starting_at(100));
    let options = ClientOptions::new()
        .with_registry(registry)
        .with_id_generator(ids.clone());
    let proxy = ClientProxy::new(options);

    proxy.ping("echo").await.unwrap();
    proxy.call("echo", "Echo", vec![json!("x")]).await.unwrap();
    assert_eq!(ids.next_id(), 102);
}
