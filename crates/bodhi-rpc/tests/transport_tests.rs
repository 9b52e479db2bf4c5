//! HTTP, WebSocket-style session and IPC transport tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use bodhi_rpc::error::error_code;
use bodhi_rpc::session::serve_connection;
use bodhi_rpc::{
    DevConfig, DevProvider, FilterConfig, HandlerConfig, RpcContext, RpcHandler, RpcServer,
    ServerConfig,
};
use bodhi_tx::FeeDelegationContext;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::handler_for;

fn server(max_batch_size: usize) -> (RpcServer, Arc<DevProvider>) {
    let provider = Arc::new(DevProvider::new(DevConfig::default()));
    let config = ServerConfig {
        max_batch_size,
        ..Default::default()
    };
    let handler = RpcHandler::with_config(
        Arc::new(RpcContext::new(
            provider.clone(),
            FeeDelegationContext::default(),
            FilterConfig::default(),
        )),
        config.handler_config(),
    );
    (RpcServer::new(config, handler), provider)
}

async fn post(server: &RpcServer, body: &'static str) -> (StatusCode, Value) {
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ==================== HTTP ====================

#[tokio::test]
async fn test_http_single_request() {
    let (server, _) = server(50);
    let (status, body) = post(&server, r#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId","params":[]}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": "0x253"}));
}

#[tokio::test]
async fn test_http_rpc_errors_keep_status_200() {
    let (server, _) = server(50);
    let (status, body) = post(&server, r#"{"jsonrpc":"2.0","id":1,"method":"eth_nope"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], error_code::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_http_malformed_json_is_400() {
    let (server, _) = server(50);
    let (status, body) = post(&server, r#"{"jsonrpc":"2.0","id":1,"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], error_code::INVALID_REQUEST);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_http_batch_limit() {
    let (server, _) = server(2);
    let (status, body) = post(
        &server,
        r#"[{"jsonrpc":"2.0","id":1,"method":"eth_chainId"},
            {"jsonrpc":"2.0","id":2,"method":"eth_chainId"},
            {"jsonrpc":"2.0","id":3,"method":"eth_chainId"}]"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], error_code::INVALID_REQUEST);

    let (_, body) = post(
        &server,
        r#"[{"jsonrpc":"2.0","id":1,"method":"eth_chainId"},
            {"jsonrpc":"2.0","id":2,"method":"net_version"}]"#,
    )
    .await;
    assert_eq!(body[0]["result"], "0x253");
    assert_eq!(body[1]["result"], "595");
}

#[tokio::test]
async fn test_http_health() {
    let (server, _) = server(50);
    let response = server
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_http_cors_preflight() {
    let (server, _) = server(50);
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/")
                .header(header::ORIGIN, "https://app.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

// ==================== Sessions ====================

async fn next_json(rx: &mut mpsc::Receiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(2), rx.next())
        .await
        .expect("no message in time")
        .expect("connection closed");
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_session_subscription_and_teardown() {
    let provider = Arc::new(DevProvider::new(DevConfig::default()));
    let handler = handler_for(provider.clone());
    let _background = handler.context().spawn_background_tasks();

    let (mut client_tx, incoming) = mpsc::channel::<String>(16);
    let (outgoing, mut client_rx) = mpsc::channel::<String>(16);
    let driver = tokio::spawn(serve_connection(handler.clone(), incoming, outgoing, 16));

    client_tx
        .send(r#"{"jsonrpc":"2.0","id":1,"method":"eth_subscribe","params":["newHeads"]}"#.to_string())
        .await
        .unwrap();
    let reply = next_json(&mut client_rx).await;
    let id = reply["result"].as_str().unwrap().to_string();
    assert_eq!(handler.context().subscriptions.len(), 1);

    let block = provider.seal_block(Vec::new());
    let push = next_json(&mut client_rx).await;
    assert_eq!(push["method"], "eth_subscription");
    assert_eq!(push["params"]["subscription"], id);
    assert_eq!(push["params"]["result"]["hash"], block.hash.to_hex());

    drop(client_tx);
    driver.await.unwrap();
    assert!(handler.context().subscriptions.is_empty());
}

#[tokio::test]
async fn test_session_unsubscribe_stops_pushes() {
    let provider = Arc::new(DevProvider::new(DevConfig::default()));
    let handler = handler_for(provider.clone());
    let _background = handler.context().spawn_background_tasks();

    let (mut client_tx, incoming) = mpsc::channel::<String>(16);
    let (outgoing, mut client_rx) = mpsc::channel::<String>(16);
    tokio::spawn(serve_connection(handler.clone(), incoming, outgoing, 16));

    client_tx
        .send(r#"{"jsonrpc":"2.0","id":1,"method":"eth_subscribe","params":["newHeads"]}"#.to_string())
        .await
        .unwrap();
    let id = next_json(&mut client_rx).await["result"].clone();

    let unsubscribe = json!({"jsonrpc": "2.0", "id": 2, "method": "eth_unsubscribe", "params": [id]});
    client_tx.send(unsubscribe.to_string()).await.unwrap();
    assert_eq!(next_json(&mut client_rx).await["result"], true);

    provider.seal_block(Vec::new());
    let stray = tokio::time::timeout(Duration::from_millis(100), client_rx.next()).await;
    assert!(stray.is_err());
}

#[tokio::test]
async fn test_session_batch_and_garbage() {
    let handler = handler_for(Arc::new(DevProvider::new(DevConfig::default())));
    let (mut client_tx, incoming) = mpsc::channel::<String>(16);
    let (outgoing, mut client_rx) = mpsc::channel::<String>(16);
    tokio::spawn(serve_connection(handler, incoming, outgoing, 16));

    client_tx.send("not json".to_string()).await.unwrap();
    let reply = next_json(&mut client_rx).await;
    assert_eq!(reply["error"]["code"], error_code::INVALID_REQUEST);

    client_tx
        .send(
            r#"[{"jsonrpc":"2.0","id":1,"method":"eth_blockNumber"},{"jsonrpc":"2.0","id":2,"method":"web3_clientVersion"}]"#
                .to_string(),
        )
        .await
        .unwrap();
    let reply = next_json(&mut client_rx).await;
    assert_eq!(reply[0]["id"], 1);
    assert_eq!(reply[1]["id"], 2);
}

// ==================== IPC ====================

#[cfg(unix)]
#[tokio::test]
async fn test_ipc_round_trip() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bodhi.ipc");
    let handler = RpcHandler::with_config(
        Arc::new(RpcContext::new(
            Arc::new(DevProvider::new(DevConfig::default())),
            FeeDelegationContext::default(),
            FilterConfig::default(),
        )),
        HandlerConfig::default(),
    );
    let listener = bodhi_rpc::ipc::bind(&path).unwrap();
    tokio::spawn(bodhi_rpc::ipc::serve(listener, handler, 16, 1024 * 1024));

    let stream = UnixStream::connect(&path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(
            br#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId"} {"jsonrpc":"2.0","id":2,"method":"net_listening"}"#,
        )
        .await
        .unwrap();

    let mut lines = BufReader::new(reader).lines();
    let mut replies = Vec::new();
    for _ in 0..2 {
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        replies.push(serde_json::from_str::<Value>(&line).unwrap());
    }
    replies.sort_by_key(|reply| reply["id"].as_u64());
    assert_eq!(replies[0]["result"], "0x253");
    assert_eq!(replies[1]["result"], true);
}
