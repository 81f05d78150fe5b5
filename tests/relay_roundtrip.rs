//! Real server, real socket: a reconnecting client talking to the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fanout::api::{build_router, AppState};
use fanout::client::{
    ConnectionManager, ConnectionState, InboundMessage, SendOutcome, WsConnector,
};
use fanout::config::{ClientConfig, DecodeFailurePolicy, ServerConfig};
use fanout::websocket::BroadcastHub;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(listener: TcpListener) -> Arc<BroadcastHub> {
    let state = AppState::new(ServerConfig::default());
    let hub = Arc::clone(&state.hub);
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    hub
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        url: format!("ws://{}", addr),
        reconnect_delay_ms: 100,
        ..Default::default()
    }
}

async fn next_message(rx: &mut broadcast::Receiver<InboundMessage>) -> Value {
    match timeout(WAIT, rx.recv()).await.unwrap().unwrap() {
        InboundMessage::Decoded(value) => value,
        InboundMessage::Raw(text) => panic!("undecoded message: {}", text),
    }
}

async fn wait_for_count(hub: &BroadcastHub, expected: usize) {
    timeout(WAIT, async {
        while hub.connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn client_receives_welcome_confirmation_and_broadcast() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = start_server(listener).await;

    let manager = ConnectionManager::spawn(client_config(addr), WsConnector);
    let mut messages = manager.subscribe_messages();

    let welcome = next_message(&mut messages).await;
    assert_eq!(welcome["type"], "info");
    assert_eq!(welcome["message"], "Connected to WebSocket server");
    assert!(welcome["clientId"].is_string());
    assert!(manager.is_connected());
    assert_eq!(hub.connection_count().await, 1);

    let payload = json!({"type": "custom", "message": "ping"});
    assert_eq!(manager.send(&payload).await.unwrap(), SendOutcome::Sent);

    let confirmation = next_message(&mut messages).await;
    assert_eq!(confirmation["type"], "confirmation");
    let echoed = confirmation["message"].as_str().unwrap();
    assert!(echoed.starts_with("Message received: "));
    assert!(echoed.contains("ping"));

    assert_eq!(hub.trigger(Some(json!("hello all"))).await.unwrap(), 1);

    let broadcast = next_message(&mut messages).await;
    assert_eq!(broadcast["type"], "broadcast");
    assert_eq!(broadcast["message"], "hello all");
    assert!(broadcast["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(
        manager.last_message(),
        Some(InboundMessage::Decoded(broadcast))
    );

    manager.teardown().await;
    wait_for_count(&hub, 0).await;
    assert!(!manager.is_connected());
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_sends_flush_once_server_comes_up() {
    // Reserve a port, then release it so the first attempts are refused
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let manager = ConnectionManager::spawn(client_config(addr), WsConnector);
    let mut messages = manager.subscribe_messages();
    let mut status = manager.subscribe_status();

    timeout(WAIT, status.wait_for(|s| s.reconnect_pending))
        .await
        .unwrap()
        .unwrap();
    assert!(manager.last_error().is_some());

    let outcome = manager
        .send(&json!({"type": "custom", "message": "queued"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Queued);

    let hub = start_server(TcpListener::bind(addr).await.unwrap()).await;

    let welcome = next_message(&mut messages).await;
    assert_eq!(welcome["type"], "info");

    let confirmation = next_message(&mut messages).await;
    assert_eq!(confirmation["type"], "confirmation");
    assert!(confirmation["message"].as_str().unwrap().contains("queued"));
    assert_eq!(hub.connection_count().await, 1);
    assert_eq!(manager.last_error(), None);

    manager.teardown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn client_broadcast_reaches_other_clients() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = start_server(listener).await;

    let alice = ConnectionManager::spawn(client_config(addr), WsConnector);
    let bob = ConnectionManager::spawn(client_config(addr), WsConnector);
    let mut alice_rx = alice.subscribe_messages();
    let mut bob_rx = bob.subscribe_messages();

    assert_eq!(next_message(&mut alice_rx).await["type"], "info");
    assert_eq!(next_message(&mut bob_rx).await["type"], "info");
    wait_for_count(&hub, 2).await;

    alice
        .send(&json!({"type": "broadcast", "message": "from alice"}))
        .await
        .unwrap();

    let relayed = next_message(&mut bob_rx).await;
    assert_eq!(relayed["type"], "broadcast");
    assert_eq!(relayed["message"], "from alice");

    alice.teardown().await;
    bob.teardown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn teardown_during_handshake_writes_nothing() {
    // Raw listener: the TCP connect completes, the upgrade waits on us
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let manager = ConnectionManager::spawn(client_config(addr), WsConnector);
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(manager.status().state, ConnectionState::Connecting);

    manager.teardown().await;
    assert_eq!(manager.status().state, ConnectionState::Disconnected);

    // The upgrade request may already be buffered; the client must be gone
    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
        let next = timeout(WAIT, ws.next()).await.unwrap();
        assert!(
            !matches!(next, Some(Ok(_))),
            "torn-down client wrote {:?}",
            next
        );
    }
    assert!(manager.send(&json!({"late": true})).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_utf8_binary_frame_is_not_passed_through() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Binary(vec![0xff, 0xfe, 0xfd])).await.unwrap();
        ws.send(Message::Text("not json".to_string())).await.unwrap();
        // Hold the socket open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = ClientConfig {
        decode_failure: DecodeFailurePolicy::Passthrough,
        ..client_config(addr)
    };
    let manager = ConnectionManager::spawn(config, WsConnector);
    let mut messages = manager.subscribe_messages();

    let first = timeout(WAIT, messages.recv()).await.unwrap().unwrap();
    assert_eq!(first, InboundMessage::Raw("not json".to_string()));

    manager.teardown().await;
    timeout(WAIT, server).await.unwrap().unwrap();
}
