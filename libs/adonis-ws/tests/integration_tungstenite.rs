//! End-to-end tests over tokio-tungstenite
//!
//! These tests run the default transport against a local mock Adonis server.

mod common;

use adonis_ws::*;
use common::{eventually, wait_until, MockWsServer, Recorder};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_session_against_mock_server() {
    verbose_println!("Testing full session over tungstenite...");

    let server = MockWsServer::start(30, 2).await;
    let connection = adonis_ws::builder()
        .url(server.ws_url())
        .build()
        .unwrap();
    let recorder = Recorder::new();

    let weak = connection.downgrade();
    let rec = recorder.clone();
    connection
        .on_lifecycle(Lifecycle::Open, move |event: &str| {
            rec.push(event);
            if let Some(connection) = weak.upgrade() {
                connection.join("chat");
            }
        })
        .on_event_response("chat", "joined", {
            let rec = recorder.clone();
            move |topic: &str, event: &str, _: &Value| rec.push(format!("{}:{}", topic, event))
        })
        .on_event_response("echo", "greeting", {
            let rec = recorder.clone();
            move |_: &str, _: &str, data: &Value| rec.push(format!("echo:{}", data["body"]))
        })
        .on_lifecycle(Lifecycle::Closed, {
            let rec = recorder.clone();
            move |event: &str| rec.push(event)
        });

    connection.send_on_open("greeting", r#"{"body":"hi"}"#);
    connection.connect();

    assert!(eventually(|| connection.state() == ConnectionState::Open).await);
    assert!(eventually(|| recorder.contains("chat:joined")).await);
    assert!(eventually(|| recorder.contains(r#"echo:"hi""#)).await);
    verbose_println!("  Trace: {:?}", recorder.entries());

    // The server acks every ping, so the heartbeat keeps going past its budget
    assert!(eventually(|| server.count_type(8) >= 3).await);
    assert!(server
        .received()
        .contains(&json!({"t": 1, "d": {"topic": "chat"}})));

    connection.close_normal();
    assert!(eventually(|| connection.state() == ConnectionState::Closed).await);
    assert!(eventually(|| recorder.contains("closed")).await);
    assert_eq!(connection.reconnection_attempts(), 0);

    let metrics = connection.metrics();
    verbose_println!("  Metrics: {:?}", metrics);
    assert!(metrics.messages_sent >= 5);
    assert!(metrics.messages_received >= 3);
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    // Grab a free port and release it so nothing is listening there
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let connection = adonis_ws::builder()
        .url(format!("ws://{}/adonis-ws", addr))
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(20), None))
        .build()
        .unwrap();
    let recorder = Recorder::new();
    let rec = recorder.clone();
    connection.on_lifecycle(Lifecycle::Reconnecting, move |event: &str| rec.push(event));

    connection.connect();

    assert!(eventually(|| connection.metrics().reconnect_count >= 2).await);
    assert!(recorder.len() >= 2);
    assert!(connection.state().is_recovering() || connection.state() == ConnectionState::Opening);

    connection.terminate();
    let count = connection.metrics().reconnect_count;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connection.metrics().reconnect_count, count);
}

#[tokio::test]
async fn test_server_drop_triggers_reconnect() {
    let server = MockWsServer::start(1_000, 3).await;
    let connection = adonis_ws::builder()
        .url(server.ws_url())
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(50), None))
        .build()
        .unwrap();
    let recorder = Recorder::new();
    let rec = recorder.clone();
    connection.on_lifecycle(Lifecycle::Reconnecting, move |event: &str| rec.push(event));

    connection.connect();
    assert!(eventually(|| connection.state() == ConnectionState::Open).await);

    // Dropping the socket without a close frame is a failure, not a close
    server.shutdown();
    assert!(wait_until(Duration::from_secs(3), || recorder.contains("reconnecting")).await);

    connection.terminate();
}
