//! Integration tests for the RCI WebSocket client.
//!
//! Each test stands up a one-shot WebSocket server on loopback that records
//! the handshake, so the `client=` query, the password subprotocol, status
//! parsing and command encoding are checked against a real connection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use stellarium_bridge::application::{ControlCommands, ControlService};
use stellarium_bridge::infrastructure::RciClient;

const WAIT: Duration = Duration::from_secs(2);

const STATUS_JSON: &str =
    r#"{"Latitude": 42.36, "Longitude": -71.09, "AzPos": 180.0, "ElPos": 45.0}"#;

// ── Fake RCI server ───────────────────────────────────────────────────────────

/// What the server saw during the opening handshake.
#[derive(Debug)]
struct Handshake {
    uri: String,
    protocol: Option<String>,
}

type ServerSide = (Handshake, WebSocketStream<TcpStream>);

/// Binds a loopback listener and accepts exactly one WebSocket client.
///
/// The `Sec-WebSocket-Protocol` header is echoed back so the client accepts
/// the handshake when it sends a password.
async fn spawn_rci_server() -> (String, JoinHandle<ServerSide>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/api/ws", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let seen: Arc<Mutex<Option<Handshake>>> = Arc::new(Mutex::new(None));
        let record = Arc::clone(&seen);

        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let protocol = req.headers().get("sec-websocket-protocol").cloned();
            if let Some(value) = &protocol {
                resp.headers_mut()
                    .insert("sec-websocket-protocol", value.clone());
            }
            *record.lock().unwrap() = Some(Handshake {
                uri: req.uri().to_string(),
                protocol: protocol.and_then(|v| v.to_str().ok().map(str::to_owned)),
            });
            Ok(resp)
        };

        let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
            .await
            .unwrap();
        let handshake = seen.lock().unwrap().take().unwrap();
        (handshake, ws)
    });

    (url, handle)
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    let message = timeout(WAIT, ws.next())
        .await
        .expect("timed out waiting for a command")
        .expect("client closed the connection")
        .unwrap();
    match message {
        Message::Text(text) => text,
        other => panic!("expected a text frame, got {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_sends_client_query_and_password() {
    // Arrange
    let (url, server) = spawn_rci_server().await;

    // Act
    let _client = RciClient::connect(&url, Some("hunter2"), "Stellarium")
        .await
        .unwrap();
    let (handshake, _ws) = server.await.unwrap();

    // Assert
    assert_eq!(handshake.uri, "/api/ws?client=Stellarium");
    assert_eq!(handshake.protocol.as_deref(), Some("hunter2"));
}

#[tokio::test]
async fn test_connect_without_password_sends_no_subprotocol() {
    // Arrange
    let (url, server) = spawn_rci_server().await;

    // Act
    let _client = RciClient::connect(&url, None, "dome-2").await.unwrap();
    let (handshake, _ws) = server.await.unwrap();

    // Assert
    assert_eq!(handshake.uri, "/api/ws?client=dome-2");
    assert!(handshake.protocol.is_none());
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Arrange: bind then drop so the port is very likely unused
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    // Act
    let result = RciClient::connect(&format!("ws://{addr}/api/ws"), None, "Stellarium").await;

    // Assert
    assert!(result.is_err());
}

#[tokio::test]
async fn test_status_frames_reach_subscribers_and_latest() {
    // Arrange
    let (url, server) = spawn_rci_server().await;
    let client = RciClient::connect(&url, None, "Stellarium").await.unwrap();
    let (_, mut ws) = server.await.unwrap();
    let mut updates = client.subscribe();
    assert!(client.latest_status().is_none());

    // Act
    ws.send(Message::Text(STATUS_JSON.to_string())).await.unwrap();
    let status = timeout(WAIT, updates.recv()).await.unwrap().unwrap();

    // Assert
    assert_eq!(status.latitude().unwrap(), 42.36);
    assert_eq!(status.azimuth_position().unwrap(), 180.0);
    assert_eq!(client.latest_status(), Some(status));
}

#[tokio::test]
async fn test_invalid_status_json_is_skipped() {
    // Arrange
    let (url, server) = spawn_rci_server().await;
    let client = RciClient::connect(&url, None, "Stellarium").await.unwrap();
    let (_, mut ws) = server.await.unwrap();
    let mut updates = client.subscribe();

    // Act
    ws.send(Message::Text("{not json".to_string())).await.unwrap();
    ws.send(Message::Text(STATUS_JSON.to_string())).await.unwrap();
    let status = timeout(WAIT, updates.recv()).await.unwrap().unwrap();

    // Assert: the first frame did not produce a snapshot
    assert_eq!(status.elevation_position().unwrap(), 45.0);
    assert_eq!(client.latest_status(), Some(status));
}

#[tokio::test]
async fn test_commands_are_sent_as_tagged_json_in_order() {
    // Arrange
    let (url, server) = spawn_rci_server().await;
    let client = RciClient::connect(&url, None, "Stellarium").await.unwrap();
    let (_, mut ws) = server.await.unwrap();

    // Act
    client.set_azimuth_position(123.5).await.unwrap();
    client.set_elevation_position(30.25).await.unwrap();
    client.stop().await.unwrap();

    // Assert
    let first: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    let second: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    let third: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(first, json!({"command": "set_azimuth_position", "position": 123.5}));
    assert_eq!(second, json!({"command": "set_elevation_position", "position": 30.25}));
    assert_eq!(third, json!({"command": "stop"}));
}

#[tokio::test]
async fn test_last_status_survives_server_close() {
    // Arrange
    let (url, server) = spawn_rci_server().await;
    let client = RciClient::connect(&url, None, "Stellarium").await.unwrap();
    let (_, mut ws) = server.await.unwrap();
    let mut updates = client.subscribe();
    ws.send(Message::Text(STATUS_JSON.to_string())).await.unwrap();
    timeout(WAIT, updates.recv()).await.unwrap().unwrap();

    // Act
    ws.close(None).await.unwrap();
    drop(ws);
    let after_close = timeout(WAIT, updates.recv())
        .await
        .expect("reader did not stop after close");

    // Assert
    assert!(matches!(after_close, Err(RecvError::Closed)));
    let status = client.latest_status().unwrap();
    assert_eq!(status.longitude().unwrap(), -71.09);
}

#[tokio::test]
async fn test_subscribers_see_channel_closed_after_server_close() {
    // Arrange
    let (url, server) = spawn_rci_server().await;
    let client = RciClient::connect(&url, None, "Stellarium").await.unwrap();
    let (_, mut ws) = server.await.unwrap();
    let mut early = client.subscribe();

    // Act
    ws.close(None).await.unwrap();
    drop(ws);
    let early_result = timeout(WAIT, early.recv())
        .await
        .expect("subscriber taken before the close never saw it");
    let late_result = timeout(WAIT, client.subscribe().recv())
        .await
        .expect("subscriber taken after the close never saw it");

    // Assert
    assert!(matches!(early_result, Err(RecvError::Closed)));
    assert!(matches!(late_result, Err(RecvError::Closed)));
}
