//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a real `tokio-tungstenite` client
//! to verify payloads actually flow over the network, that text is the
//! outbound frame type for JSON, and that `is_open` tracks the peer.

use futures_util::{SinkExt, StreamExt};
use loretable_transport::{Connection, Transport, WebSocketTransport};
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Binds a transport on a random port and connects one client to it.
async fn bind_and_connect() -> (
    loretable_transport::WebSocketConnection,
    ClientWs,
) {
    let mut transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let (client_ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");
    (server_conn, client_ws)
}

#[tokio::test]
async fn test_send_and_receive_payloads() {
    let (server_conn, mut client_ws) = bind_and_connect().await;
    assert!(server_conn.id().into_inner() > 0);

    // Server → client: JSON payloads go out as text frames.
    server_conn
        .send(br#"{"type":"pong"}"#)
        .await
        .expect("send should succeed");
    let msg = client_ws.next().await.unwrap().unwrap();
    assert!(matches!(msg, Message::Text(_)), "expected a text frame");
    assert_eq!(msg.into_data().as_ref(), br#"{"type":"pong"}"#);

    // Client → server: both text and binary frames arrive as bytes.
    client_ws
        .send(Message::text(r#"{"type":"ping"}"#))
        .await
        .unwrap();
    let received = server_conn.recv().await.unwrap().unwrap();
    assert_eq!(received, br#"{"type":"ping"}"#);

    client_ws
        .send(Message::Binary(b"raw bytes".to_vec().into()))
        .await
        .unwrap();
    let received = server_conn.recv().await.unwrap().unwrap();
    assert_eq!(received, b"raw bytes");

    server_conn.close().await.expect("close should succeed");
}

#[tokio::test]
async fn test_recv_returns_none_on_client_close() {
    let (server_conn, mut client_ws) = bind_and_connect().await;

    assert!(server_conn.is_open());
    client_ws.send(Message::Close(None)).await.unwrap();

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
    assert!(!server_conn.is_open(), "is_open should flip on close");
}

#[tokio::test]
async fn test_close_marks_connection_not_open() {
    let (server_conn, _client_ws) = bind_and_connect().await;
    assert!(server_conn.is_open());
    server_conn.close().await.expect("close should succeed");
    assert!(!server_conn.is_open());
}
