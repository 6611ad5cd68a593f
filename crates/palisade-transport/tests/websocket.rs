//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it with
//! a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use palisade_transport::{
        Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    /// Binds on port 0, connects one client, returns both ends.
    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have an address");

        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_uses_text_frames() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);

        conn.send(br#"{"event":"gameStart"}"#).await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "json frames go out as text: {msg:?}");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"event":"gameStart"}"#);
    }

    #[tokio::test]
    async fn test_websocket_recv_text_and_binary() {
        let (conn, mut client) = connected_pair().await;

        client.send(Message::Text("hello".into())).await.unwrap();
        client
            .send(Message::Binary(b"raw".to_vec().into()))
            .await
            .unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), b"hello");
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"raw");
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        let (conn, mut client) = connected_pair().await;
        let conn = Arc::new(conn);

        // Park a reader; nothing will arrive for it yet.
        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"ping"))
            .await
            .expect("send must not wait for the reader")
            .unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client.send(Message::Text("pong".into())).await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got, b"pong");
    }

    #[tokio::test]
    async fn test_websocket_client_close_marks_connection_closed() {
        let (conn, mut client) = connected_pair().await;
        assert!(!conn.is_closed());

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
        assert!(conn.is_closed());
        assert!(matches!(
            conn.send(b"late").await,
            Err(TransportError::Closed(id)) if id == conn.id()
        ));
    }

    #[tokio::test]
    async fn test_websocket_close_is_idempotent() {
        let (conn, _client) = connected_pair().await;
        conn.close().await.unwrap();
        assert!(conn.is_closed());
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_websocket_peer_addr_is_loopback() {
        let (conn, _client) = connected_pair().await;
        assert!(conn.peer_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_bad_address_returns_bind_error() {
        let result = WebSocketTransport::bind("not an address").await;
        assert!(matches!(result, Err(TransportError::Bind { ref addr, .. }) if addr == "not an address"));
    }
}
