//! End-to-end tests: a real server on a random port, real WebSocket clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use palisade::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = PalisadeServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(SessionTokenProvider)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next data frame, decoded as JSON.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame arrived")
            .expect("stream ended")
            .expect("recv");
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                return serde_json::from_slice(&msg.into_data()).expect("decode");
            }
            Message::Close(_) => panic!("connection closed"),
            _ => continue,
        }
    }
}

/// Skips frames until one with the given `event` tag arrives.
async fn recv_event(ws: &mut ClientWs, event: &str) -> Value {
    loop {
        let value = recv(ws).await;
        if value["event"] == event {
            return value;
        }
    }
}

async fn create_room(ws: &mut ClientWs, name: &str, size: usize) -> u64 {
    send(ws, json!({"type": "createRoom", "name": name, "size": size})).await;
    let created = recv(ws).await;
    assert_eq!(created["event"], "roomCreated", "{created}");
    created["roomId"].as_u64().expect("room id")
}

async fn enter(ws: &mut ClientWs, room_id: u64, token: &str) -> Value {
    send(ws, json!({"type": "enter", "roomId": room_id, "token": token})).await;
    recv(ws).await
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_create_room_returns_room_id() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let first = create_room(&mut ws, "one", 7).await;
    let second = create_room(&mut ws, "two", 5).await;
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[tokio::test]
async fn test_create_room_invalid_size_returns_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "createRoom", "name": "huge", "size": 99})).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["event"], "error");
    assert!(reply["message"].as_str().unwrap().contains("board size"));
}

#[tokio::test]
async fn test_list_rooms_shows_joinable_rooms() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    let room_id = create_room(&mut ws, "lobby", 6).await;

    send(&mut ws, json!({"type": "listRooms"})).await;
    let list = recv(&mut ws).await;
    assert_eq!(
        list,
        json!({"event": "roomList", "rooms": [
            {"roomId": room_id, "name": "lobby", "size": 6, "seated": 0, "capacity": 2}
        ]})
    );
}

#[tokio::test]
async fn test_enter_unknown_room_returns_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let reply = enter(&mut ws, 99, "alice").await;
    assert_eq!(reply, json!({"event": "error", "message": "room R-99 not found"}));
}

#[tokio::test]
async fn test_malformed_lobby_request_returns_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "dance"})).await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["event"], "error");

    // The connection stays in the lobby.
    create_room(&mut ws, "still here", 4).await;
}

// =========================================================================
// Playing
// =========================================================================

#[tokio::test]
async fn test_two_players_start_and_play_a_turn() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let room_id = create_room(&mut alice, "duel", 3).await;

    assert_eq!(
        enter(&mut alice, room_id, "alice").await,
        json!({"event": "joined", "player": "甲"})
    );
    assert_eq!(
        enter(&mut bob, room_id, "bob").await,
        json!({"event": "joined", "player": "乙"})
    );

    recv_event(&mut alice, "gameStart").await;
    let map = recv(&mut alice).await;
    assert_eq!(map["event"], "updateMap");
    assert_eq!(map["players"], json!([[0, 0, "甲"], [2, 2, "乙"]]));

    let ask = recv(&mut alice).await;
    assert_eq!(ask["event"], "askAction");
    let prompt = ask["prompt"].as_u64().unwrap();

    send(
        &mut alice,
        json!({"motion": [0, 1], "wallDirection": "down", "prompt": prompt}),
    )
    .await;

    recv_event(&mut bob, "gameStart").await;
    recv_event(&mut bob, "updateMap").await;
    let map = recv(&mut bob).await;
    assert_eq!(map["event"], "updateMap");
    assert_eq!(map["players"], json!([[0, 1, "甲"], [2, 2, "乙"]]));
    assert_eq!(map["wallAbove"][1], "010");

    let ask = recv(&mut bob).await;
    assert_eq!(ask["event"], "askAction");
    assert_eq!(ask["message"], "");
}

#[tokio::test]
async fn test_enter_full_room_returns_full_error() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let mut carol = connect(&addr).await;
    let room_id = create_room(&mut alice, "duel", 3).await;
    enter(&mut alice, room_id, "alice").await;
    enter(&mut bob, room_id, "bob").await;

    let reply = enter(&mut carol, room_id, "carol").await;
    assert_eq!(
        reply,
        json!({"event": "error", "message": "could not join the room, it may be full"})
    );
}

#[tokio::test]
async fn test_reconnect_after_drop_replays_prompt() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let room_id = create_room(&mut alice, "duel", 3).await;
    enter(&mut alice, room_id, "alice").await;
    enter(&mut bob, room_id, "bob").await;

    let ask = recv_event(&mut alice, "askAction").await;
    alice.close(None).await.expect("close");
    drop(alice);

    // The server notices the drop asynchronously; retry until it has.
    let mut again = connect(&addr).await;
    let mut reply = enter(&mut again, room_id, "alice").await;
    for _ in 0..50 {
        if reply["event"] != "error" {
            break;
        }
        assert_eq!(reply["message"], "you are already connected to this room");
        tokio::time::sleep(Duration::from_millis(20)).await;
        reply = enter(&mut again, room_id, "alice").await;
    }

    assert_eq!(
        reply,
        json!({
            "event": "reconnected",
            "player": "甲",
            "position": [0, 0],
            "status": "running",
            "playerStatus": "active",
        })
    );
    assert_eq!(recv(&mut again).await["event"], "updateMap");
    assert_eq!(recv(&mut again).await, ask);
}

#[tokio::test]
async fn test_enter_without_token_issues_reusable_token() {
    let addr = start_server().await;
    let mut first = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let room_id = create_room(&mut first, "duel", 3).await;

    let issued = enter(&mut first, room_id, "").await;
    assert_eq!(issued["event"], "sessionToken");
    let token = issued["token"].as_str().expect("token").to_string();
    assert_eq!(token.len(), 32);
    assert_eq!(recv(&mut first).await, json!({"event": "joined", "player": "甲"}));
    enter(&mut bob, room_id, "bob").await;

    recv_event(&mut first, "askAction").await;
    first.close(None).await.expect("close");
    drop(first);

    let mut again = connect(&addr).await;
    let mut reply = enter(&mut again, room_id, &token).await;
    for _ in 0..50 {
        if reply["event"] != "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        reply = enter(&mut again, room_id, &token).await;
    }
    assert_eq!(reply["event"], "reconnected");
    assert_eq!(reply["player"], "甲");
}

#[tokio::test]
async fn test_reconnect_while_connected_is_rejected() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut imposter = connect(&addr).await;
    let room_id = create_room(&mut alice, "duel", 3).await;
    enter(&mut alice, room_id, "alice").await;

    let reply = enter(&mut imposter, room_id, "alice").await;
    assert_eq!(
        reply,
        json!({"event": "error", "message": "you are already connected to this room"})
    );
}
