//! Per-connection handler: lobby requests, then frame forwarding.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Lobby: answer `createRoom` / `listRooms` until an `enter` succeeds,
//!      issuing a `sessionToken` to clients that arrive without one
//!   2. Seated: forward every frame verbatim to the room's inbound queue
//!
//! Outbound frames while seated are written by the room itself through
//! the [`WsSocket`] it was handed on `enter`.

use std::sync::Arc;

use palisade_protocol::{ClientRequest, Codec, Identity, RoomId, ServerEvent};
use palisade_room::{Entered, RoomSettings};
use palisade_session::{IdentityProvider, SessionError, Socket};
use palisade_transport::{Connection, WebSocketConnection};

use crate::PalisadeError;
use crate::server::ServerState;

// ---------------------------------------------------------------------------
// WsSocket
// ---------------------------------------------------------------------------

/// The write half of a WebSocket connection, as a room sees it.
pub struct WsSocket(Arc<WebSocketConnection>);

impl Socket for WsSocket {
    async fn send(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        self.0
            .send(&frame)
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    async fn close(&self) {
        if let Err(e) = self.0.close().await {
            tracing::debug!(conn_id = %self.0.id(), error = %e, "close failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P: IdentityProvider>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P>>,
) -> Result<(), PalisadeError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let Some((room_id, identity, entered)) = lobby(&conn, &state).await? else {
        tracing::debug!(%conn_id, "connection left the lobby");
        return Ok(());
    };

    tracing::info!(
        %conn_id,
        %room_id,
        %identity,
        player = %entered.player,
        rejoined = entered.rejoined,
        "connection seated"
    );

    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                if entered.inbound.push(data).is_err() {
                    tracing::debug!(%conn_id, %room_id, "room gone, dropping connection");
                    break;
                }
            }
            Ok(None) => {
                tracing::info!(%conn_id, %room_id, %identity, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %room_id, error = %e, "recv error");
                break;
            }
        }
    }

    Ok(())
}

/// Serves lobby requests until the connection is seated in a room.
/// Returns `None` if the client leaves first.
async fn lobby<P: IdentityProvider>(
    conn: &Arc<WebSocketConnection>,
    state: &ServerState<P>,
) -> Result<Option<(RoomId, Identity, Entered)>, PalisadeError> {
    let conn_id = conn.id();

    while let Some(data) = conn.recv().await? {
        let request: ClientRequest = match state.codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "bad lobby request");
                send_event(conn, state, &ServerEvent::error(e.to_string())).await?;
                continue;
            }
        };

        match request {
            ClientRequest::CreateRoom { name, size } => {
                let created = {
                    let mut rooms = state.rooms.lock().await;
                    rooms.reap_closed();
                    rooms.create_room(RoomSettings::new(name, size))
                };
                let event = match created {
                    Ok(room_id) => ServerEvent::RoomCreated { room_id },
                    Err(e) => ServerEvent::error(e.client_message()),
                };
                send_event(conn, state, &event).await?;
            }

            ClientRequest::ListRooms => {
                // Lock only to copy the handles, drop before querying rooms.
                let handles = state.rooms.lock().await.room_handles();

                let mut rooms = Vec::with_capacity(handles.len());
                for handle in &handles {
                    if let Ok(info) = handle.info().await {
                        if info.is_joinable() {
                            rooms.push(info.to_list_entry());
                        }
                    }
                }
                send_event(conn, state, &ServerEvent::RoomList { rooms }).await?;
            }

            ClientRequest::Enter { room_id, token } => {
                let identity = match state.provider.resolve(&token).await {
                    Ok(identity) => identity,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "identity rejected");
                        send_event(conn, state, &ServerEvent::error(e.to_string())).await?;
                        continue;
                    }
                };
                if token.trim().is_empty() {
                    let issued = ServerEvent::SessionToken {
                        token: identity.clone(),
                    };
                    send_event(conn, state, &issued).await?;
                }

                let room = state.rooms.lock().await.room(room_id);
                let entered = match room {
                    Ok(handle) => {
                        handle
                            .enter(identity.clone(), WsSocket(Arc::clone(conn)))
                            .await
                    }
                    Err(e) => Err(e),
                };
                match entered {
                    Ok(entered) => return Ok(Some((room_id, identity, entered))),
                    Err(e) => {
                        tracing::debug!(%conn_id, %room_id, %identity, error = %e, "enter refused");
                        send_event(conn, state, &ServerEvent::error(e.client_message())).await?;
                    }
                }
            }
        }
    }

    Ok(None)
}

async fn send_event<P: IdentityProvider>(
    conn: &WebSocketConnection,
    state: &ServerState<P>,
    event: &ServerEvent,
) -> Result<(), PalisadeError> {
    let bytes = state.codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
