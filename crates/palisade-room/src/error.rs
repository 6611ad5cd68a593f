//! Error types for the room layer.

use palisade_engine::EngineError;
use palisade_protocol::{Identity, ProtocolError, RoomId};
use palisade_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Every seat is taken (or the game is already under way).
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The identity holds no seat in this room.
    #[error("{0} is not in room {1}")]
    NotInRoom(Identity, RoomId),

    /// The requested room settings were rejected.
    #[error("invalid room settings: {0}")]
    InvalidSettings(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The room was asked to shut down.
    #[error("room {0} is closed")]
    Closed(RoomId),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl RoomError {
    /// The text shown to a client whose join or reconnect failed.
    pub fn client_message(&self) -> String {
        match self {
            Self::RoomFull(_) | Self::Session(SessionError::PlayerAlreadyRegistered(_)) => {
                "could not join the room, it may be full".into()
            }
            Self::Session(SessionError::StillConnected(_)) => {
                "you are already connected to this room".into()
            }
            other => other.to_string(),
        }
    }
}
