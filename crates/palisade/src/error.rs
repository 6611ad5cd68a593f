//! Unified error type for the Palisade server.

use palisade_engine::EngineError;
use palisade_protocol::ProtocolError;
use palisade_room::RoomError;
use palisade_session::SessionError;
use palisade_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PalisadeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Identity resolution or seat bookkeeping failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room refused or could not be reached.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_protocol::{ClientRequest, Codec, JsonCodec, RoomId};
    use palisade_transport::ConnectionId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Closed(ConnectionId::new(3));
        let err: PalisadeError = err.into();
        assert!(matches!(err, PalisadeError::Transport(_)));
        assert_eq!(err.to_string(), "conn-3 is closed");
    }

    #[test]
    fn test_from_protocol_error() {
        let err = JsonCodec.decode::<ClientRequest>(b"{").unwrap_err();
        let err: PalisadeError = err.into();
        assert!(matches!(err, PalisadeError::Protocol(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_from_session_error() {
        let err: PalisadeError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, PalisadeError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: PalisadeError = RoomError::NotFound(RoomId(1)).into();
        assert!(matches!(err, PalisadeError::Room(_)));
        assert_eq!(err.to_string(), "room R-1 not found");
    }

    #[test]
    fn test_from_engine_error() {
        let err: PalisadeError = EngineError::GameOver.into();
        assert!(matches!(err, PalisadeError::Engine(_)));
    }
}
