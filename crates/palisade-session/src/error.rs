//! Error types for the session layer.

use palisade_protocol::{Identity, Symbol};

/// Errors that can occur while binding identities or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity provider rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The player already has an identity bound, or the identity is
    /// already bound to a player.
    #[error("player {0} is already registered")]
    PlayerAlreadyRegistered(Symbol),

    /// No seat exists for this identity.
    #[error("unknown identity {0}")]
    UnknownIdentity(Identity),

    /// No seat exists for this player.
    #[error("player {0} has no seat")]
    UnknownPlayer(Symbol),

    /// Reconnect refused: the socket currently bound is still open.
    #[error("identity {0} is still connected")]
    StillConnected(Identity),

    /// The socket is gone; the frame was not delivered.
    #[error("socket closed")]
    SocketClosed,

    /// The socket reported a failure while sending.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The inbound queue was shut down.
    #[error("inbound queue closed")]
    InboundClosed,
}
