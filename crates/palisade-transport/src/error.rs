//! Error types for the transport layer.

use std::io;
#[cfg(feature = "websocket")]
use std::net::SocketAddr;

#[cfg(feature = "websocket")]
use tokio_tungstenite::tungstenite;

use crate::ConnectionId;

/// Errors raised while listening, upgrading, or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a TCP connection (or reading the bound address) failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The peer connected but the WebSocket upgrade failed.
    #[cfg(feature = "websocket")]
    #[error("websocket handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    /// The connection was already closed.
    #[error("{0} is closed")]
    Closed(ConnectionId),

    #[cfg(feature = "websocket")]
    #[error("send on {id} failed: {source}")]
    Send {
        id: ConnectionId,
        #[source]
        source: tungstenite::Error,
    },

    #[cfg(feature = "websocket")]
    #[error("receive on {id} failed: {source}")]
    Receive {
        id: ConnectionId,
        #[source]
        source: tungstenite::Error,
    },
}
