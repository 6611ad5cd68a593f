//! The outbound half of a connection, as the session layer sees it.

use std::future::Future;

use tokio::sync::mpsc;

use crate::SessionError;

/// Something frames can be written to.
///
/// The session manager never reads from a socket: inbound frames arrive
/// through the [`Inbound`] queue the connection handler pushes into.
///
/// The returned futures are `Send` so room actors stay spawnable with
/// `tokio::spawn` whatever socket type they are generic over.
pub trait Socket: Send + Sync + 'static {
    /// Delivers one encoded frame.
    fn send(&self, frame: Vec<u8>) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// `true` once the peer is gone. Reconnects are only accepted for
    /// identities whose bound socket reports closed.
    fn is_closed(&self) -> bool;

    /// Closes the socket. The default does nothing.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// In-process peer: frames land in the receiving end of the channel.
/// Closed once the receiver is dropped.
impl Socket for mpsc::UnboundedSender<Vec<u8>> {
    fn send(&self, frame: Vec<u8>) -> impl Future<Output = Result<(), SessionError>> + Send {
        let result = mpsc::UnboundedSender::send(self, frame).map_err(|_| SessionError::SocketClosed);
        async move { result }
    }

    fn is_closed(&self) -> bool {
        mpsc::UnboundedSender::is_closed(self)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Producer end of a seat's inbound queue.
///
/// The connection handler pushes every frame the client sends; the room
/// consumes them one per prompt. The same queue survives reconnects, so a
/// frame sent just before a drop is still delivered.
#[derive(Debug, Clone)]
pub struct Inbound(pub(crate) mpsc::UnboundedSender<Vec<u8>>);

impl Inbound {
    /// Queues a frame for the room.
    pub fn push(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        self.0.send(frame).map_err(|_| SessionError::InboundClosed)
    }

    /// `true` if both handles point at the same queue.
    pub fn same_queue(&self, other: &Inbound) -> bool {
        self.0.same_channel(&other.0)
    }
}
