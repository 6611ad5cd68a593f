//! The session manager: who sits where, and how frames reach them.
//!
//! One manager exists per room. It binds connection identities to the
//! room's players, owns each seat's inbound queue, and remembers every
//! request frame that has been sent but not yet answered so it can be
//! replayed after a reconnect.
//!
//! # Concurrency
//!
//! `SessionManager` is a cheap-clone handle over a table behind a
//! `std::sync::Mutex`. The lock only guards lookups and bookkeeping;
//! it is always released before any socket I/O or queue wait, so a
//! reconnect can be served while the room is parked in
//! [`receive_from`](SessionManager::receive_from).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use palisade_protocol::{Identity, Recipient, Symbol};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::{Inbound, SessionError, Socket};

/// Everything the room knows about one seated connection.
struct Seat<S> {
    player: Symbol,
    socket: Arc<S>,
    inbound_tx: Inbound,
    inbound_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    /// Request frames sent but not yet answered, oldest first.
    pending: Vec<Pending>,
    /// Extra answers still owed by replays whose request is settled.
    echoes: usize,
}

/// A request frame waiting for its answer.
struct Pending {
    frame: Vec<u8>,
    /// How often [`SessionManager::resend_pending`] sent it again.
    replays: usize,
}

struct Table<S> {
    seats: HashMap<Identity, Seat<S>>,
    /// Reverse index, player → identity.
    identities: HashMap<Symbol, Identity>,
    /// Identities in the order they took their seats.
    order: Vec<Identity>,
    /// Players nobody has claimed yet, in join order.
    unregistered: VecDeque<Symbol>,
}

impl<S> Table<S> {
    fn seat_of_player(&self, player: &Symbol) -> Result<(&Identity, &Seat<S>), SessionError> {
        self.identities
            .get(player)
            .and_then(|id| self.seats.get_key_value(id))
            .ok_or_else(|| SessionError::UnknownPlayer(player.clone()))
    }

    fn seat_of_player_mut(&mut self, player: &Symbol) -> Result<&mut Seat<S>, SessionError> {
        let identity = self
            .identities
            .get(player)
            .ok_or_else(|| SessionError::UnknownPlayer(player.clone()))?;
        self.seats
            .get_mut(identity)
            .ok_or_else(|| SessionError::UnknownPlayer(player.clone()))
    }

    fn socket_for(&self, recipient: &Recipient) -> Result<(Identity, Arc<S>), SessionError> {
        match recipient {
            Recipient::Identity(identity) => self
                .seats
                .get(identity)
                .map(|seat| (identity.clone(), Arc::clone(&seat.socket)))
                .ok_or_else(|| SessionError::UnknownIdentity(identity.clone())),
            Recipient::Player(player) => self
                .seat_of_player(player)
                .map(|(id, seat)| (id.clone(), Arc::clone(&seat.socket))),
        }
    }

    fn sockets(&self) -> Vec<(Identity, Arc<S>)> {
        self.order
            .iter()
            .filter_map(|id| self.seats.get(id).map(|s| (id.clone(), Arc::clone(&s.socket))))
            .collect()
    }
}

/// Binds identities to players and carries frames between them and the
/// room.
///
/// ## Lifecycle of a seat
///
/// ```text
///               register_player()              socket drops
///  [unclaimed] ─────────────────→ [connected] ─────────────→ [disconnected]
///                                      ↑                           │
///                                      └──────── reconnect() ──────┘
///                                          (pending frames replayed
///                                           by resend_pending)
/// ```
///
/// Seats are never removed; an identity stays bound to its player for
/// the life of the room.
pub struct SessionManager<S: Socket> {
    inner: Arc<Mutex<Table<S>>>,
}

impl<S: Socket> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Socket> SessionManager<S> {
    /// Creates a manager whose unclaimed pool holds `players`, in order.
    pub fn new(players: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Table {
                seats: HashMap::new(),
                identities: HashMap::new(),
                order: Vec::new(),
                unregistered: players.into_iter().collect(),
            })),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table<S>> {
        // The table stays consistent even if a holder panicked: every
        // mutation is a single insert/remove.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Binding ----------------------------------------------------------

    /// Seats `identity` as `player`.
    ///
    /// Returns the producer end of the new seat's inbound queue.
    ///
    /// # Errors
    /// [`SessionError::PlayerAlreadyRegistered`] if `player` is no longer
    /// in the unclaimed pool or `identity` already holds a seat.
    pub fn register_player(
        &self,
        identity: Identity,
        player: Symbol,
        socket: S,
    ) -> Result<Inbound, SessionError> {
        let mut table = self.table();
        if table.seats.contains_key(&identity) {
            return Err(SessionError::PlayerAlreadyRegistered(player));
        }
        let slot = table
            .unregistered
            .iter()
            .position(|p| p == &player)
            .ok_or_else(|| SessionError::PlayerAlreadyRegistered(player.clone()))?;
        table.unregistered.remove(slot);

        let (tx, rx) = mpsc::unbounded_channel();
        let inbound = Inbound(tx);
        table.seats.insert(
            identity.clone(),
            Seat {
                player: player.clone(),
                socket: Arc::new(socket),
                inbound_tx: inbound.clone(),
                inbound_rx: Arc::new(AsyncMutex::new(rx)),
                pending: Vec::new(),
                echoes: 0,
            },
        );
        table.identities.insert(player.clone(), identity.clone());
        table.order.push(identity.clone());

        tracing::debug!(%identity, %player, "seat registered");
        Ok(inbound)
    }

    /// Swaps a fresh socket into an existing seat.
    ///
    /// Returns the seat's existing inbound queue. Pending frames are left
    /// untouched; call [`resend_pending`](Self::resend_pending) to replay
    /// them.
    ///
    /// # Errors
    /// - [`SessionError::UnknownIdentity`]: the identity holds no seat
    /// - [`SessionError::StillConnected`]: the bound socket is still open;
    ///   it stays bound
    pub fn reconnect(&self, identity: &Identity, socket: S) -> Result<Inbound, SessionError> {
        let mut table = self.table();
        let seat = table
            .seats
            .get_mut(identity)
            .ok_or_else(|| SessionError::UnknownIdentity(identity.clone()))?;
        if !seat.socket.is_closed() {
            tracing::warn!(%identity, player = %seat.player, "reconnect refused, socket still open");
            return Err(SessionError::StillConnected(identity.clone()));
        }
        seat.socket = Arc::new(socket);
        tracing::debug!(%identity, player = %seat.player, "seat reconnected");
        Ok(seat.inbound_tx.clone())
    }

    // -- Outbound ---------------------------------------------------------

    /// Sends one frame to a single seat.
    pub async fn send_to(
        &self,
        recipient: impl Into<Recipient>,
        frame: Vec<u8>,
    ) -> Result<(), SessionError> {
        let (_, socket) = self.table().socket_for(&recipient.into())?;
        socket.send(frame).await
    }

    /// Sends a frame to every seat concurrently and waits until each send
    /// finished or failed. Failures are logged, not returned.
    pub async fn broadcast(&self, frame: Vec<u8>) {
        let sockets = self.table().sockets();
        let frame = &frame;
        join_all(sockets.into_iter().map(|(identity, socket)| async move {
            if let Err(e) = socket.send(frame.clone()).await {
                tracing::debug!(%identity, error = %e, "broadcast send failed");
            }
        }))
        .await;
    }

    // -- Inbound ----------------------------------------------------------

    /// Waits for the next frame `player` sent. No timeout.
    ///
    /// Cancel-safe: dropping the future before it resolves loses no frame.
    pub async fn receive_from(&self, player: &Symbol) -> Result<Vec<u8>, SessionError> {
        let rx = {
            let table = self.table();
            let (_, seat) = table.seat_of_player(player)?;
            Arc::clone(&seat.inbound_rx)
        };
        let mut rx = rx.lock().await;
        rx.recv().await.ok_or(SessionError::InboundClosed)
    }

    // -- Request / reply --------------------------------------------------

    /// Records `frame` as pending for `player` and sends it.
    ///
    /// A settled request that had been replayed may be answered once per
    /// copy. Before sending, up to that many frames already queued from
    /// `player` are dropped, so a late duplicate never answers this
    /// request. Frames sent ahead of an ordinary request are kept.
    ///
    /// A dead socket is not an error here: the frame stays pending and is
    /// replayed when the player reconnects.
    pub async fn post(&self, player: &Symbol, frame: Vec<u8>) -> Result<(), SessionError> {
        let (identity, socket, rx, echoes) = {
            let mut table = self.table();
            let seat = table.seat_of_player_mut(player)?;
            seat.pending.push(Pending {
                frame: frame.clone(),
                replays: 0,
            });
            let echoes = std::mem::take(&mut seat.echoes);
            let rx = Arc::clone(&seat.inbound_rx);
            let (identity, socket) = table.socket_for(&Recipient::Player(player.clone()))?;
            (identity, socket, rx, echoes)
        };
        let discarded = discard_queued(&rx, echoes);
        if discarded > 0 {
            tracing::debug!(%identity, %player, discarded, "dropped duplicate replies");
        }
        if let Err(e) = socket.send(frame).await {
            tracing::debug!(%identity, %player, error = %e, "request kept for replay");
        }
        Ok(())
    }

    /// Forgets the first pending frame of `player` equal to `frame`.
    ///
    /// If that frame had been replayed, each replay may still draw an
    /// answer; the next [`post`](Self::post) discards them.
    pub fn settle(&self, player: &Symbol, frame: &[u8]) {
        let mut table = self.table();
        if let Ok(seat) = table.seat_of_player_mut(player) {
            if let Some(i) = seat.pending.iter().position(|p| p.frame == frame) {
                let settled = seat.pending.remove(i);
                seat.echoes += settled.replays;
            }
        }
    }

    /// Sends a request and waits for the next frame from `player`.
    ///
    /// The request stays pending (and is replayed on reconnect) until the
    /// reply arrives.
    pub async fn ask(&self, player: &Symbol, frame: Vec<u8>) -> Result<Vec<u8>, SessionError> {
        self.post(player, frame.clone()).await?;
        let reply = self.receive_from(player).await;
        self.settle(player, &frame);
        reply
    }

    /// Like [`ask`](Self::ask), but gives up after `timeout`.
    ///
    /// On timeout the request is dropped from the pending list and
    /// `Ok(None)` is returned.
    pub async fn ask_within(
        &self,
        player: &Symbol,
        frame: Vec<u8>,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        self.post(player, frame.clone()).await?;
        let reply = tokio::time::timeout(timeout, self.receive_from(player)).await;
        self.settle(player, &frame);
        match reply {
            Ok(frame) => frame.map(Some),
            Err(_) => {
                tracing::debug!(%player, ?timeout, "request timed out");
                Ok(None)
            }
        }
    }

    /// Re-sends every pending frame of `identity`, in order and
    /// byte-identical. The frames stay pending, so calling this twice
    /// sends everything twice.
    pub async fn resend_pending(&self, identity: &Identity) -> Result<usize, SessionError> {
        let (frames, socket) = {
            let mut table = self.table();
            let seat = table
                .seats
                .get_mut(identity)
                .ok_or_else(|| SessionError::UnknownIdentity(identity.clone()))?;
            let frames: Vec<Vec<u8>> = seat
                .pending
                .iter_mut()
                .map(|p| {
                    p.replays += 1;
                    p.frame.clone()
                })
                .collect();
            (frames, Arc::clone(&seat.socket))
        };
        let count = frames.len();
        for frame in frames {
            socket.send(frame).await?;
        }
        Ok(count)
    }

    /// Closes every bound socket.
    pub async fn close_all(&self) {
        let sockets = self.table().sockets();
        join_all(sockets.iter().map(|(_, socket)| socket.close())).await;
    }

    // -- Inspection -------------------------------------------------------

    /// Players nobody has claimed yet, in join order.
    pub fn unregistered(&self) -> Vec<Symbol> {
        self.table().unregistered.iter().cloned().collect()
    }

    /// The player the next registration will get.
    pub fn next_unregistered(&self) -> Option<Symbol> {
        self.table().unregistered.front().cloned()
    }

    pub fn player_of(&self, identity: &Identity) -> Option<Symbol> {
        self.table().seats.get(identity).map(|s| s.player.clone())
    }

    pub fn identity_of(&self, player: &Symbol) -> Option<Identity> {
        self.table().identities.get(player).cloned()
    }

    /// `true` if the identity holds a seat whose socket is open.
    pub fn is_connected(&self, identity: &Identity) -> bool {
        self.table()
            .seats
            .get(identity)
            .is_some_and(|s| !s.socket.is_closed())
    }

    /// A copy of the identity's pending request frames, oldest first.
    pub fn pending(&self, identity: &Identity) -> Vec<Vec<u8>> {
        self.table()
            .seats
            .get(identity)
            .map(|s| s.pending.iter().map(|p| p.frame.clone()).collect())
            .unwrap_or_default()
    }

    /// Seated `(identity, player)` pairs in the order they sat down.
    pub fn seated(&self) -> Vec<(Identity, Symbol)> {
        let table = self.table();
        table
            .order
            .iter()
            .filter_map(|id| table.seats.get(id).map(|s| (id.clone(), s.player.clone())))
            .collect()
    }

    pub fn seated_count(&self) -> usize {
        self.table().seats.len()
    }
}

/// Drops up to `limit` frames already waiting in a seat's inbound queue.
/// Returns how many were dropped.
fn discard_queued(rx: &AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>, limit: usize) -> usize {
    if limit == 0 {
        return 0;
    }
    // Held only by a pending `receive_from`, which never overlaps a post.
    let Ok(mut rx) = rx.try_lock() else {
        return 0;
    };
    let mut count = 0;
    while count < limit && rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

// =========================================================================
// Tests
// =========================================================================
