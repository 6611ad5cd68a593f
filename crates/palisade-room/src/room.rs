//! Room actor: an isolated Tokio task that owns one game.
//!
//! Each room runs in its own task and is the only writer of its [`Game`].
//! The outside world talks to it through a [`RoomHandle`]: commands go in
//! over a bounded mpsc channel, answers come back on oneshot channels.
//!
//! The actor keeps serving commands while it waits on a player, so a
//! reconnect is handled even when the room is parked on that very
//! player's prompt.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use palisade_engine::{Game, GameEvent, TurnInput};
use palisade_protocol::{
    ActionReply, Codec, Identity, JsonCodec, RoomId, RoomListEntry, RoomStatus, ServerEvent,
    Symbol, VoteReply,
};
use palisade_session::{Inbound, SessionManager, Socket};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{RoomConfig, RoomError, RoomSettings, TimeoutPolicy};

/// What a successful enter/register/reconnect hands back to the
/// connection handler.
#[derive(Debug, Clone)]
pub struct Entered {
    /// The player the identity is bound to.
    pub player: Symbol,
    /// Where to push the client's frames.
    pub inbound: Inbound,
    /// `true` if this was a reconnect rather than a fresh seat.
    pub rejoined: bool,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand<S> {
    /// Register if the identity is new to the room, reconnect otherwise.
    Enter {
        identity: Identity,
        socket: S,
        reply: oneshot::Sender<Result<Entered, RoomError>>,
    },

    Register {
        identity: Identity,
        socket: S,
        reply: oneshot::Sender<Result<Entered, RoomError>>,
    },

    Reconnect {
        identity: Identity,
        socket: S,
        reply: oneshot::Sender<Result<Entered, RoomError>>,
    },

    Info {
        reply: oneshot::Sender<RoomInfo>,
    },

    /// Tear the room down, telling everyone `reason`.
    Shutdown { reason: String },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    /// Board side length.
    pub size: usize,
    pub status: RoomStatus,
    /// Players already seated.
    pub seated: usize,
    /// Total seats.
    pub capacity: usize,
}

impl RoomInfo {
    /// Waiting for players with at least one seat open.
    pub fn is_joinable(&self) -> bool {
        self.status.is_joinable() && self.seated < self.capacity
    }

    pub fn to_list_entry(&self) -> RoomListEntry {
        RoomListEntry {
            room_id: self.room_id,
            name: self.name.clone(),
            size: self.size,
            seated: self.seated,
            capacity: self.capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Every method fails
/// with [`RoomError::Unavailable`] once the actor has exited.
pub struct RoomHandle<S> {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand<S>>,
}

impl<S> Clone for RoomHandle<S> {
    fn clone(&self) -> Self {
        Self {
            room_id: self.room_id,
            sender: self.sender.clone(),
        }
    }
}

impl<S: Socket> RoomHandle<S> {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Seats a new identity or reconnects a known one, whichever applies.
    pub async fn enter(&self, identity: Identity, socket: S) -> Result<Entered, RoomError> {
        self.call(|reply| RoomCommand::Enter {
            identity,
            socket,
            reply,
        })
        .await?
    }

    /// Seats `identity` as the next unclaimed player.
    pub async fn register(&self, identity: Identity, socket: S) -> Result<Entered, RoomError> {
        self.call(|reply| RoomCommand::Register {
            identity,
            socket,
            reply,
        })
        .await?
    }

    /// Binds a fresh socket to an identity that already holds a seat.
    pub async fn reconnect(&self, identity: Identity, socket: S) -> Result<Entered, RoomError> {
        self.call(|reply| RoomCommand::Reconnect {
            identity,
            socket,
            reply,
        })
        .await?
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.call(|reply| RoomCommand::Info { reply }).await
    }

    /// Tells the room to shut down. Returns once the command is queued.
    pub async fn shutdown(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown {
                reason: reason.into(),
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand<S>,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: Socket> {
    room_id: RoomId,
    name: String,
    status: RoomStatus,
    config: RoomConfig,
    game: Game,
    session: SessionManager<S>,
    codec: JsonCodec,
    receiver: mpsc::Receiver<RoomCommand<S>>,
    /// `false` once every handle is gone.
    commands_open: bool,
    /// Last prompt id handed out. Strictly increasing for the room's life.
    prompt_seq: u64,
    /// Set by a shutdown command.
    close_reason: Option<String>,
}

impl<S: Socket> RoomActor<S> {
    /// Runs the room to completion, then tears it down.
    ///
    /// Errors and panics inside the game loop are caught here so that
    /// every connected client is told before the sockets close.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, name = %self.name, "room actor started");

        let outcome = AssertUnwindSafe(self.lifecycle()).catch_unwind().await;
        let reason = match outcome {
            Ok(Ok(())) => self
                .close_reason
                .take()
                .unwrap_or_else(|| "game over".to_string()),
            Ok(Err(RoomError::Closed(_))) => self
                .close_reason
                .take()
                .unwrap_or_else(|| "room shut down".to_string()),
            Ok(Err(e)) => {
                tracing::error!(room_id = %self.room_id, error = %e, "room failed");
                self.broadcast(&ServerEvent::error(e.to_string())).await;
                "internal error".to_string()
            }
            Err(payload) => {
                let info = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!(room_id = %self.room_id, panic = %info, "room panicked");
                self.broadcast(&ServerEvent::error("internal error")).await;
                "internal error".to_string()
            }
        };

        self.teardown(reason).await;
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    async fn lifecycle(&mut self) -> Result<(), RoomError> {
        loop {
            match self.status {
                RoomStatus::Waiting => match self.receiver.recv().await {
                    Some(cmd) => self.handle_command(cmd).await?,
                    None => {
                        self.commands_open = false;
                        return Err(RoomError::Closed(self.room_id));
                    }
                },
                RoomStatus::Running => self.play().await?,
                RoomStatus::Finished => {
                    if !self.config.restart_vote || !self.vote().await? {
                        return Ok(());
                    }
                    self.game.reset()?;
                    self.set_status(RoomStatus::Running);
                    tracing::info!(room_id = %self.room_id, "game restarted");
                    self.broadcast(&ServerEvent::GameStart).await;
                }
                RoomStatus::Closed => return Ok(()),
            }
        }
    }

    // -- Commands ---------------------------------------------------------

    async fn handle_command(&mut self, cmd: RoomCommand<S>) -> Result<(), RoomError> {
        match cmd {
            RoomCommand::Enter {
                identity,
                socket,
                reply,
            } => {
                let result = if self.session.player_of(&identity).is_some() {
                    self.reconnect(identity, socket).await
                } else {
                    self.register(identity, socket).await
                };
                let _ = reply.send(result);
            }
            RoomCommand::Register {
                identity,
                socket,
                reply,
            } => {
                let result = self.register(identity, socket).await;
                let _ = reply.send(result);
            }
            RoomCommand::Reconnect {
                identity,
                socket,
                reply,
            } => {
                let result = self.reconnect(identity, socket).await;
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown { reason } => {
                tracing::info!(room_id = %self.room_id, %reason, "room shutting down");
                self.close_reason = Some(reason);
                return Err(RoomError::Closed(self.room_id));
            }
        }
        Ok(())
    }

    async fn register(&mut self, identity: Identity, socket: S) -> Result<Entered, RoomError> {
        if !self.status.is_joinable() {
            return Err(RoomError::RoomFull(self.room_id));
        }
        let player = self
            .session
            .next_unregistered()
            .ok_or(RoomError::RoomFull(self.room_id))?;
        let inbound = self
            .session
            .register_player(identity.clone(), player.clone(), socket)?;

        tracing::info!(room_id = %self.room_id, %identity, %player, "player joined");

        let joined = self.codec.encode(&ServerEvent::Joined {
            player: player.clone(),
        })?;
        if let Err(e) = self.session.send_to(identity.clone(), joined).await {
            tracing::debug!(room_id = %self.room_id, %identity, error = %e, "joined not delivered");
        }
        self.broadcast(&ServerEvent::NewPlayer {
            player: player.clone(),
        })
        .await;

        if self.session.next_unregistered().is_none() {
            self.broadcast(&ServerEvent::GameStart).await;
            self.set_status(RoomStatus::Running);
            tracing::info!(room_id = %self.room_id, "game started");
        }

        Ok(Entered {
            player,
            inbound,
            rejoined: false,
        })
    }

    async fn reconnect(&mut self, identity: Identity, socket: S) -> Result<Entered, RoomError> {
        let player = self
            .session
            .player_of(&identity)
            .ok_or_else(|| RoomError::NotInRoom(identity.clone(), self.room_id))?;
        let inbound = self.session.reconnect(&identity, socket)?;

        let index = self
            .game
            .board()
            .index_of(&player)
            .ok_or_else(|| RoomError::NotInRoom(identity.clone(), self.room_id))?;
        let seat = self.game.board().player(index)?;
        let welcome = self.codec.encode(&ServerEvent::Reconnected {
            player: player.clone(),
            position: seat.position,
            status: self.status,
            player_status: seat.status,
        })?;
        self.session.send_to(identity.clone(), welcome).await?;

        if self.status != RoomStatus::Finished {
            let map = self.codec.encode(&ServerEvent::update_map(self.game.board()))?;
            self.session.send_to(identity.clone(), map).await?;
        }
        let replayed = self.session.resend_pending(&identity).await?;

        tracing::info!(room_id = %self.room_id, %identity, %player, replayed, "player reconnected");
        Ok(Entered {
            player,
            inbound,
            rejoined: true,
        })
    }

    fn info(&self) -> RoomInfo {
        let capacity = self.game.board().players().len();
        RoomInfo {
            room_id: self.room_id,
            name: self.name.clone(),
            size: self.game.board().size(),
            status: self.status,
            seated: self.session.seated_count(),
            capacity,
        }
    }

    // -- Game loop --------------------------------------------------------

    /// Drives the engine from its current state to the end of the game.
    async fn play(&mut self) -> Result<(), RoomError> {
        let mut input = None;
        // Set by a turn's first prompt, kept across re-prompts.
        let mut deadline = None;
        loop {
            let event = self.game.resume(input.take())?;
            if !matches!(event, GameEvent::AwaitingAction { .. }) {
                deadline = None;
            }
            match event {
                GameEvent::UpdateMap => {
                    let event = ServerEvent::update_map(self.game.board());
                    self.broadcast(&event).await;
                    tracing::debug!(room_id = %self.room_id, "map\n{}", self.game.board().render());
                }
                GameEvent::AwaitingAction { player, message } => {
                    let turn_timeout = self.config.turn_timeout;
                    let at = *deadline
                        .get_or_insert_with(|| turn_timeout.map(|t| Instant::now() + t));
                    let reply = self.await_action(&player, message, at).await?;
                    // A move may still be rejected and re-prompted within this turn.
                    if !matches!(reply, TurnInput::Act { .. }) {
                        deadline = None;
                    }
                    input = Some(reply);
                }
                GameEvent::ActionApplied {
                    player,
                    from,
                    to,
                    wall,
                } => {
                    tracing::debug!(room_id = %self.room_id, %player, %from, %to, %wall, "move applied");
                }
                GameEvent::Eliminated { player, score } => {
                    tracing::info!(room_id = %self.room_id, %player, score, "player eliminated");
                    self.broadcast(&ServerEvent::Eliminated { player, score })
                        .await;
                }
                GameEvent::Terminal(result) => {
                    tracing::info!(
                        room_id = %self.room_id,
                        winner = ?result.winner(),
                        "game over"
                    );
                    self.broadcast(&ServerEvent::game_over(&result)).await;
                    self.set_status(RoomStatus::Finished);
                    return Ok(());
                }
            }
        }
    }

    /// Prompts `player` until a well-formed reply (or `deadline`) yields
    /// a turn input. Malformed replies re-prompt without moving the
    /// deadline.
    async fn await_action(
        &mut self,
        player: &Symbol,
        mut message: String,
        deadline: Option<Instant>,
    ) -> Result<TurnInput, RoomError> {
        let index = self
            .game
            .board()
            .index_of(player)
            .ok_or_else(|| palisade_engine::EngineError::InvalidBoard(format!("no player {player}")))?;

        loop {
            let reachable = self.game.board().reachable_points(index)?;
            let prompt = self.next_prompt();
            let frame = self
                .codec
                .encode(&ServerEvent::ask_action(prompt, message, reachable))?;
            self.session.post(player, frame.clone()).await?;

            let outcome = loop {
                let Some(bytes) = self.next_reply(player, deadline).await? else {
                    break None;
                };
                match self.codec.decode::<ActionReply>(&bytes) {
                    Ok(reply) if reply.prompt.is_some_and(|p| p != prompt) => {
                        tracing::warn!(
                            room_id = %self.room_id,
                            %player,
                            stale = ?reply.prompt,
                            current = prompt,
                            "discarding reply to an earlier prompt"
                        );
                    }
                    decoded => break Some(decoded),
                }
            };
            self.session.settle(player, &frame);

            match outcome {
                Some(Ok(reply)) => return Ok(reply.into_input()),
                Some(Err(e)) => {
                    tracing::debug!(room_id = %self.room_id, %player, error = %e, "malformed action");
                    message = e.to_string();
                }
                None => {
                    tracing::info!(
                        room_id = %self.room_id,
                        %player,
                        policy = ?self.config.timeout_policy,
                        "turn timed out"
                    );
                    return Ok(match self.config.timeout_policy {
                        TimeoutPolicy::SkipTurn => TurnInput::Pass,
                        TimeoutPolicy::Eliminate => TurnInput::Resign,
                    });
                }
            }
        }
    }

    /// Waits for the next frame from `player`, serving room commands in
    /// the meantime. `Ok(None)` means the deadline passed.
    async fn next_reply(
        &mut self,
        player: &Symbol,
        deadline: Option<Instant>,
    ) -> Result<Option<Vec<u8>>, RoomError> {
        let session = self.session.clone();
        loop {
            let expired = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                frame = session.receive_from(player) => return Ok(Some(frame?)),
                () = expired => return Ok(None),
                cmd = self.receiver.recv(), if self.commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd).await?,
                    None => self.commands_open = false,
                },
            }
        }
    }

    // -- Restart vote -----------------------------------------------------

    /// Asks every seated player whether to play again and counts the
    /// ballots under the configured policy.
    async fn vote(&mut self) -> Result<bool, RoomError> {
        let prompt = self.next_prompt();
        let frame = self.codec.encode(&ServerEvent::AskRestart { prompt })?;
        let timeout = self.config.vote_timeout;
        let seated = self.session.seated();
        let total = seated.len();

        let ballots: Vec<_> = seated
            .into_iter()
            .map(|(_, player)| {
                let session = self.session.clone();
                let frame = frame.clone();
                async move {
                    let reply = ask(&session, &player, frame, timeout).await;
                    (player, reply)
                }
            })
            .collect();
        let ballots = join_all(ballots);
        tokio::pin!(ballots);

        let results = loop {
            tokio::select! {
                results = &mut ballots => break results,
                cmd = self.receiver.recv(), if self.commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd).await?,
                    None => self.commands_open = false,
                },
            }
        };

        let mut yes = 0;
        for (player, reply) in results {
            let agreed = match reply {
                Ok(Some(bytes)) => self
                    .codec
                    .decode::<VoteReply>(&bytes)
                    .is_ok_and(|v| v.restart && v.prompt.is_none_or(|p| p == prompt)),
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!(room_id = %self.room_id, %player, error = %e, "ballot lost");
                    false
                }
            };
            tracing::debug!(room_id = %self.room_id, %player, agreed, "ballot");
            if agreed {
                yes += 1;
            }
        }

        let passed = self.config.vote_policy.passes(yes, total);
        tracing::info!(room_id = %self.room_id, yes, total, passed, "restart vote counted");
        Ok(passed)
    }

    // -- Helpers ----------------------------------------------------------

    fn next_prompt(&mut self) -> u64 {
        self.prompt_seq += 1;
        self.prompt_seq
    }

    fn set_status(&mut self, next: RoomStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal room transition {} -> {next}",
            self.status
        );
        self.status = next;
    }

    /// Encodes once and fans out to every seat. Encode failures are
    /// logged; a room never dies because one event could not be sent.
    async fn broadcast(&self, event: &ServerEvent) {
        match self.codec.encode(event) {
            Ok(frame) => self.session.broadcast(frame).await,
            Err(e) => tracing::error!(room_id = %self.room_id, error = %e, "encode failed"),
        }
    }

    async fn teardown(&mut self, reason: String) {
        self.status = RoomStatus::Closed;
        self.broadcast(&ServerEvent::RoomClosed {
            reason: reason.clone(),
        })
        .await;
        self.session.close_all().await;
        self.receiver.close();
        tracing::info!(room_id = %self.room_id, %reason, "room closed");
    }
}

async fn ask<S: Socket>(
    session: &SessionManager<S>,
    player: &Symbol,
    frame: Vec<u8>,
    timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, palisade_session::SessionError> {
    match timeout {
        Some(t) => session.ask_within(player, frame, t).await,
        None => session.ask(player, frame).await.map(Some),
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// The settings must already be validated.
pub(crate) fn spawn_room<S: Socket>(
    room_id: RoomId,
    settings: RoomSettings,
    config: RoomConfig,
) -> Result<RoomHandle<S>, RoomError> {
    let game = Game::with_symbols(settings.size, settings.symbols.iter().cloned())?;
    let session = SessionManager::new(settings.symbols);
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = RoomActor {
        room_id,
        name: settings.name,
        status: RoomStatus::Waiting,
        config,
        game,
        session,
        codec: JsonCodec,
        receiver: rx,
        commands_open: true,
        prompt_seq: 0,
        close_reason: None,
    };

    tokio::spawn(actor.run());

    Ok(RoomHandle {
        room_id,
        sender: tx,
    })
}
