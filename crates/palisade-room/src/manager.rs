//! Room manager: creates, tracks, and routes identities to rooms.

use std::collections::HashMap;

use palisade_protocol::{Identity, RoomId};
use palisade_session::Socket;

use crate::room::{Entered, spawn_room};
use crate::{RoomConfig, RoomError, RoomHandle, RoomInfo, RoomSettings};

/// Owns every live room and hands out handles to them.
///
/// This is the entry point for room operations from the server shell.
/// The manager itself is plain data; wrap it in a lock to share it.
pub struct RoomManager<S: Socket> {
    /// Live rooms, keyed by room ID.
    rooms: HashMap<RoomId, RoomHandle<S>>,

    /// Next ID to hand out. IDs are never reused.
    next_room_id: u64,

    /// Policy every spawned room runs with.
    config: RoomConfig,
}

impl<S: Socket> RoomManager<S> {
    /// Creates an empty manager whose rooms run with `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            next_room_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Validates `settings`, spawns a room actor and returns its ID.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_room(&mut self, settings: RoomSettings) -> Result<RoomId, RoomError> {
        settings.validate().map_err(RoomError::InvalidSettings)?;

        let room_id = RoomId(self.next_room_id);
        self.next_room_id += 1;

        let name = settings.name.clone();
        let size = settings.size;
        let handle = spawn_room(room_id, settings, self.config.clone())?;
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, %name, size, "room created");
        Ok(room_id)
    }

    /// A handle to the room, for callers that must not hold the manager
    /// across a round trip to the actor.
    pub fn room(&self, room_id: RoomId) -> Result<RoomHandle<S>, RoomError> {
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Seats a new identity or reconnects a known one.
    pub async fn enter(
        &self,
        room_id: RoomId,
        identity: Identity,
        socket: S,
    ) -> Result<Entered, RoomError> {
        self.room(room_id)?.enter(identity, socket).await
    }

    pub async fn register(
        &self,
        room_id: RoomId,
        identity: Identity,
        socket: S,
    ) -> Result<Entered, RoomError> {
        self.room(room_id)?.register(identity, socket).await
    }

    pub async fn reconnect(
        &self,
        room_id: RoomId,
        identity: Identity,
        socket: S,
    ) -> Result<Entered, RoomError> {
        self.room(room_id)?.reconnect(identity, socket).await
    }

    /// Returns info about a specific room.
    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        self.room(room_id)?.info().await
    }

    /// Rooms that still have open seats, lowest ID first.
    ///
    /// Rooms whose actor has exited are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for room_id in self.room_ids() {
            let Some(handle) = self.rooms.get(&room_id) else {
                continue;
            };
            match handle.info().await {
                Ok(info) if info.is_joinable() => infos.push(info),
                Ok(_) => {}
                Err(e) => tracing::debug!(%room_id, error = %e, "room skipped in listing"),
            }
        }
        infos
    }

    /// Shuts a room down and forgets it.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        if let Err(e) = handle.shutdown("room destroyed").await {
            tracing::debug!(%room_id, error = %e, "room already gone");
        }
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// Forgets every room whose actor has exited. Returns how many were
    /// removed.
    pub fn reap_closed(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|room_id, handle| {
            let keep = !handle.is_closed();
            if !keep {
                tracing::debug!(%room_id, "closed room reaped");
            }
            keep
        });
        before - self.rooms.len()
    }

    /// Shuts every room down with `reason` and empties the manager.
    pub async fn shutdown_all(&mut self, reason: &str) {
        for (room_id, handle) in self.rooms.drain() {
            if let Err(e) = handle.shutdown(reason).await {
                tracing::debug!(%room_id, error = %e, "room already gone");
            }
        }
    }

    /// Clones of every live handle, lowest ID first. Lets a caller
    /// query rooms without holding the manager.
    pub fn room_handles(&self) -> Vec<RoomHandle<S>> {
        self.room_ids()
            .into_iter()
            .filter_map(|id| self.rooms.get(&id).cloned())
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Live room IDs in ascending order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<_> = self.rooms.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl<S: Socket> Default for RoomManager<S> {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
