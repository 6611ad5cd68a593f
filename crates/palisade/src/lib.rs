//! # Palisade
//!
//! A turn-based wall-partition game served over WebSockets.
//!
//! Players share an N×N board. On each turn a player moves up to three
//! steps and plants a wall next to where they stop. Walls never come
//! down, so the board splits into regions; a player left alone in a
//! region is eliminated and scores its size.
//!
//! This crate is the server shell. It accepts connections, answers lobby
//! requests (`createRoom`, `listRooms`, `enter`) and hands seated
//! connections to the room actors in `palisade-room`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use palisade::prelude::*;
//!
//! # async fn start() -> Result<(), PalisadeError> {
//! let server = PalisadeServerBuilder::new()
//!     .bind("127.0.0.1:8080")
//!     .room_config(RoomConfig {
//!         restart_vote: true,
//!         ..RoomConfig::default()
//!     })
//!     .build(SessionTokenProvider)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PalisadeError;
pub use handler::WsSocket;
pub use server::{DEFAULT_BIND, PalisadeServer, PalisadeServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{DEFAULT_BIND, PalisadeError, PalisadeServer, PalisadeServerBuilder};

    pub use palisade_engine::{Board, Game, GameResult, MAX_STEPS};
    pub use palisade_protocol::{
        ActionReply, Cell, ClientRequest, Codec, Direction, Identity, JsonCodec, Motion,
        PlayerStatus, RoomId, RoomListEntry, ServerEvent, Symbol, VoteReply,
    };
    pub use palisade_room::{
        RoomConfig, RoomError, RoomSettings, RoomStatus, TimeoutPolicy, VotePolicy,
    };
    pub use palisade_session::{IdentityProvider, SessionError, SessionTokenProvider};
}
