//! Wire protocol for Palisade.
//!
//! - **Types**: [`ServerEvent`] (everything the server sends),
//!   [`ClientRequest`] (lobby requests), [`ActionReply`] / [`VoteReply`]
//!   (answers to prompts), plus the [`Identity`] and [`RoomId`] handles
//!   and the [`RoomStatus`] state machine.
//! - **Codec**: the [`Codec`] trait and [`JsonCodec`].
//! - **Errors**: [`ProtocolError`].
//!
//! ```text
//! Transport (bytes) → Protocol (ServerEvent / ClientRequest) → Session → Room
//! ```
//!
//! Engine value types that appear in frames ([`Symbol`], [`Cell`],
//! [`Direction`], [`Motion`]) are re-exported so clients of this crate
//! need not depend on the engine.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use palisade_engine::{Cell, Direction, Motion, PlayerStatus, Symbol};
pub use types::{
    ActionReply, ClientRequest, Identity, Recipient, RoomId, RoomListEntry, RoomStatus,
    ServerEvent, VoteReply,
};
