//! Everything that travels on the wire.
//!
//! Outbound frames are [`ServerEvent`]s, a closed enum tagged by an
//! `"event"` field. Inbound frames come in two flavours: [`ClientRequest`]s
//! (tagged by `"type"`) that a connection sends before it is seated in a
//! room, and the untagged replies ([`ActionReply`], [`VoteReply`]) it sends
//! once the room starts prompting it.
//!
//! All field names are camelCase on the wire.

use std::fmt;

use palisade_engine::{
    Board, Cell, Direction, GameResult, Motion, PlayerStatus, Symbol, TurnInput,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The stable, transport-level handle of a client (a session cookie, a
/// token, ...). Survives reconnects; the room binds it to one player.
///
/// Serialized as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A unique identifier for a room (one game instance).
///
/// Serialized as the bare number; displayed as `R-7` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a single frame goes to: a connection identity, or the player a
/// connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    Identity(Identity),
    Player(Symbol),
}

impl From<Identity> for Recipient {
    fn from(identity: Identity) -> Self {
        Self::Identity(identity)
    }
}

impl From<Symbol> for Recipient {
    fn from(symbol: Symbol) -> Self {
        Self::Player(symbol)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(id) => write!(f, "identity {id}"),
            Self::Player(symbol) => write!(f, "player {symbol}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Waiting ──→ Running ──→ Finished ──→ Closed
///                ↑            │
///                └─(restart)──┘
/// ```
///
/// Any state may jump straight to `Closed` on shutdown or a fatal error.
/// Lowercase on the wire (`"running"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Seats are still open.
    Waiting,
    /// Turns are being played.
    Running,
    /// Results are out; a restart vote may be running.
    Finished,
    /// Torn down. No more frames will be sent.
    Closed,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Running)
                | (Self::Running, Self::Finished)
                | (Self::Finished, Self::Running)
                | (Self::Waiting | Self::Running | Self::Finished, Self::Closed)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Room listing
// ---------------------------------------------------------------------------

/// A summary of a joinable room, as returned by `listRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub name: String,
    /// Board side length.
    pub size: usize,
    /// Players already seated.
    pub seated: usize,
    /// Total seats.
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Every frame the server sends.
///
/// Internally tagged, so `ServerEvent::Eliminated { player, score }`
/// becomes `{"event":"eliminated","player":"甲","score":12}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    // -- Seating --
    /// To the joiner: you play `player`.
    Joined { player: Symbol },

    /// To everyone seated: `player` took a seat.
    NewPlayer { player: Symbol },

    /// Every seat is taken (or a restart was agreed); turns begin.
    GameStart,

    // -- Game flow --
    /// The whole board. Wall rows are `'0'`/`'1'` strings, players are
    /// `[row, col, symbol]` triples in turn order.
    UpdateMap {
        wall_above: Vec<String>,
        wall_left: Vec<String>,
        players: Vec<(usize, usize, Symbol)>,
    },

    /// To the current player: your move. Replayed byte-for-byte after a
    /// reconnect until answered.
    AskAction {
        prompt: u64,
        message: String,
        reachable: Vec<Cell>,
    },

    /// `player` is out with `score` cells.
    Eliminated { player: Symbol, score: usize },

    /// To a returning connection: who you are, where you stand, and
    /// what the room is doing.
    Reconnected {
        player: Symbol,
        position: Cell,
        status: RoomStatus,
        player_status: PlayerStatus,
    },

    /// Final ranking, best first, as `[symbol, score]` pairs.
    GameOver { results: Vec<(Symbol, usize)> },

    /// To every seated player: play again?
    AskRestart { prompt: u64 },

    /// The room is gone; no more frames follow.
    RoomClosed { reason: String },

    // -- Lobby --
    /// To a connection that entered without a token: the identity it was
    /// given. Presenting it again later reclaims the same seat.
    SessionToken { token: Identity },

    RoomCreated { room_id: RoomId },

    RoomList { rooms: Vec<RoomListEntry> },

    // -- Errors --
    Error { message: String },
}

impl ServerEvent {
    /// Snapshot of the board for an `updateMap` frame.
    pub fn update_map(board: &Board) -> Self {
        Self::UpdateMap {
            wall_above: Board::wall_rows(board.wall_above()),
            wall_left: Board::wall_rows(board.wall_left()),
            players: board
                .players()
                .iter()
                .map(|p| (p.position.row, p.position.col, p.symbol.clone()))
                .collect(),
        }
    }

    pub fn ask_action(
        prompt: u64,
        message: impl Into<String>,
        reachable: impl IntoIterator<Item = Cell>,
    ) -> Self {
        Self::AskAction {
            prompt,
            message: message.into(),
            reachable: reachable.into_iter().collect(),
        }
    }

    pub fn game_over(result: &GameResult) -> Self {
        Self::GameOver {
            results: result
                .standings
                .iter()
                .map(|s| (s.symbol.clone(), s.score))
                .collect(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The prompt id of a request frame (`askAction`, `askRestart`).
    pub fn prompt(&self) -> Option<u64> {
        match self {
            Self::AskAction { prompt, .. } | Self::AskRestart { prompt } => Some(*prompt),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Lobby requests, sent by a connection before it is seated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Open a new room with a `size × size` board.
    CreateRoom { name: String, size: usize },

    /// Ask for the joinable rooms.
    ListRooms,

    /// Take a seat in (or return to) a room. An empty token asks the
    /// server to mint a fresh identity.
    Enter {
        room_id: RoomId,
        #[serde(default)]
        token: String,
    },
}

/// Answer to an `askAction` prompt.
///
/// `prompt` echoes the prompt id; replies carrying an id the room has
/// already moved past are dropped. Older clients that omit it are
/// accepted as answering the current prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReply {
    #[serde(alias = "motions")]
    pub motion: Motion,
    #[serde(alias = "wall_dir", alias = "wall_direction")]
    pub wall_direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<u64>,
}

impl ActionReply {
    pub fn into_input(self) -> TurnInput {
        TurnInput::Act {
            motion: self.motion,
            wall: self.wall_direction,
        }
    }
}

/// Answer to an `askRestart` prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReply {
    pub restart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_engine::Game;
    use serde_json::json;

    fn to_value(event: &ServerEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn test_identity_and_room_id_are_transparent() {
        assert_eq!(serde_json::to_string(&Identity::new("abc")).unwrap(), "\"abc\"");
        assert_eq!(serde_json::to_string(&RoomId(7)).unwrap(), "7");
        assert_eq!(RoomId(7).to_string(), "R-7");
    }

    #[test]
    fn test_update_map_shape() {
        let game = Game::with_symbols(3, ["甲", "乙"]).unwrap();
        let value = to_value(&ServerEvent::update_map(game.board()));
        assert_eq!(
            value,
            json!({
                "event": "updateMap",
                "wallAbove": ["111", "000", "000"],
                "wallLeft": ["100", "100", "100"],
                "players": [[0, 0, "甲"], [2, 2, "乙"]],
            })
        );
    }

    #[test]
    fn test_ask_action_shape() {
        let event = ServerEvent::ask_action(4, "", [Cell::new(0, 0), Cell::new(0, 1)]);
        assert_eq!(
            to_value(&event),
            json!({
                "event": "askAction",
                "prompt": 4,
                "message": "",
                "reachable": [[0, 0], [0, 1]],
            })
        );
        assert_eq!(event.prompt(), Some(4));
    }

    #[test]
    fn test_reconnected_status_is_room_status() {
        let event = ServerEvent::Reconnected {
            player: Symbol::from("A"),
            position: Cell::new(1, 2),
            status: RoomStatus::Running,
            player_status: PlayerStatus::Eliminated,
        };
        assert_eq!(
            to_value(&event),
            json!({
                "event": "reconnected",
                "player": "A",
                "position": [1, 2],
                "status": "running",
                "playerStatus": "eliminated",
            })
        );
        assert_eq!(event.prompt(), None);
    }

    #[test]
    fn test_room_status_transitions() {
        assert!(RoomStatus::Waiting.can_transition_to(RoomStatus::Running));
        assert!(RoomStatus::Finished.can_transition_to(RoomStatus::Running));
        assert!(RoomStatus::Running.can_transition_to(RoomStatus::Closed));
        assert!(!RoomStatus::Waiting.can_transition_to(RoomStatus::Finished));
        assert!(!RoomStatus::Closed.can_transition_to(RoomStatus::Running));
        assert!(RoomStatus::Waiting.is_joinable());
        assert!(!RoomStatus::Running.is_joinable());
        assert_eq!(serde_json::to_string(&RoomStatus::Finished).unwrap(), "\"finished\"");
    }

    #[test]
    fn test_session_token_shape() {
        let event = ServerEvent::SessionToken {
            token: Identity::new("00ff"),
        };
        assert_eq!(to_value(&event), json!({"event": "sessionToken", "token": "00ff"}));
    }

    #[test]
    fn test_room_list_fields_are_camel_case() {
        let event = ServerEvent::RoomList {
            rooms: vec![RoomListEntry {
                room_id: RoomId(1),
                name: "lobby".into(),
                size: 7,
                seated: 1,
                capacity: 2,
            }],
        };
        assert_eq!(
            to_value(&event),
            json!({"event": "roomList", "rooms": [
                {"roomId": 1, "name": "lobby", "size": 7, "seated": 1, "capacity": 2}
            ]})
        );
    }

    #[test]
    fn test_action_reply_accepts_aliases() {
        let reply: ActionReply =
            serde_json::from_str(r#"{"motions":[1,-1],"wall_dir":"left"}"#).unwrap();
        assert_eq!(reply.motion, Motion::new(1, -1));
        assert_eq!(reply.wall_direction, Direction::Left);
        assert_eq!(reply.prompt, None);

        let reply: ActionReply =
            serde_json::from_str(r#"{"motion":[0,0],"wallDirection":"up","prompt":3}"#).unwrap();
        assert_eq!(reply.prompt, Some(3));
        assert_eq!(
            reply.into_input(),
            TurnInput::Act {
                motion: Motion::STAY,
                wall: Direction::Up
            }
        );
    }

    #[test]
    fn test_action_reply_rejects_unknown_direction() {
        let result: Result<ActionReply, _> =
            serde_json::from_str(r#"{"motion":[0,0],"wallDirection":"north"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_request_enter_token_defaults_to_empty() {
        let request: ClientRequest =
            serde_json::from_str(r#"{"type":"enter","roomId":3}"#).unwrap();
        assert_eq!(
            request,
            ClientRequest::Enter {
                room_id: RoomId(3),
                token: String::new()
            }
        );
        let request: ClientRequest =
            serde_json::from_str(r#"{"type":"createRoom","name":"x","size":5}"#).unwrap();
        assert_eq!(
            request,
            ClientRequest::CreateRoom {
                name: "x".into(),
                size: 5
            }
        );
    }

    #[test]
    fn test_game_over_lists_symbol_score_pairs() {
        let game = Game::with_symbols(2, ["A", "B"]).unwrap();
        let event = ServerEvent::game_over(&game.standings());
        assert_eq!(
            to_value(&event),
            json!({"event": "gameOver", "results": [["A", 4], ["B", 4]]})
        );
    }
}
