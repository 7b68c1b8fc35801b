//! JSON wire protocol between table clients and the game server.
//!
//! Two closed families travel over the socket, one per direction:
//!
//! ```text
//!  client ── Action {"action": "<tag>", ...} ──► server
//!  client ◄── Event {"type": "<tag>", ...} ───── server
//! ```
//!
//! Tags are kebab-case and fields camelCase. Positions are `[x, y]` integer
//! arrays, cards are raw bytes (see [`crate::card`]).
//!
//! Inbound decoding is forward compatible: a frame whose tag this client
//! does not know decodes to [`Inbound::Unknown`] instead of an error, so a
//! newer server never tears down an older client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::Card;

pub type StackId = String;
pub type PlayerId = String;
pub type GameId = String;

// ───────────────────────────────────────────────────────────────────
// Position
// ───────────────────────────────────────────────────────────────────

/// Integer table coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance. Widened to i64 so table-sized
    /// coordinates never overflow.
    #[inline]
    pub fn distance_squared(&self, other: &Position) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// Component-wise offset by `to - from`.
    pub fn translated(&self, from: Position, to: Position) -> Position {
        Position {
            x: self.x.saturating_add(to.x.saturating_sub(from.x)),
            y: self.y.saturating_add(to.y.saturating_sub(from.y)),
        }
    }
}

impl From<[i32; 2]> for Position {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [i32; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ───────────────────────────────────────────────────────────────────
// Client → server
// ───────────────────────────────────────────────────────────────────

/// Intents sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Action {
    JoinGame,
    TakeCard { stack: StackId },
    PutCard { hand_index: usize, position: Position, face_down: bool },
    FlipCard { stack: StackId },
    FlipStack { stack: StackId },
    /// Begin a drag that lifts the top card off `stack`.
    PopCard { stack: StackId },
    MoveStack { stack: StackId, position: Position },
    /// End a drag. For a popped card `stack` is the stack it was popped from.
    DropStack { stack: StackId, position: Position },
    Shuffle { stack: StackId },
    Deal { stack: StackId },
    GivePlayer { hand_index: usize, trade_to: PlayerId },
    Reset,
    LeaveGame,
    Ping,
}

impl Action {
    /// Wire tag, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::JoinGame => "join-game",
            Action::TakeCard { .. } => "take-card",
            Action::PutCard { .. } => "put-card",
            Action::FlipCard { .. } => "flip-card",
            Action::FlipStack { .. } => "flip-stack",
            Action::PopCard { .. } => "pop-card",
            Action::MoveStack { .. } => "move-stack",
            Action::DropStack { .. } => "drop-stack",
            Action::Shuffle { .. } => "shuffle",
            Action::Deal { .. } => "deal",
            Action::GivePlayer { .. } => "give-player",
            Action::Reset => "reset",
            Action::LeaveGame => "leave-game",
            Action::Ping => "ping",
        }
    }

    /// The stack this action mutates, if any.
    pub fn stack(&self) -> Option<&str> {
        match self {
            Action::TakeCard { stack }
            | Action::FlipCard { stack }
            | Action::FlipStack { stack }
            | Action::PopCard { stack }
            | Action::MoveStack { stack, .. }
            | Action::DropStack { stack, .. }
            | Action::Shuffle { stack }
            | Action::Deal { stack } => Some(stack),
            Action::JoinGame
            | Action::PutCard { .. }
            | Action::GivePlayer { .. }
            | Action::Reset
            | Action::LeaveGame
            | Action::Ping => None,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

// ───────────────────────────────────────────────────────────────────
// Server → client
// ───────────────────────────────────────────────────────────────────

/// The action that provoked a `game-state` snapshot on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CauseAction {
    JoinGame,
    TakeCard,
    PutCard,
    FlipCard,
    FlipStack,
    PopCard,
    MoveCard,
    MoveStack,
    DropStack,
    Shuffle,
    Deal,
    GivePlayer,
    Reset,
    LeaveGame,
    Ping,
    /// Server-side action this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One stack as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    pub stack_id: StackId,
    pub position: Position,
    pub visible_card: Card,
    pub remaining_cards: u32,
}

/// Messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Event {
    /// Full table snapshot. Never a diff.
    GameState {
        game_id: GameId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause_action: Option<CauseAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause_player: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        players: Option<Vec<PlayerId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stacks: Option<Vec<StackState>>,
    },
    PlayerState {
        game_id: GameId,
        hand: Vec<Card>,
    },
    Error {
        error: String,
        message: String,
    },
    CloseGame,
    Success,
    Pong,
}

impl Event {
    /// Every tag this client understands.
    pub const TAGS: [&'static str; 6] = [
        "game-state",
        "player-state",
        "error",
        "close-game",
        "success",
        "pong",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Event::GameState { .. } => "game-state",
            Event::PlayerState { .. } => "player-state",
            Event::Error { .. } => "error",
            Event::CloseGame => "close-game",
            Event::Success => "success",
            Event::Pong => "pong",
        }
    }

    /// Serialize to a JSON text frame (used by test servers).
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(Event),
    /// Well-formed frame with a tag this client does not recognize.
    Unknown { tag: String },
}

impl Inbound {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingTag)?
            .to_owned();

        if !Event::TAGS.contains(&tag.as_str()) {
            return Ok(Inbound::Unknown { tag });
        }

        serde_json::from_value(value)
            .map(Inbound::Event)
            .map_err(|e| ProtocolError::InvalidPayload {
                tag,
                reason: e.to_string(),
            })
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Frame has no \"type\" tag")]
    MissingTag,
    #[error("Invalid {tag} payload: {reason}")]
    InvalidPayload { tag: String, reason: String },
    #[error("Encoding error: {0}")]
    Encode(String),
}
