//! # cardtable-sync — client-side sync for a shared card table
//!
//! Keeps a local view of a multiplayer card table consistent with an
//! authoritative game server while the player drags, splits and merges
//! stacks with optimistic, immediate feedback.
//!
//! ## Architecture
//!
//! ```text
//!   touch input                          WebSocket (JSON)
//!       │                                       ▲
//!       ▼                                       │ Action
//! ┌─────────────┐  drain_outbox  ┌────────────────┐
//! │   Engine    │ ─────────────► │   SyncClient   │
//! │ (gestures,  │                │ (supervisor,   │
//! │  hand)      │ ◄───────────── │  backlog, ping)│
//! └──────┬──────┘  apply_event   └────────────────┘
//!        │                               │ Event
//!        ▼
//! ┌─────────────┐    resolve     ┌────────────────┐
//! │  TableView  │ ─────────────► │   proximity    │
//! │ (snapshots) │                └────────────────┘
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`card`] — one-byte card encoding and asset lookup
//! - [`protocol`] — JSON wire messages (`Action` out, `Event` in)
//! - [`stack`] — stacks and their sync tags
//! - [`table`] — ordered table view and the snapshot merge
//! - [`proximity`] — merge-target lookup on drop
//! - [`engine`] — gestures, optimistic mutations, outbox
//! - [`client`] — WebSocket connection with reconnect and backlog
//! - [`session`] — driver wiring a client to an engine
//! - [`config`] — client configuration

pub mod card;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod proximity;
pub mod session;
pub mod stack;
pub mod table;

// Re-exports for convenience
pub use card::{Card, CardError, DecodedCard, SpecialCard, Suit};
pub use client::{Backlog, ConnectionState, SessionEvent, SyncClient};
pub use config::{BackoffConfig, ClientConfig, ConfigError};
pub use engine::{Engine, Notice, TouchId};
pub use error::SessionError;
pub use protocol::{
    Action, CauseAction, Event, GameId, Inbound, PlayerId, Position, ProtocolError, StackId,
    StackState,
};
pub use session::GameSession;
pub use stack::{Provenance, Stack, SyncTag};
pub use table::{SnapshotCause, SnapshotOutcome, TableView};
