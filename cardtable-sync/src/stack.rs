//! Card stacks and their sync classification.
//!
//! A stack is what the renderer draws at one table position: a top card and
//! a count. Besides the server's view of it, each stack carries a
//! [`SyncTag`] saying how far it may trust that view:
//!
//! | Tag         | local | moving | Snapshot behaviour                     |
//! |-------------|-------|--------|----------------------------------------|
//! | `Confirmed` |   –   |   –    | overwritten, removed when unlisted     |
//! | `Local`     |   ✓   |   –    | overwritten and confirmed when listed  |
//! | `Moving`    |   ✓   |   ✓    | ignored until the drag ends            |
//!
//! `moving ⇒ local` holds by construction: there is no state with `moving`
//! set and `local` clear.

use uuid::Uuid;

use crate::card::Card;
use crate::protocol::{Position, StackId, StackState};

/// Prefix of ids generated for stacks the server has not named yet.
pub const LOCAL_ID_PREFIX: &str = "local:";

/// Sync classification of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncTag {
    /// Matches the last authoritative snapshot.
    #[default]
    Confirmed,
    /// Created or changed by this client and not yet echoed.
    Local,
    /// Under a finger right now. Always also local.
    Moving,
}

/// How a stack came to be on this client's table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Provenance {
    /// Listed by an authoritative snapshot, or adopted into one.
    #[default]
    Server,
    /// Popped off the named stack by a local drag.
    Split(StackId),
    /// Played from the hand by a local `put-card`.
    Hand,
}

/// One pile of cards on the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    id: StackId,
    position: Position,
    remaining_cards: u32,
    visible_card: Card,
    tag: SyncTag,
    provenance: Provenance,
    /// Wire id for the drop that ends the split drag. Cleared at that drop.
    origin: Option<StackId>,
    /// The server removed this stack while it was being dragged.
    removal_deferred: bool,
}

impl Stack {
    /// Stack mirroring an authoritative snapshot entry.
    pub fn from_state(state: &StackState) -> Self {
        Self {
            id: state.stack_id.clone(),
            position: state.position,
            remaining_cards: state.remaining_cards,
            visible_card: state.visible_card,
            tag: SyncTag::Confirmed,
            provenance: Provenance::Server,
            origin: None,
            removal_deferred: false,
        }
    }

    /// New single-card stack played from the hand, tagged `local`.
    pub fn create_local(position: Position, card: Card) -> Self {
        Self {
            id: format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()),
            position,
            remaining_cards: 1,
            visible_card: card,
            tag: SyncTag::Local,
            provenance: Provenance::Hand,
            origin: None,
            removal_deferred: false,
        }
    }

    /// Single-card stack popped off `origin`, tagged `local`.
    pub fn split_from(origin: &str, position: Position, card: Card) -> Self {
        Self {
            provenance: Provenance::Split(origin.to_owned()),
            origin: Some(origin.to_owned()),
            ..Self::create_local(position, card)
        }
    }

    // ───────────────────── classification ─────────────────────

    /// Tag as mid-drag. Implies `local`.
    pub fn begin_move(&mut self) {
        self.tag = SyncTag::Moving;
    }

    /// Drag finished. Stays `local` until echoed.
    pub fn end_move(&mut self) {
        if self.tag == SyncTag::Moving {
            self.tag = SyncTag::Local;
        }
    }

    /// Tag as locally changed. A moving stack stays moving.
    pub fn mark_local(&mut self) {
        if self.tag == SyncTag::Confirmed {
            self.tag = SyncTag::Local;
        }
    }

    /// Authoritative echo received. Clears both `local` and `moving`.
    pub fn confirm(&mut self) {
        self.tag = SyncTag::Confirmed;
    }

    pub fn tag(&self) -> SyncTag {
        self.tag
    }

    pub fn is_local(&self) -> bool {
        self.tag != SyncTag::Confirmed
    }

    pub fn is_moving(&self) -> bool {
        self.tag == SyncTag::Moving
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Created by a local pop and not yet adopted by the server.
    pub fn is_split(&self) -> bool {
        matches!(self.provenance, Provenance::Split(_))
    }

    /// Stack a split was popped off. Survives the drop, unlike [`Stack::origin`].
    pub fn split_source(&self) -> Option<&str> {
        match &self.provenance {
            Provenance::Split(source) => Some(source.as_str()),
            _ => None,
        }
    }

    /// Played from the hand and not yet adopted by the server.
    pub fn is_from_hand(&self) -> bool {
        self.provenance == Provenance::Hand
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Still carries a client-generated id the server cannot address.
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    /// Forget the split origin once the drag that created it has ended.
    pub(crate) fn take_origin(&mut self) -> Option<StackId> {
        self.origin.take()
    }

    pub(crate) fn defer_removal(&mut self) {
        self.removal_deferred = true;
    }

    pub fn removal_deferred(&self) -> bool {
        self.removal_deferred
    }

    // ───────────────────── state ─────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn remaining_cards(&self) -> u32 {
        self.remaining_cards
    }

    /// Top card. Meaningless when the stack is empty.
    pub fn visible_card(&self) -> Card {
        self.visible_card
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_cards == 0
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Take the server-assigned id. Used when a split stack is adopted.
    pub(crate) fn rename(&mut self, id: StackId) {
        self.id = id;
        self.provenance = Provenance::Server;
        self.origin = None;
    }

    /// Overwrite with an authoritative entry. Returns whether the position
    /// changed.
    pub fn apply_state(&mut self, state: &StackState) -> bool {
        let moved = self.position != state.position;
        self.position = state.position;
        self.remaining_cards = state.remaining_cards;
        self.visible_card = state.visible_card;
        moved
    }

    /// Whether this stack already shows exactly what `state` reports.
    pub fn matches(&self, state: &StackState) -> bool {
        self.position == state.position
            && self.remaining_cards == state.remaining_cards
            && self.visible_card == state.visible_card
    }

    /// Put `count` cards on top, `top` being the new visible card.
    pub fn push_cards(&mut self, count: u32, top: Card) {
        self.remaining_cards = self.remaining_cards.saturating_add(count);
        self.visible_card = top;
    }

    /// Lift the top card off. The card underneath is unknown to the client
    /// and shows as [`Card::HIDDEN`] until the next snapshot.
    pub fn pop_card(&mut self) -> Option<Card> {
        if self.remaining_cards == 0 {
            return None;
        }
        let top = self.visible_card;
        self.remaining_cards -= 1;
        self.visible_card = Card::HIDDEN;
        Some(top)
    }

    /// Turn the top card over.
    pub fn flip_top(&mut self) {
        self.visible_card = self.visible_card.flip();
    }
}
