//! Bit-packed card codec.
//!
//! Every card on the table or in a hand travels as a single byte:
//!
//! ```text
//!   bit  7        6          5  4  3  2     1  0
//!  ┌──────────┬──────────┬─────────────┬────────┐
//!  │ face-down│ special  │    rank     │  suit  │   numerical (bit 6 = 0)
//!  └──────────┴──────────┴─────────────┴────────┘
//!  ┌──────────┬──────────┬──────────────────────┐
//!  │ face-down│ special  │     special type     │   special (bit 6 = 1)
//!  └──────────┴──────────┴──────────────────────┘
//! ```
//!
//! Ranks are 1-indexed (ace = 1, king = 13). Suits: 0 spades, 1 hearts,
//! 2 diamonds, 3 clubs. Special types: 0 black joker, 1 red joker.
//!
//! Decoding is total: every byte maps to some [`DecodedCard`]. Only the
//! field-level constructors validate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const FACE_DOWN_MASK: u8 = 0b1000_0000;
const SPECIAL_MASK: u8 = 0b0100_0000;
const SPECIAL_TYPE_MASK: u8 = 0b0011_1111;
const RANK_MASK: u8 = 0b0011_1100;
const SUIT_MASK: u8 = 0b0000_0011;

/// Version of the asset key table returned by [`Card::image_path`].
///
/// Bump whenever a key changes so renderers can invalidate cached sprites.
pub const ASSET_CATALOG_VERSION: u32 = 1;

const BACKING_ASSET: &str = "cards/red_backing.png";

/// Card field validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("Invalid rank {0}: expected 1..=13")]
    InvalidRank(u8),
    #[error("Invalid suit {0}: expected 0..=3")]
    InvalidSuit(u8),
    #[error("Invalid special type {0}: expected 0..=63")]
    InvalidSpecialType(u8),
}

/// The four suits in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Suit {
    Spades = 0,
    Hearts = 1,
    Diamonds = 2,
    Clubs = 3,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    /// Two low bits of a byte → suit. Total.
    fn from_bits(bits: u8) -> Self {
        match bits & SUIT_MASK {
            0 => Suit::Spades,
            1 => Suit::Hearts,
            2 => Suit::Diamonds,
            _ => Suit::Clubs,
        }
    }

    pub fn try_from_u8(value: u8) -> Result<Self, CardError> {
        if value > 3 {
            return Err(CardError::InvalidSuit(value));
        }
        Ok(Self::from_bits(value))
    }

    pub fn title(self) -> &'static str {
        match self {
            Suit::Spades => "Spades",
            Suit::Hearts => "Hearts",
            Suit::Diamonds => "Diamonds",
            Suit::Clubs => "Clubs",
        }
    }
}

/// Known special card types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecialCard {
    JokerBlack = 0,
    JokerRed = 1,
}

/// A card's fields after unpacking.
///
/// `rank` is the raw 4-bit field and may fall outside 1..=13 for bytes that
/// no server would produce; [`DecodedCard::encode`] rejects those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCard {
    pub face_down: bool,
    pub is_special: bool,
    pub rank: Option<u8>,
    pub suit: Option<Suit>,
    pub special_type: Option<u8>,
}

impl DecodedCard {
    /// Re-pack the fields. Inverse of [`Card::decode`] for valid cards.
    pub fn encode(&self) -> Result<Card, CardError> {
        if self.is_special {
            Card::encode(self.face_down, true, self.special_type.unwrap_or(0), 0)
        } else {
            Card::encode(
                self.face_down,
                false,
                self.rank.unwrap_or(0),
                self.suit.map_or(0, |s| s as u8),
            )
        }
    }
}

/// A single card, packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "CardRepr", into = "u8")]
#[repr(transparent)]
pub struct Card(u8);

/// Accepted wire shapes: a raw integer, or `{"value": int}` from the
/// structured client variant.
#[derive(Deserialize)]
#[serde(untagged)]
enum CardRepr {
    Raw(u8),
    Wrapped { value: u8 },
}

impl From<CardRepr> for Card {
    fn from(repr: CardRepr) -> Self {
        match repr {
            CardRepr::Raw(v) | CardRepr::Wrapped { value: v } => Card(v),
        }
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> Self {
        card.0
    }
}

impl From<u8> for Card {
    fn from(value: u8) -> Self {
        Card(value)
    }
}

impl Card {
    /// Face-down card with no identity. Stands in for cards the client
    /// cannot see, such as the one left on top after popping a card.
    pub const HIDDEN: Card = Card(FACE_DOWN_MASK);

    /// Pack the given fields.
    ///
    /// For special cards `rank_or_type` is the special type and `suit` is
    /// ignored.
    pub fn encode(
        face_down: bool,
        is_special: bool,
        rank_or_type: u8,
        suit: u8,
    ) -> Result<Card, CardError> {
        let face = if face_down { FACE_DOWN_MASK } else { 0 };
        if is_special {
            if rank_or_type > SPECIAL_TYPE_MASK {
                return Err(CardError::InvalidSpecialType(rank_or_type));
            }
            return Ok(Card(face | SPECIAL_MASK | rank_or_type));
        }
        if !(1..=13).contains(&rank_or_type) {
            return Err(CardError::InvalidRank(rank_or_type));
        }
        let suit = Suit::try_from_u8(suit)?;
        Ok(Card(face | (rank_or_type << 2) | suit as u8))
    }

    /// Face-up numerical card.
    pub fn numerical(rank: u8, suit: Suit) -> Result<Card, CardError> {
        Self::encode(false, false, rank, suit as u8)
    }

    /// Face-up special card.
    pub fn special(kind: SpecialCard) -> Card {
        Card(SPECIAL_MASK | kind as u8)
    }

    /// Raw byte value.
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Unpack all fields.
    pub fn decode(self) -> DecodedCard {
        DecodedCard {
            face_down: self.is_face_down(),
            is_special: self.is_special(),
            rank: self.rank(),
            suit: self.suit(),
            special_type: self.special_type(),
        }
    }

    #[inline]
    pub fn is_face_down(self) -> bool {
        self.0 & FACE_DOWN_MASK != 0
    }

    #[inline]
    pub fn is_special(self) -> bool {
        self.0 & SPECIAL_MASK != 0
    }

    #[inline]
    pub fn is_numerical(self) -> bool {
        !self.is_special()
    }

    pub fn rank(self) -> Option<u8> {
        self.is_numerical().then(|| (self.0 & RANK_MASK) >> 2)
    }

    pub fn suit(self) -> Option<Suit> {
        self.is_numerical().then(|| Suit::from_bits(self.0))
    }

    pub fn special_type(self) -> Option<u8> {
        self.is_special().then(|| self.0 & SPECIAL_TYPE_MASK)
    }

    /// Toggle the face-down bit. `c.flip().flip() == c`.
    #[inline]
    pub fn flip(self) -> Card {
        Card(self.0 ^ FACE_DOWN_MASK)
    }

    /// Same card, face down.
    pub fn face_down(self) -> Card {
        Card(self.0 | FACE_DOWN_MASK)
    }

    /// Asset key for the renderer. See [`ASSET_CATALOG_VERSION`].
    pub fn image_path(self) -> &'static str {
        if self.is_face_down() {
            return BACKING_ASSET;
        }
        if let Some(kind) = self.special_type() {
            return match kind {
                0 => "cards/joker_black.png",
                1 => "cards/joker_red.png",
                _ => BACKING_ASSET,
            };
        }
        match (self.rank(), self.suit()) {
            (Some(rank @ 1..=13), Some(suit)) => {
                NUMERICAL_ASSETS[suit as usize * 13 + (rank as usize - 1)]
            }
            _ => BACKING_ASSET,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_face_down() {
            return write!(f, "Face-down card");
        }
        match (self.special_type(), self.rank(), self.suit()) {
            (Some(0), _, _) => write!(f, "Black Joker"),
            (Some(1), _, _) => write!(f, "Red Joker"),
            (Some(kind), _, _) => write!(f, "Special card {kind}"),
            (None, Some(rank @ 1..=13), Some(suit)) => {
                write!(f, "{} of {}", RANK_NAMES[rank as usize - 1], suit.title())
            }
            _ => write!(f, "Unknown card"),
        }
    }
}

const RANK_NAMES: [&str; 13] = [
    "Ace", "2", "3", "4", "5", "6", "7", "8", "9", "10", "Jack", "Queen", "King",
];

/// Indexed by `suit * 13 + (rank - 1)`.
const NUMERICAL_ASSETS: [&str; 52] = [
    "cards/ace_of_spades.png",
    "cards/2_of_spades.png",
    "cards/3_of_spades.png",
    "cards/4_of_spades.png",
    "cards/5_of_spades.png",
    "cards/6_of_spades.png",
    "cards/7_of_spades.png",
    "cards/8_of_spades.png",
    "cards/9_of_spades.png",
    "cards/10_of_spades.png",
    "cards/jack_of_spades.png",
    "cards/queen_of_spades.png",
    "cards/king_of_spades.png",
    "cards/ace_of_hearts.png",
    "cards/2_of_hearts.png",
    "cards/3_of_hearts.png",
    "cards/4_of_hearts.png",
    "cards/5_of_hearts.png",
    "cards/6_of_hearts.png",
    "cards/7_of_hearts.png",
    "cards/8_of_hearts.png",
    "cards/9_of_hearts.png",
    "cards/10_of_hearts.png",
    "cards/jack_of_hearts.png",
    "cards/queen_of_hearts.png",
    "cards/king_of_hearts.png",
    "cards/ace_of_diamonds.png",
    "cards/2_of_diamonds.png",
    "cards/3_of_diamonds.png",
    "cards/4_of_diamonds.png",
    "cards/5_of_diamonds.png",
    "cards/6_of_diamonds.png",
    "cards/7_of_diamonds.png",
    "cards/8_of_diamonds.png",
    "cards/9_of_diamonds.png",
    "cards/10_of_diamonds.png",
    "cards/jack_of_diamonds.png",
    "cards/queen_of_diamonds.png",
    "cards/king_of_diamonds.png",
    "cards/ace_of_clubs.png",
    "cards/2_of_clubs.png",
    "cards/3_of_clubs.png",
    "cards/4_of_clubs.png",
    "cards/5_of_clubs.png",
    "cards/6_of_clubs.png",
    "cards/7_of_clubs.png",
    "cards/8_of_clubs.png",
    "cards/9_of_clubs.png",
    "cards/10_of_clubs.png",
    "cards/jack_of_clubs.png",
    "cards/queen_of_clubs.png",
    "cards/king_of_clubs.png",
];
