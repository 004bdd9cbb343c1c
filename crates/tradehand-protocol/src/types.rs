//! Values that travel inside event payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A registered player.
///
/// Assigned by the repository at registration and stable for the life of the
/// process: a player who disconnects and registers again under the same name
/// gets the same id back. Serialized as a plain number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A game table. Only used in logs and status reports; clients never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub u64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// One playing card.
///
/// `kind` is the suit-like category (1..=4) that hands are scored on; `id`
/// is the face (1..=4). Real cards cover every `(id, kind)` pair once. Each
/// kind also has one fake card, always with `id` 1, which counts toward its
/// kind but discounts the hand.
///
/// On the wire `kind` is called `type`:
/// `{"id": 3, "type": 2, "is_real": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: u8,
    #[serde(rename = "type")]
    pub kind: u8,
    pub is_real: bool,
}

impl Card {
    pub const fn real(id: u8, kind: u8) -> Self {
        Self {
            id,
            kind,
            is_real: true,
        }
    }

    pub const fn fake(kind: u8) -> Self {
        Self {
            id: 1,
            kind,
            is_real: false,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_real {
            write!(f, "{}/{}", self.kind, self.id)
        } else {
            write!(f, "{}/fake", self.kind)
        }
    }
}

// ---------------------------------------------------------------------------
// Payload records
// ---------------------------------------------------------------------------

/// A card put forward by a non-current player during one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub player_id: PlayerId,
    pub card: Card,
}

/// One line of the `update_score` screen: what a hand was worth this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub player_id: PlayerId,
    pub points: i64,
    pub cards: Vec<Card>,
}

/// One line of the `sum_score` screen: cumulative total before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumLine {
    pub player_id: PlayerId,
    pub old_score: i64,
    pub new_score: i64,
}
