//! Error types for the table layer.

use tradehand_cards::HandError;
use tradehand_protocol::{Card, PlayerId, ProtocolError, TableId};

use crate::DecisionKind;

/// Failures reported by a [`Repository`](crate::Repository).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Registration refused: the active player count is at the limit.
    #[error("table is full ({max} active players)")]
    CapacityExceeded { max: usize },

    /// Registration refused: an active player already uses this name.
    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("player {0} holds no hand")]
    NoHand(PlayerId),

    #[error("no current player is set")]
    NoCurrentPlayer,

    #[error("player {player} does not hold {card}")]
    CardNotHeld { player: PlayerId, card: Card },

    /// The backing store cannot be used any more.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Failures delivering an event to its audience.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: ProtocolError,
    },

    /// The fan-out side has shut down.
    #[error("broadcast channel closed")]
    Closed,
}

/// Why a submitted decision was not accepted.
///
/// Rejections are expected during normal play (a click after the deadline,
/// a double click) and are only worth a debug log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionRejected {
    #[error("no decision is being collected")]
    NotOpen,

    #[error("expected a {expected} decision, got {got}")]
    WrongKind {
        expected: DecisionKind,
        got: DecisionKind,
    },

    #[error("player {0} may not decide now")]
    NotEligible(PlayerId),

    /// The player's previous decision has not been taken yet.
    #[error("player {0} already has a decision waiting")]
    Pending(PlayerId),
}

/// Errors from table operations and from a running game.
///
/// Any of these escaping the orchestrator stops the table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    /// A stored hand broke the card invariants.
    #[error("corrupt hand: {0}")]
    Hand(#[from] HandError),

    #[error("player {0} has an empty hand")]
    EmptyHand(PlayerId),

    /// The table actor is gone or its command channel is full.
    #[error("table {0} is unavailable")]
    Unavailable(TableId),

    /// The game task panicked or was cancelled.
    #[error("game task aborted: {0}")]
    Aborted(String),
}
