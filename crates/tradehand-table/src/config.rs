//! Table configuration, the round phase machine, and table status.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tradehand_cards::PointsTable;

// ---------------------------------------------------------------------------
// PhaseTimings
// ---------------------------------------------------------------------------

/// Decision deadlines and screen pacing.
///
/// `choose_*` and `select_offer` bound how long a decision window stays
/// open. The rest are how long the table pauses so clients can show a
/// screen; each is also sent to clients as the event's `timeout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    pub choose_bid: Duration,
    pub show_bid: Duration,
    pub choose_offer: Duration,
    pub select_offer: Duration,
    pub between_actions: Duration,
    pub offers_finished: Duration,
    pub show_selected_offer: Duration,
    pub prepare_for_next_turn: Duration,
    pub end_of_round: Duration,
    pub update_score: Duration,
    pub sum_score: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            choose_bid: Duration::from_secs(15),
            show_bid: Duration::from_millis(1500),
            choose_offer: Duration::from_secs(15),
            select_offer: Duration::from_secs(15),
            between_actions: Duration::from_secs(1),
            offers_finished: Duration::from_secs(3),
            show_selected_offer: Duration::from_secs(2),
            prepare_for_next_turn: Duration::from_secs(2),
            end_of_round: Duration::from_secs(3),
            update_score: Duration::from_secs(5),
            sum_score: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// TableConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Most players that may be active at once. A game only starts with
    /// exactly four.
    pub max_players: usize,

    /// Capacity of the table's command channel.
    pub command_buffer: usize,

    pub timings: PhaseTimings,

    pub points: PointsTable,

    /// Stop after this many rounds. `None` plays forever.
    pub rounds_limit: Option<u32>,

    /// Seed for shuffles and fallback choices. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            command_buffer: 64,
            timings: PhaseTimings::default(),
            points: PointsTable::default(),
            rounds_limit: None,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a table is inside a round.
///
/// ```text
/// AwaitingPlayers → Dealing → Bidding → RevealBid → OfferCollection
///                      ↑         ↑  │                  │        │
///                      │         │  │            OfferSelection │
///                      │         │  │                  │        │
///                      │         │  │             Settlement    │
///                      │         │  │                  │        │
///                      │         └──┼──── TurnAdvance ←┴────────┘
///                      │            ↓
///                      └──────── RoundEnd → Finished
/// ```
///
/// `Dealing` falls back to `AwaitingPlayers` when the table does not have
/// exactly four active players, and `TurnAdvance` does the same once every
/// seated player has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    AwaitingPlayers,
    Dealing,
    Bidding,
    RevealBid,
    OfferCollection,
    OfferSelection,
    Settlement,
    TurnAdvance,
    RoundEnd,
    Finished,
}

impl Phase {
    /// Phases reachable in one step from this one.
    pub fn successors(self) -> &'static [Phase] {
        match self {
            Self::AwaitingPlayers => &[Self::Dealing],
            Self::Dealing => &[Self::Bidding, Self::AwaitingPlayers],
            Self::Bidding => &[Self::RevealBid, Self::RoundEnd],
            Self::RevealBid => &[Self::OfferCollection],
            Self::OfferCollection => &[Self::OfferSelection, Self::TurnAdvance],
            Self::OfferSelection => &[Self::Settlement],
            Self::Settlement => &[Self::TurnAdvance],
            Self::TurnAdvance => &[Self::Bidding, Self::AwaitingPlayers],
            Self::RoundEnd => &[Self::Dealing, Self::Finished],
            Self::Finished => &[],
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.successors().contains(&target)
    }

    /// Whether a round is underway.
    pub fn in_round(self) -> bool {
        !matches!(self, Self::AwaitingPlayers | Self::Finished)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingPlayers => "AwaitingPlayers",
            Self::Dealing => "Dealing",
            Self::Bidding => "Bidding",
            Self::RevealBid => "RevealBid",
            Self::OfferCollection => "OfferCollection",
            Self::OfferSelection => "OfferSelection",
            Self::Settlement => "Settlement",
            Self::TurnAdvance => "TurnAdvance",
            Self::RoundEnd => "RoundEnd",
            Self::Finished => "Finished",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// TableStatus
// ---------------------------------------------------------------------------

/// Lifecycle of the table actor itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    /// Accepting players, no game running.
    Open,
    /// A game is running.
    Playing,
    /// The configured number of rounds has been played.
    Finished,
    /// The running game hit a fatal error.
    Failed(String),
    /// Shut down on request.
    Stopped,
}

impl TableStatus {
    /// Whether the table has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_) | Self::Stopped)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Playing => write!(f, "Playing"),
            Self::Finished => write!(f, "Finished"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}
