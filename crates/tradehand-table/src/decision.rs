//! Decision windows: the only path from player input into a running game.
//!
//! Each phase that waits on players opens a fresh [`DecisionWindow`] on the
//! table's [`DecisionDesk`]. Opening bumps the desk's generation and
//! installs a new bounded channel; connection tasks call
//! [`DecisionDesk::submit`], which stamps the decision with the generation
//! that is open right now. When the window is dropped the slot closes, and
//! the window ignores anything stamped with another generation. A late
//! click from one phase therefore never turns up in the next.
//!
//! Each eligible player may have one decision waiting at a time. A repeat
//! is refused until the window has taken the first one, so a burst from
//! one player never crowds out another player's input.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tradehand_protocol::{Card, PlayerId};

use crate::DecisionRejected;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    Bid,
    Offer,
    SelectOffer,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Offer => write!(f, "offer"),
            Self::SelectOffer => write!(f, "offer selection"),
        }
    }
}

/// Player input, tagged with who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The current player's bid. `round_done` ends the round instead.
    Bid {
        player: PlayerId,
        card: Card,
        round_done: bool,
    },
    /// A non-current player's offer.
    Offer { player: PlayerId, card: Card },
    /// The current player picks the offer made by `offerer`.
    SelectOffer { player: PlayerId, offerer: PlayerId },
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Bid { .. } => DecisionKind::Bid,
            Self::Offer { .. } => DecisionKind::Offer,
            Self::SelectOffer { .. } => DecisionKind::SelectOffer,
        }
    }

    pub fn player(&self) -> PlayerId {
        match self {
            Self::Bid { player, .. } | Self::Offer { player, .. } | Self::SelectOffer { player, .. } => {
                *player
            }
        }
    }
}

#[derive(Debug)]
struct Stamped {
    generation: u64,
    decision: Decision,
}

#[derive(Debug)]
struct OpenSlot {
    kind: DecisionKind,
    generation: u64,
    eligible: Vec<PlayerId>,
    pending: HashSet<PlayerId>,
    sender: mpsc::Sender<Stamped>,
}

/// Where decisions are dropped off. Shared by the table handle (writers)
/// and the orchestrator (the only reader).
#[derive(Debug, Default)]
pub(crate) struct DecisionDesk {
    slot: Mutex<Option<OpenSlot>>,
    generation: AtomicU64,
}

impl DecisionDesk {
    // The slot only ever holds a fully built value, so a poisoned lock is
    // still consistent.
    fn slot(&self) -> MutexGuard<'_, Option<OpenSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a window for `kind` accepting decisions from `eligible`
    /// players, replacing any window still open.
    pub(crate) fn open(self: &Arc<Self>, kind: DecisionKind, eligible: Vec<PlayerId>) -> DecisionWindow {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel(eligible.len().max(1));
        *self.slot() = Some(OpenSlot {
            kind,
            generation,
            pending: HashSet::with_capacity(eligible.len()),
            eligible,
            sender,
        });
        DecisionWindow {
            desk: Arc::clone(self),
            kind,
            generation,
            receiver,
        }
    }

    /// Hands a decision to the open window. Returns the generation it was
    /// stamped with.
    pub(crate) fn submit(&self, decision: Decision) -> Result<u64, DecisionRejected> {
        let mut slot = self.slot();
        let open = slot.as_mut().ok_or(DecisionRejected::NotOpen)?;
        let player = decision.player();
        if open.kind != decision.kind() {
            return Err(DecisionRejected::WrongKind {
                expected: open.kind,
                got: decision.kind(),
            });
        }
        if !open.eligible.contains(&player) {
            return Err(DecisionRejected::NotEligible(player));
        }
        if !open.pending.insert(player) {
            return Err(DecisionRejected::Pending(player));
        }

        let generation = open.generation;
        // At most one stamp per eligible player is queued, so the channel
        // never fills.
        let stamped = Stamped {
            generation,
            decision,
        };
        if open.sender.try_send(stamped).is_err() {
            open.pending.remove(&player);
            return Err(DecisionRejected::NotOpen);
        }
        Ok(generation)
    }

    /// Frees `player` to submit again once the window has taken their
    /// decision.
    fn release(&self, generation: u64, player: PlayerId) {
        if let Some(open) = self.slot().as_mut().filter(|open| open.generation == generation) {
            open.pending.remove(&player);
        }
    }

    fn close(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|open| open.generation == generation) {
            *slot = None;
        }
    }
}

/// The reading end of one phase's decisions. Closes the slot on drop.
#[derive(Debug)]
pub(crate) struct DecisionWindow {
    desk: Arc<DecisionDesk>,
    kind: DecisionKind,
    generation: u64,
    receiver: mpsc::Receiver<Stamped>,
}

impl DecisionWindow {
    /// Next decision of this window, or `None` once `deadline` passes.
    pub(crate) async fn recv_until(&mut self, deadline: Instant) -> Option<Decision> {
        loop {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(stamped)) if stamped.generation == self.generation => {
                    self.desk.release(self.generation, stamped.decision.player());
                    return Some(stamped.decision);
                }
                Ok(Some(stale)) => {
                    tracing::debug!(
                        kind = %self.kind,
                        stale = stale.generation,
                        open = self.generation,
                        "discarding decision from a closed window"
                    );
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

impl Drop for DecisionWindow {
    fn drop(&mut self) {
        self.desk.close(self.generation);
    }
}
