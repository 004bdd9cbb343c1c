//! Persistence contract for players, hands, the turn pointer, and scores.
//!
//! The orchestrator never holds state across phases itself: every hand,
//! the current player, and the score ledger live behind [`Repository`] so
//! other tasks (the table actor, the connection handlers) see the same
//! picture. Implementations must be read-your-writes and must apply
//! [`swap_cards`](Repository::swap_cards) and
//! [`set_current_player`](Repository::set_current_player) as single steps.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tradehand_protocol::{Card, PlayerId};

use crate::RepositoryError;

/// The two-card exchange at the end of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSwap {
    pub current: PlayerId,
    pub bid: Card,
    pub offerer: PlayerId,
    pub offered: Card,
}

pub trait Repository: Send + Sync + 'static {
    /// Registers `name` and returns its id.
    ///
    /// An inactive player with the same name is reactivated under the same
    /// id, keeping their score.
    ///
    /// # Errors
    /// - [`RepositoryError::NameTaken`] if an active player uses `name`
    /// - [`RepositoryError::CapacityExceeded`] if the active count is at the limit
    fn register_player(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<PlayerId, RepositoryError>> + Send;

    /// Marks a player inactive. Players are never deleted.
    fn deactivate_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn active_player_count(&self) -> impl Future<Output = Result<usize, RepositoryError>> + Send;

    /// Active player ids in ascending order.
    fn active_player_ids(
        &self,
    ) -> impl Future<Output = Result<Vec<PlayerId>, RepositoryError>> + Send;

    /// Drops every stored hand.
    fn clear_hands(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn set_hand(
        &self,
        id: PlayerId,
        cards: Vec<Card>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn hand(&self, id: PlayerId) -> impl Future<Output = Result<Vec<Card>, RepositoryError>> + Send;

    /// Exchanges the bid and the offered card and returns both new hands,
    /// current player's first. Nothing changes unless both cards are held.
    fn swap_cards(
        &self,
        swap: CardSwap,
    ) -> impl Future<Output = Result<(Vec<Card>, Vec<Card>), RepositoryError>> + Send;

    fn current_player(&self) -> impl Future<Output = Result<PlayerId, RepositoryError>> + Send;

    /// Replaces the current player in one step; readers never observe the
    /// pointer unset.
    fn set_current_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Cumulative score of every known player, ascending by id.
    fn cumulative_scores(
        &self,
    ) -> impl Future<Output = Result<Vec<(PlayerId, i64)>, RepositoryError>> + Send;

    /// Adds a round's points to a player's total and returns the new total.
    fn add_round_points(
        &self,
        id: PlayerId,
        points: i64,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PlayerRecord {
    name: String,
    active: bool,
    score: i64,
}

#[derive(Debug, Default)]
struct Store {
    last_id: u64,
    players: BTreeMap<PlayerId, PlayerRecord>,
    hands: HashMap<PlayerId, Vec<Card>>,
    current: Option<PlayerId>,
}

impl Store {
    fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerRecord, RepositoryError> {
        self.players
            .get_mut(&id)
            .ok_or(RepositoryError::UnknownPlayer(id))
    }

    fn position(&self, player: PlayerId, card: Card) -> Result<usize, RepositoryError> {
        self.hands
            .get(&player)
            .ok_or(RepositoryError::NoHand(player))?
            .iter()
            .position(|held| *held == card)
            .ok_or(RepositoryError::CardNotHeld { player, card })
    }
}

/// In-process [`Repository`]. State lives for the life of the process.
///
/// A single `std::sync::Mutex` guards the whole store; no method awaits
/// while holding it.
#[derive(Debug)]
pub struct MemoryRepository {
    max_players: usize,
    store: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            store: Mutex::new(Store::default()),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".into()))
    }
}

impl Repository for MemoryRepository {
    async fn register_player(&self, name: &str) -> Result<PlayerId, RepositoryError> {
        let mut store = self.store()?;
        let existing = store
            .players
            .iter()
            .find(|(_, record)| record.name == name)
            .map(|(id, record)| (*id, record.active));

        if let Some((_, true)) = existing {
            return Err(RepositoryError::NameTaken(name.to_owned()));
        }
        let active = store.players.values().filter(|r| r.active).count();
        if active >= self.max_players {
            return Err(RepositoryError::CapacityExceeded {
                max: self.max_players,
            });
        }

        if let Some((id, _)) = existing {
            store.player_mut(id)?.active = true;
            return Ok(id);
        }
        store.last_id += 1;
        let id = PlayerId(store.last_id);
        store.players.insert(
            id,
            PlayerRecord {
                name: name.to_owned(),
                active: true,
                score: 0,
            },
        );
        Ok(id)
    }

    async fn deactivate_player(&self, id: PlayerId) -> Result<(), RepositoryError> {
        self.store()?.player_mut(id)?.active = false;
        Ok(())
    }

    async fn active_player_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.store()?.players.values().filter(|r| r.active).count())
    }

    async fn active_player_ids(&self) -> Result<Vec<PlayerId>, RepositoryError> {
        Ok(self
            .store()?
            .players
            .iter()
            .filter(|(_, r)| r.active)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn clear_hands(&self) -> Result<(), RepositoryError> {
        self.store()?.hands.clear();
        Ok(())
    }

    async fn set_hand(&self, id: PlayerId, cards: Vec<Card>) -> Result<(), RepositoryError> {
        let mut store = self.store()?;
        store.player_mut(id)?;
        store.hands.insert(id, cards);
        Ok(())
    }

    async fn hand(&self, id: PlayerId) -> Result<Vec<Card>, RepositoryError> {
        self.store()?
            .hands
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NoHand(id))
    }

    async fn swap_cards(&self, swap: CardSwap) -> Result<(Vec<Card>, Vec<Card>), RepositoryError> {
        let mut store = self.store()?;
        let bid_at = store.position(swap.current, swap.bid)?;
        let offer_at = store.position(swap.offerer, swap.offered)?;

        if let Some(hand) = store.hands.get_mut(&swap.current) {
            hand[bid_at] = swap.offered;
        }
        if let Some(hand) = store.hands.get_mut(&swap.offerer) {
            hand[offer_at] = swap.bid;
        }

        let current = store.hands.get(&swap.current).cloned().unwrap_or_default();
        let offerer = store.hands.get(&swap.offerer).cloned().unwrap_or_default();
        Ok((current, offerer))
    }

    async fn current_player(&self) -> Result<PlayerId, RepositoryError> {
        self.store()?.current.ok_or(RepositoryError::NoCurrentPlayer)
    }

    async fn set_current_player(&self, id: PlayerId) -> Result<(), RepositoryError> {
        let mut store = self.store()?;
        store.player_mut(id)?;
        store.current = Some(id);
        Ok(())
    }

    async fn cumulative_scores(&self) -> Result<Vec<(PlayerId, i64)>, RepositoryError> {
        Ok(self
            .store()?
            .players
            .iter()
            .map(|(id, r)| (*id, r.score))
            .collect())
    }

    async fn add_round_points(&self, id: PlayerId, points: i64) -> Result<i64, RepositoryError> {
        let mut store = self.store()?;
        let record = store.player_mut(id)?;
        record.score += points;
        Ok(record.score)
    }
}
