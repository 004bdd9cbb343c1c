//! The per-round deck and the deal.

use rand::Rng;
use rand::seq::SliceRandom;
use tradehand_protocol::{Card, PlayerId};

/// Number of card types (and of fake cards, one per type).
pub const KINDS: u8 = 4;
/// Cards per hand.
pub const HAND_SIZE: usize = 5;
/// Players at a table.
pub const SEATS: usize = 4;
/// 16 real cards plus 4 fakes: exactly enough for four hands.
pub const DECK_SIZE: usize = HAND_SIZE * SEATS;

/// A shuffled deck holding every card of the game exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundDeck([Card; DECK_SIZE]);

impl RoundDeck {
    pub fn cards(&self) -> &[Card] {
        &self.0
    }
}

/// Builds the 20-card deck and shuffles it with `rng`.
pub fn build_round_deck<R: Rng + ?Sized>(rng: &mut R) -> RoundDeck {
    let reals = (1..=KINDS).flat_map(|kind| (1..=4).map(move |id| Card::real(id, kind)));
    let fakes = (1..=KINDS).map(Card::fake);

    let mut cards = [Card::fake(1); DECK_SIZE];
    for (slot, card) in cards.iter_mut().zip(reals.chain(fakes)) {
        *slot = card;
    }
    cards.shuffle(rng);
    RoundDeck(cards)
}

/// Deals five consecutive cards to each seat, in seat order.
pub fn deal(seats: &[PlayerId; SEATS], deck: RoundDeck) -> Vec<(PlayerId, Vec<Card>)> {
    seats
        .iter()
        .zip(deck.0.chunks_exact(HAND_SIZE))
        .map(|(id, hand)| (*id, hand.to_vec()))
        .collect()
}
