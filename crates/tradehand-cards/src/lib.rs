//! Cards for Tradehand: building and dealing a round deck, and scoring the
//! hands that come out of it.
//!
//! Everything here is pure. Randomness is always passed in by the caller so
//! a seeded generator reproduces a round exactly.

mod deck;
mod error;
mod evaluator;

pub use deck::{DECK_SIZE, HAND_SIZE, KINDS, RoundDeck, SEATS, build_round_deck, deal};
pub use error::HandError;
pub use evaluator::{Category, PointsTable, can_finish_round, classify, discount, score};
