//! Hand scoring.
//!
//! A hand's round score is a fake-card discount plus the bonus of its best
//! category. Categories are checked in a fixed order and the first match
//! wins:
//!
//! | category          | shape (cards per type)          |
//! |-------------------|---------------------------------|
//! | fake poker        | all four fake cards             |
//! | poker             | some type held 4+ times         |
//! | one of each       | all four types present          |
//! | full house        | no singleton, nothing above 3   |
//! | three of a kind   | exactly one triple              |
//! | two pair          | exactly two pairs               |
//! | pair              | exactly one pair                |
//!
//! Five cards over four types always repeat a type, and every five-card
//! shape is caught before `pair` (a `{2,1,1,1}` hand is one of each). So
//! [`Category::Pair`] and [`Category::Nothing`] only exist for
//! completeness; no valid hand reaches them.

use serde::{Deserialize, Serialize};
use tradehand_protocol::Card;

use crate::{HAND_SIZE, HandError, KINDS};

/// Point values for each category and discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsTable {
    pub fake_one: i64,
    pub fake_two: i64,
    pub fake_three: i64,
    pub fake_poker: i64,
    pub poker: i64,
    pub one_of_each: i64,
    pub full_house: i64,
    pub three_of_a_kind: i64,
    pub two_pair: i64,
    pub pair: i64,
}

impl Default for PointsTable {
    fn default() -> Self {
        Self {
            fake_one: -5,
            fake_two: -10,
            fake_three: -20,
            fake_poker: 100,
            poker: 50,
            one_of_each: 40,
            full_house: 30,
            three_of_a_kind: 20,
            two_pair: 10,
            pair: 5,
        }
    }
}

impl PointsTable {
    fn bonus(&self, category: Category) -> i64 {
        match category {
            Category::FakePoker => self.fake_poker,
            Category::Poker => self.poker,
            Category::OneOfEach => self.one_of_each,
            Category::FullHouse => self.full_house,
            Category::ThreeOfAKind => self.three_of_a_kind,
            Category::TwoPair => self.two_pair,
            Category::Pair => self.pair,
            Category::Nothing => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FakePoker,
    Poker,
    OneOfEach,
    FullHouse,
    ThreeOfAKind,
    TwoPair,
    Pair,
    Nothing,
}

struct Shape {
    per_kind: [usize; KINDS as usize],
    fakes: usize,
}

impl Shape {
    fn of(hand: &[Card]) -> Result<Self, HandError> {
        if hand.len() != HAND_SIZE {
            return Err(HandError::WrongSize(hand.len()));
        }
        let mut per_kind = [0; KINDS as usize];
        let mut fakes = 0;
        for card in hand {
            if !(1..=KINDS).contains(&card.kind) {
                return Err(HandError::InvalidType(card.kind));
            }
            per_kind[usize::from(card.kind - 1)] += 1;
            if !card.is_real {
                fakes += 1;
            }
        }
        if fakes > usize::from(KINDS) {
            return Err(HandError::TooManyFakes(fakes));
        }
        Ok(Self { per_kind, fakes })
    }

    fn kinds_with(&self, count: usize) -> usize {
        self.per_kind.iter().filter(|&&c| c == count).count()
    }

    fn category(&self) -> Category {
        if self.fakes == usize::from(KINDS) {
            Category::FakePoker
        } else if self.per_kind.iter().any(|&c| c >= 4) {
            Category::Poker
        } else if self.per_kind.iter().all(|&c| c > 0) {
            Category::OneOfEach
        } else if self.per_kind.iter().all(|&c| c != 1 && c <= 3) {
            Category::FullHouse
        } else if self.kinds_with(3) == 1 {
            Category::ThreeOfAKind
        } else if self.kinds_with(2) == 2 {
            Category::TwoPair
        } else if self.kinds_with(2) == 1 {
            Category::Pair
        } else {
            Category::Nothing
        }
    }
}

/// The best category of a five-card hand.
pub fn classify(hand: &[Card]) -> Result<Category, HandError> {
    Ok(Shape::of(hand)?.category())
}

/// Penalty for holding fake cards. Holding all four is not penalised;
/// that hand scores as fake poker instead.
pub fn discount(hand: &[Card], points: &PointsTable) -> Result<i64, HandError> {
    let shape = Shape::of(hand)?;
    Ok(match shape.fakes {
        1 => points.fake_one,
        2 => points.fake_two,
        3 => points.fake_three,
        _ => 0,
    })
}

/// Round points for a hand: discount plus category bonus.
pub fn score(hand: &[Card], points: &PointsTable) -> Result<i64, HandError> {
    let category = classify(hand)?;
    Ok(discount(hand, points)? + points.bonus(category))
}

/// Whether the holder may end the round with this hand.
pub fn can_finish_round(hand: &[Card]) -> Result<bool, HandError> {
    Ok(matches!(
        classify(hand)?,
        Category::FakePoker | Category::Poker | Category::OneOfEach
    ))
}
