/// A hand that breaks the card invariants. The dealer never produces one,
/// so seeing this error means table state is corrupt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandError {
    #[error("hand has {0} cards, expected 5")]
    WrongSize(usize),

    #[error("card type {0} is outside 1..=4")]
    InvalidType(u8),

    #[error("hand holds {0} fake cards, at most 4 exist")]
    TooManyFakes(usize),
}
