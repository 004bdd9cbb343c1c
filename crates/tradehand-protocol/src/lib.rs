//! Wire protocol for Tradehand.
//!
//! Every frame exchanged with a client is one JSON object of the shape
//! `{"type": <event name>, "event_data": <payload>}`:
//!
//! - **Types** ([`Card`], [`PlayerId`], [`Offer`], ...): the values that
//!   appear inside event payloads.
//! - **Events** ([`ServerEvent`], [`ClientEvent`]): everything the server
//!   announces and everything a client may ask for.
//! - **Audiences** ([`Audience`]): which connections an outbound event is
//!   meant for.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, events out.
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent) → Table (decisions)
//! Table (ServerEvent, Audience) → Protocol (frames) → Transport
//! ```

mod audience;
mod codec;
mod error;
mod events;
mod types;

pub use audience::Audience;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{Card, Offer, PlayerId, ScoreLine, SumLine, TableId};
