//! # Tradehand
//!
//! Server for a four-player card-swap table played over WebSockets.
//!
//! Players connect, register a name, and once four are seated the table
//! deals a round: each turn one player bids a card face down, the others
//! offer a card in exchange, and the bidder takes one offer. Any
//! connection that never registers is a **hub**, a shared display that
//! mirrors the table.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradehand::prelude::*;
//!
//! # async fn run() -> Result<(), TradehandError> {
//! let config = ServerConfig::from_env()?;
//! let server = TradehandServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod server;

pub use config::{ConfigError, DEFAULT_PORT, ServerConfig, TIMING_NAMES};
pub use error::TradehandError;
pub use handler::{INVALID_REQUEST, REGISTRATION_REFUSED};
pub use hub::{Frame, Hub, OUTBOUND_QUEUE_CAPACITY};
pub use server::{TradehandServer, TradehandServerBuilder};

pub mod prelude {
    pub use crate::{ConfigError, ServerConfig, TradehandError, TradehandServer, TradehandServerBuilder};
    pub use tradehand_protocol::{Audience, Card, ClientEvent, Offer, PlayerId, ServerEvent};
    pub use tradehand_table::{PhaseTimings, TableConfig, TableStatus};
}
