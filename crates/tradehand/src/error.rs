//! Unified error type for the Tradehand server.

use tradehand_protocol::ProtocolError;
use tradehand_table::{BroadcastError, TableError, TableStatus};
use tradehand_transport::TransportError;

use crate::ConfigError;

/// Top-level error wrapping every sub-crate error.
///
/// The `#[from]` variants let `?` lift sub-crate errors without mapping at
/// each call site.
#[derive(Debug, thiserror::Error)]
pub enum TradehandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Table(#[from] TableError),

    /// An event addressed to one connection could not be encoded.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The table stopped on its own, for a reason other than a clean finish.
    #[error("table stopped: {0}")]
    TableStopped(TableStatus),
}
