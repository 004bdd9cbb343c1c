//! The game table for Tradehand.
//!
//! A table is one actor task that owns player registration and at most one
//! running game. The game itself is driven by an orchestrator task that
//! walks each round through its phases, waiting on player decisions or
//! deadlines and announcing every step through a [`Broadcaster`].
//!
//! # Key types
//!
//! - [`spawn_table`] / [`TableHandle`]: start a table and talk to it
//! - [`Repository`]: persistence contract ([`MemoryRepository`] in-process)
//! - [`Broadcaster`]: fan-out contract implemented by the server
//! - [`Decision`]: player input forwarded into the open decision window
//! - [`Phase`] / [`TableStatus`]: what the table is doing right now
//! - [`TableConfig`]: seats, timings, points, round limit, seed

#![allow(async_fn_in_trait)]

mod broadcast;
mod config;
mod decision;
mod error;
mod orchestrator;
mod repository;
mod table;

pub use broadcast::Broadcaster;
pub use config::{Phase, PhaseTimings, TableConfig, TableStatus};
pub use decision::{Decision, DecisionKind};
pub use error::{BroadcastError, DecisionRejected, RepositoryError, TableError};
pub use orchestrator::{GameOutcome, next_seat};
pub use repository::{CardSwap, MemoryRepository, Repository};
pub use table::{TableHandle, TableInfo, spawn_table};
