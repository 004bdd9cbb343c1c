//! Server configuration and its environment overrides.
//!
//! | variable              | effect                                   |
//! |-----------------------|------------------------------------------|
//! | `PORT`                | listen on `0.0.0.0:<PORT>` (default 8080) |
//! | `MAX_PLAYERS`         | active player limit, at least 4          |
//! | `ROUNDS_LIMIT`        | stop after this many rounds              |
//! | `TABLE_SEED`          | deterministic shuffles and fallbacks     |
//! | `TIMEOUT_<NAME>_MS`   | one phase timing, e.g. `TIMEOUT_CHOOSE_BID_MS` |

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tradehand_cards::SEATS;
use tradehand_table::{PhaseTimings, TableConfig};

pub const DEFAULT_PORT: u16 = 8080;

/// Names accepted in `TIMEOUT_<NAME>_MS`.
pub const TIMING_NAMES: [&str; 11] = [
    "CHOOSE_BID",
    "SHOW_BID",
    "CHOOSE_OFFER",
    "SELECT_OFFER",
    "BETWEEN_ACTIONS",
    "OFFERS_FINISHED",
    "SHOW_SELECTED_OFFER",
    "PREPARE_FOR_NEXT_TURN",
    "END_OF_ROUND",
    "UPDATE_SCORE",
    "SUM_SCORE",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub table: TableConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            table: TableConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("PORT") {
            let port: u16 = parse("PORT", &value)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(value) = lookup("MAX_PLAYERS") {
            let max: usize = parse("MAX_PLAYERS", &value)?;
            if max < SEATS {
                return Err(invalid("MAX_PLAYERS", &value, format!("must be at least {SEATS}")));
            }
            config.table.max_players = max;
        }
        if let Some(value) = lookup("ROUNDS_LIMIT") {
            config.table.rounds_limit = Some(parse("ROUNDS_LIMIT", &value)?);
        }
        if let Some(value) = lookup("TABLE_SEED") {
            config.table.seed = Some(parse("TABLE_SEED", &value)?);
        }

        for name in TIMING_NAMES {
            let key = format!("TIMEOUT_{name}_MS");
            if let Some(value) = lookup(&key) {
                let millis: u64 = parse(&key, &value)?;
                if let Some(timing) = timing_mut(&mut config.table.timings, name) {
                    *timing = Duration::from_millis(millis);
                }
            }
        }

        Ok(config)
    }
}

fn timing_mut<'a>(timings: &'a mut PhaseTimings, name: &str) -> Option<&'a mut Duration> {
    let timing = match name {
        "CHOOSE_BID" => &mut timings.choose_bid,
        "SHOW_BID" => &mut timings.show_bid,
        "CHOOSE_OFFER" => &mut timings.choose_offer,
        "SELECT_OFFER" => &mut timings.select_offer,
        "BETWEEN_ACTIONS" => &mut timings.between_actions,
        "OFFERS_FINISHED" => &mut timings.offers_finished,
        "SHOW_SELECTED_OFFER" => &mut timings.show_selected_offer,
        "PREPARE_FOR_NEXT_TURN" => &mut timings.prepare_for_next_turn,
        "END_OF_ROUND" => &mut timings.end_of_round,
        "UPDATE_SCORE" => &mut timings.update_score,
        "SUM_SCORE" => &mut timings.sum_score,
        _ => return None,
    };
    Some(timing)
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn invalid(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}
