//! Fan-out contract between the table and the connections.

use std::future::Future;

use tradehand_protocol::{Audience, ServerEvent};

use crate::BroadcastError;

/// Delivers a server event to every live connection the audience includes.
///
/// Connections that are gone are skipped; that is not an error. An error
/// means the event could not be produced or the fan-out itself is dead, and
/// it stops the game.
///
/// # Example
///
/// ```rust
/// use std::sync::Mutex;
/// use tradehand_protocol::{Audience, ServerEvent};
/// use tradehand_table::{BroadcastError, Broadcaster};
///
/// /// Keeps every event, for tests and replays.
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<(Audience, ServerEvent)>>);
///
/// impl Broadcaster for Recorder {
///     async fn broadcast(
///         &self,
///         audience: Audience,
///         event: &ServerEvent,
///     ) -> Result<(), BroadcastError> {
///         self.0
///             .lock()
///             .map_err(|_| BroadcastError::Closed)?
///             .push((audience, event.clone()));
///         Ok(())
///     }
/// }
/// ```
pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(
        &self,
        audience: Audience,
        event: &ServerEvent,
    ) -> impl Future<Output = Result<(), BroadcastError>> + Send;
}
