//! Per-connection handler: registration and decision routing.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task draining the connection's hub queue. The flow is:
//!   1. Join the hub (an unregistered connection sees hub events)
//!   2. Loop: decode client events
//!      - `set_name_request` registers a player and takes a seat
//!      - bids, offers, and offer picks go to the table as decisions
//!   3. On close: leave the hub, mark the player inactive
//!
//! The writer closes the socket when its queue ends, either because the
//! handler left the hub or because the hub dropped a slow connection. The
//! read side then sees the close and the player is marked inactive.

use std::sync::Arc;

use tokio::sync::mpsc;
use tradehand_protocol::{Audience, ClientEvent, Codec, PlayerId, ProtocolError, ServerEvent};
use tradehand_table::{Broadcaster, Decision, RepositoryError, TableError};
use tradehand_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::TradehandError;
use crate::hub::Frame;
use crate::server::ServerState;

/// Status code sent when a registration is refused.
pub const REGISTRATION_REFUSED: u16 = 409;

/// Status code sent for a well-formed but invalid request.
pub const INVALID_REQUEST: u16 = 400;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TradehandError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let outbound = state.hub.connect(conn_id);
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), outbound));

    let mut player = None;
    let result = read_loop(&conn, &state, &mut player).await;

    // Dropping the hub entry closes the queue, so the writer flushes what is
    // left and exits.
    state.hub.disconnect(conn_id);
    if let Some(player_id) = player {
        tracing::info!(%conn_id, %player_id, "player disconnected");
        if let Err(e) = state.table.leave(player_id).await {
            tracing::warn!(%player_id, error = %e, "could not mark player inactive");
        }
    }
    let _ = writer.await;
    result
}

async fn write_loop(conn: Arc<WebSocketConnection>, mut outbound: mpsc::Receiver<Frame>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
    let _ = conn.close().await;
}

async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    player: &mut Option<PlayerId>,
) -> Result<(), TradehandError> {
    let conn_id = conn.id();
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
        };

        let event: ClientEvent = match state.hub.codec().decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        match event {
            ClientEvent::SetNameRequest { name } => {
                register(conn_id, state, player, name).await?;
            }
            other => forward_decision(conn_id, state, *player, other),
        }
    }
}

/// Registers the connection's player and seats them. A refused registration
/// is answered with an `error` event and leaves the connection in the hub.
async fn register<C: Codec>(
    conn_id: ConnectionId,
    state: &ServerState<C>,
    player: &mut Option<PlayerId>,
    name: String,
) -> Result<(), TradehandError> {
    if let Some(player_id) = player {
        tracing::warn!(%conn_id, %player_id, "connection already registered, ignoring");
        return Ok(());
    }
    let name = match validate_name(name) {
        Ok(name) => name,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "registration refused");
            state.hub.send_to(
                conn_id,
                &ServerEvent::Error {
                    code: INVALID_REQUEST,
                    message: e.to_string(),
                },
            )?;
            return Ok(());
        }
    };

    let player_id = match state.table.register(name.as_str()).await {
        Ok(player_id) => player_id,
        Err(TableError::Repository(
            e @ (RepositoryError::CapacityExceeded { .. } | RepositoryError::NameTaken(_)),
        )) => {
            state.hub.send_to(
                conn_id,
                &ServerEvent::Error {
                    code: REGISTRATION_REFUSED,
                    message: e.to_string(),
                },
            )?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // The reply goes out before the connection is bound to the player, so
    // nothing addressed to the player can overtake it.
    state.hub.send_to(
        conn_id,
        &ServerEvent::SetNameResponse {
            assigned_player_id: player_id,
        },
    )?;
    state.hub.attach(conn_id, player_id);
    *player = Some(player_id);
    tracing::info!(%conn_id, %player_id, player_name = %name, "player joined");

    state
        .hub
        .broadcast(Audience::Others(conn_id), &ServerEvent::PlayerJoined { player_id, name })
        .await?;

    if state.table.take_seat(player_id).await? {
        tracing::info!(%player_id, "table is full, game starting");
    }
    Ok(())
}

/// Trims the requested name and refuses a blank one.
fn validate_name(name: String) -> Result<String, ProtocolError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::InvalidMessage("player name is empty".into()));
    }
    if trimmed.len() == name.len() {
        Ok(name)
    } else {
        Ok(trimmed.to_string())
    }
}

fn forward_decision<C: Codec>(
    conn_id: ConnectionId,
    state: &ServerState<C>,
    player: Option<PlayerId>,
    event: ClientEvent,
) {
    let Some(player) = player else {
        tracing::debug!(%conn_id, event = event.name(), "decision from unregistered connection");
        return;
    };

    let decision = match event {
        ClientEvent::BidSelected {
            card,
            is_round_over,
        } => Decision::Bid {
            player,
            card,
            round_done: is_round_over,
        },
        ClientEvent::OfferSelected { card } => Decision::Offer { player, card },
        ClientEvent::PlayerChooseOffer { player_id } => Decision::SelectOffer {
            player,
            offerer: player_id,
        },
        ClientEvent::SetNameRequest { .. } => return,
    };

    let kind = decision.kind();
    match state.table.submit(decision) {
        Ok(generation) => {
            tracing::debug!(%player, %kind, generation, "decision accepted");
        }
        Err(e) => {
            tracing::debug!(%player, %kind, error = %e, "decision rejected");
        }
    }
}
