//! Connection registry and event fan-out.
//!
//! Every accepted connection gets a bounded outbound queue drained by its
//! own writer task. [`Hub`] keeps the queues keyed by connection, together
//! with the player each connection registered (if any), and implements
//! [`Broadcaster`] for the table: an event is encoded once and the same
//! frame is queued on every connection its [`Audience`] includes.
//!
//! A queue that is closed or full is dropped. Its writer then drains what
//! is left and closes the socket. The entry and its player binding stay
//! until the connection handler calls [`Hub::disconnect`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tradehand_protocol::{Audience, Codec, JsonCodec, PlayerId, ServerEvent};
use tradehand_table::{BroadcastError, Broadcaster};
use tradehand_transport::ConnectionId;

/// One encoded event, shared by every queue it is pushed to.
pub type Frame = Arc<[u8]>;

/// Frames a connection may have waiting before it counts as too slow.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

struct Peer {
    player: Option<PlayerId>,
    /// `None` once the queue was dropped.
    outbound: Option<mpsc::Sender<Frame>>,
}

impl Peer {
    fn push(&mut self, connection: ConnectionId, frame: Frame) -> bool {
        let Some(outbound) = &self.outbound else {
            return false;
        };
        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%connection, "outbound queue full, dropping slow connection");
                self.outbound = None;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%connection, "pruned closed connection");
                self.outbound = None;
                false
            }
        }
    }
}

pub struct Hub<C = JsonCodec> {
    codec: C,
    queue_capacity: usize,
    peers: Mutex<HashMap<ConnectionId, Peer>>,
}

impl<C: Codec> Hub<C> {
    pub fn new(codec: C) -> Self {
        Self::with_queue_capacity(codec, OUTBOUND_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(codec: C, queue_capacity: usize) -> Self {
        Self {
            codec,
            queue_capacity: queue_capacity.max(1),
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    // Peers are inserted and removed whole, so a poisoned map is still usable.
    fn peers(&self) -> MutexGuard<'_, HashMap<ConnectionId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new connection as part of the hub and returns the queue
    /// its writer task drains.
    pub fn connect(&self, connection: ConnectionId) -> mpsc::Receiver<Frame> {
        let (outbound, rx) = mpsc::channel(self.queue_capacity);
        self.peers().insert(
            connection,
            Peer {
                player: None,
                outbound: Some(outbound),
            },
        );
        rx
    }

    /// Binds a registered player to the connection. From now on the
    /// connection receives that player's events instead of the hub's.
    pub fn attach(&self, connection: ConnectionId, player: PlayerId) {
        if let Some(peer) = self.peers().get_mut(&connection) {
            peer.player = Some(player);
        }
    }

    /// Forgets the connection and closes its queue. Returns the player it
    /// was bound to, even if the queue had already been dropped.
    pub fn disconnect(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.peers().remove(&connection).and_then(|peer| peer.player)
    }

    /// Connections whose queue is still open.
    pub fn connection_count(&self) -> usize {
        self.peers()
            .values()
            .filter(|peer| peer.outbound.is_some())
            .count()
    }

    /// Sends an event to exactly one connection.
    pub fn send_to(&self, connection: ConnectionId, event: &ServerEvent) -> Result<(), BroadcastError> {
        let frame = self.encode(event)?;
        let delivered = self
            .peers()
            .get_mut(&connection)
            .is_some_and(|peer| peer.push(connection, frame));
        if !delivered {
            tracing::debug!(%connection, event = event.name(), "connection gone, event dropped");
        }
        Ok(())
    }

    fn encode(&self, event: &ServerEvent) -> Result<Frame, BroadcastError> {
        self.codec
            .encode(event)
            .map(Frame::from)
            .map_err(|source| BroadcastError::Encode {
                event: event.name(),
                source,
            })
    }

    fn fan_out(&self, audience: &Audience, event: &ServerEvent) -> Result<usize, BroadcastError> {
        let frame = self.encode(event)?;
        let mut delivered = 0;
        for (connection, peer) in self.peers().iter_mut() {
            if audience.includes(*connection, peer.player) && peer.push(*connection, Arc::clone(&frame)) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

impl Default for Hub<JsonCodec> {
    fn default() -> Self {
        Self::new(JsonCodec)
    }
}

impl<C: Codec> Broadcaster for Hub<C> {
    async fn broadcast(&self, audience: Audience, event: &ServerEvent) -> Result<(), BroadcastError> {
        let delivered = self.fan_out(&audience, event)?;
        tracing::debug!(event = event.name(), ?audience, delivered, "event queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradehand_protocol::Card;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn text(frame: Frame) -> String {
        String::from_utf8(frame.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_hub_routes_private_event_to_owner_only() {
        let hub = Hub::default();
        let mut alice = hub.connect(conn(1));
        let mut bob = hub.connect(conn(2));
        let mut screen = hub.connect(conn(3));
        hub.attach(conn(1), PlayerId(1));
        hub.attach(conn(2), PlayerId(2));

        let event = ServerEvent::CardsDealt {
            cards: vec![Card::real(1, 1)],
        };
        hub.broadcast(Audience::Player(PlayerId(1)), &event)
            .await
            .unwrap();

        assert!(text(alice.try_recv().unwrap()).contains("cards_dealt"));
        assert!(bob.try_recv().is_err());
        assert!(screen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hub_player_and_hub_reaches_unregistered_connections() {
        let hub = Hub::default();
        let mut alice = hub.connect(conn(1));
        let mut bob = hub.connect(conn(2));
        let mut screen = hub.connect(conn(3));
        hub.attach(conn(1), PlayerId(1));
        hub.attach(conn(2), PlayerId(2));

        let event = ServerEvent::EndOfRound { timeout: 3000 };
        hub.broadcast(Audience::PlayerAndHub(PlayerId(2)), &event)
            .await
            .unwrap();

        assert!(alice.try_recv().is_err());
        assert!(bob.try_recv().is_ok());
        assert_eq!(
            text(screen.try_recv().unwrap()),
            r#"{"type":"end_of_round","event_data":{"timeout":3000}}"#
        );
    }

    #[tokio::test]
    async fn test_hub_skips_and_prunes_closed_connections() {
        let hub = Hub::default();
        let gone = hub.connect(conn(1));
        let mut alive = hub.connect(conn(2));
        drop(gone);

        hub.broadcast(Audience::All, &ServerEvent::DealingCards {})
            .await
            .unwrap();

        assert!(alive.try_recv().is_ok());
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_hub_others_excludes_sender() {
        let hub = Hub::default();
        let mut sender = hub.connect(conn(1));
        let mut other = hub.connect(conn(2));

        let event = ServerEvent::PlayerJoined {
            player_id: PlayerId(1),
            name: "ann".into(),
        };
        hub.broadcast(Audience::Others(conn(1)), &event).await.unwrap();

        assert!(sender.try_recv().is_err());
        assert!(other.try_recv().is_ok());
    }

    #[test]
    fn test_hub_send_to_single_connection() {
        let hub = Hub::default();
        let mut first = hub.connect(conn(1));
        let mut second = hub.connect(conn(2));

        let event = ServerEvent::SetNameResponse {
            assigned_player_id: PlayerId(7),
        };
        hub.send_to(conn(1), &event).unwrap();

        assert!(text(first.try_recv().unwrap()).contains("\"assigned_player_id\":7"));
        assert!(second.try_recv().is_err());
    }

    #[test]
    fn test_hub_disconnect_returns_attached_player() {
        let hub = Hub::default();
        let _rx = hub.connect(conn(1));
        let _screen = hub.connect(conn(2));
        hub.attach(conn(1), PlayerId(4));

        assert_eq!(hub.disconnect(conn(1)), Some(PlayerId(4)));
        assert_eq!(hub.disconnect(conn(2)), None);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_hub_pruned_connection_keeps_player_binding() {
        let hub = Hub::default();
        let writer = hub.connect(conn(1));
        hub.attach(conn(1), PlayerId(3));
        drop(writer);

        hub.broadcast(Audience::All, &ServerEvent::DealingCards {})
            .await
            .unwrap();
        assert_eq!(hub.connection_count(), 0);

        assert_eq!(hub.disconnect(conn(1)), Some(PlayerId(3)));
    }

    #[tokio::test]
    async fn test_hub_full_queue_drops_slow_connection() {
        let hub = Hub::with_queue_capacity(JsonCodec, 2);
        let mut slow = hub.connect(conn(1));
        let mut fast = hub.connect(conn(2));
        hub.attach(conn(1), PlayerId(1));

        for _ in 0..3 {
            hub.broadcast(Audience::All, &ServerEvent::DealingCards {})
                .await
                .unwrap();
            assert!(fast.try_recv().is_ok());
        }

        assert_eq!(hub.connection_count(), 1);
        // The two queued frames still drain, then the queue reports closed.
        assert!(slow.try_recv().is_ok());
        assert!(slow.try_recv().is_ok());
        assert!(matches!(
            slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(hub.disconnect(conn(1)), Some(PlayerId(1)));
    }
}
