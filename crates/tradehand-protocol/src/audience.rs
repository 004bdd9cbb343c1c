//! Who an outbound event is for.
//!
//! The table never addresses sockets directly. It names an [`Audience`] and
//! the broadcaster applies [`Audience::includes`] to every live connection.
//! A connection that has not registered a player (no [`PlayerId`]) belongs
//! to the **hub**: the shared display that watches the whole table.

use tradehand_transport::ConnectionId;

use crate::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connection, players and hub alike.
    All,

    /// Only connections without a registered player.
    Hub,

    /// Only the connection(s) of one player.
    Player(PlayerId),

    /// One player plus the hub. Used for prompts the hub mirrors.
    PlayerAndHub(PlayerId),

    /// A set of players plus the hub.
    PlayersAndHub(Vec<PlayerId>),

    /// Everyone except one connection, typically the sender.
    Others(ConnectionId),
}

impl Audience {
    /// Whether a connection with the given identity should receive the event.
    pub fn includes(&self, connection: ConnectionId, player: Option<PlayerId>) -> bool {
        match self {
            Audience::All => true,
            Audience::Hub => player.is_none(),
            Audience::Player(id) => player == Some(*id),
            Audience::PlayerAndHub(id) => player.is_none_or(|p| p == *id),
            Audience::PlayersAndHub(ids) => player.is_none_or(|p| ids.contains(&p)),
            Audience::Others(sender) => connection != *sender,
        }
    }
}
