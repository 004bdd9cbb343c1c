//! Transport errors.

use std::io;
#[cfg(feature = "websocket")]
use std::net::SocketAddr;

#[cfg(feature = "websocket")]
use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener or accepting a TCP stream failed.
    #[error("listener error: {0}")]
    Listen(#[source] io::Error),

    /// A client connected but the WebSocket upgrade failed.
    #[cfg(feature = "websocket")]
    #[error("handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    /// The connection is already closed, by us or by the peer.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[cfg(feature = "websocket")]
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    #[cfg(feature = "websocket")]
    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
}
