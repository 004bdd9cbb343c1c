//! Error types for the protocol layer.

/// Failures turning events into frames or frames into events.
///
/// A `Decode` error on an inbound frame is never fatal: the caller logs it
/// and drops the frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Malformed JSON, an unknown `type`, or a payload of the wrong shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed but semantically invalid, e.g. an empty player name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
