//! Codec trait and the JSON implementation used on the wire.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to frames and decodes frames back to values.
///
/// `Send + Sync + 'static` so one codec can be shared by every connection
/// task and the broadcast hub.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON codec backed by `serde_json`. Browser clients read these frames
/// directly, so this is the only codec the server uses.
///
/// ```rust
/// use tradehand_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let bytes = JsonCodec.encode(&ServerEvent::DealingCards {}).unwrap();
/// assert_eq!(bytes, br#"{"type":"dealing_cards","event_data":{}}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
