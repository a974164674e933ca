//! Codec seam: how frames and events become bytes.
//!
//! The transport layer moves opaque byte buffers; the [`Codec`] trait is
//! the single place where those bytes meet serde. [`JsonCodec`] is the
//! only implementation today — the clients are browsers, so a
//! human-readable format earns its keep — but keeping the seam means a
//! binary codec slots in without touching the handler.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientFrame, ServerEvent};

    #[test]
    fn test_frame_round_trip() {
        let codec = JsonCodec;
        let frame = ClientFrame::Ping;
        let bytes = codec.encode(&frame).unwrap();
        let back: ClientFrame = codec.decode(&bytes).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn test_event_round_trip() {
        let codec = JsonCodec;
        let event = ServerEvent::error("bad frame");
        let bytes = codec.encode(&event).unwrap();
        let back: ServerEvent = codec.decode(&bytes).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let codec = JsonCodec;
        let result: Result<ClientFrame, _> = codec.decode(b"not json");
        assert!(result.is_err());
    }
}
