//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown `"type"` tag,
    /// missing fields, or a truncated buffer.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates a protocol rule (e.g. a second
    /// `session:join` on an already-joined connection).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
