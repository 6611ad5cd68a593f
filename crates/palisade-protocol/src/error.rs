//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
///
/// The decode message ends up in front of players (it becomes the
/// `message` of the next prompt when an action reply is malformed), so
/// the wording stays short and lower case.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or a
    /// value of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
