//! Error types for the protocol layer.
//!
//! Decoding never panics: every way a line can be wrong maps onto one of
//! these variants, and the reader drops the frame.

/// Errors that can occur while building, encoding or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line doesn't start with a numeric type id.
    #[error("invalid message header: {0:?}")]
    InvalidHeader(String),

    /// No decoder is registered for this type id.
    #[error("unknown message type {0}")]
    UnknownType(i32),

    /// The parameters don't match the message's layout (wrong arity,
    /// non-numeric where a number is expected, out-of-range value).
    #[error("malformed {message} message: {reason}")]
    Malformed {
        message: &'static str,
        reason: String,
    },

    /// A text value would break the line format.
    #[error("invalid text {value:?}: {reason}")]
    InvalidText {
        value: String,
        reason: &'static str,
    },
}
