//! Error types for the session layer.

use tradewind_transport::{ConnectionId, TransportError};

use crate::QueueError;

/// Errors that can occur while tracking connections and routing messages.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) turned the player away.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The nickname has an account and the password didn't match.
    #[error("wrong password for {0}")]
    WrongPassword(String),

    /// Another connection already uses this nickname.
    #[error("nickname {0:?} is already in use")]
    NameInUse(String),

    /// No connection with this id is registered.
    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    /// A capped queue refused a deposit.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The reader thread couldn't be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
