use std::fmt;

/// Why a connect attempt on the in-process transport failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannotConnect {
    /// No listener is bound under that name.
    NotFound,
    /// The listener's backlog of waiting connections is full.
    Full,
    /// The listener shut down before accepting.
    Closed,
}

impl fmt::Display for CannotConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "no such port",
            Self::Full => "backlog full",
            Self::Closed => "port closed",
        })
    }
}

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending before the server accepted the connection.
    #[error("connection not yet accepted")]
    NotAccepted,

    /// `accepted` is set exactly once.
    #[error("connection already accepted")]
    AlreadyAccepted,

    /// The connection name is set once, after authentication.
    #[error("connection name already set")]
    NameAlreadySet,

    /// Couldn't reach an in-process listener.
    #[error("cannot connect to {port:?}: {reason}")]
    CannotConnect { port: String, reason: CannotConnect },

    /// A listener is already bound under this name.
    #[error("port {0:?} already bound")]
    PortInUse(String),

    /// A frame longer than the framing allows.
    #[error("frame too large: {0} bytes (max {max})", max = crate::MAX_FRAME_LEN)]
    FrameTooLarge(usize),

    /// A frame that isn't UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    pub(crate) fn cannot_connect(port: &str, reason: CannotConnect) -> Self {
        Self::CannotConnect {
            port: port.to_string(),
            reason,
        }
    }
}
