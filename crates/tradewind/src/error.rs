//! Unified error type for Tradewind.

use tradewind_game::GameError;
use tradewind_protocol::ProtocolError;
use tradewind_session::SessionError;
use tradewind_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tradewind` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TradewindError {
    /// A transport-level error (connect, send, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, invalid text).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, names, queues).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game rule rejected an action.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A configuration file didn't parse.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    /// A background thread couldn't be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The server refused the connection.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// A server was built without any listener.
    #[error("no listener configured; call bind() or local()")]
    NoListener,
}
