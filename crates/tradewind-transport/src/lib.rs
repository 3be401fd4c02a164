//! Transport abstraction layer for Tradewind.
//!
//! Provides the [`Transport`] and [`Connection`] traits so the rest of the
//! system never branches on how bytes move. Two implementations:
//!
//! - [`LocalConnection`] / [`LocalListener`]: paired in-process endpoints,
//!   found through a named [`LocalRegistry`]
//! - [`TcpConnection`] / [`TcpTransport`]: sockets with length-prefixed
//!   frames
//!
//! Everything here is blocking and thread-based: one reader thread per
//! connection sits in [`Connection::recv`], while any thread may call
//! [`Connection::send`].
//!
//! # Feature Flags
//!
//! - `tcp` (default): the socket transport

mod error;
#[cfg(feature = "tcp")]
mod framing;
mod lifecycle;
mod local;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::{CannotConnect, TransportError};
#[cfg(feature = "tcp")]
pub use framing::{read_frame, write_frame};
pub use lifecycle::{Lifecycle, LinkState};
pub use local::{LocalConnection, LocalListener, LocalRegistry};
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest frame payload, in bytes.
pub const MAX_FRAME_LEN: usize = 65535;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// A fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Blocks until the next incoming connection, already marked accepted.
    ///
    /// Returns [`TransportError::Shutdown`] once [`shutdown`](Self::shutdown)
    /// has been called.
    fn accept(&self) -> Result<Self::Connection, TransportError>;

    /// Stops accepting. Wakes a blocked `accept`.
    fn shutdown(&self) -> Result<(), TransportError>;

    /// Where this transport listens, for logs.
    fn local_name(&self) -> String;
}

/// A single connection that carries text frames both ways.
pub trait Connection: Send + Sync + 'static {
    fn id(&self) -> ConnectionId;

    fn lifecycle(&self) -> &Lifecycle;

    /// The peer's address or port name, for logs.
    fn peer(&self) -> String;

    /// Queues one frame for the peer. Never blocks on the network.
    ///
    /// Fails if the connection isn't accepted yet, is closed, or the frame
    /// is too long.
    fn send(&self, line: &str) -> Result<(), TransportError>;

    /// Blocks for the next frame. `Ok(None)` means the connection ended
    /// (peer disconnect, local disconnect, or soft close).
    ///
    /// Only the connection's reader thread should call this.
    fn recv(&self) -> Result<Option<String>, TransportError>;

    /// Closes the connection and tells the peer, if possible. Idempotent:
    /// the peer is notified at most once. Wakes a blocked `recv`.
    fn disconnect(&self);

    /// Stops inbound reads, lets already-queued outbound frames drain, then
    /// closes.
    fn disconnect_soft(&self);

    fn name(&self) -> Option<String> {
        self.lifecycle().name().map(str::to_string)
    }

    /// Sets the connection's name. Only once, after authentication.
    fn set_name(&self, name: &str) -> Result<(), TransportError> {
        self.lifecycle().set_name(name)
    }

    fn is_accepted(&self) -> bool {
        self.lifecycle().is_accepted()
    }

    fn is_closed(&self) -> bool {
        self.lifecycle().is_closed()
    }

    fn state(&self) -> LinkState {
        self.lifecycle().state()
    }

    /// The failure that closed the connection, if any.
    fn last_error(&self) -> Option<String> {
        self.lifecycle().last_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
    }
}
