//! The per-connection reader thread.
//!
//! One OS thread per connection blocks in [`Connection::recv`], decodes each
//! frame and hands it to a [`Handler`]. Frames that don't decode are logged
//! and dropped; the thread keeps reading. When the connection ends, for any
//! reason, the handler hears about it exactly once through
//! [`Handler::on_lost`] and the thread exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tradewind_protocol::{Codec, Message};
use tradewind_transport::Connection;

use crate::SessionError;

/// Receives what a reader thread reads.
///
/// All methods run on the connection's reader thread.
pub trait Handler: Send + Sync + 'static {
    /// The first message that decoded. Usually the version handshake.
    fn on_first(&self, conn: &Arc<dyn Connection>, message: Message) {
        self.on_message(conn, message);
    }

    fn on_message(&self, conn: &Arc<dyn Connection>, message: Message);

    /// The connection ended. `error` is the transport failure, if there was
    /// one; `None` means an orderly close.
    fn on_lost(&self, conn: &Arc<dyn Connection>, error: Option<String>);
}

/// Starts the reader thread for `conn`.
pub fn spawn_reader(
    conn: Arc<dyn Connection>,
    codec: Arc<dyn Codec>,
    handler: Arc<dyn Handler>,
) -> Result<JoinHandle<()>, SessionError> {
    thread::Builder::new()
        .name(format!("reader-{}", conn.id()))
        .spawn(move || read_loop(&conn, codec.as_ref(), handler.as_ref()))
        .map_err(SessionError::Spawn)
}

fn read_loop(conn: &Arc<dyn Connection>, codec: &dyn Codec, handler: &dyn Handler) {
    let id = conn.id();
    let mut first = true;
    let error = loop {
        match conn.recv() {
            Ok(Some(line)) => match codec.decode(&line) {
                Ok(message) => {
                    tracing::trace!(%id, message = %message.message_type(), "received");
                    if first {
                        first = false;
                        handler.on_first(conn, message);
                    } else {
                        handler.on_message(conn, message);
                    }
                }
                Err(e) => {
                    tracing::debug!(%id, error = %e, "dropping undecodable frame");
                }
            },
            Ok(None) => break None,
            Err(e) => break Some(e.to_string()),
        }
    };
    // Make sure the connection is closed even if the peer went away first.
    // A soft close finishes on its own once the outbound side drains.
    if !conn.lifecycle().is_soft_closed_in() {
        conn.disconnect();
    }
    match &error {
        Some(e) => tracing::info!(%id, error = %e, "connection lost"),
        None => tracing::debug!(%id, "connection closed"),
    }
    handler.on_lost(conn, error);
}
