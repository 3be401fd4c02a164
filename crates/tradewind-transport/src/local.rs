//! In-process transport: paired endpoints that talk through queues.
//!
//! A [`LocalRegistry`] maps port names to listeners. Connecting enqueues a
//! pending endpoint on the listener's bounded backlog and blocks until
//! [`LocalListener::accept`] takes it, builds the server end, marks it
//! accepted and wakes the client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::{
    CannotConnect, Connection, ConnectionId, Lifecycle, Transport, TransportError,
};

/// What travels between the two ends.
#[derive(Debug)]
enum Frame {
    Line(String),
    /// The peer disconnected. Always the last frame it sends.
    Disconnect,
    /// Local wake-up for a blocked reader.
    Wake,
}

/// One end of an in-process pair.
pub struct LocalConnection {
    id: ConnectionId,
    peer_label: String,
    life: Lifecycle,
    to_peer: mpsc::UnboundedSender<Frame>,
    to_self: mpsc::UnboundedSender<Frame>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl LocalConnection {
    /// Two unaccepted ends wired to each other.
    pub fn pair(label: &str) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = Self {
            id: ConnectionId::next(),
            peer_label: format!("local:{label}"),
            life: Lifecycle::new(),
            to_peer: b_tx.clone(),
            to_self: a_tx.clone(),
            inbound: Mutex::new(a_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            peer_label: format!("local:{label}"),
            life: Lifecycle::new(),
            to_peer: a_tx,
            to_self: b_tx,
            inbound: Mutex::new(b_rx),
        };
        (a, b)
    }

    /// Connects to a listener bound in `registry`, blocking until accepted.
    pub fn connect(registry: &LocalRegistry, port: &str) -> Result<Self, TransportError> {
        registry.connect(port)
    }
}

impl Connection for LocalConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    fn peer(&self) -> String {
        self.peer_label.clone()
    }

    fn send(&self, line: &str) -> Result<(), TransportError> {
        self.life.check_can_send()?;
        if line.len() > crate::MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(line.len()));
        }
        self.to_peer
            .send(Frame::Line(line.to_string()))
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".to_string()))
    }

    fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut inbound = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.life.is_closed() || self.life.is_soft_closed_in() {
                return Ok(None);
            }
            match inbound.blocking_recv() {
                Some(Frame::Line(line)) => return Ok(Some(line)),
                Some(Frame::Wake) => continue,
                Some(Frame::Disconnect) | None => {
                    if self.life.close() {
                        tracing::debug!(id = %self.id, "local peer disconnected");
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn disconnect(&self) {
        if !self.life.close() {
            return;
        }
        // The peer may already be gone; nothing left to tell it then.
        let _ = self.to_peer.send(Frame::Disconnect);
        let _ = self.to_self.send(Frame::Wake);
        tracing::debug!(id = %self.id, "local connection closed");
    }

    fn disconnect_soft(&self) {
        if !self.life.begin_soft_close() {
            return;
        }
        let _ = self.to_self.send(Frame::Wake);
        // Everything sent so far is already in the peer's queue, ahead of
        // the marker.
        if self.life.close() {
            let _ = self.to_peer.send(Frame::Disconnect);
        }
    }
}

impl Drop for LocalConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for LocalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConnection")
            .field("id", &self.id)
            .field("peer", &self.peer_label)
            .field("state", &self.life.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Rendezvous
// ---------------------------------------------------------------------------

/// A client waiting to be accepted.
struct Pending {
    server_end: LocalConnection,
    ready: oneshot::Sender<Result<(), CannotConnect>>,
}

/// The named rendezvous table for in-process ports.
///
/// Created explicitly and cloned into whoever needs it, so tests get their
/// own table instead of sharing process-wide state.
#[derive(Clone, Default)]
pub struct LocalRegistry {
    ports: Arc<Mutex<HashMap<String, mpsc::Sender<Pending>>>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a listener under `port`, with room for `backlog` clients
    /// waiting to be accepted.
    pub fn bind(&self, port: &str, backlog: usize) -> Result<LocalListener, TransportError> {
        let mut ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        if ports.contains_key(port) {
            return Err(TransportError::PortInUse(port.to_string()));
        }
        let (tx, rx) = mpsc::channel(backlog.max(1));
        ports.insert(port.to_string(), tx);
        tracing::info!(port, backlog, "local transport listening");
        Ok(LocalListener {
            port: port.to_string(),
            registry: self.clone(),
            backlog: Mutex::new(rx),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_bound(&self, port: &str) -> bool {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(port)
    }

    /// Connects to `port`, blocking until a listener accepts.
    pub fn connect(&self, port: &str) -> Result<LocalConnection, TransportError> {
        let backlog = self
            .ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(port)
            .cloned()
            .ok_or_else(|| TransportError::cannot_connect(port, CannotConnect::NotFound))?;

        let (client_end, server_end) = LocalConnection::pair(port);
        let (ready_tx, ready_rx) = oneshot::channel();
        backlog
            .try_send(Pending {
                server_end,
                ready: ready_tx,
            })
            .map_err(|e| {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => CannotConnect::Full,
                    mpsc::error::TrySendError::Closed(_) => CannotConnect::Closed,
                };
                TransportError::cannot_connect(port, reason)
            })?;
        drop(backlog);

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {
                client_end.life.mark_accepted()?;
                tracing::debug!(port, id = %client_end.id, "local connect accepted");
                Ok(client_end)
            }
            Ok(Err(reason)) => Err(TransportError::cannot_connect(port, reason)),
            Err(_) => Err(TransportError::cannot_connect(port, CannotConnect::Closed)),
        }
    }

    fn unbind(&self, port: &str) {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(port);
    }
}

/// The accepting side of a local port.
pub struct LocalListener {
    port: String,
    registry: LocalRegistry,
    backlog: Mutex<mpsc::Receiver<Pending>>,
    closed: AtomicBool,
}

impl LocalListener {
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Transport for LocalListener {
    type Connection = LocalConnection;

    fn accept(&self) -> Result<LocalConnection, TransportError> {
        let mut backlog = self.backlog.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let Some(pending) = backlog.blocking_recv() else {
                return Err(TransportError::Shutdown);
            };
            if self.closed.load(Ordering::Acquire) {
                let _ = pending.ready.send(Err(CannotConnect::Closed));
                continue;
            }
            let Pending { server_end, ready } = pending;
            server_end.life.mark_accepted()?;
            if ready.send(Ok(())).is_err() {
                // The client gave up while waiting.
                continue;
            }
            tracing::debug!(port = %self.port, id = %server_end.id, "accepted local connection");
            return Ok(server_end);
        }
    }

    fn shutdown(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Dropping the registry's sender ends `accept` once the backlog
            // has been drained and refused.
            self.registry.unbind(&self.port);
            tracing::info!(port = %self.port, "local transport shut down");
        }
        Ok(())
    }

    fn local_name(&self) -> String {
        format!("local:{}", self.port)
    }
}

impl Drop for LocalListener {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_unaccepted_pair_refuses_send() {
        let (a, _b) = LocalConnection::pair("t");
        assert!(matches!(a.send("x"), Err(TransportError::NotAccepted)));
    }

    #[test]
    fn test_pair_delivers_in_order() {
        let (a, b) = LocalConnection::pair("t");
        a.life.mark_accepted().unwrap();
        b.life.mark_accepted().unwrap();
        a.send("one").unwrap();
        a.send("two").unwrap();
        assert_eq!(b.recv().unwrap().as_deref(), Some("one"));
        assert_eq!(b.recv().unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_disconnect_wakes_own_reader() {
        let (a, _b) = LocalConnection::pair("t");
        let a = Arc::new(a);
        let reader = {
            let a = Arc::clone(&a);
            thread::spawn(move || a.recv())
        };
        a.disconnect();
        assert!(reader.join().unwrap().unwrap().is_none());
    }

    #[test]
    fn test_connect_unknown_port() {
        let registry = LocalRegistry::new();
        let err = registry.connect("nowhere").unwrap_err();
        assert!(matches!(
            err,
            TransportError::CannotConnect {
                reason: CannotConnect::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_bind_twice_fails() {
        let registry = LocalRegistry::new();
        let _listener = registry.bind("p", 4).unwrap();
        assert!(matches!(
            registry.bind("p", 4),
            Err(TransportError::PortInUse(_))
        ));
    }

    #[test]
    fn test_dropping_listener_unbinds() {
        let registry = LocalRegistry::new();
        drop(registry.bind("p", 4).unwrap());
        assert!(!registry.is_bound("p"));
    }
}
