//! Socket transport using `std::net` and one writer thread per connection.
//!
//! `send` only enqueues; the writer thread owns the write half and writes
//! whole frames one at a time, so frames from different threads are never
//! interleaved. `recv` reads on the caller's (reader) thread.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tokio::sync::mpsc;

use crate::framing::{read_frame, write_frame};
use crate::{Connection, ConnectionId, Lifecycle, MAX_FRAME_LEN, Transport, TransportError};

enum Outbound {
    Line(String),
    /// Write everything queued so far, then close.
    Finish,
}

struct Shared {
    id: ConnectionId,
    life: Lifecycle,
    stream: TcpStream,
}

impl Shared {
    fn fail(&self, error: &TransportError) {
        self.life.record_error(error);
        if self.life.close() {
            tracing::debug!(id = %self.id, %error, "tcp connection failed");
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// One socket connection.
pub struct TcpConnection {
    shared: Arc<Shared>,
    peer_addr: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: Mutex<BufReader<TcpStream>>,
}

impl TcpConnection {
    /// Connects to a server. The connection is usable immediately.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).map_err(TransportError::SendFailed)?;
        let conn = Self::from_stream(stream)?;
        conn.shared.life.mark_accepted()?;
        tracing::debug!(id = %conn.shared.id, peer = %conn.peer_addr, "tcp connected");
        Ok(conn)
    }

    fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true).map_err(TransportError::SendFailed)?;
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let read_half = stream.try_clone().map_err(TransportError::ReceiveFailed)?;
        let write_half = stream.try_clone().map_err(TransportError::SendFailed)?;
        let shared = Arc::new(Shared {
            id: ConnectionId::next(),
            life: Lifecycle::new(),
            stream,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let writer_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("tcp-writer-{}", shared.id))
            .spawn(move || writer_loop(writer_shared, BufWriter::new(write_half), rx))
            .map_err(TransportError::SendFailed)?;

        Ok(Self {
            shared,
            peer_addr,
            outbound: tx,
            reader: Mutex::new(BufReader::new(read_half)),
        })
    }
}

fn writer_loop(
    shared: Arc<Shared>,
    mut writer: BufWriter<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = rx.blocking_recv() {
        match item {
            Outbound::Line(line) => {
                if let Err(e) = write_frame(&mut writer, &line) {
                    shared.fail(&e);
                    return;
                }
            }
            Outbound::Finish => {
                let _ = shared.stream.shutdown(Shutdown::Write);
                shared.life.close();
                tracing::debug!(id = %shared.id, "tcp connection drained and closed");
                return;
            }
        }
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.shared.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.shared.life
    }

    fn peer(&self) -> String {
        self.peer_addr.clone()
    }

    fn send(&self, line: &str) -> Result<(), TransportError> {
        self.shared.life.check_can_send()?;
        if self.shared.life.is_soft_closed_in() {
            return Err(TransportError::ConnectionClosed("closing".to_string()));
        }
        if line.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(line.len()));
        }
        self.outbound
            .send(Outbound::Line(line.to_string()))
            .map_err(|_| TransportError::ConnectionClosed("writer stopped".to_string()))
    }

    fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.life.is_closed() || self.shared.life.is_soft_closed_in() {
            return Ok(None);
        }
        loop {
            return match read_frame(&mut *reader) {
                Ok(Some(line)) => Ok(Some(line)),
                Ok(None) => {
                    // A soft close ends reads here; the writer finishes the close.
                    if !self.shared.life.is_soft_closed_in() && self.shared.life.close() {
                        tracing::debug!(id = %self.shared.id, "tcp peer closed the stream");
                    }
                    Ok(None)
                }
                // The length prefix already consumed the frame; the stream is in step.
                Err(TransportError::InvalidUtf8) => {
                    tracing::debug!(id = %self.shared.id, "dropping frame that is not utf-8");
                    continue;
                }
                // Our own disconnect shut the socket under the reader.
                Err(_) if self.shared.life.is_closed() || self.shared.life.is_soft_closed_in() => {
                    Ok(None)
                }
                Err(e) => {
                    self.shared.fail(&e);
                    Err(e)
                }
            };
        }
    }

    fn disconnect(&self) {
        if !self.shared.life.close() {
            return;
        }
        // Stream EOF is the peer's disconnect notice.
        let _ = self.shared.stream.shutdown(Shutdown::Both);
        tracing::debug!(id = %self.shared.id, "tcp connection closed");
    }

    fn disconnect_soft(&self) {
        if self.shared.life.is_closed() || !self.shared.life.begin_soft_close() {
            return;
        }
        let _ = self.shared.stream.shutdown(Shutdown::Read);
        if self.outbound.send(Outbound::Finish).is_err() {
            self.disconnect();
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        // Let queued frames drain; the writer closes the socket afterwards.
        if !self.shared.life.is_closed() {
            let _ = self.outbound.send(Outbound::Finish);
        }
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.shared.id)
            .field("peer", &self.peer_addr)
            .field("state", &self.shared.life.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A socket listener producing [`TcpConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
    addr: SocketAddr,
    closed: AtomicBool,
}

impl TcpTransport {
    /// Binds a listener. Use port 0 for an OS-assigned port.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(TransportError::AcceptFailed)?;
        let addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%addr, "tcp transport listening");
        Ok(Self {
            listener,
            addr,
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    fn accept(&self) -> Result<TcpConnection, TransportError> {
        loop {
            let (stream, addr) = self.listener.accept().map_err(TransportError::AcceptFailed)?;
            if self.closed.load(Ordering::Acquire) {
                let _ = stream.shutdown(Shutdown::Both);
                return Err(TransportError::Shutdown);
            }
            match TcpConnection::from_stream(stream) {
                Ok(conn) => {
                    conn.shared.life.mark_accepted()?;
                    tracing::debug!(id = %conn.shared.id, %addr, "accepted tcp connection");
                    return Ok(conn);
                }
                Err(e) => tracing::warn!(%addr, error = %e, "dropping tcp connection"),
            }
        }
    }

    fn shutdown(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // A throwaway connection wakes a blocked accept.
            let _ = TcpStream::connect(self.addr);
            tracing::info!(addr = %self.addr, "tcp transport shut down");
        }
        Ok(())
    }

    fn local_name(&self) -> String {
        format!("tcp:{}", self.addr)
    }
}
