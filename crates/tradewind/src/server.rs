//! `Server` builder, accept loops and shutdown.
//!
//! This is the entry point for running a Tradewind game server. It ties
//! together all the layers: transport → protocol → session → game.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tradewind_game::BoardRules;
use tradewind_protocol::{GameName, MessageRegistry};
use tradewind_session::{Authenticator, OpenAuthenticator};
use tradewind_transport::{
    Connection, LocalListener, LocalRegistry, TcpTransport, Transport, TransportError,
};

use crate::TradewindError;
use crate::config::ServerConfig;
use crate::handler::{self, ServerHandler};
use crate::lobby::{self, BoardFactory, Lobby};
use crate::watchdog::Watchdog;

/// Builder for configuring and starting a Tradewind server.
///
/// # Example
///
/// ```rust,ignore
/// use tradewind::prelude::*;
///
/// let server = Server::builder()
///     .bind("0.0.0.0:8880")
///     .build()?;
/// server.run()
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    local: Option<LocalRegistry>,
    auth: Arc<dyn Authenticator>,
    boards: BoardFactory,
}

impl ServerBuilder {
    /// Creates a new builder with default settings and no listeners.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            local: None,
            auth: Arc::new(OpenAuthenticator),
            boards: lobby::open_boards(),
        }
    }

    /// Replaces the whole configuration. Listeners named in it are kept.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Listens for TCP connections on `addr`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = Some(addr.to_string());
        self
    }

    /// Listens on `port` of an in-process registry.
    pub fn local(mut self, registry: &LocalRegistry, port: &str) -> Self {
        self.local = Some(registry.clone());
        self.config.local_port = Some(port.to_string());
        self
    }

    pub fn authenticator(mut self, auth: impl Authenticator) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    /// Sets how each new game's board is built.
    pub fn board_factory(
        mut self,
        boards: impl Fn(&GameName) -> Box<dyn BoardRules> + Send + Sync + 'static,
    ) -> Self {
        self.boards = Arc::new(boards);
        self
    }

    /// Binds the configured listeners. Nothing is accepted until
    /// [`Server::start`] or [`Server::run`].
    pub fn build(self) -> Result<Server, TradewindError> {
        let tcp = match &self.config.bind_addr {
            Some(addr) => Some(TcpTransport::bind(addr.as_str())?),
            None => None,
        };
        let local = match &self.config.local_port {
            Some(port) => {
                let registry = self.local.unwrap_or_default();
                let listener = registry.bind(port, self.config.accept_backlog)?;
                Some((registry, listener))
            }
            None => None,
        };
        if tcp.is_none() && local.is_none() {
            return Err(TradewindError::NoListener);
        }
        let lobby = Arc::new(Lobby::new(self.config, self.auth, self.boards));
        Ok(Server { lobby, tcp, local })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tradewind server, not yet accepting.
pub struct Server {
    lobby: Arc<Lobby>,
    tcp: Option<TcpTransport>,
    local: Option<(LocalRegistry, LocalListener)>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The TCP address, if the server listens on TCP.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().map(TcpTransport::local_addr)
    }

    /// The in-process registry clients connect through, if any.
    pub fn local_registry(&self) -> Option<&LocalRegistry> {
        self.local.as_ref().map(|(registry, _)| registry)
    }

    /// Starts the accept loops and the watchdog, and returns at once.
    pub fn start(self) -> Result<ServerHandle, TradewindError> {
        let Server { lobby, tcp, local } = self;
        let handler = Arc::new(ServerHandler::new(Arc::clone(&lobby)));
        let codec = Arc::new(MessageRegistry::standard());
        let local_addr = tcp.as_ref().map(TcpTransport::local_addr);
        let local_registry = local.as_ref().map(|(registry, _)| registry.clone());

        let mut handle = ServerHandle {
            lobby: Arc::clone(&lobby),
            listeners: Vec::new(),
            accept_threads: Vec::new(),
            watchdog: None,
            local_addr,
            local_registry,
            stopped: false,
        };
        if let Some(tcp) = tcp {
            let tcp = Arc::new(tcp);
            handle.listeners.push(Arc::clone(&tcp) as Arc<dyn Listener>);
            handle
                .accept_threads
                .push(spawn_accept_loop(tcp, &lobby, &handler, &codec)?);
        }
        if let Some((_, listener)) = local {
            let listener = Arc::new(listener);
            handle.listeners.push(Arc::clone(&listener) as Arc<dyn Listener>);
            handle
                .accept_threads
                .push(spawn_accept_loop(listener, &lobby, &handler, &codec)?);
        }
        handle.watchdog = Some(
            Watchdog::spawn(Arc::clone(&lobby), lobby.config.watchdog_interval)
                .map_err(TradewindError::Spawn)?,
        );
        tracing::info!(
            tcp = ?handle.local_addr,
            local = ?lobby.config.local_port,
            version = %lobby.version,
            "tradewind server running"
        );
        Ok(handle)
    }

    /// Runs the server on the calling thread until its listeners stop.
    pub fn run(self) -> Result<(), TradewindError> {
        self.start()?.join();
        Ok(())
    }
}

/// Shutdown for listeners of any transport.
trait Listener: Send + Sync {
    fn stop(&self);
}

impl<T: Transport> Listener for T {
    fn stop(&self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(listener = %self.local_name(), error = %e, "listener shutdown failed");
        }
    }
}

fn spawn_accept_loop<T: Transport>(
    transport: Arc<T>,
    lobby: &Arc<Lobby>,
    handler: &Arc<ServerHandler>,
    codec: &Arc<MessageRegistry>,
) -> Result<JoinHandle<()>, TradewindError> {
    let lobby = Arc::clone(lobby);
    let handler = Arc::clone(handler);
    let codec = Arc::clone(codec);
    let name = transport.local_name();
    thread::Builder::new()
        .name(format!("accept-{name}"))
        .spawn(move || {
            tracing::debug!(listener = %name, "accepting connections");
            loop {
                match transport.accept() {
                    Ok(conn) => {
                        let conn: Arc<dyn Connection> = Arc::new(conn);
                        handler::serve(&lobby, &handler, &codec, conn);
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(listener = %name, error = %e, "accept failed");
                        thread::sleep(Duration::from_millis(50));
                    }
                }
            }
            tracing::debug!(listener = %name, "accept loop stopped");
        })
        .map_err(TradewindError::Spawn)
}

/// A running server. Dropping it shuts the server down.
pub struct ServerHandle {
    lobby: Arc<Lobby>,
    listeners: Vec<Arc<dyn Listener>>,
    accept_threads: Vec<JoinHandle<()>>,
    watchdog: Option<Watchdog>,
    local_addr: Option<SocketAddr>,
    local_registry: Option<LocalRegistry>,
    stopped: bool,
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn local_registry(&self) -> Option<&LocalRegistry> {
        self.local_registry.as_ref()
    }

    /// Names of the games currently running.
    pub fn games(&self) -> Vec<GameName> {
        self.lobby.games()
    }

    pub fn connection_count(&self) -> usize {
        self.lobby.registry.len()
    }

    /// Blocks until the listeners stop.
    pub fn join(mut self) {
        for thread in self.accept_threads.drain(..) {
            let _ = thread.join();
        }
    }

    /// Stops accepting, closes every connection and stops every game.
    pub fn shutdown(mut self) {
        self.stop_all();
    }

    fn stop_all(&mut self) {
        if std::mem::replace(&mut self.stopped, true) {
            return;
        }
        for listener in self.listeners.drain(..) {
            listener.stop();
        }
        for thread in self.accept_threads.drain(..) {
            let _ = thread.join();
        }
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        for id in self.lobby.registry.ids() {
            if let Some(conn) = self.lobby.registry.connection(id) {
                conn.disconnect();
            }
        }
        self.lobby.stop_games();
        tracing::info!("tradewind server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_listener_is_rejected() {
        let result = ServerBuilder::new().build();
        assert!(matches!(result, Err(TradewindError::NoListener)));
    }

    #[test]
    fn test_local_port_taken_twice() {
        let registry = LocalRegistry::new();
        let _first = ServerBuilder::new().local(&registry, "game").build().unwrap();
        let second = ServerBuilder::new().local(&registry, "game").build();
        assert!(matches!(
            second,
            Err(TradewindError::Transport(TransportError::PortInUse(_)))
        ));
    }

    #[test]
    fn test_start_and_shutdown() {
        let registry = LocalRegistry::new();
        let server = ServerBuilder::new()
            .local(&registry, "start-stop")
            .build()
            .unwrap();
        assert!(server.local_addr().is_none());
        let handle = server.start().unwrap();
        assert_eq!(handle.connection_count(), 0);
        assert!(handle.games().is_empty());
        handle.shutdown();
        assert!(!registry.is_bound("start-stop"));
    }
}
