//! A client that handles everything on its reader thread.
//!
//! This is the shape a visual client takes: each message from the server
//! updates the [`ShadowGame`] it belongs to and is then handed straight to
//! a [`GameListener`]. Robots, which think more slowly than messages
//! arrive, use [`RobotClient`](crate::RobotClient) instead.

use std::collections::BTreeMap;
use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tradewind_game::Seat;
use tradewind_protocol::{
    Codec, EndTurn, GameName, GameTextMsg, ImARobot, JoinGame, LeaveGame, Message,
    MessageRegistry, Name, PeerVersion, RollDice, ServerPing, SitDown, StartGame, Text,
};
use tradewind_session::{Handler, spawn_reader};
use tradewind_transport::{Connection, ConnectionId, LocalRegistry, TcpConnection};

use crate::TradewindError;
use crate::config::ClientConfig;
use crate::shadow::{ShadowGame, Tracked};

/// Callbacks for a [`Client`]. All of them run on the reader thread.
pub trait GameListener: Send + Sync + 'static {
    /// A message for a game this client has joined, after `shadow` has
    /// taken it in. The shadow is locked for the duration of the call.
    fn on_game_message(&self, shadow: &ShadowGame, message: &Message, tracked: Tracked);

    /// Anything not tied to a joined game: game lists, status lines,
    /// rejections.
    fn on_session_message(&self, message: &Message) {
        let _ = message;
    }

    /// The connection is gone. `error` is set if it failed.
    fn on_disconnected(&self, error: Option<&str>) {
        let _ = error;
    }
}

/// A connected client with a shadow of every game it joined.
pub struct Client {
    nickname: Name,
    password: Text,
    conn: Arc<dyn Connection>,
    core: Arc<ClientCore>,
    reader: Option<JoinHandle<()>>,
}

struct ClientCore {
    games: Mutex<BTreeMap<GameName, ShadowGame>>,
    server_version: Mutex<Option<PeerVersion>>,
    listener: Arc<dyn GameListener>,
}

impl ClientCore {
    fn games(&self) -> MutexGuard<'_, BTreeMap<GameName, ShadowGame>> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Handler for ClientCore {
    fn on_message(&self, _conn: &Arc<dyn Connection>, message: Message) {
        match &message {
            Message::Version(v) => {
                let version = PeerVersion::from(v);
                tracing::debug!(%version, "server version");
                *self
                    .server_version
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(version);
            }
            Message::JoinGameAuth(m) => {
                self.games()
                    .entry(m.game.clone())
                    .or_insert_with(|| ShadowGame::new(m.game.clone()));
            }
            Message::DeleteGame(m) => {
                self.games().remove(&m.game);
            }
            Message::RejectConnection(m) => {
                tracing::warn!(reason = %m.reason, "server rejected the connection");
            }
            _ => {}
        }
        if let Some(game) = message.game() {
            let mut games = self.games();
            if let Some(shadow) = games.get_mut(game) {
                let tracked = shadow.apply(&message);
                self.listener.on_game_message(shadow, &message, tracked);
                return;
            }
        }
        self.listener.on_session_message(&message);
    }

    fn on_lost(&self, _conn: &Arc<dyn Connection>, error: Option<String>) {
        self.listener.on_disconnected(error.as_deref());
    }
}

impl Client {
    /// Connects through an in-process registry.
    pub fn connect_local(
        registry: &LocalRegistry,
        port: &str,
        config: ClientConfig,
        listener: impl GameListener,
    ) -> Result<Self, TradewindError> {
        let conn = registry.connect(port)?;
        Self::start(Arc::new(conn), config, Arc::new(listener))
    }

    /// Connects over TCP.
    pub fn connect_tcp(
        addr: impl ToSocketAddrs,
        config: ClientConfig,
        listener: impl GameListener,
    ) -> Result<Self, TradewindError> {
        let conn = TcpConnection::connect(addr)?;
        Self::start(Arc::new(conn), config, Arc::new(listener))
    }

    fn start(
        conn: Arc<dyn Connection>,
        config: ClientConfig,
        listener: Arc<dyn GameListener>,
    ) -> Result<Self, TradewindError> {
        let nickname = Name::new(config.nickname.as_str())?;
        let password = Text::new(config.password.as_str())?;
        let core = Arc::new(ClientCore {
            games: Mutex::new(BTreeMap::new()),
            server_version: Mutex::new(None),
            listener,
        });
        let reader = open_session(&conn, &config, Arc::clone(&core) as Arc<dyn Handler>)?;
        tracing::info!(conn_id = %conn.id(), %nickname, "client connected");
        Ok(Self {
            nickname,
            password,
            conn,
            core,
            reader: Some(reader),
        })
    }

    pub fn nickname(&self) -> &Name {
        &self.nickname
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn is_connected(&self) -> bool {
        !self.conn.is_closed()
    }

    /// What the server announced, once its first frame has arrived.
    pub fn server_version(&self) -> Option<PeerVersion> {
        self.core
            .server_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Games this client has been admitted to.
    pub fn games(&self) -> Vec<GameName> {
        self.core.games().keys().cloned().collect()
    }

    /// Runs `f` against the shadow of `game`, if joined.
    pub fn shadow<R>(&self, game: &GameName, f: impl FnOnce(&ShadowGame) -> R) -> Option<R> {
        self.core.games().get(game).map(f)
    }

    pub fn send(&self, message: impl Into<Message>) -> Result<(), TradewindError> {
        self.conn.send(&message.into().encode())?;
        Ok(())
    }

    /// Asks to join `game`, creating it if needed. The shadow appears once
    /// the server's `JoinGameAuth` arrives.
    pub fn join(&self, game: &str) -> Result<GameName, TradewindError> {
        let game = GameName::new(game)?;
        self.send(JoinGame {
            game: game.clone(),
            nickname: self.nickname.clone(),
            password: self.password.clone(),
        })?;
        Ok(game)
    }

    pub fn leave(&self, game: &GameName) -> Result<(), TradewindError> {
        self.core.games().remove(game);
        self.send(LeaveGame {
            game: game.clone(),
            nickname: self.nickname.clone(),
        })
    }

    pub fn sit(&self, game: &GameName, seat: Seat) -> Result<(), TradewindError> {
        self.send(SitDown {
            game: game.clone(),
            nickname: self.nickname.clone(),
            seat,
            robot: false,
        })
    }

    pub fn start_game(&self, game: &GameName) -> Result<(), TradewindError> {
        self.send(StartGame { game: game.clone() })
    }

    pub fn roll(&self, game: &GameName) -> Result<(), TradewindError> {
        self.send(RollDice { game: game.clone() })
    }

    pub fn end_turn(&self, game: &GameName) -> Result<(), TradewindError> {
        self.send(EndTurn { game: game.clone() })
    }

    pub fn chat(&self, game: &GameName, text: &str) -> Result<(), TradewindError> {
        self.send(GameTextMsg {
            game: game.clone(),
            nickname: self.nickname.clone(),
            text: Text::sanitized(text),
        })
    }

    /// Says goodbye and closes the connection once it has drained.
    pub fn disconnect(mut self) {
        self.close();
    }

    fn close(&mut self) {
        say_goodbye(self.conn.as_ref());
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sends the opening frames, our `Version` and then `ImARobot` for robots,
/// and starts the reader. The connection is closed if any of it fails.
pub(crate) fn open_session(
    conn: &Arc<dyn Connection>,
    config: &ClientConfig,
    handler: Arc<dyn Handler>,
) -> Result<JoinHandle<()>, TradewindError> {
    let opened = greet(conn.as_ref(), config).and_then(|()| {
        let codec: Arc<dyn Codec> = Arc::new(MessageRegistry::standard());
        Ok(spawn_reader(Arc::clone(conn), codec, handler)?)
    });
    if opened.is_err() {
        conn.disconnect();
    }
    opened
}

fn greet(conn: &dyn Connection, config: &ClientConfig) -> Result<(), TradewindError> {
    let version = config.version.to_peer_version();
    conn.send(&Message::from(version.to_message()).encode())?;
    if config.robot {
        let hello = ImARobot {
            nickname: Name::new(config.nickname.as_str())?,
            cookie: Text::sanitized(&config.robot_cookie),
            brain: Text::sanitized(&config.robot_brain),
        };
        conn.send(&Message::from(hello).encode())?;
    }
    Ok(())
}

/// Sends the disconnect marker and starts a soft close.
pub(crate) fn say_goodbye(conn: &dyn Connection) {
    if conn.is_closed() {
        return;
    }
    let goodbye = ServerPing {
        sleep_time: ServerPing::DISCONNECT,
    };
    let _ = conn.send(&Message::from(goodbye).encode());
    conn.disconnect_soft();
}
