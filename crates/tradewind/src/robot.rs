//! A robot client: game traffic goes into one capped queue per game.
//!
//! The reader thread never waits on the robot's thinking. It handles the
//! few connection-level messages itself and deposits everything about a
//! game into that game's queue, blocking only when the queue is full. The
//! robot's own thread drains the queue at its own pace with
//! [`CappedQueue::take`]. When the connection ends, every queue gets a
//! final [`RobotEvent::ConnectionLost`] and is closed.

use std::collections::BTreeMap;
use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tradewind_game::Seat;
use tradewind_protocol::{
    GameName, JoinGame, LeaveGame, Message, Name, PeerVersion, SitDown, Text,
};
use tradewind_session::{CappedQueue, Handler, QueueError, Route, RoutingTable};
use tradewind_transport::{Connection, LocalRegistry, TcpConnection};

use crate::TradewindError;
use crate::client::{open_session, say_goodbye};
use crate::config::ClientConfig;

/// What a robot finds in a game's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotEvent {
    Message(Message),
    /// Always the last event of a queue whose connection ended.
    ConnectionLost { error: Option<String> },
}

pub type RobotQueue = Arc<CappedQueue<RobotEvent>>;

struct RobotCore {
    routes: RoutingTable,
    capacity: usize,
    queues: Mutex<BTreeMap<GameName, RobotQueue>>,
    server_version: Mutex<Option<PeerVersion>>,
    rejection: Mutex<Option<String>>,
}

impl RobotCore {
    fn new(capacity: usize) -> Self {
        Self {
            routes: RoutingTable::robot(),
            capacity,
            queues: Mutex::new(BTreeMap::new()),
            server_version: Mutex::new(None),
            rejection: Mutex::new(None),
        }
    }

    fn queues(&self) -> MutexGuard<'_, BTreeMap<GameName, RobotQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self, game: &GameName) -> Option<RobotQueue> {
        self.queues().get(game).cloned()
    }

    fn open_queue(&self, game: &GameName) -> RobotQueue {
        Arc::clone(
            self.queues()
                .entry(game.clone())
                .or_insert_with(|| Arc::new(CappedQueue::new(self.capacity))),
        )
    }

    fn deliver(&self, message: Message) {
        let Some(game) = message.game().cloned() else {
            return;
        };
        let Some(queue) = self.queue(&game) else {
            tracing::debug!(%game, message = %message.message_type(), "not in this game; dropped");
            return;
        };
        // The lock is released; a full queue blocks only this reader.
        if let Err(QueueError::Closed) = queue.deposit_blocking(RobotEvent::Message(message)) {
            tracing::debug!(%game, "queue closed; dropped");
        }
    }

    fn connection_message(&self, message: Message) {
        match &message {
            Message::Version(v) => {
                *self
                    .server_version
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(PeerVersion::from(v));
            }
            Message::RejectConnection(m) => {
                tracing::warn!(reason = %m.reason, "server rejected the robot");
                *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(m.reason.as_str().to_string());
            }
            Message::StatusMessage(m) => {
                tracing::info!(status = m.status, text = %m.text, "server status");
            }
            Message::JoinGameAuth(_) => self.deliver(message),
            Message::DeleteGame(m) => {
                if let Some(queue) = self.queues().remove(&m.game) {
                    queue.close();
                }
            }
            _ => {}
        }
    }
}

impl Handler for RobotCore {
    fn on_message(&self, _conn: &Arc<dyn Connection>, message: Message) {
        match self.routes.route_of(&message) {
            Route::Direct => self.connection_message(message),
            Route::Queue => self.deliver(message),
            Route::Drop => {
                tracing::trace!(message = %message.message_type(), "dropped");
            }
        }
    }

    fn on_lost(&self, _conn: &Arc<dyn Connection>, error: Option<String>) {
        let queues = std::mem::take(&mut *self.queues());
        for (game, queue) in queues {
            let lost = RobotEvent::ConnectionLost {
                error: error.clone(),
            };
            if queue.deposit(lost).is_err() {
                tracing::warn!(%game, "queue full; robot will see the close without a reason");
            }
            queue.close();
        }
    }
}

/// A connected robot.
pub struct RobotClient {
    nickname: Name,
    password: Text,
    conn: Arc<dyn Connection>,
    core: Arc<RobotCore>,
    reader: Option<JoinHandle<()>>,
}

impl RobotClient {
    pub fn connect_local(
        registry: &LocalRegistry,
        port: &str,
        config: ClientConfig,
    ) -> Result<Self, TradewindError> {
        let conn = registry.connect(port)?;
        Self::start(Arc::new(conn), config)
    }

    pub fn connect_tcp(
        addr: impl ToSocketAddrs,
        config: ClientConfig,
    ) -> Result<Self, TradewindError> {
        let conn = TcpConnection::connect(addr)?;
        Self::start(Arc::new(conn), config)
    }

    fn start(conn: Arc<dyn Connection>, mut config: ClientConfig) -> Result<Self, TradewindError> {
        config.robot = true;
        let nickname = Name::new(config.nickname.as_str())?;
        let password = Text::new(config.password.as_str())?;
        let core = Arc::new(RobotCore::new(config.robot_queue_capacity));
        let reader = open_session(&conn, &config, Arc::clone(&core) as Arc<dyn Handler>)?;
        tracing::info!(conn_id = %conn.id(), %nickname, brain = %config.robot_brain, "robot connected");
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

    pub fn is_connected(&self) -> bool {
        !self.conn.is_closed()
    }

    pub fn server_version(&self) -> Option<PeerVersion> {
        self.core
            .server_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Why the server turned this robot away, if it did.
    pub fn rejection(&self) -> Option<String> {
        self.core
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Asks to join `game` and returns its queue. The queue exists before
    /// the request goes out, so nothing the server sends is missed.
    pub fn join(&self, game: &str) -> Result<(GameName, RobotQueue), TradewindError> {
        let game = GameName::new(game)?;
        let queue = self.core.open_queue(&game);
        self.send(JoinGame {
            game: game.clone(),
            nickname: self.nickname.clone(),
            password: self.password.clone(),
        })?;
        Ok((game, queue))
    }

    pub fn queue(&self, game: &GameName) -> Option<RobotQueue> {
        self.core.queue(game)
    }

    pub fn sit(&self, game: &GameName, seat: Seat) -> Result<(), TradewindError> {
        self.send(SitDown {
            game: game.clone(),
            nickname: self.nickname.clone(),
            seat,
            robot: true,
        })
    }

    /// Leaves `game` and closes its queue.
    pub fn leave(&self, game: &GameName) -> Result<(), TradewindError> {
        if let Some(queue) = self.core.queues().remove(game) {
            queue.close();
        }
        self.send(LeaveGame {
            game: game.clone(),
            nickname: self.nickname.clone(),
        })
    }

    pub fn send(&self, message: impl Into<Message>) -> Result<(), TradewindError> {
        self.conn.send(&message.into().encode())?;
        Ok(())
    }

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

impl Drop for RobotClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradewind_game::GameState;
    use tradewind_protocol::{DeleteGame, GameStateMsg, Version};
    use tradewind_transport::LocalConnection;

    fn conn() -> Arc<dyn Connection> {
        let (a, _b) = LocalConnection::pair("robot-test");
        Arc::new(a)
    }

    fn state(game: &GameName) -> Message {
        GameStateMsg {
            game: game.clone(),
            state: GameState::Play1,
        }
        .into()
    }

    #[test]
    fn test_game_message_goes_to_its_queue() {
        let core = RobotCore::new(4);
        let game = GameName::new("harbor").unwrap();
        let queue = core.open_queue(&game);
        core.on_message(&conn(), state(&game));
        assert_eq!(queue.try_take(), Some(RobotEvent::Message(state(&game))));
    }

    #[test]
    fn test_message_for_unjoined_game_is_dropped() {
        let core = RobotCore::new(4);
        let joined = GameName::new("harbor").unwrap();
        let queue = core.open_queue(&joined);
        core.on_message(&conn(), state(&GameName::new("elsewhere").unwrap()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_version_is_handled_directly() {
        let core = RobotCore::new(4);
        let game = GameName::new("harbor").unwrap();
        let queue = core.open_queue(&game);
        let version: Version = PeerVersion::current().to_message();
        core.on_message(&conn(), version.into());
        assert!(queue.is_empty());
        assert_eq!(
            core.server_version.lock().unwrap().clone(),
            Some(PeerVersion::current())
        );
    }

    #[test]
    fn test_delete_game_closes_queue() {
        let core = RobotCore::new(4);
        let game = GameName::new("harbor").unwrap();
        let queue = core.open_queue(&game);
        core.on_message(&conn(), DeleteGame { game: game.clone() }.into());
        assert!(queue.is_closed());
        assert!(core.queue(&game).is_none());
    }

    #[test]
    fn test_connection_lost_is_last_event() {
        let core = RobotCore::new(4);
        let game = GameName::new("harbor").unwrap();
        let queue = core.open_queue(&game);
        core.on_message(&conn(), state(&game));
        core.on_lost(&conn(), Some("reset by peer".to_string()));
        assert_eq!(queue.take(), Some(RobotEvent::Message(state(&game))));
        assert_eq!(
            queue.take(),
            Some(RobotEvent::ConnectionLost {
                error: Some("reset by peer".to_string())
            })
        );
        assert_eq!(queue.take(), None);
    }
}
