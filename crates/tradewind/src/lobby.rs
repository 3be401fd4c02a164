//! State shared by every server thread: peers, games, config.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tradewind_game::{BoardRules, Game, OpenBoard};
use tradewind_protocol::{DeleteGame, GameName, Message, NewGame, PeerVersion};
use tradewind_session::{Authenticator, CappedQueue, ConnectionRegistry};
use tradewind_transport::Connection;

use crate::config::ServerConfig;
use crate::game_actor::{self, GameCommand};
use crate::TradewindError;

/// Builds the board for a newly created game.
pub type BoardFactory = Arc<dyn Fn(&GameName) -> Box<dyn BoardRules> + Send + Sync>;

/// A board with no rules of its own, for every game.
pub(crate) fn open_boards() -> BoardFactory {
    Arc::new(|_| Box::new(OpenBoard::new()))
}

pub(crate) type GameQueue = Arc<CappedQueue<GameCommand>>;

struct GameHandle {
    queue: GameQueue,
    thread: Option<JoinHandle<()>>,
}

/// Shared server state, passed to each reader thread and game actor.
pub(crate) struct Lobby {
    pub(crate) config: ServerConfig,
    pub(crate) version: PeerVersion,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) auth: Arc<dyn Authenticator>,
    boards: BoardFactory,
    games: Mutex<BTreeMap<GameName, GameHandle>>,
}

impl Lobby {
    pub(crate) fn new(
        config: ServerConfig,
        auth: Arc<dyn Authenticator>,
        boards: BoardFactory,
    ) -> Self {
        let version = config.version.to_peer_version();
        Self {
            config,
            version,
            registry: ConnectionRegistry::new(),
            auth,
            boards,
            games: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock_games(&self) -> MutexGuard<'_, BTreeMap<GameName, GameHandle>> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends one message, dropping it if it would exceed the frame limit.
    pub(crate) fn send(&self, conn: &dyn Connection, message: &Message) {
        let line = message.encode();
        if line.len() > self.config.frame_limit() {
            tracing::warn!(
                conn_id = %conn.id(),
                message = %message.message_type(),
                len = line.len(),
                "outbound message too long; dropped"
            );
            return;
        }
        if let Err(e) = conn.send(&line) {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
        }
    }

    /// Sends to every connected peer.
    pub(crate) fn broadcast(&self, message: &Message) {
        for id in self.registry.ids() {
            if let Some(conn) = self.registry.connection(id) {
                self.send(conn.as_ref(), message);
            }
        }
    }

    pub(crate) fn games(&self) -> Vec<GameName> {
        self.lock_games().keys().cloned().collect()
    }

    pub(crate) fn game_queue(&self, name: &GameName) -> Option<GameQueue> {
        self.lock_games().get(name).map(|h| Arc::clone(&h.queue))
    }

    /// The queue of game `name`, starting the game if it doesn't exist.
    /// The flag is `true` when the game was just created.
    pub(crate) fn open_game(
        self: &Arc<Self>,
        name: &GameName,
    ) -> Result<(GameQueue, bool), TradewindError> {
        let mut games = self.lock_games();
        if let Some(handle) = games.get(name) {
            if !handle.queue.is_closed() {
                return Ok((Arc::clone(&handle.queue), false));
            }
        }
        let game = match self.config.dice_seed {
            Some(seed) => Game::with_seed(
                name.as_str(),
                self.config.game_flags.clone(),
                (self.boards)(name),
                seed,
            ),
            None => Game::new(
                name.as_str(),
                self.config.game_flags.clone(),
                (self.boards)(name),
            ),
        };
        let queue: GameQueue = Arc::new(CappedQueue::new(self.config.game_queue_capacity));
        let thread = game_actor::spawn(name.clone(), game, Arc::clone(self), Arc::clone(&queue))
            .map_err(TradewindError::Spawn)?;
        games.insert(
            name.clone(),
            GameHandle {
                queue: Arc::clone(&queue),
                thread: Some(thread),
            },
        );
        drop(games);
        tracing::info!(game = %name, "game created");
        self.broadcast(&NewGame { game: name.clone() }.into());
        Ok((queue, true))
    }

    /// Removes a game whose members have all gone, unless something is
    /// still waiting in its queue. Returns `true` if the game was removed;
    /// its actor must stop.
    pub(crate) fn retire_if_idle(&self, name: &GameName, queue: &GameQueue) -> bool {
        let mut games = self.lock_games();
        if !queue.is_empty() {
            return false;
        }
        queue.close();
        // The actor calling this is the thread behind the handle.
        games.remove(name);
        drop(games);
        self.registry.forget_game(name);
        tracing::info!(game = %name, "game deleted");
        self.broadcast(&DeleteGame { game: name.clone() }.into());
        true
    }

    /// Queues a watchdog tick for every game. A full queue skips its tick.
    pub(crate) fn tick_all(&self) {
        for handle in self.lock_games().values() {
            let _ = handle.queue.deposit(GameCommand::Tick);
        }
    }

    /// Stops every game actor and waits for them.
    pub(crate) fn stop_games(&self) {
        let handles: Vec<GameHandle> = {
            let mut games = self.lock_games();
            std::mem::take(&mut *games).into_values().collect()
        };
        for mut handle in handles {
            if handle.queue.deposit_blocking(GameCommand::Shutdown).is_err() {
                handle.queue.close();
            }
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
