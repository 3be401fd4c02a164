//! Who is connected, what they announced, and which games they're in.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tradewind_protocol::{GameName, Name, PeerVersion};
use tradewind_transport::{Connection, ConnectionId};

use crate::SessionError;

/// A snapshot of one connection's session data.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: ConnectionId,
    pub nickname: Option<Name>,
    pub version: PeerVersion,
    pub robot: bool,
    pub games: BTreeSet<GameName>,
}

struct Entry {
    conn: Arc<dyn Connection>,
    info: PeerInfo,
}

#[derive(Default)]
struct Inner {
    peers: HashMap<ConnectionId, Entry>,
    names: HashMap<Name, ConnectionId>,
}

/// All live connections on a server.
///
/// Cheap to clone; every clone sees the same table. The lock is only held
/// for map operations, never while sending.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, conn: Arc<dyn Connection>) {
        let id = conn.id();
        let info = PeerInfo {
            id,
            nickname: None,
            version: PeerVersion::legacy(),
            robot: false,
            games: BTreeSet::new(),
        };
        self.lock().peers.insert(id, Entry { conn, info });
    }

    /// Forgets a connection and frees its nickname.
    pub fn remove(&self, id: ConnectionId) -> Option<PeerInfo> {
        let mut inner = self.lock();
        let entry = inner.peers.remove(&id)?;
        if let Some(name) = &entry.info.nickname {
            inner.names.remove(name);
        }
        Some(entry.info)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Arc<dyn Connection>> {
        self.lock().peers.get(&id).map(|e| Arc::clone(&e.conn))
    }

    pub fn info(&self, id: ConnectionId) -> Option<PeerInfo> {
        self.lock().peers.get(&id).map(|e| e.info.clone())
    }

    pub fn by_name(&self, name: &str) -> Option<ConnectionId> {
        self.lock().names.get(name).copied()
    }

    pub fn set_version(&self, id: ConnectionId, version: PeerVersion) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let entry = inner.peers.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        entry.info.version = version;
        Ok(())
    }

    /// The peer's announced version, or the legacy default.
    pub fn version(&self, id: ConnectionId) -> PeerVersion {
        self.lock()
            .peers
            .get(&id)
            .map(|e| e.info.version.clone())
            .unwrap_or_default()
    }

    pub fn mark_robot(&self, id: ConnectionId) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let entry = inner.peers.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        entry.info.robot = true;
        Ok(())
    }

    pub fn is_robot(&self, id: ConnectionId) -> bool {
        self.lock().peers.get(&id).is_some_and(|e| e.info.robot)
    }

    /// Gives the connection its nickname. Claiming the name it already has
    /// is fine; a name held by another connection is not.
    pub fn claim_name(&self, id: ConnectionId, name: &Name) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if let Some(holder) = inner.names.get(name) {
            return if *holder == id {
                Ok(())
            } else {
                Err(SessionError::NameInUse(name.to_string()))
            };
        }
        let entry = inner.peers.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        if entry.info.nickname.is_some() {
            return Err(SessionError::AuthFailed(
                "connection already has a different nickname".to_string(),
            ));
        }
        entry.conn.set_name(name.as_str())?;
        entry.info.nickname = Some(name.clone());
        inner.names.insert(name.clone(), id);
        Ok(())
    }

    pub fn join_game(&self, id: ConnectionId, game: &GameName) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let entry = inner.peers.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        entry.info.games.insert(game.clone());
        Ok(())
    }

    pub fn leave_game(&self, id: ConnectionId, game: &GameName) {
        if let Some(entry) = self.lock().peers.get_mut(&id) {
            entry.info.games.remove(game);
        }
    }

    /// Drops `game` from every member's list.
    pub fn forget_game(&self, game: &GameName) {
        for entry in self.lock().peers.values_mut() {
            entry.info.games.remove(game);
        }
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.lock().peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().peers.is_empty()
    }
}
