//! Per-connection handling on the server: handshake, names, joins, and
//! routing game requests to their game's queue.
//!
//! Every accepted connection gets its own reader thread calling into a
//! shared [`ServerHandler`]. The flow is:
//!   1. Server sends its `Version` and the `Games` list
//!   2. Peer's first frame is its `Version` (older peers may skip it)
//!   3. `JoinGame` names the connection (once) and authenticates it
//!   4. `JoinGameAuth` goes out, then the game actor sends the game
//!   5. Game requests are queued for the game's actor

use std::sync::Arc;

use tradewind_protocol::{
    Codec, DeclineReason, GameName, Games, ImARobot, JoinGame, JoinGameAuth, Message,
    MessageRegistry, PeerVersion, RejectConnection, ServerPing, StatusMessage, Text, status,
};
use tradewind_session::{Handler, Route, RoutingTable, SessionError, spawn_reader};
use tradewind_transport::Connection;

use crate::game_actor::GameCommand;
use crate::lobby::Lobby;
use crate::outbound;

/// The server's reader-thread callbacks.
pub(crate) struct ServerHandler {
    lobby: Arc<Lobby>,
    routes: RoutingTable,
}

impl ServerHandler {
    pub(crate) fn new(lobby: Arc<Lobby>) -> Self {
        Self {
            lobby,
            routes: RoutingTable::server(),
        }
    }

    fn send(&self, conn: &Arc<dyn Connection>, message: impl Into<Message>) {
        self.lobby.send(conn.as_ref(), &message.into());
    }

    fn status(&self, conn: &Arc<dyn Connection>, code: i32, text: &str) {
        self.send(
            conn,
            StatusMessage {
                status: code,
                text: Text::sanitized(text),
            },
        );
    }

    // -- session messages ---------------------------------------------------

    fn session_message(&self, conn: &Arc<dyn Connection>, message: Message) {
        let id = conn.id();
        match message {
            Message::Version(v) => {
                let version = PeerVersion::from(&v);
                tracing::debug!(conn_id = %id, %version, "peer version");
                if let Err(e) = self.lobby.registry.set_version(id, version) {
                    tracing::debug!(conn_id = %id, error = %e, "version after disconnect");
                }
            }
            Message::ImARobot(m) => self.robot(conn, m),
            Message::JoinGame(m) => self.join(conn, m),
            Message::LeaveGame(m) => self.leave(conn, &m.game),
            Message::LeaveAll(_) => {
                let games = self
                    .lobby
                    .registry
                    .info(id)
                    .map(|info| info.games)
                    .unwrap_or_default();
                for game in &games {
                    self.leave(conn, game);
                }
            }
            Message::ServerPing(ping) if ping.is_disconnect() => {
                tracing::debug!(conn_id = %id, "peer said goodbye");
                conn.disconnect_soft();
            }
            Message::ServerPing(ping) => self.send(conn, ServerPing { sleep_time: ping.sleep_time }),
            other => {
                tracing::debug!(conn_id = %id, message = %other.message_type(), "ignored");
            }
        }
    }

    fn robot(&self, conn: &Arc<dyn Connection>, m: ImARobot) {
        let id = conn.id();
        if let Some(cookie) = &self.lobby.config.robot_cookie {
            if m.cookie.as_str() != cookie {
                tracing::warn!(conn_id = %id, nickname = %m.nickname, "robot cookie mismatch");
                self.reject(conn, "robot cookie mismatch");
                return;
            }
        }
        if let Err(e) = self.lobby.registry.claim_name(id, &m.nickname) {
            self.reject(conn, &e.to_string());
            return;
        }
        if let Err(e) = self.lobby.registry.mark_robot(id) {
            tracing::debug!(conn_id = %id, error = %e, "robot after disconnect");
            return;
        }
        tracing::info!(conn_id = %id, nickname = %m.nickname, brain = %m.brain, "robot connected");
    }

    fn reject(&self, conn: &Arc<dyn Connection>, reason: &str) {
        self.send(
            conn,
            RejectConnection {
                reason: Text::sanitized(reason),
            },
        );
        conn.disconnect_soft();
    }

    fn join(&self, conn: &Arc<dyn Connection>, m: JoinGame) {
        let id = conn.id();
        let Some(info) = self.lobby.registry.info(id) else {
            return;
        };
        match &info.nickname {
            None => {
                let claimed = self
                    .lobby
                    .auth
                    .authenticate(&m.nickname, m.password.as_str())
                    .and_then(|()| self.lobby.registry.claim_name(id, &m.nickname));
                if let Err(e) = claimed {
                    tracing::info!(conn_id = %id, nickname = %m.nickname, error = %e, "join refused");
                    self.status(conn, status_code(&e), &e.to_string());
                    return;
                }
            }
            Some(name) if *name != m.nickname => {
                self.status(
                    conn,
                    status::NOT_OK_GENERIC,
                    &format!("this connection is already named {name}"),
                );
                return;
            }
            Some(_) => {}
        }
        if info.games.contains(&m.game) {
            tracing::debug!(conn_id = %id, game = %m.game, "already a member");
            return;
        }
        if let Err(e) = self.lobby.registry.join_game(id, &m.game) {
            tracing::debug!(conn_id = %id, error = %e, "join after disconnect");
            return;
        }
        // Authorization always reaches the peer before any game state.
        self.send(conn, JoinGameAuth { game: m.game.clone() });
        // A game retiring at this very moment closes its queue; the second
        // attempt starts a fresh one.
        for _ in 0..2 {
            let queue = match self.lobby.open_game(&m.game) {
                Ok((queue, _)) => queue,
                Err(e) => {
                    tracing::error!(game = %m.game, error = %e, "could not start game");
                    break;
                }
            };
            let command = GameCommand::Join {
                conn: Arc::clone(conn),
                nickname: m.nickname.clone(),
            };
            if queue.deposit_blocking(command).is_ok() {
                return;
            }
        }
        self.lobby.registry.leave_game(id, &m.game);
        self.status(conn, status::GAME_NOT_FOUND, "the game could not be started");
    }

    fn leave(&self, conn: &Arc<dyn Connection>, game: &GameName) {
        let id = conn.id();
        self.lobby.registry.leave_game(id, game);
        if let Some(queue) = self.lobby.game_queue(game) {
            let _ = queue.deposit_blocking(GameCommand::Leave { conn: id });
        }
    }

    // -- game messages ------------------------------------------------------

    fn forward(&self, conn: &Arc<dyn Connection>, message: Message) {
        let id = conn.id();
        let Some(game) = message.game().cloned() else {
            return;
        };
        let member = self
            .lobby
            .registry
            .info(id)
            .is_some_and(|info| info.games.contains(&game));
        let queue = self.lobby.game_queue(&game).filter(|_| member);
        let delivered = queue.is_some_and(|q| {
            q.deposit_blocking(GameCommand::Request { conn: id, message })
                .is_ok()
        });
        if !delivered {
            let version = self.lobby.registry.version(id);
            if let Some(decline) = outbound::decline(
                &game,
                DeclineReason::NotThisGame,
                0,
                "you are not a member of this game",
                &version,
            ) {
                self.send(conn, decline);
            }
        }
    }
}

impl Handler for ServerHandler {
    fn on_first(&self, conn: &Arc<dyn Connection>, message: Message) {
        if !matches!(message, Message::Version(_)) {
            tracing::debug!(conn_id = %conn.id(), "no version announced; treating as legacy");
        }
        self.on_message(conn, message);
    }

    fn on_message(&self, conn: &Arc<dyn Connection>, message: Message) {
        match self.routes.route_of(&message) {
            Route::Direct => self.session_message(conn, message),
            Route::Queue => self.forward(conn, message),
            Route::Drop => {
                tracing::debug!(conn_id = %conn.id(), message = %message.message_type(), "dropped");
            }
        }
    }

    fn on_lost(&self, conn: &Arc<dyn Connection>, error: Option<String>) {
        let id = conn.id();
        let Some(info) = self.lobby.registry.remove(id) else {
            return;
        };
        tracing::info!(
            conn_id = %id,
            nickname = ?info.nickname.as_ref().map(|n| n.as_str()),
            error = ?error,
            "connection ended"
        );
        for game in &info.games {
            if let Some(queue) = self.lobby.game_queue(game) {
                let _ = queue.deposit_blocking(GameCommand::ConnectionLost { conn: id });
            }
        }
    }
}

/// Greets a newly accepted connection and starts its reader thread.
pub(crate) fn serve(
    lobby: &Arc<Lobby>,
    handler: &Arc<ServerHandler>,
    codec: &Arc<MessageRegistry>,
    conn: Arc<dyn Connection>,
) {
    let id = conn.id();
    tracing::info!(conn_id = %id, peer = %conn.peer(), "connection accepted");
    lobby.registry.register(Arc::clone(&conn));
    lobby.send(conn.as_ref(), &lobby.version.to_message().into());
    lobby.send(
        conn.as_ref(),
        &Games {
            games: lobby.games(),
        }
        .into(),
    );
    let codec: Arc<dyn Codec> = Arc::clone(codec) as Arc<dyn Codec>;
    let handler: Arc<dyn Handler> = Arc::clone(handler) as Arc<dyn Handler>;
    if let Err(e) = spawn_reader(Arc::clone(&conn), codec, handler) {
        tracing::error!(conn_id = %id, error = %e, "could not start reader");
        lobby.registry.remove(id);
        conn.disconnect();
    }
}

/// The status code a refused join is reported with.
fn status_code(e: &SessionError) -> i32 {
    match e {
        SessionError::WrongPassword(_) => status::PW_WRONG,
        SessionError::NameInUse(_) => status::NAME_IN_USE,
        _ => status::NOT_OK_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_for_auth_failures() {
        assert_eq!(
            status_code(&SessionError::WrongPassword("a".into())),
            status::PW_WRONG
        );
        assert_eq!(
            status_code(&SessionError::NameInUse("a".into())),
            status::NAME_IN_USE
        );
        assert_eq!(
            status_code(&SessionError::AuthFailed("a".into())),
            status::NOT_OK_GENERIC
        );
    }
}
