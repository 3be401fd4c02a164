//! One owner thread per game.
//!
//! Reader threads never touch a [`Game`]. They deposit [`GameCommand`]s in
//! the game's capped queue and the actor applies them one at a time, so the
//! game record has exactly one writer. Each accepted request produces
//! [`Effect`]s, which are rendered separately for every member.
//!
//! ```text
//! reader threads ──► CappedQueue<GameCommand> ──► GameActor ──► members
//! watchdog ───────► (Tick)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tradewind_game::{Effect, Game, GameError, GameState, Seat, StateViolation};
use tradewind_protocol::{
    DeclineReason, GameMembers, GameName, GameStateMsg, GameTextMsg, JoinGame, LeaveGame,
    Message, Name, PeerVersion, SitDown, Text, Turn, choice, simple,
};
use tradewind_transport::{Connection, ConnectionId};

use crate::lobby::{GameQueue, Lobby};
use crate::outbound::{self, Recipient};

/// Work for a game actor.
pub(crate) enum GameCommand {
    /// The connection was authorized to join; send it the game.
    Join {
        conn: Arc<dyn Connection>,
        nickname: Name,
    },
    Leave {
        conn: ConnectionId,
    },
    /// A game-scoped message from a member.
    Request {
        conn: ConnectionId,
        message: Message,
    },
    /// The member's connection is gone. Their seat stays; the watchdog
    /// answers for it.
    ConnectionLost {
        conn: ConnectionId,
    },
    /// Periodic check for overdue responses.
    Tick,
    Shutdown,
}

pub(crate) fn spawn(
    name: GameName,
    game: Game,
    lobby: Arc<Lobby>,
    queue: GameQueue,
) -> std::io::Result<JoinHandle<()>> {
    let actor = GameActor {
        name: name.clone(),
        game,
        members: BTreeMap::new(),
        lobby,
        queue,
        waiting: None,
    };
    thread::Builder::new()
        .name(format!("game-{name}"))
        .spawn(move || actor.run())
}

struct Member {
    conn: Arc<dyn Connection>,
    nickname: Name,
    version: PeerVersion,
}

/// What the game is waiting on, and since when.
struct Waiting {
    state: GameState,
    seats: Vec<Seat>,
    since: Instant,
}

/// Why a request was refused.
struct Refusal {
    reason: DeclineReason,
    text: String,
}

impl Refusal {
    fn new(reason: DeclineReason, text: impl Into<String>) -> Self {
        Self {
            reason,
            text: text.into(),
        }
    }

    fn not_seated() -> Self {
        Self::new(DeclineReason::NotYourTurn, "you are not seated in this game")
    }
}

impl From<GameError> for Refusal {
    fn from(e: GameError) -> Self {
        let reason = if e.is_not_your_turn() {
            DeclineReason::NotYourTurn
        } else if e.is_wrong_time() {
            DeclineReason::NotNow
        } else if e.is_location() {
            DeclineReason::Location
        } else {
            DeclineReason::InvalidRequest
        };
        Self::new(reason, e.to_string())
    }
}

struct GameActor {
    name: GameName,
    game: Game,
    members: BTreeMap<ConnectionId, Member>,
    lobby: Arc<Lobby>,
    queue: GameQueue,
    waiting: Option<Waiting>,
}

impl GameActor {
    fn run(mut self) {
        while let Some(command) = self.queue.take() {
            match command {
                GameCommand::Join { conn, nickname } => self.join(conn, nickname),
                GameCommand::Leave { conn } => self.leave(conn, false),
                GameCommand::ConnectionLost { conn } => self.leave(conn, true),
                GameCommand::Request { conn, message } => self.request(conn, message),
                GameCommand::Tick => self.tick(Instant::now()),
                GameCommand::Shutdown => break,
            }
            if self.members.is_empty() && self.lobby.retire_if_idle(&self.name, &self.queue) {
                break;
            }
        }
        tracing::debug!(game = %self.name, "game actor stopped");
    }

    // -- membership ---------------------------------------------------------

    fn join(&mut self, conn: Arc<dyn Connection>, nickname: Name) {
        let id = conn.id();
        let version = self.lobby.registry.version(id);
        self.broadcast(
            &JoinGame {
                game: self.name.clone(),
                nickname: nickname.clone(),
                password: Text::empty(),
            }
            .into(),
        );
        self.members.insert(
            id,
            Member {
                conn: Arc::clone(&conn),
                nickname: nickname.clone(),
                version: version.clone(),
            },
        );
        tracing::info!(game = %self.name, conn_id = %id, %nickname, "joined");

        let to = Recipient {
            seat: self.game.seat_of(nickname.as_str()),
            version: &version,
        };
        let mut out: Vec<Message> = vec![
            GameMembers {
                game: self.name.clone(),
                members: self.members.values().map(|m| m.nickname.clone()).collect(),
            }
            .into(),
        ];
        for (seat, player) in self.game.players() {
            if let Ok(nickname) = Name::new(player.nickname()) {
                out.push(
                    SitDown {
                        game: self.name.clone(),
                        nickname,
                        seat,
                        robot: player.is_robot(),
                    }
                    .into(),
                );
            }
            outbound::hand_snapshot(&self.name, seat, &player.holding().snapshot(), to, &mut out);
        }
        let state = self.game.state();
        out.push(
            GameStateMsg {
                game: self.name.clone(),
                state,
            }
            .into(),
        );
        if let Some(current) = self.game.current().filter(|_| state.is_active()) {
            out.push(
                Turn {
                    game: self.name.clone(),
                    seat: current,
                    state,
                }
                .into(),
            );
        }
        for message in &out {
            self.lobby.send(conn.as_ref(), message);
        }
    }

    fn leave(&mut self, conn: ConnectionId, lost: bool) {
        let Some(member) = self.members.remove(&conn) else {
            return;
        };
        self.lobby.registry.leave_game(conn, &self.name);
        tracing::info!(game = %self.name, conn_id = %conn, nickname = %member.nickname, lost, "left");
        self.broadcast(
            &LeaveGame {
                game: self.name.clone(),
                nickname: member.nickname.clone(),
            }
            .into(),
        );
        let Some(seat) = self.game.seat_of(member.nickname.as_str()) else {
            return;
        };
        if matches!(self.game.state(), GameState::New | GameState::Ready) {
            match self.game.vacate(seat) {
                Ok(effects) => self.publish(&effects),
                Err(e) => tracing::debug!(game = %self.name, %seat, error = %e, "seat kept"),
            }
        }
    }

    // -- requests -----------------------------------------------------------

    fn request(&mut self, conn: ConnectionId, message: Message) {
        let Some(member) = self.members.get(&conn) else {
            tracing::debug!(game = %self.name, conn_id = %conn, "request from non-member dropped");
            return;
        };
        let nickname = member.nickname.clone();
        if let Message::GameTextMsg(chat) = message {
            self.broadcast(
                &GameTextMsg {
                    game: self.name.clone(),
                    nickname,
                    text: chat.text,
                }
                .into(),
            );
            return;
        }
        let kind = message.message_type();
        match self.apply(conn, &nickname, message) {
            Ok(effects) => {
                tracing::debug!(game = %self.name, %nickname, message = %kind, "applied");
                self.publish(&effects);
            }
            Err(refusal) => self.decline(conn, &nickname, refusal),
        }
    }

    fn apply(
        &mut self,
        conn: ConnectionId,
        nickname: &Name,
        message: Message,
    ) -> Result<Vec<Effect>, Refusal> {
        let seat = self.game.seat_of(nickname.as_str());
        let seated = || seat.ok_or_else(Refusal::not_seated);
        let effects = match message {
            Message::SitDown(m) => {
                if m.nickname != *nickname {
                    return Err(Refusal::new(
                        DeclineReason::InvalidRequest,
                        "you can only seat yourself",
                    ));
                }
                if seat.is_some() {
                    return Err(Refusal::new(
                        DeclineReason::InvalidRequest,
                        "you are already seated",
                    ));
                }
                let robot = self.lobby.registry.is_robot(conn);
                self.game.sit(m.seat, nickname.as_str(), robot)?
            }
            Message::StartGame(_) => {
                seated()?;
                self.game.start(None)?
            }
            Message::PutPiece(m) => self.game.place_piece(seated()?, m.piece, m.coord)?,
            Message::BuildRequest(m) => match m.piece {
                Some(piece) => self.game.build_request(seated()?, piece)?,
                None => self.game.request_special_build(seated()?)?,
            },
            Message::CancelBuildRequest(_) => self.game.cancel_build(seated()?)?,
            Message::RollDice(_) => self.game.roll_dice(seated()?)?,
            Message::Discard(m) => self.game.discard(seated()?, m.resources)?,
            Message::PickResources(m) => {
                let seat = seated()?;
                if self.game.state() == GameState::WaitingForDiscovery {
                    self.game.discovery(seat, m.resources)?
                } else {
                    self.game.pick_gold(seat, m.resources)?
                }
            }
            Message::MoveRobber(m) => self.game.move_robber(seated()?, m.hex(), m.is_pirate())?,
            Message::ChoosePlayer(m) => self.choose(seated()?, m.choice)?,
            Message::EndTurn(_) => self.game.end_turn(seated()?)?,
            Message::BuyDevCardRequest(_) => self.game.buy_dev_card(seated()?)?,
            Message::PlayDevCardRequest(m) => self.game.play_dev_card(seated()?, m.card)?,
            Message::PickResourceType(m) => self.game.monopoly(seated()?, m.rtype)?,
            Message::SimpleRequest(m) if m.request == simple::PLACE_INV_ITEM => {
                if m.value1 == -1 {
                    self.game.start_inv_item(seated()?)?
                } else {
                    self.game.place_inv_item(seated()?)?
                }
            }
            other => {
                return Err(Refusal::new(
                    DeclineReason::InvalidRequest,
                    format!("{} is not a game request", other.message_type()),
                ));
            }
        };
        Ok(effects)
    }

    /// Answers a choice prompt: robber or pirate, a victim, or cloth.
    fn choose(&mut self, seat: Seat, value: i32) -> Result<Vec<Effect>, Refusal> {
        let max_seats = self.game.flags().max_seats;
        let effects = match value {
            choice::MOVE_ROBBER => self.game.choose_robber_or_pirate(seat, false)?,
            choice::MOVE_PIRATE => self.game.choose_robber_or_pirate(seat, true)?,
            v if self.game.state() == GameState::WaitingForRobClothOrResource => {
                self.game.choose_cloth_or_resource(seat, v < 0)?
            }
            v => {
                let victim = Seat::from_wire(v, max_seats).ok_or_else(|| {
                    Refusal::new(DeclineReason::InvalidRequest, format!("no such seat {v}"))
                })?;
                self.game.choose_victim(seat, victim)?
            }
        };
        Ok(effects)
    }

    fn decline(&self, conn: ConnectionId, nickname: &Name, refusal: Refusal) {
        tracing::warn!(
            game = %self.name,
            %nickname,
            reason = ?refusal.reason,
            text = %refusal.text,
            "request declined"
        );
        let Some(member) = self.members.get(&conn) else {
            return;
        };
        if let Some(message) = outbound::decline(
            &self.name,
            refusal.reason,
            self.game.state().rank(),
            &refusal.text,
            &member.version,
        ) {
            self.lobby.send(member.conn.as_ref(), &message);
        }
    }

    // -- output -------------------------------------------------------------

    fn broadcast(&self, message: &Message) {
        for member in self.members.values() {
            self.lobby.send(member.conn.as_ref(), message);
        }
    }

    /// Renders `effects` for each member and sends them.
    fn publish(&mut self, effects: &[Effect]) {
        let hands: BTreeMap<Seat, i32> = self
            .game
            .players()
            .map(|(seat, player)| (seat, player.holding().total()))
            .collect();
        for member in self.members.values() {
            let to = Recipient {
                seat: self.game.seat_of(member.nickname.as_str()),
                version: &member.version,
            };
            let mut out = Vec::new();
            for effect in effects {
                outbound::render(&self.name, effect, to, &hands, &mut out);
            }
            for message in &out {
                self.lobby.send(member.conn.as_ref(), message);
            }
        }
        self.note_waiting(Instant::now());
    }

    // -- watchdog -----------------------------------------------------------

    /// Restarts the clock whenever the game starts waiting on something new.
    fn note_waiting(&mut self, now: Instant) {
        let state = self.game.state();
        let seats = self.game.machine().obligated();
        if seats.is_empty() {
            self.waiting = None;
            return;
        }
        let same = self
            .waiting
            .as_ref()
            .is_some_and(|w| w.state == state && w.seats == seats);
        if !same {
            self.waiting = Some(Waiting {
                state,
                seats,
                since: now,
            });
        }
    }

    /// Whether someone connected is sitting at `seat`.
    fn is_present(&self, seat: Seat) -> bool {
        self.members.values().any(|m| {
            !m.conn.is_closed() && self.game.seat_of(m.nickname.as_str()) == Some(seat)
        })
    }

    fn tick(&mut self, now: Instant) {
        self.note_waiting(now);
        let Some(waiting) = &self.waiting else {
            return;
        };
        let waited = now.saturating_duration_since(waiting.since);
        let limit = self.lobby.config.force_response_after;
        let overdue: Vec<Seat> = waiting
            .seats
            .iter()
            .copied()
            .filter(|seat| overdue(waited, limit, self.is_present(*seat)))
            .collect();
        for seat in overdue {
            match self.game.force_response(seat) {
                Ok(effects) => self.publish(&effects),
                Err(GameError::Violation(StateViolation::NothingOwed { .. })) => {}
                Err(e) => {
                    tracing::debug!(game = %self.name, %seat, error = %e, "could not force response");
                }
            }
        }
    }
}

/// An absent seat gets `limit`; a connected one twice as long.
fn overdue(waited: Duration, limit: Duration, present: bool) -> bool {
    let allowed = if present {
        limit.saturating_mul(2)
    } else {
        limit
    };
    waited >= allowed
}
