//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tradewind::prelude::*;
use tradewind::ServerHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// Forwards every message the client sees into a channel.
pub struct Recorder(Sender<Message>);

impl GameListener for Recorder {
    fn on_game_message(&self, _shadow: &ShadowGame, message: &Message, _tracked: Tracked) {
        let _ = self.0.send(message.clone());
    }

    fn on_session_message(&self, message: &Message) {
        let _ = self.0.send(message.clone());
    }
}

pub fn recorder() -> (Recorder, Receiver<Message>) {
    let (tx, rx) = mpsc::channel();
    (Recorder(tx), rx)
}

/// Waits for the first message matching `pred`, skipping the rest.
pub fn wait_for(rx: &Receiver<Message>, mut pred: impl FnMut(&Message) -> bool) -> Message {
    let deadline = Instant::now() + WAIT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(m) if pred(&m) => return m,
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => panic!("timed out waiting for a message"),
            Err(RecvTimeoutError::Disconnected) => panic!("listener dropped"),
        }
    }
}

pub fn wait_for_state(rx: &Receiver<Message>, state: GameState) {
    wait_for(rx, |m| match m {
        Message::GameStateMsg(s) => s.state == state,
        Message::Turn(t) => t.state == state,
        _ => false,
    });
}

/// Polls `check` until it holds.
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

pub fn local_server(registry: &LocalRegistry, port: &str, config: ServerConfig) -> ServerHandle {
    Server::builder()
        .config(config)
        .local(registry, port)
        .build()
        .unwrap()
        .start()
        .unwrap()
}

pub fn connect(registry: &LocalRegistry, port: &str, nickname: &str) -> (Client, Receiver<Message>) {
    let (listener, rx) = recorder();
    let client =
        Client::connect_local(registry, port, ClientConfig::named(nickname), listener).unwrap();
    (client, rx)
}

/// Joins `game` and waits until the client holds its shadow.
pub fn join(client: &Client, rx: &Receiver<Message>, game: &str) -> GameName {
    let game = client.join(game).unwrap();
    wait_for(rx, |m| matches!(m, Message::GameStateMsg(s) if s.game == game));
    game
}
