//! The watchdog forces a response out of seats that keep a game waiting.

mod common;

use std::time::Duration;

use common::*;
use tradewind::prelude::*;
use tradewind::SERVER_NICKNAME;

fn impatient() -> ServerConfig {
    ServerConfig {
        watchdog_interval: Duration::from_millis(20),
        force_response_after: Duration::from_millis(100),
        ..ServerConfig::default()
    }
}

fn ran_out_of_time(m: &Message) -> bool {
    matches!(m, Message::GameTextMsg(t)
        if t.nickname.as_str() == SERVER_NICKNAME && t.text.as_str().contains("ran out of time"))
}

#[test]
fn test_disconnected_first_player_placement_is_skipped() {
    let registry = LocalRegistry::new();
    let _handle = local_server(&registry, "absent", impatient());
    let (ann, ann_rx) = connect(&registry, "absent", "ann");
    let (bob, bob_rx) = connect(&registry, "absent", "bob");
    let game = join(&ann, &ann_rx, "harbor");
    join(&bob, &bob_rx, "harbor");
    ann.sit(&game, Seat(0)).unwrap();
    bob.sit(&game, Seat(1)).unwrap();
    wait_for(&bob_rx, |m| matches!(m, Message::SitDown(s) if s.seat == Seat(1)));

    bob.start_game(&game).unwrap();
    let Message::FirstPlayer(first) = wait_for(&bob_rx, |m| matches!(m, Message::FirstPlayer(_)))
    else {
        unreachable!()
    };

    // Whoever goes first walks away; the one who stays watches.
    let (stayer, rx, other) = if first.seat == Seat(0) {
        ann.disconnect();
        (bob, bob_rx, Seat(1))
    } else {
        bob.disconnect();
        (ann, ann_rx, Seat(0))
    };

    wait_for(&rx, ran_out_of_time);
    let Message::Turn(turn) = wait_for(&rx, |m| matches!(m, Message::Turn(_))) else {
        unreachable!()
    };
    assert_eq!(turn.seat, other);
    assert_eq!(turn.state, GameState::Start1A);
    assert_eq!(stayer.shadow(&game, |s| s.current()), Some(Some(other)));
}

#[test]
fn test_connected_player_is_forced_too() {
    let registry = LocalRegistry::new();
    let _handle = local_server(&registry, "present", impatient());
    let (ann, ann_rx) = connect(&registry, "present", "ann");
    let (bob, bob_rx) = connect(&registry, "present", "bob");
    let game = join(&ann, &ann_rx, "harbor");
    join(&bob, &bob_rx, "harbor");
    ann.sit(&game, Seat(0)).unwrap();
    bob.sit(&game, Seat(1)).unwrap();
    wait_for(&ann_rx, |m| matches!(m, Message::SitDown(s) if s.seat == Seat(1)));

    ann.start_game(&game).unwrap();
    wait_for(&ann_rx, |m| matches!(m, Message::FirstPlayer(_)));
    wait_for(&ann_rx, ran_out_of_time);
    assert!(ann.is_connected());
    assert!(bob.is_connected());
}

#[test]
fn test_game_without_seats_is_left_alone() {
    let registry = LocalRegistry::new();
    let handle = local_server(&registry, "idle", impatient());
    let (ann, ann_rx) = connect(&registry, "idle", "ann");
    let game = join(&ann, &ann_rx, "harbor");
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(ann.shadow(&game, |s| s.state()), Some(GameState::New));
    assert_eq!(handle.games(), vec![game]);
}
