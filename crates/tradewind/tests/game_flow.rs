//! A two-player game driven through real connections: seating, initial
//! placement in snake order, rolling until a seven, discards, and the robber.

mod common;

use std::sync::mpsc::Receiver;

use common::*;
use tradewind::prelude::*;
use tradewind_game::PieceKind;
use tradewind_protocol::{DeclineReason, Discard, MoveRobber, PutPiece};

struct Table {
    ann: Client,
    ann_rx: Receiver<Message>,
    bob: Client,
    bob_rx: Receiver<Message>,
    game: GameName,
}

impl Table {
    fn at(&self, seat: Seat) -> &Client {
        if seat == Seat(0) { &self.ann } else { &self.bob }
    }

    fn rx(&self, seat: Seat) -> &Receiver<Message> {
        if seat == Seat(0) { &self.ann_rx } else { &self.bob_rx }
    }

    /// Places a piece and waits until ann sees it announced.
    fn place(&self, seat: Seat, piece: PieceKind, coord: i32) {
        self.at(seat)
            .send(PutPiece {
                game: self.game.clone(),
                seat,
                piece,
                coord,
            })
            .unwrap();
        wait_for(&self.ann_rx, |m| matches!(m, Message::PutPiece(p) if p.coord == coord));
    }
}

fn seated_table(registry: &LocalRegistry, port: &str) -> (tradewind::ServerHandle, Table) {
    let config = ServerConfig {
        dice_seed: Some(7),
        ..ServerConfig::default()
    };
    let handle = Server::builder()
        .config(config)
        .local(registry, port)
        .board_factory(|_| {
            Box::new(OpenBoard::new().with_initial_yield(ResourceSet::from_counts(2, 2, 2, 1, 1, 0)))
        })
        .build()
        .unwrap()
        .start()
        .unwrap();

    let (ann, ann_rx) = connect(registry, port, "ann");
    let (bob, bob_rx) = connect(registry, port, "bob");
    let game = join(&ann, &ann_rx, "harbor");
    join(&bob, &bob_rx, "harbor");

    ann.sit(&game, Seat(0)).unwrap();
    bob.sit(&game, Seat(1)).unwrap();
    wait_for(&ann_rx, |m| matches!(m, Message::SitDown(s) if s.seat == Seat(1)));
    (
        handle,
        Table {
            ann,
            ann_rx,
            bob,
            bob_rx,
            game,
        },
    )
}

/// Starts the game and plays both rounds of initial placement. Returns the
/// first player, who is current afterwards.
fn play_setup(table: &Table) -> Seat {
    table.ann.start_game(&table.game).unwrap();
    let Message::FirstPlayer(first) =
        wait_for(&table.ann_rx, |m| matches!(m, Message::FirstPlayer(_)))
    else {
        unreachable!()
    };
    let first = first.seat;
    let other = if first == Seat(0) { Seat(1) } else { Seat(0) };

    let mut coord = 1;
    for seat in [first, other, other, first] {
        table.place(seat, PieceKind::Settlement, coord);
        table.place(seat, PieceKind::Road, coord + 1);
        coord += 2;
    }
    wait_for_state(&table.ann_rx, GameState::RollOrCard);
    first
}

#[test]
fn test_setup_runs_in_snake_order_and_pays_second_settlement() {
    let registry = LocalRegistry::new();
    let (_handle, table) = seated_table(&registry, "setup");
    let first = play_setup(&table);

    let (state, current, hands) = table
        .ann
        .shadow(&table.game, |s| {
            (
                s.state(),
                s.current(),
                [
                    s.seat(Seat(0)).map(|p| p.hand().total()),
                    s.seat(Seat(1)).map(|p| p.hand().total()),
                ],
            )
        })
        .unwrap();
    assert_eq!(state, GameState::RollOrCard);
    assert_eq!(current, Some(first));
    assert_eq!(hands, [Some(8), Some(8)]);

    wait_for_state(&table.bob_rx, GameState::RollOrCard);
    let pieces = table
        .bob
        .shadow(&table.game, |s| {
            s.seat(Seat(0))
                .map(|p| (p.pieces(PieceKind::Settlement), p.pieces(PieceKind::Road)))
        })
        .unwrap();
    assert_eq!(pieces, Some((2, 2)));
}

#[test]
fn test_roll_out_of_turn_is_declined() {
    let registry = LocalRegistry::new();
    let (_handle, table) = seated_table(&registry, "decline");
    let first = play_setup(&table);
    let other = if first == Seat(0) { Seat(1) } else { Seat(0) };

    table.at(other).roll(&table.game).unwrap();
    let Message::DeclinePlayerRequest(declined) = wait_for(table.rx(other), |m| {
        matches!(m, Message::DeclinePlayerRequest(_))
    }) else {
        unreachable!()
    };
    assert_eq!(declined.reason, DeclineReason::NotYourTurn);
    assert_eq!(
        table.ann.shadow(&table.game, |s| s.state()),
        Some(GameState::RollOrCard)
    );
}

#[test]
fn test_seven_waits_for_discards_then_robber() {
    let registry = LocalRegistry::new();
    let (_handle, table) = seated_table(&registry, "seven");
    let mut current = play_setup(&table);

    let mut rolled_seven = false;
    for _ in 0..300 {
        table.at(current).roll(&table.game).unwrap();
        let Message::DiceResult(dice) =
            wait_for(&table.ann_rx, |m| matches!(m, Message::DiceResult(_)))
        else {
            unreachable!()
        };
        if dice.total == 7 {
            rolled_seven = true;
            break;
        }
        table.at(current).end_turn(&table.game).unwrap();
        let Message::Turn(turn) = wait_for(&table.ann_rx, |m| matches!(m, Message::Turn(_)))
        else {
            unreachable!()
        };
        current = turn.seat;
    }
    assert!(rolled_seven, "no seven in 300 rolls");

    // Both hold eight cards, so both owe four. Prompts precede the phase.
    for seat in [Seat(0), Seat(1)] {
        let Message::DiscardRequest(request) =
            wait_for(table.rx(seat), |m| matches!(m, Message::DiscardRequest(_)))
        else {
            unreachable!()
        };
        assert_eq!(request.count, 4);
    }
    wait_for_state(&table.ann_rx, GameState::WaitingForDiscards);

    table
        .ann
        .send(Discard {
            game: table.game.clone(),
            resources: ResourceSet::from_counts(2, 2, 0, 0, 0, 0),
        })
        .unwrap();
    table
        .bob
        .send(Discard {
            game: table.game.clone(),
            resources: ResourceSet::from_counts(0, 0, 2, 1, 1, 0),
        })
        .unwrap();

    // The robber phase follows the last discard directly.
    let next = wait_for(&table.ann_rx, |m| matches!(m, Message::GameStateMsg(_)));
    assert!(matches!(next, Message::GameStateMsg(s) if s.state == GameState::PlacingRobber));

    let (own, other) = table
        .ann
        .shadow(&table.game, |s| {
            (
                s.seat(Seat(0)).map(|p| p.hand()),
                s.seat(Seat(1)).map(|p| p.hand().total()),
            )
        })
        .unwrap();
    let own = own.unwrap();
    assert_eq!(own.total(), 4);
    assert_eq!(own.amount(tradewind_game::ResourceType::Clay), 0);
    assert_eq!(other, Some(4));

    table
        .at(current)
        .send(MoveRobber::robber(table.game.clone(), current, 9))
        .unwrap();
    wait_for(&table.ann_rx, |m| matches!(m, Message::MoveRobber(r) if r.hex() == 9));
    wait_for_state(&table.ann_rx, GameState::Play1);
    assert_eq!(table.ann.shadow(&table.game, |s| s.robber()), Some(Some(9)));
}

#[test]
fn test_chat_reaches_other_members() {
    let registry = LocalRegistry::new();
    let (_handle, table) = seated_table(&registry, "chat");
    table.ann.chat(&table.game, "good luck").unwrap();
    wait_for(&table.bob_rx, |m| {
        matches!(m, Message::GameTextMsg(t) if t.nickname.as_str() == "ann" && t.text.as_str() == "good luck")
    });
}
