//! Integration tests for the game record, driven through a scripted board.

use std::collections::BTreeMap;

use tradewind_game::{
    BoardRules, Coord, DevCard, Effect, Game, GameError, GameFlags, GameState, PieceKind,
    PlacementYield, Production, ResourceSet, ResourceType, Seat, StateViolation, TurnEvent,
    TurnMachine,
};

// =========================================================================
// Scripted board: one gold hex, one cloth village, fixed production.
// =========================================================================

const GOLD_NODE: Coord = 0x0505;
const CLOTH_HEX: Coord = 0x0909;

#[derive(Default)]
struct ScriptedBoard {
    placed: Vec<(Seat, PieceKind, Coord)>,
    cloth: BTreeMap<Seat, u32>,
}

impl BoardRules for ScriptedBoard {
    fn production(&self, dice: u8) -> Production {
        let mut production = Production::default();
        if dice == 6 {
            for seat in self.placed.iter().map(|(s, ..)| *s) {
                production
                    .resources
                    .entry(seat)
                    .or_insert_with(ResourceSet::new)
                    .add(ResourceType::Ore, 1);
            }
        }
        if dice == 11 {
            production.gold_picks.insert(Seat(1), 2);
        }
        production
    }

    fn is_legal_placement(&self, _: Seat, _: PieceKind, coord: Coord, _: GameState) -> bool {
        coord >= 0
    }

    fn placement_yield(
        &self,
        _seat: Seat,
        piece: PieceKind,
        coord: Coord,
        _state: GameState,
    ) -> PlacementYield {
        PlacementYield {
            resources: ResourceSet::new(),
            gold_picks: if piece == PieceKind::Settlement && coord == GOLD_NODE {
                1
            } else {
                0
            },
        }
    }

    fn commit_placement(&mut self, seat: Seat, piece: PieceKind, coord: Coord) {
        self.placed.push((seat, piece, coord));
    }

    fn robbery_candidates(&self, seat: Seat, hex: Coord, _pirate: bool) -> Option<Vec<Seat>> {
        (hex == CLOTH_HEX).then(|| {
            self.cloth
                .keys()
                .copied()
                .filter(|s| *s != seat)
                .collect()
        })
    }

    fn commit_robber(&mut self, _hex: Coord, _pirate: bool) {}

    fn has_cloth(&self, seat: Seat) -> bool {
        self.cloth.get(&seat).is_some_and(|n| *n > 0)
    }

    fn steal_cloth(&mut self, victim: Seat, thief: Seat) {
        if let Some(n) = self.cloth.get_mut(&victim) {
            *n -= 1;
        }
        *self.cloth.entry(thief).or_default() += 1;
    }

    fn victory_points(&self, _seat: Seat) -> u32 {
        0
    }
}

fn started(flags: GameFlags, board: ScriptedBoard, seats: &[u8]) -> Game {
    let mut game = Game::with_seed("scripted", flags, Box::new(board), 42);
    for (i, seat) in seats.iter().enumerate() {
        game.sit(Seat(*seat), format!("p{i}"), false).unwrap();
    }
    game.start(Some(Seat(seats[0]))).unwrap();
    game
}

fn finish_setup(game: &mut Game) {
    let mut coord = 1;
    while game.state().is_initial_placement() {
        let seat = game.current().unwrap();
        game.place_piece(seat, PieceKind::Settlement, coord).unwrap();
        game.place_piece(seat, PieceKind::Road, coord + 1).unwrap();
        coord += 2;
    }
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_gold_settlement_during_setup_waits_for_pick() {
    let mut game = started(GameFlags::default(), ScriptedBoard::default(), &[0, 1]);
    let effects = game.place_piece(Seat(0), PieceKind::Settlement, GOLD_NODE).unwrap();
    assert!(effects.contains(&Effect::PickGoldRequired {
        seat: Seat(0),
        count: 1
    }));
    assert_eq!(game.state(), GameState::StartsWaitingForPickGoldResource);

    // The road can't come before the pick.
    assert!(game.place_piece(Seat(0), PieceKind::Road, 3).is_err());
    game.pick_gold(Seat(0), ResourceSet::of(ResourceType::Wood, 1))
        .unwrap();
    assert_eq!(game.state(), GameState::Start1B);
}

#[test]
fn test_gold_roll_blocks_until_every_pick() {
    let mut game = started(GameFlags::default(), ScriptedBoard::default(), &[0, 1]);
    finish_setup(&mut game);
    let effects = game.roll_dice_as(Seat(0), 11).unwrap();
    assert!(effects.contains(&Effect::PickGoldRequired {
        seat: Seat(1),
        count: 2
    }));
    assert!(matches!(
        game.end_turn(Seat(0)),
        Err(GameError::Violation(StateViolation::WrongState { .. }))
    ));
    assert!(matches!(
        game.pick_gold(Seat(1), ResourceSet::of(ResourceType::Clay, 1)),
        Err(GameError::Violation(StateViolation::WrongCount {
            expected: 2,
            got: 1
        }))
    ));
    game.pick_gold(Seat(1), ResourceSet::of(ResourceType::Clay, 2))
        .unwrap();
    assert_eq!(game.state(), GameState::Play1);
}

#[test]
fn test_cloth_robbery_choice() {
    let flags = GameFlags {
        cloth_robbery: true,
        ..GameFlags::default()
    };
    let mut board = ScriptedBoard::default();
    board.cloth.insert(Seat(1), 2);
    let mut game = started(flags, board, &[0, 1]);
    finish_setup(&mut game);

    game.roll_dice_as(Seat(0), 7).unwrap();
    let effects = game.move_robber(Seat(0), CLOTH_HEX, false).unwrap();
    assert!(effects.contains(&Effect::ChooseClothOrResource {
        seat: Seat(0),
        victim: Seat(1)
    }));
    let effects = game.choose_cloth_or_resource(Seat(0), true).unwrap();
    assert!(effects.contains(&Effect::ClothStolen {
        thief: Seat(0),
        victim: Seat(1)
    }));
    assert_eq!(game.state(), GameState::Play1);
}

#[test]
fn test_robber_on_illegal_hex_rejected() {
    let mut game = started(GameFlags::default(), ScriptedBoard::default(), &[0, 1]);
    finish_setup(&mut game);
    game.roll_dice_as(Seat(0), 7).unwrap();
    assert!(matches!(
        game.move_robber(Seat(0), 1, false),
        Err(GameError::IllegalRobberHex { .. })
    ));
    assert_eq!(game.state(), GameState::PlacingRobber);
}

#[test]
fn test_full_round_of_turns() {
    let mut game = started(GameFlags::default(), ScriptedBoard::default(), &[0, 1, 2]);
    finish_setup(&mut game);
    for expected in [0, 1, 2, 0] {
        assert_eq!(game.current(), Some(Seat(expected)));
        let effects = game.roll_dice_as(Seat(expected), 6).unwrap();
        // Every seat with a piece on the board gets ore on a 6.
        let gains = effects
            .iter()
            .filter(|e| matches!(e, Effect::Gained { .. }))
            .count();
        assert_eq!(gains, 3);
        let effects = game.end_turn(Seat(expected)).unwrap();
        assert!(matches!(effects[0], Effect::TurnStarted { .. }));
    }
}

#[test]
fn test_knight_played_counts() {
    let mut game = started(GameFlags::default(), ScriptedBoard::default(), &[0, 1]);
    finish_setup(&mut game);
    game.grant_dev_card(Seat(0), DevCard::Knight);
    game.play_dev_card(Seat(0), DevCard::Knight).unwrap();
    assert_eq!(game.state(), GameState::PlacingRobber);
    assert_eq!(game.player(Seat(0)).unwrap().knights_played(), 1);
}

// =========================================================================
// Rejections never mutate the machine
// =========================================================================

/// Walks a machine through a representative path and, at every stop, fires
/// every trigger that isn't legal there.
#[test]
fn test_illegal_triggers_never_mutate_any_visited_state() {
    let mut machine = TurnMachine::new(GameFlags::default());
    let mut visited = Vec::new();
    let path = vec![
        TurnEvent::Sit { seat: Seat(0) },
        TurnEvent::Sit { seat: Seat(1) },
        TurnEvent::Start { first: Seat(0) },
        TurnEvent::PiecePlaced {
            seat: Seat(0),
            piece: PieceKind::Settlement,
            gold_picks: 0,
        },
        TurnEvent::PiecePlaced {
            seat: Seat(0),
            piece: PieceKind::Road,
            gold_picks: 0,
        },
    ];
    for event in path {
        visited.push(machine.clone());
        machine.apply(event).unwrap();
    }
    visited.push(machine.clone());

    let probes = [
        TurnEvent::EndTurn { seat: Seat(0) },
        TurnEvent::EndTurn { seat: Seat(1) },
        TurnEvent::Discarded {
            seat: Seat(0),
            count: 1,
        },
        TurnEvent::GoldPicked {
            seat: Seat(1),
            count: 1,
        },
        TurnEvent::ChoseVictim {
            seat: Seat(0),
            victim: Seat(1),
            cloth_choice: false,
        },
        TurnEvent::MonopolyPicked { seat: Seat(0) },
        TurnEvent::InvItemPlaced { seat: Seat(0) },
        TurnEvent::Rolled {
            seat: Seat(1),
            total: 7,
            discards: BTreeMap::new(),
            gold_picks: BTreeMap::new(),
        },
    ];
    for mut snapshot in visited {
        for probe in &probes {
            let before = snapshot.clone();
            if snapshot.apply(probe.clone()).is_err() {
                assert_eq!(snapshot, before, "{probe:?} in {}", before.state());
            } else {
                snapshot = before;
            }
        }
    }
}
