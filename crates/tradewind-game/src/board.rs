//! The rules boundary.
//!
//! Board geometry, production, costs and scoring live outside this crate.
//! [`Game`](crate::Game) consults them through [`BoardRules`], in two
//! steps: a read-only query first, then a `commit_*` call once the turn
//! machine has accepted the move. That keeps a rejected request from
//! touching the board.

use std::collections::{BTreeMap, HashMap};

use crate::resources::{ResourceSet, ResourceType};
use crate::state::GameState;
use crate::types::{Coord, PieceKind, Seat};

/// What a dice roll produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Production {
    pub resources: BTreeMap<Seat, ResourceSet>,
    /// Free picks earned from gold hexes.
    pub gold_picks: BTreeMap<Seat, u32>,
}

/// What putting a piece down earns right away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementYield {
    pub resources: ResourceSet,
    pub gold_picks: u32,
}

/// The game-rules collaborator.
pub trait BoardRules: Send {
    /// Resources produced by a dice total (never called for a 7).
    fn production(&self, dice: u8) -> Production;

    /// Whether `seat` may put `piece` at `coord`. `state` is the phase the
    /// placement happens in (initial placements have their own rules).
    fn is_legal_placement(&self, seat: Seat, piece: PieceKind, coord: Coord, state: GameState)
    -> bool;

    /// What the placement would earn. Only asked for legal placements.
    fn placement_yield(
        &self,
        _seat: Seat,
        _piece: PieceKind,
        _coord: Coord,
        _state: GameState,
    ) -> PlacementYield {
        PlacementYield::default()
    }

    /// Records an accepted placement.
    fn commit_placement(&mut self, seat: Seat, piece: PieceKind, coord: Coord);

    /// Seats adjacent to `hex` that `seat` could rob, or `None` if the
    /// robber (or pirate) can't go there.
    fn robbery_candidates(&self, seat: Seat, hex: Coord, pirate: bool) -> Option<Vec<Seat>>;

    /// Records an accepted robber or pirate move.
    fn commit_robber(&mut self, hex: Coord, pirate: bool);

    /// Whether `seat` holds cloth that could be stolen.
    fn has_cloth(&self, _seat: Seat) -> bool {
        false
    }

    /// Moves one cloth from `victim` to `thief`.
    fn steal_cloth(&mut self, _victim: Seat, _thief: Seat) {}

    /// Price of a piece.
    fn cost(&self, piece: PieceKind) -> ResourceSet {
        match piece {
            PieceKind::Road => ResourceSet::from_counts(1, 0, 0, 0, 1, 0),
            PieceKind::Settlement => ResourceSet::from_counts(1, 0, 1, 1, 1, 0),
            PieceKind::City => ResourceSet::from_counts(0, 3, 0, 2, 0, 0),
            PieceKind::Ship => ResourceSet::from_counts(0, 0, 1, 0, 1, 0),
        }
    }

    /// Price of a development card.
    fn dev_card_cost(&self) -> ResourceSet {
        ResourceSet::from_counts(0, 1, 1, 1, 0, 0)
    }

    /// Victory points `seat` has on the board (cards are counted separately).
    fn victory_points(&self, seat: Seat) -> u32;
}

/// A permissive board: every placement is legal, production and robbery
/// candidates are whatever the host configured, and scoring counts
/// settlements (1) and cities (2).
#[derive(Debug, Clone, Default)]
pub struct OpenBoard {
    production: HashMap<u8, Production>,
    neighbours: HashMap<Coord, Vec<Seat>>,
    pieces: Vec<(Seat, PieceKind, Coord)>,
    robber: Option<Coord>,
    pirate: Option<Coord>,
    initial_yield: Option<ResourceSet>,
}

impl OpenBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each `seat` receives `rtype` whenever `dice` is rolled.
    pub fn with_production(mut self, dice: u8, seat: Seat, rtype: ResourceType, amount: i32) -> Self {
        let entry = self.production.entry(dice).or_default();
        entry
            .resources
            .entry(seat)
            .or_default()
            .add(rtype, amount);
        self
    }

    /// `seat` earns `picks` gold picks whenever `dice` is rolled.
    pub fn with_gold(mut self, dice: u8, seat: Seat, picks: u32) -> Self {
        *self
            .production
            .entry(dice)
            .or_default()
            .gold_picks
            .entry(seat)
            .or_default() += picks;
        self
    }

    /// Seats touching `hex`, for robbery.
    pub fn with_neighbours(mut self, hex: Coord, seats: impl IntoIterator<Item = Seat>) -> Self {
        self.neighbours.insert(hex, seats.into_iter().collect());
        self
    }

    /// What a second initial settlement earns.
    pub fn with_initial_yield(mut self, set: ResourceSet) -> Self {
        self.initial_yield = Some(set);
        self
    }

    pub fn robber(&self) -> Option<Coord> {
        self.robber
    }

    pub fn pirate(&self) -> Option<Coord> {
        self.pirate
    }

    pub fn pieces(&self) -> &[(Seat, PieceKind, Coord)] {
        &self.pieces
    }
}

impl BoardRules for OpenBoard {
    fn production(&self, dice: u8) -> Production {
        self.production.get(&dice).cloned().unwrap_or_default()
    }

    fn is_legal_placement(&self, seat: Seat, piece: PieceKind, coord: Coord, _: GameState) -> bool {
        if piece == PieceKind::City {
            return self
                .pieces
                .iter()
                .any(|(s, p, c)| *s == seat && *p == PieceKind::Settlement && *c == coord);
        }
        !self.pieces.iter().any(|(_, _, c)| *c == coord)
    }

    fn placement_yield(
        &self,
        _seat: Seat,
        piece: PieceKind,
        _coord: Coord,
        state: GameState,
    ) -> PlacementYield {
        let resources = match (piece, state) {
            (PieceKind::Settlement, GameState::Start2A) => self.initial_yield.unwrap_or_default(),
            _ => ResourceSet::new(),
        };
        PlacementYield {
            resources,
            gold_picks: 0,
        }
    }

    fn commit_placement(&mut self, seat: Seat, piece: PieceKind, coord: Coord) {
        if piece == PieceKind::City {
            // A city replaces the settlement under it.
            self.pieces
                .retain(|(s, p, c)| !(*s == seat && *p == PieceKind::Settlement && *c == coord));
        }
        self.pieces.push((seat, piece, coord));
    }

    fn robbery_candidates(&self, seat: Seat, hex: Coord, pirate: bool) -> Option<Vec<Seat>> {
        let current = if pirate { self.pirate } else { self.robber };
        if current == Some(hex) {
            return None;
        }
        let seats = self.neighbours.get(&hex).cloned().unwrap_or_default();
        Some(seats.into_iter().filter(|s| *s != seat).collect())
    }

    fn commit_robber(&mut self, hex: Coord, pirate: bool) {
        if pirate {
            self.pirate = Some(hex);
        } else {
            self.robber = Some(hex);
        }
    }

    fn victory_points(&self, seat: Seat) -> u32 {
        self.pieces
            .iter()
            .filter(|(s, _, _)| *s == seat)
            .map(|(_, piece, _)| match piece {
                PieceKind::Settlement => 1,
                PieceKind::City => 2,
                PieceKind::Road | PieceKind::Ship => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_board_rejects_occupied_coord() {
        let mut board = OpenBoard::new();
        assert!(board.is_legal_placement(Seat(0), PieceKind::Settlement, 0x23, GameState::Start1A));
        board.commit_placement(Seat(0), PieceKind::Settlement, 0x23);
        assert!(!board.is_legal_placement(Seat(1), PieceKind::Settlement, 0x23, GameState::Start1A));
    }

    #[test]
    fn test_open_board_city_replaces_settlement_in_score() {
        let mut board = OpenBoard::new();
        board.commit_placement(Seat(0), PieceKind::Settlement, 5);
        board.commit_placement(Seat(0), PieceKind::Road, 6);
        assert_eq!(board.victory_points(Seat(0)), 1);
        assert!(board.is_legal_placement(Seat(0), PieceKind::City, 5, GameState::Play1));
        assert!(!board.is_legal_placement(Seat(1), PieceKind::City, 5, GameState::Play1));
        board.commit_placement(Seat(0), PieceKind::City, 5);
        assert_eq!(board.victory_points(Seat(0)), 2);
    }

    #[test]
    fn test_open_board_robber_cannot_stay_put() {
        let mut board = OpenBoard::new().with_neighbours(9, [Seat(0), Seat(1)]);
        assert_eq!(board.robbery_candidates(Seat(0), 9, false), Some(vec![Seat(1)]));
        board.commit_robber(9, false);
        assert_eq!(board.robbery_candidates(Seat(0), 9, false), None);
        // The pirate is tracked separately.
        assert!(board.robbery_candidates(Seat(0), 9, true).is_some());
    }

    #[test]
    fn test_default_costs() {
        let board = OpenBoard::new();
        assert_eq!(board.cost(PieceKind::City).total(), 5);
        assert_eq!(board.dev_card_cost().amount(ResourceType::Ore), 1);
    }
}
