//! Error types for the game layer.

use crate::state::GameState;
use crate::types::{Coord, DevCard, PieceKind, Seat};

/// A trigger the turn machine refuses in its current state.
///
/// Returning one of these never changes the machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    /// The trigger isn't legal in this phase at all.
    #[error("{trigger} is not allowed in state {state}")]
    WrongState {
        state: GameState,
        trigger: &'static str,
    },

    /// Only the current player may do this.
    #[error("{seat} acted but it is {current:?}'s turn")]
    NotYourTurn { seat: Seat, current: Option<Seat> },

    /// The seat has no pending discard or pick.
    #[error("{seat} owes no response")]
    NothingOwed { seat: Seat },

    /// The piece doesn't match what the phase is placing.
    #[error("cannot place a {piece} in state {state}")]
    WrongPiece { piece: PieceKind, state: GameState },

    /// The chosen seat isn't one of the robbery candidates.
    #[error("{seat} is not a robbery candidate")]
    InvalidVictim { seat: Seat },

    /// A discard or pick had the wrong number of resources.
    #[error("expected {expected} resources, got {got}")]
    WrongCount { expected: u32, got: u32 },

    /// A development card was already played this turn.
    #[error("a development card was already played this turn")]
    CardAlreadyPlayed,

    /// Victory point and unknown cards can't be played.
    #[error("{0:?} cannot be played")]
    CardNotPlayable(DevCard),

    /// The game wasn't created with the option this trigger needs.
    #[error("game option {0} is not enabled")]
    OptionDisabled(&'static str),

    /// The seat number is past the table size.
    #[error("{seat} is outside this {max_seats}-seat game")]
    SeatOutOfRange { seat: Seat, max_seats: u8 },

    /// Someone is already sitting there.
    #[error("{0} is already taken")]
    SeatTaken(Seat),

    /// Nobody is sitting there.
    #[error("{0} is not occupied")]
    SeatEmpty(Seat),
}

/// Errors from [`Game`](crate::Game) operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The turn machine rejected the trigger.
    #[error(transparent)]
    Violation(#[from] StateViolation),

    /// The player can't pay for this.
    #[error("{seat} cannot afford this")]
    CannotAfford { seat: Seat },

    /// The player doesn't hold a playable copy of the card.
    #[error("{seat} holds no playable {card:?}")]
    CardNotHeld { seat: Seat, card: DevCard },

    /// The board refused the location.
    #[error("illegal location {coord} for a {piece}")]
    IllegalPlacement { piece: PieceKind, coord: Coord },

    /// The board refused the robber or pirate hex.
    #[error("the {which} cannot move to {coord}")]
    IllegalRobberHex { which: &'static str, coord: Coord },

    /// No development cards left to buy.
    #[error("the development card deck is empty")]
    DeckEmpty,

    /// The request named resources in an invalid way (unknowns, negatives).
    #[error("invalid resource selection: {0}")]
    InvalidResources(String),
}

impl GameError {
    /// Whether this rejection is about turn order rather than the content
    /// of the request.
    pub fn is_not_your_turn(&self) -> bool {
        matches!(self, Self::Violation(StateViolation::NotYourTurn { .. }))
    }

    /// Whether this rejection is about timing ("not now") rather than the
    /// content of the request.
    pub fn is_wrong_time(&self) -> bool {
        matches!(
            self,
            Self::Violation(
                StateViolation::WrongState { .. }
                    | StateViolation::NothingOwed { .. }
                    | StateViolation::CardAlreadyPlayed
            )
        )
    }

    /// Whether this rejection is about a board location.
    pub fn is_location(&self) -> bool {
        matches!(
            self,
            Self::IllegalPlacement { .. } | Self::IllegalRobberHex { .. }
        )
    }
}
