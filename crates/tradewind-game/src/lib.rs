//! Game rules plumbing for Tradewind.
//!
//! The turn state machine, resource accounting and the authoritative game
//! record. Nothing in here touches the network: the server feeds requests
//! into a [`Game`] and turns the returned [`Effect`]s into messages.
//!
//! # Key types
//!
//! - [`GameState`]: every phase, with its wire rank and classification
//! - [`TurnMachine`]: legal transitions; rejects without mutating
//! - [`ResourceSet`] / [`Holding`]: hand accounting with an unknown bucket
//! - [`BoardRules`]: the external rules collaborator ([`OpenBoard`] for tests)
//! - [`Game`]: one game instance: players, deck, dice, board

mod board;
mod error;
mod game;
mod machine;
mod resources;
mod state;
mod types;

pub use board::{BoardRules, OpenBoard, PlacementYield, Production};
pub use error::{GameError, StateViolation};
pub use game::{DISCARD_LIMIT, Effect, Game, Player, Visibility};
pub use machine::{ForcedAction, GameFlags, ROBBER_ROLL, Transition, TurnEvent, TurnMachine};
pub use resources::{Accounting, Holding, ResourceSet, ResourceType, UNKNOWN_RESOURCE};
pub use state::{Band, GameState};
pub use types::{Coord, DevCard, MAX_SEATS, PieceKind, Seat};
