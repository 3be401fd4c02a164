//! Small identity and vocabulary types shared by the state machine, the
//! game record and the wire protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// A player's seat number at the table (0-based).
///
/// Newtype over `u8` so a seat can't be confused with a coordinate, a count
/// or a wire-level element value. On the wire a seat travels as a plain
/// integer; `-1` means "nobody" and is mapped to `Option<Seat>` at the
/// protocol boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Seat(pub u8);

impl Seat {
    /// Converts a wire integer into a seat, if it is in `0..max_seats`.
    pub fn from_wire(value: i32, max_seats: u8) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v < max_seats)
            .map(Self)
    }

    /// The seat as a wire integer.
    pub fn to_wire(self) -> i32 {
        i32::from(self.0)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat-{}", self.0)
    }
}

/// Largest table size supported (six-player extension).
pub const MAX_SEATS: u8 = 6;

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

/// A piece a player can put on the board.
///
/// The discriminants are the legacy wire numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Road = 0,
    Settlement = 1,
    City = 2,
    Ship = 3,
}

impl PieceKind {
    /// All piece kinds in wire order.
    pub const ALL: [Self; 4] = [Self::Road, Self::Settlement, Self::City, Self::Ship];

    pub fn from_wire(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.to_wire() == value)
    }

    pub fn to_wire(self) -> i32 {
        self as i32
    }

    /// Roads and ships are the two "edge" pieces; either one completes an
    /// initial placement.
    pub fn is_edge(self) -> bool {
        matches!(self, Self::Road | Self::Ship)
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Road => "road",
            Self::Settlement => "settlement",
            Self::City => "city",
            Self::Ship => "ship",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Development cards
// ---------------------------------------------------------------------------

/// A development card type, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DevCard {
    /// A card whose type the observer can't see (another player's hand).
    Unknown = 0,
    RoadBuilding = 1,
    Discovery = 2,
    Monopoly = 3,
    VictoryPoint = 4,
    Knight = 9,
}

impl DevCard {
    pub const ALL: [Self; 6] = [
        Self::Unknown,
        Self::RoadBuilding,
        Self::Discovery,
        Self::Monopoly,
        Self::VictoryPoint,
        Self::Knight,
    ];

    pub fn from_wire(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.to_wire() == value)
    }

    pub fn to_wire(self) -> i32 {
        self as i32
    }

    /// Victory point cards are revealed at game end, never played.
    pub fn is_playable(self) -> bool {
        matches!(
            self,
            Self::RoadBuilding | Self::Discovery | Self::Monopoly | Self::Knight
        )
    }
}

/// A board coordinate (hex, node or edge), opaque to this crate.
///
/// Negative values are meaningful on the wire: a robber move to `-hex`
/// means "move the pirate to `hex`".
pub type Coord = i32;
