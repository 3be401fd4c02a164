//! The game phases and their classification.
//!
//! Every phase has a wire number (its *rank*). Ranks are totally ordered and
//! kept compatible with older peers, but nothing in this crate decides what a
//! phase *means* by comparing ranks: the classification helpers below are
//! exhaustive matches, so a new phase has to be placed in a band explicitly.
//!
//! ```text
//!  Setup band     NEW → READY → START1A/1B → START2A/2B → [START3A/3B] → ROLL_OR_CARD
//!  Turn band      ROLL_OR_CARD → PLAY1 ⇄ PLACING_* / WAITING_FOR_* → … → SPECIAL_BUILDING
//!  Terminal band  LOADING → LOADING_RESUMING → … OVER → RESET_OLD
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A phase of one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Game created, nobody seated.
    New,
    /// Players are sitting down; the game can be started.
    Ready,
    /// A board reset is waiting for robots to leave before restarting.
    ReadyResetWaitRobotDismiss,
    /// First initial settlement.
    Start1A,
    /// First initial road or ship.
    Start1B,
    /// Second initial settlement (reverse seat order).
    Start2A,
    /// Second initial road or ship.
    Start2B,
    /// Third initial settlement, when the game uses three placements.
    Start3A,
    /// Third initial road or ship.
    Start3B,
    /// An initial settlement touched a gold hex; waiting for resource picks.
    StartsWaitingForPickGoldResource,
    /// Current player may roll the dice or play a card first.
    RollOrCard,
    /// Main phase: build, trade, buy or play a card, end turn.
    Play1,
    PlacingRoad,
    PlacingSettlement,
    PlacingCity,
    PlacingRobber,
    PlacingPirate,
    PlacingShip,
    /// First road of a road-building card.
    PlacingFreeRoad1,
    /// Second road of a road-building card.
    PlacingFreeRoad2,
    /// Placing a special inventory item (scenario rules).
    PlacingInvItem,
    WaitingForDiscards,
    WaitingForRobChoosePlayer,
    WaitingForDiscovery,
    WaitingForMonopoly,
    WaitingForRobberOrPirate,
    WaitingForRobClothOrResource,
    WaitingForPickGoldResource,
    /// Six-player special building phase between turns.
    SpecialBuilding,
    /// A saved game is being loaded.
    Loading,
    /// A loaded game waits for robots to rejoin before resuming.
    LoadingResuming,
    /// Game over.
    Over,
    /// This copy of the game was replaced by a board reset.
    ResetOld,
}

/// Coarse grouping of the phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Setup,
    Turn,
    Terminal,
}

impl GameState {
    /// Every phase, in rank order.
    pub const ALL: [Self; 33] = [
        Self::New,
        Self::Ready,
        Self::ReadyResetWaitRobotDismiss,
        Self::Start1A,
        Self::Start1B,
        Self::Start2A,
        Self::Start2B,
        Self::Start3A,
        Self::Start3B,
        Self::StartsWaitingForPickGoldResource,
        Self::RollOrCard,
        Self::Play1,
        Self::PlacingRoad,
        Self::PlacingSettlement,
        Self::PlacingCity,
        Self::PlacingRobber,
        Self::PlacingPirate,
        Self::PlacingShip,
        Self::PlacingFreeRoad1,
        Self::PlacingFreeRoad2,
        Self::PlacingInvItem,
        Self::WaitingForDiscards,
        Self::WaitingForRobChoosePlayer,
        Self::WaitingForDiscovery,
        Self::WaitingForMonopoly,
        Self::WaitingForRobberOrPirate,
        Self::WaitingForRobClothOrResource,
        Self::WaitingForPickGoldResource,
        Self::SpecialBuilding,
        Self::Loading,
        Self::LoadingResuming,
        Self::Over,
        Self::ResetOld,
    ];

    /// The legacy wire number of this phase.
    pub fn rank(self) -> i32 {
        match self {
            Self::New => 0,
            Self::Ready => 1,
            Self::ReadyResetWaitRobotDismiss => 4,
            Self::Start1A => 5,
            Self::Start1B => 6,
            Self::Start2A => 10,
            Self::Start2B => 11,
            Self::Start3A => 12,
            Self::Start3B => 13,
            Self::StartsWaitingForPickGoldResource => 14,
            Self::RollOrCard => 15,
            Self::Play1 => 20,
            Self::PlacingRoad => 30,
            Self::PlacingSettlement => 31,
            Self::PlacingCity => 32,
            Self::PlacingRobber => 33,
            Self::PlacingPirate => 34,
            Self::PlacingShip => 35,
            Self::PlacingFreeRoad1 => 40,
            Self::PlacingFreeRoad2 => 41,
            Self::PlacingInvItem => 42,
            Self::WaitingForDiscards => 50,
            Self::WaitingForRobChoosePlayer => 51,
            Self::WaitingForDiscovery => 52,
            Self::WaitingForMonopoly => 53,
            Self::WaitingForRobberOrPirate => 54,
            Self::WaitingForRobClothOrResource => 55,
            Self::WaitingForPickGoldResource => 56,
            Self::SpecialBuilding => 100,
            Self::Loading => 990,
            Self::LoadingResuming => 991,
            Self::Over => 1000,
            Self::ResetOld => 1001,
        }
    }

    /// Looks a phase up by wire number.
    pub fn from_rank(rank: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.rank() == rank)
    }

    pub fn band(self) -> Band {
        match self {
            Self::New
            | Self::Ready
            | Self::ReadyResetWaitRobotDismiss
            | Self::Start1A
            | Self::Start1B
            | Self::Start2A
            | Self::Start2B
            | Self::Start3A
            | Self::Start3B
            | Self::StartsWaitingForPickGoldResource => Band::Setup,
            Self::RollOrCard
            | Self::Play1
            | Self::PlacingRoad
            | Self::PlacingSettlement
            | Self::PlacingCity
            | Self::PlacingRobber
            | Self::PlacingPirate
            | Self::PlacingShip
            | Self::PlacingFreeRoad1
            | Self::PlacingFreeRoad2
            | Self::PlacingInvItem
            | Self::WaitingForDiscards
            | Self::WaitingForRobChoosePlayer
            | Self::WaitingForDiscovery
            | Self::WaitingForMonopoly
            | Self::WaitingForRobberOrPirate
            | Self::WaitingForRobClothOrResource
            | Self::WaitingForPickGoldResource
            | Self::SpecialBuilding => Band::Turn,
            Self::Loading | Self::LoadingResuming | Self::Over | Self::ResetOld => {
                Band::Terminal
            }
        }
    }

    /// Initial placement phases (START1A through START3B, including the
    /// gold-pick wait between them).
    pub fn is_initial_placement(self) -> bool {
        matches!(
            self,
            Self::Start1A
                | Self::Start1B
                | Self::Start2A
                | Self::Start2B
                | Self::Start3A
                | Self::Start3B
                | Self::StartsWaitingForPickGoldResource
        )
    }

    /// The game is being played: initial placement or a regular turn.
    pub fn is_active(self) -> bool {
        self.is_initial_placement() || self.band() == Band::Turn
    }

    /// The game can't advance until one or more players respond.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::StartsWaitingForPickGoldResource
                | Self::WaitingForDiscards
                | Self::WaitingForRobChoosePlayer
                | Self::WaitingForDiscovery
                | Self::WaitingForMonopoly
                | Self::WaitingForRobberOrPirate
                | Self::WaitingForRobClothOrResource
                | Self::WaitingForPickGoldResource
        )
    }

    /// The current player is placing a piece, the robber/pirate, or an item.
    pub fn is_placing(self) -> bool {
        matches!(
            self,
            Self::PlacingRoad
                | Self::PlacingSettlement
                | Self::PlacingCity
                | Self::PlacingRobber
                | Self::PlacingPirate
                | Self::PlacingShip
                | Self::PlacingFreeRoad1
                | Self::PlacingFreeRoad2
                | Self::PlacingInvItem
        )
    }

    /// Loading, over, or superseded.
    pub fn is_terminal(self) -> bool {
        self.band() == Band::Terminal
    }

    /// The game has ended. A reset marker counts as over so a stale copy of
    /// a reset game is never mistaken for a live one.
    pub fn is_over(self) -> bool {
        matches!(self, Self::Over | Self::ResetOld)
    }
}

impl PartialOrd for GameState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::ReadyResetWaitRobotDismiss => "READY_RESET_WAIT_ROBOT_DISMISS",
            Self::Start1A => "START1A",
            Self::Start1B => "START1B",
            Self::Start2A => "START2A",
            Self::Start2B => "START2B",
            Self::Start3A => "START3A",
            Self::Start3B => "START3B",
            Self::StartsWaitingForPickGoldResource => "STARTS_WAITING_FOR_PICK_GOLD_RESOURCE",
            Self::RollOrCard => "ROLL_OR_CARD",
            Self::Play1 => "PLAY1",
            Self::PlacingRoad => "PLACING_ROAD",
            Self::PlacingSettlement => "PLACING_SETTLEMENT",
            Self::PlacingCity => "PLACING_CITY",
            Self::PlacingRobber => "PLACING_ROBBER",
            Self::PlacingPirate => "PLACING_PIRATE",
            Self::PlacingShip => "PLACING_SHIP",
            Self::PlacingFreeRoad1 => "PLACING_FREE_ROAD1",
            Self::PlacingFreeRoad2 => "PLACING_FREE_ROAD2",
            Self::PlacingInvItem => "PLACING_INV_ITEM",
            Self::WaitingForDiscards => "WAITING_FOR_DISCARDS",
            Self::WaitingForRobChoosePlayer => "WAITING_FOR_ROB_CHOOSE_PLAYER",
            Self::WaitingForDiscovery => "WAITING_FOR_DISCOVERY",
            Self::WaitingForMonopoly => "WAITING_FOR_MONOPOLY",
            Self::WaitingForRobberOrPirate => "WAITING_FOR_ROBBER_OR_PIRATE",
            Self::WaitingForRobClothOrResource => "WAITING_FOR_ROB_CLOTH_OR_RESOURCE",
            Self::WaitingForPickGoldResource => "WAITING_FOR_PICK_GOLD_RESOURCE",
            Self::SpecialBuilding => "SPECIAL_BUILDING",
            Self::Loading => "LOADING",
            Self::LoadingResuming => "LOADING_RESUMING",
            Self::Over => "OVER",
            Self::ResetOld => "RESET_OLD",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_round_trips_through_from_rank() {
        for state in GameState::ALL {
            assert_eq!(GameState::from_rank(state.rank()), Some(state));
        }
        assert_eq!(GameState::from_rank(2), None);
        assert_eq!(GameState::from_rank(-1), None);
    }

    #[test]
    fn test_all_is_sorted_by_rank() {
        // ALL is documented as rank order, and Ord is defined by rank.
        let mut sorted = GameState::ALL;
        sorted.sort();
        assert_eq!(sorted, GameState::ALL);
    }

    #[test]
    fn test_reset_old_ranks_above_over() {
        assert!(GameState::ResetOld > GameState::Over);
        assert!(GameState::ResetOld.is_over());
        assert!(GameState::Over.is_over());
        assert!(!GameState::Loading.is_over());
    }

    #[test]
    fn test_band_classification() {
        assert_eq!(GameState::Ready.band(), Band::Setup);
        assert_eq!(GameState::StartsWaitingForPickGoldResource.band(), Band::Setup);
        assert_eq!(GameState::SpecialBuilding.band(), Band::Turn);
        assert_eq!(GameState::LoadingResuming.band(), Band::Terminal);
    }

    #[test]
    fn test_is_active_covers_setup_placement_and_turns() {
        assert!(GameState::Start1A.is_active());
        assert!(GameState::Play1.is_active());
        assert!(GameState::WaitingForDiscards.is_active());
        assert!(!GameState::Ready.is_active());
        assert!(!GameState::Over.is_active());
    }

    #[test]
    fn test_is_waiting_only_for_response_phases() {
        let waiting: Vec<GameState> = GameState::ALL
            .into_iter()
            .filter(|s| s.is_waiting())
            .collect();
        assert_eq!(waiting.len(), 8);
        assert!(!GameState::PlacingRobber.is_waiting());
        assert!(GameState::PlacingRobber.is_placing());
    }

    #[test]
    fn test_display_uses_wire_names() {
        assert_eq!(GameState::RollOrCard.to_string(), "ROLL_OR_CARD");
        assert_eq!(GameState::WaitingForDiscards.to_string(), "WAITING_FOR_DISCARDS");
    }
}
