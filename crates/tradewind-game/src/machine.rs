//! The turn state machine.
//!
//! [`TurnMachine`] owns the phase, the seat whose turn it is, and the
//! bookkeeping that decides what comes next: who still owes a discard, who
//! can be robbed, who asked for a special building phase. It knows nothing
//! about the board or the players' cards; the caller resolves those and
//! reports the outcome in the [`TurnEvent`] (e.g. how many cards each seat
//! must discard on a 7).
//!
//! [`TurnMachine::apply`] runs the event against a copy of the machine and
//! commits only on success, so a rejected trigger leaves every field as it
//! was.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;
use crate::state::{Band, GameState};
use crate::types::{DevCard, PieceKind, Seat};

/// Dice total that triggers discards and the robber.
pub const ROBBER_ROLL: u8 = 7;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Game options that change which transitions exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameFlags {
    /// A third round of initial placements, in forward order.
    pub three_initial_placements: bool,
    /// Six-player special building phase between turns.
    pub special_building: bool,
    /// After a 7 or a knight, the player chooses robber or pirate.
    pub pirate_fleet: bool,
    /// A robber may take cloth instead of a resource.
    pub cloth_robbery: bool,
    /// Victory points needed to win.
    pub vp_to_win: u32,
    /// Table size.
    pub max_seats: u8,
}

impl Default for GameFlags {
    fn default() -> Self {
        Self {
            three_initial_placements: false,
            special_building: false,
            pirate_fleet: false,
            cloth_robbery: false,
            vp_to_win: 10,
            max_seats: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Events and results
// ---------------------------------------------------------------------------

/// Everything that can move the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Sit { seat: Seat },
    Vacate { seat: Seat },
    Start { first: Seat },
    /// A reset game's robots have left; players can sit again.
    RobotsDismissed,
    /// A piece was put down. `gold_picks` is how many free resources the
    /// placement earned from gold hexes.
    PiecePlaced {
        seat: Seat,
        piece: PieceKind,
        gold_picks: u32,
    },
    BuildRequest { seat: Seat, piece: PieceKind },
    CancelBuild { seat: Seat },
    /// The dice were rolled. On a 7, `discards` says how many cards each
    /// seat must give up; otherwise `gold_picks` says how many free picks
    /// each seat earned.
    Rolled {
        seat: Seat,
        total: u8,
        discards: BTreeMap<Seat, u32>,
        gold_picks: BTreeMap<Seat, u32>,
    },
    Discarded { seat: Seat, count: u32 },
    GoldPicked { seat: Seat, count: u32 },
    ChoseRobberOrPirate { seat: Seat, pirate: bool },
    /// The robber or pirate moved. `victims` are the seats that can be
    /// robbed there; `cloth_choice` is set when a single victim also has
    /// cloth to steal.
    RobberMoved {
        seat: Seat,
        pirate: bool,
        victims: Vec<Seat>,
        cloth_choice: bool,
    },
    ChoseVictim {
        seat: Seat,
        victim: Seat,
        cloth_choice: bool,
    },
    ChoseClothOrResource { seat: Seat, cloth: bool },
    DevCardPlayed { seat: Seat, card: DevCard },
    DiscoveryPicked { seat: Seat },
    MonopolyPicked { seat: Seat },
    BoughtDevCard { seat: Seat },
    SpecialBuildRequest { seat: Seat },
    InvItemStart { seat: Seat },
    InvItemPlaced { seat: Seat },
    EndTurn { seat: Seat },
    /// Resolve whatever `seat` owes without their input.
    ForceResponse { seat: Seat },
    GameOver,
    /// A loaded game waits for robots to rejoin.
    AwaitRobots,
    /// A loaded game resumes play.
    Resume,
    /// This game was superseded by a board reset.
    Reset,
}

impl TurnEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Sit { .. } => "sit down",
            Self::Vacate { .. } => "leave seat",
            Self::Start { .. } => "start game",
            Self::RobotsDismissed => "robots dismissed",
            Self::PiecePlaced { .. } => "place piece",
            Self::BuildRequest { .. } => "build request",
            Self::CancelBuild { .. } => "cancel build",
            Self::Rolled { .. } => "roll dice",
            Self::Discarded { .. } => "discard",
            Self::GoldPicked { .. } => "pick resources",
            Self::ChoseRobberOrPirate { .. } => "choose robber or pirate",
            Self::RobberMoved { .. } => "move robber",
            Self::ChoseVictim { .. } => "choose player",
            Self::ChoseClothOrResource { .. } => "choose cloth or resource",
            Self::DevCardPlayed { .. } => "play card",
            Self::DiscoveryPicked { .. } => "discovery pick",
            Self::MonopolyPicked { .. } => "monopoly pick",
            Self::BoughtDevCard { .. } => "buy card",
            Self::SpecialBuildRequest { .. } => "special build request",
            Self::InvItemStart { .. } => "place item",
            Self::InvItemPlaced { .. } => "item placed",
            Self::EndTurn { .. } => "end turn",
            Self::ForceResponse { .. } => "force response",
            Self::GameOver => "game over",
            Self::AwaitRobots => "await robots",
            Self::Resume => "resume",
            Self::Reset => "reset",
        }
    }
}

/// A default response applied on a seat's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForcedAction {
    /// Discard `count` cards chosen at random.
    Discard { seat: Seat, count: u32 },
    /// Take `count` gold-hex resources chosen at random.
    PickGold { seat: Seat, count: u32 },
    /// The seat's initial placement was skipped.
    SkipPlacement { seat: Seat },
    /// The seat's turn (or special building phase) was ended. `cancelled`
    /// is the phase that was abandoned.
    EndTurn { seat: Seat, cancelled: GameState },
}

/// The outcome of a successful [`TurnMachine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: GameState,
    pub to: GameState,
    pub forced: Option<ForcedAction>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

// ---------------------------------------------------------------------------
// TurnMachine
// ---------------------------------------------------------------------------

/// Phase tracking for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnMachine {
    flags: GameFlags,
    state: GameState,
    /// Phase to return to when a transient phase completes.
    old_state: GameState,
    seats: BTreeSet<Seat>,
    first_player: Option<Seat>,
    current: Option<Seat>,
    dice: Option<u8>,
    /// Seats that still owe a discard or gold pick, and how many.
    pending: BTreeMap<Seat, u32>,
    /// Seats the current player may rob.
    candidates: Vec<Seat>,
    special_requests: BTreeSet<Seat>,
    /// The player whose turn ended when special building began.
    special_origin: Option<Seat>,
    card_played: bool,
    /// For a loaded game, the phase to resume.
    saved_state: Option<GameState>,
}

impl TurnMachine {
    pub fn new(flags: GameFlags) -> Self {
        Self {
            flags,
            state: GameState::New,
            old_state: GameState::New,
            seats: BTreeSet::new(),
            first_player: None,
            current: None,
            dice: None,
            pending: BTreeMap::new(),
            candidates: Vec::new(),
            special_requests: BTreeSet::new(),
            special_origin: None,
            card_played: false,
            saved_state: None,
        }
    }

    /// A fresh copy of a reset game. With robots still seated, it waits for
    /// them to be dismissed before players can sit.
    pub fn after_reset(flags: GameFlags, robots_seated: bool) -> Self {
        let mut machine = Self::new(flags);
        if robots_seated {
            machine.state = GameState::ReadyResetWaitRobotDismiss;
        }
        machine
    }

    /// A game restored from a save, which resumes in `saved` with `current`
    /// to move once its players are back.
    pub fn loading(
        flags: GameFlags,
        seats: impl IntoIterator<Item = Seat>,
        saved: GameState,
        current: Option<Seat>,
    ) -> Self {
        let mut machine = Self::new(flags);
        machine.seats = seats.into_iter().collect();
        machine.state = GameState::Loading;
        machine.old_state = saved;
        machine.saved_state = Some(saved);
        machine.current = current;
        machine.first_player = current;
        machine
    }

    pub fn flags(&self) -> &GameFlags {
        &self.flags
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn old_state(&self) -> GameState {
        self.old_state
    }

    pub fn current(&self) -> Option<Seat> {
        self.current
    }

    pub fn first_player(&self) -> Option<Seat> {
        self.first_player
    }

    pub fn dice(&self) -> Option<u8> {
        self.dice
    }

    pub fn seats(&self) -> impl Iterator<Item = Seat> + '_ {
        self.seats.iter().copied()
    }

    pub fn is_seated(&self, seat: Seat) -> bool {
        self.seats.contains(&seat)
    }

    /// How many cards `seat` still owes in the current waiting phase.
    pub fn owed(&self, seat: Seat) -> Option<u32> {
        self.pending.get(&seat).copied()
    }

    pub fn pending(&self) -> &BTreeMap<Seat, u32> {
        &self.pending
    }

    pub fn candidates(&self) -> &[Seat] {
        &self.candidates
    }

    pub fn card_played(&self) -> bool {
        self.card_played
    }

    pub fn special_requests(&self) -> impl Iterator<Item = Seat> + '_ {
        self.special_requests.iter().copied()
    }

    /// Seats the game is waiting on right now.
    pub fn obligated(&self) -> Vec<Seat> {
        match self.state {
            GameState::WaitingForDiscards
            | GameState::WaitingForPickGoldResource
            | GameState::StartsWaitingForPickGoldResource => self.pending.keys().copied().collect(),
            s if s.is_active() => self.current.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Applies `event`. On error the machine is unchanged.
    pub fn apply(&mut self, event: TurnEvent) -> Result<Transition, StateViolation> {
        let mut next = self.clone();
        let from = self.state;
        let forced = next.step(event)?;
        let to = next.state;
        *self = next;
        Ok(Transition { from, to, forced })
    }

    /// Whether `event` would be accepted, without applying it.
    pub fn check(&self, event: TurnEvent) -> Result<(), StateViolation> {
        self.clone().step(event).map(|_| ())
    }

    fn step(&mut self, event: TurnEvent) -> Result<Option<ForcedAction>, StateViolation> {
        let trigger = event.name();
        match event {
            TurnEvent::Sit { seat } => self.sit(seat, trigger)?,
            TurnEvent::Vacate { seat } => self.vacate(seat, trigger)?,
            TurnEvent::Start { first } => self.start(first, trigger)?,
            TurnEvent::RobotsDismissed => {
                self.require(&[GameState::ReadyResetWaitRobotDismiss], trigger)?;
                self.state = if self.seats.is_empty() {
                    GameState::New
                } else {
                    GameState::Ready
                };
            }
            TurnEvent::PiecePlaced {
                seat,
                piece,
                gold_picks,
            } => self.piece_placed(seat, piece, gold_picks, trigger)?,
            TurnEvent::BuildRequest { seat, piece } => {
                self.require(&[GameState::Play1, GameState::SpecialBuilding], trigger)?;
                self.require_current(seat)?;
                self.old_state = self.state;
                self.state = match piece {
                    PieceKind::Road => GameState::PlacingRoad,
                    PieceKind::Settlement => GameState::PlacingSettlement,
                    PieceKind::City => GameState::PlacingCity,
                    PieceKind::Ship => GameState::PlacingShip,
                };
            }
            TurnEvent::CancelBuild { seat } => {
                self.require(
                    &[
                        GameState::PlacingRoad,
                        GameState::PlacingSettlement,
                        GameState::PlacingCity,
                        GameState::PlacingShip,
                        GameState::PlacingInvItem,
                        GameState::PlacingFreeRoad1,
                        GameState::PlacingFreeRoad2,
                    ],
                    trigger,
                )?;
                self.require_current(seat)?;
                self.state = self.old_state;
            }
            TurnEvent::Rolled {
                seat,
                total,
                discards,
                gold_picks,
            } => self.rolled(seat, total, discards, gold_picks, trigger)?,
            TurnEvent::Discarded { seat, count } => {
                self.require(&[GameState::WaitingForDiscards], trigger)?;
                self.settle_pending(seat, count)?;
                if self.pending.is_empty() {
                    self.enter_robber_phase();
                }
            }
            TurnEvent::GoldPicked { seat, count } => {
                self.require(
                    &[
                        GameState::WaitingForPickGoldResource,
                        GameState::StartsWaitingForPickGoldResource,
                    ],
                    trigger,
                )?;
                self.settle_pending(seat, count)?;
                if self.pending.is_empty() {
                    self.state = self.old_state;
                }
            }
            TurnEvent::ChoseRobberOrPirate { seat, pirate } => {
                self.require(&[GameState::WaitingForRobberOrPirate], trigger)?;
                self.require_current(seat)?;
                self.state = if pirate {
                    GameState::PlacingPirate
                } else {
                    GameState::PlacingRobber
                };
            }
            TurnEvent::RobberMoved {
                seat,
                pirate,
                victims,
                cloth_choice,
            } => {
                let expected = if pirate {
                    GameState::PlacingPirate
                } else {
                    GameState::PlacingRobber
                };
                self.require(&[expected], trigger)?;
                self.require_current(seat)?;
                match victims.as_slice() {
                    [] => self.state = self.old_state,
                    [victim] => self.robbed(*victim, cloth_choice),
                    _ => {
                        self.candidates = victims;
                        self.state = GameState::WaitingForRobChoosePlayer;
                    }
                }
            }
            TurnEvent::ChoseVictim {
                seat,
                victim,
                cloth_choice,
            } => {
                self.require(&[GameState::WaitingForRobChoosePlayer], trigger)?;
                self.require_current(seat)?;
                if !self.candidates.contains(&victim) {
                    return Err(StateViolation::InvalidVictim { seat: victim });
                }
                self.robbed(victim, cloth_choice);
            }
            TurnEvent::ChoseClothOrResource { seat, .. } => {
                if !self.flags.cloth_robbery {
                    return Err(StateViolation::OptionDisabled("cloth robbery"));
                }
                self.require(&[GameState::WaitingForRobClothOrResource], trigger)?;
                self.require_current(seat)?;
                self.candidates.clear();
                self.state = self.old_state;
            }
            TurnEvent::DevCardPlayed { seat, card } => self.play_card(seat, card, trigger)?,
            TurnEvent::DiscoveryPicked { seat } => {
                self.require(&[GameState::WaitingForDiscovery], trigger)?;
                self.require_current(seat)?;
                self.state = self.old_state;
            }
            TurnEvent::MonopolyPicked { seat } => {
                self.require(&[GameState::WaitingForMonopoly], trigger)?;
                self.require_current(seat)?;
                self.state = self.old_state;
            }
            TurnEvent::BoughtDevCard { seat } => {
                self.require(&[GameState::Play1, GameState::SpecialBuilding], trigger)?;
                self.require_current(seat)?;
            }
            TurnEvent::SpecialBuildRequest { seat } => {
                if !self.flags.special_building {
                    return Err(StateViolation::OptionDisabled("special building"));
                }
                if self.state.band() != Band::Turn || self.current == Some(seat) {
                    return Err(self.wrong_state(trigger));
                }
                self.require_seated(seat)?;
                self.special_requests.insert(seat);
            }
            TurnEvent::InvItemStart { seat } => {
                self.require(&[GameState::Play1], trigger)?;
                self.require_current(seat)?;
                self.old_state = self.state;
                self.state = GameState::PlacingInvItem;
            }
            TurnEvent::InvItemPlaced { seat } => {
                self.require(&[GameState::PlacingInvItem], trigger)?;
                self.require_current(seat)?;
                self.state = self.old_state;
            }
            TurnEvent::EndTurn { seat } => {
                self.require(&[GameState::Play1, GameState::SpecialBuilding], trigger)?;
                self.require_current(seat)?;
                self.advance_turn();
            }
            TurnEvent::ForceResponse { seat } => return self.force(seat, trigger).map(Some),
            TurnEvent::GameOver => {
                if !self.state.is_active() {
                    return Err(self.wrong_state(trigger));
                }
                self.pending.clear();
                self.candidates.clear();
                self.state = GameState::Over;
            }
            TurnEvent::AwaitRobots => {
                self.require(&[GameState::Loading], trigger)?;
                self.state = GameState::LoadingResuming;
            }
            TurnEvent::Resume => {
                self.require(&[GameState::Loading, GameState::LoadingResuming], trigger)?;
                let saved = self.saved_state.take().unwrap_or(GameState::RollOrCard);
                self.state = saved;
                self.old_state = saved;
            }
            TurnEvent::Reset => {
                if self.state == GameState::ResetOld {
                    return Err(self.wrong_state(trigger));
                }
                self.state = GameState::ResetOld;
            }
        }
        Ok(None)
    }

    // -- setup --------------------------------------------------------------

    fn sit(&mut self, seat: Seat, trigger: &'static str) -> Result<(), StateViolation> {
        self.require(&[GameState::New, GameState::Ready], trigger)?;
        if seat.0 >= self.flags.max_seats {
            return Err(StateViolation::SeatOutOfRange {
                seat,
                max_seats: self.flags.max_seats,
            });
        }
        if !self.seats.insert(seat) {
            return Err(StateViolation::SeatTaken(seat));
        }
        self.state = GameState::Ready;
        Ok(())
    }

    fn vacate(&mut self, seat: Seat, trigger: &'static str) -> Result<(), StateViolation> {
        self.require(&[GameState::New, GameState::Ready], trigger)?;
        if !self.seats.remove(&seat) {
            return Err(StateViolation::SeatEmpty(seat));
        }
        if self.seats.is_empty() {
            self.state = GameState::New;
        }
        Ok(())
    }

    fn start(&mut self, first: Seat, trigger: &'static str) -> Result<(), StateViolation> {
        self.require(&[GameState::Ready], trigger)?;
        self.require_seated(first)?;
        self.first_player = Some(first);
        self.current = Some(first);
        self.state = GameState::Start1A;
        Ok(())
    }

    fn piece_placed(
        &mut self,
        seat: Seat,
        piece: PieceKind,
        gold_picks: u32,
        trigger: &'static str,
    ) -> Result<(), StateViolation> {
        let state = self.state;
        let expects = |ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(StateViolation::WrongPiece { piece, state })
            }
        };
        match state {
            GameState::Start1A | GameState::Start2A | GameState::Start3A => {
                self.require_current(seat)?;
                expects(piece == PieceKind::Settlement)?;
                let next = match state {
                    GameState::Start1A => GameState::Start1B,
                    GameState::Start2A => GameState::Start2B,
                    _ => GameState::Start3B,
                };
                if gold_picks > 0 {
                    self.pending.insert(seat, gold_picks);
                    self.old_state = next;
                    self.state = GameState::StartsWaitingForPickGoldResource;
                } else {
                    self.state = next;
                }
            }
            GameState::Start1B | GameState::Start2B | GameState::Start3B => {
                self.require_current(seat)?;
                expects(piece.is_edge())?;
                self.finish_initial_placement(seat);
            }
            GameState::PlacingRoad
            | GameState::PlacingSettlement
            | GameState::PlacingCity
            | GameState::PlacingShip => {
                self.require_current(seat)?;
                let wanted = match state {
                    GameState::PlacingRoad => PieceKind::Road,
                    GameState::PlacingSettlement => PieceKind::Settlement,
                    GameState::PlacingCity => PieceKind::City,
                    _ => PieceKind::Ship,
                };
                expects(piece == wanted)?;
                self.after_turn_placement(seat, gold_picks);
            }
            GameState::PlacingFreeRoad1 => {
                self.require_current(seat)?;
                expects(piece.is_edge())?;
                self.state = GameState::PlacingFreeRoad2;
            }
            GameState::PlacingFreeRoad2 => {
                self.require_current(seat)?;
                expects(piece.is_edge())?;
                self.after_turn_placement(seat, gold_picks);
            }
            _ => return Err(self.wrong_state(trigger)),
        }
        Ok(())
    }

    fn after_turn_placement(&mut self, seat: Seat, gold_picks: u32) {
        if gold_picks > 0 {
            self.pending.insert(seat, gold_picks);
            self.state = GameState::WaitingForPickGoldResource;
        } else {
            self.state = self.old_state;
        }
    }

    /// Moves on after `seat` finished a settlement-and-edge pair. Round one
    /// goes forward, round two backward, round three forward again; the
    /// last seat of a round also opens the next one.
    fn finish_initial_placement(&mut self, seat: Seat) {
        let Some(first) = self.first_player else {
            return;
        };
        let last = self.prev_seat(first);
        match self.state {
            GameState::Start1B => {
                if seat == last {
                    self.state = GameState::Start2A;
                } else {
                    self.current = Some(self.next_seat(seat));
                    self.state = GameState::Start1A;
                }
            }
            GameState::Start2B => {
                if seat != first {
                    self.current = Some(self.prev_seat(seat));
                    self.state = GameState::Start2A;
                } else if self.flags.three_initial_placements {
                    self.state = GameState::Start3A;
                } else {
                    self.begin_play(first);
                }
            }
            _ => {
                if seat == last {
                    self.begin_play(first);
                } else {
                    self.current = Some(self.next_seat(seat));
                    self.state = GameState::Start3A;
                }
            }
        }
    }

    fn begin_play(&mut self, first: Seat) {
        self.current = Some(first);
        self.state = GameState::RollOrCard;
        self.old_state = GameState::RollOrCard;
        self.card_played = false;
        self.dice = None;
    }

    // -- turn ---------------------------------------------------------------

    fn rolled(
        &mut self,
        seat: Seat,
        total: u8,
        discards: BTreeMap<Seat, u32>,
        gold_picks: BTreeMap<Seat, u32>,
        trigger: &'static str,
    ) -> Result<(), StateViolation> {
        self.require(&[GameState::RollOrCard], trigger)?;
        self.require_current(seat)?;
        self.dice = Some(total);
        self.old_state = GameState::Play1;
        if total == ROBBER_ROLL {
            self.pending = discards.into_iter().filter(|(_, n)| *n > 0).collect();
            if self.pending.is_empty() {
                self.enter_robber_phase();
            } else {
                self.state = GameState::WaitingForDiscards;
            }
        } else {
            self.pending = gold_picks.into_iter().filter(|(_, n)| *n > 0).collect();
            self.state = if self.pending.is_empty() {
                GameState::Play1
            } else {
                GameState::WaitingForPickGoldResource
            };
        }
        Ok(())
    }

    fn enter_robber_phase(&mut self) {
        self.state = if self.flags.pirate_fleet {
            GameState::WaitingForRobberOrPirate
        } else {
            GameState::PlacingRobber
        };
    }

    fn robbed(&mut self, victim: Seat, cloth_choice: bool) {
        if cloth_choice && self.flags.cloth_robbery {
            self.candidates = vec![victim];
            self.state = GameState::WaitingForRobClothOrResource;
        } else {
            self.candidates.clear();
            self.state = self.old_state;
        }
    }

    fn play_card(
        &mut self,
        seat: Seat,
        card: DevCard,
        trigger: &'static str,
    ) -> Result<(), StateViolation> {
        self.require(&[GameState::RollOrCard, GameState::Play1], trigger)?;
        self.require_current(seat)?;
        if !card.is_playable() {
            return Err(StateViolation::CardNotPlayable(card));
        }
        if self.card_played {
            return Err(StateViolation::CardAlreadyPlayed);
        }
        self.card_played = true;
        self.old_state = self.state;
        match card {
            DevCard::Knight => self.enter_robber_phase(),
            DevCard::RoadBuilding => self.state = GameState::PlacingFreeRoad1,
            DevCard::Discovery => self.state = GameState::WaitingForDiscovery,
            DevCard::Monopoly => self.state = GameState::WaitingForMonopoly,
            DevCard::VictoryPoint | DevCard::Unknown => {}
        }
        Ok(())
    }

    /// Ends the current turn. Special building requesters go first, in seat
    /// order after the player whose turn ended.
    fn advance_turn(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        let origin = *self.special_origin.get_or_insert(current);
        self.special_requests.remove(&current);

        let next_builder = self.special_requests_in_order(origin).into_iter().next();
        if let Some(builder) = next_builder {
            self.special_requests.remove(&builder);
            self.current = Some(builder);
            self.old_state = GameState::SpecialBuilding;
            self.state = GameState::SpecialBuilding;
            return;
        }

        self.special_origin = None;
        let next = self.next_seat(origin);
        self.begin_play(next);
    }

    fn special_requests_in_order(&self, origin: Seat) -> Vec<Seat> {
        let after = self.special_requests.range(Seat(origin.0.saturating_add(1))..);
        let before = self.special_requests.range(..=origin);
        after.chain(before).copied().collect()
    }

    // -- forced responses ---------------------------------------------------

    fn force(&mut self, seat: Seat, trigger: &'static str) -> Result<ForcedAction, StateViolation> {
        match self.state {
            GameState::WaitingForDiscards => {
                let count = self.owed(seat).ok_or(StateViolation::NothingOwed { seat })?;
                self.pending.remove(&seat);
                if self.pending.is_empty() {
                    self.enter_robber_phase();
                }
                Ok(ForcedAction::Discard { seat, count })
            }
            GameState::WaitingForPickGoldResource => {
                let count = self.owed(seat).ok_or(StateViolation::NothingOwed { seat })?;
                self.pending.remove(&seat);
                if self.pending.is_empty() {
                    self.state = self.old_state;
                }
                Ok(ForcedAction::PickGold { seat, count })
            }
            GameState::StartsWaitingForPickGoldResource => {
                let count = self.owed(seat).ok_or(StateViolation::NothingOwed { seat })?;
                self.pending.remove(&seat);
                if self.pending.is_empty() {
                    self.state = self.old_state;
                }
                Ok(ForcedAction::PickGold { seat, count })
            }
            s if s.is_initial_placement() => {
                self.require_current(seat)?;
                // Skipping either half of a placement skips the whole pair.
                self.state = match s {
                    GameState::Start1A => GameState::Start1B,
                    GameState::Start2A => GameState::Start2B,
                    GameState::Start3A => GameState::Start3B,
                    other => other,
                };
                self.finish_initial_placement(seat);
                Ok(ForcedAction::SkipPlacement { seat })
            }
            s if s.band() == Band::Turn => {
                self.require_current(seat)?;
                self.pending.clear();
                self.candidates.clear();
                self.advance_turn();
                Ok(ForcedAction::EndTurn {
                    seat,
                    cancelled: s,
                })
            }
            _ => Err(self.wrong_state(trigger)),
        }
    }

    // -- helpers ------------------------------------------------------------

    fn settle_pending(&mut self, seat: Seat, count: u32) -> Result<(), StateViolation> {
        let expected = self.owed(seat).ok_or(StateViolation::NothingOwed { seat })?;
        if expected != count {
            return Err(StateViolation::WrongCount {
                expected,
                got: count,
            });
        }
        self.pending.remove(&seat);
        Ok(())
    }

    fn require(&self, allowed: &[GameState], trigger: &'static str) -> Result<(), StateViolation> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.wrong_state(trigger))
        }
    }

    fn require_current(&self, seat: Seat) -> Result<(), StateViolation> {
        if self.current == Some(seat) {
            Ok(())
        } else {
            Err(StateViolation::NotYourTurn {
                seat,
                current: self.current,
            })
        }
    }

    fn require_seated(&self, seat: Seat) -> Result<(), StateViolation> {
        if self.seats.contains(&seat) {
            Ok(())
        } else {
            Err(StateViolation::SeatEmpty(seat))
        }
    }

    fn wrong_state(&self, trigger: &'static str) -> StateViolation {
        StateViolation::WrongState {
            state: self.state,
            trigger,
        }
    }

    fn next_seat(&self, seat: Seat) -> Seat {
        self.seats
            .range(Seat(seat.0.saturating_add(1))..)
            .next()
            .or_else(|| self.seats.iter().next())
            .copied()
            .unwrap_or(seat)
    }

    fn prev_seat(&self, seat: Seat) -> Seat {
        self.seats
            .range(..seat)
            .next_back()
            .or_else(|| self.seats.iter().next_back())
            .copied()
            .unwrap_or(seat)
    }
}
