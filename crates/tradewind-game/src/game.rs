//! The authoritative game record.
//!
//! A [`Game`] combines the [`TurnMachine`] with the players' hands, the
//! development card deck and the board. Each operation validates against
//! the machine, applies the consequences, and returns the [`Effect`]s that
//! describe what changed and who is allowed to see it. Turning effects into
//! messages is the caller's job.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::board::BoardRules;
use crate::error::{GameError, StateViolation};
use crate::machine::{ForcedAction, GameFlags, ROBBER_ROLL, Transition, TurnEvent, TurnMachine};
use crate::resources::{Holding, ResourceSet, ResourceType};
use crate::state::GameState;
use crate::types::{Coord, DevCard, PieceKind, Seat};

/// Hands above this size must discard half on a 7.
pub const DISCARD_LIMIT: i32 = 7;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Who may see the details of a resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Only these seats see the resource types; everyone else sees the
    /// same number of unknown resources.
    Only(Vec<Seat>),
}

impl Visibility {
    /// Whether `viewer` (a seat, or `None` for an observer) sees details.
    pub fn reveals_to(&self, viewer: Option<Seat>) -> bool {
        match self {
            Self::Public => true,
            Self::Only(seats) => viewer.is_some_and(|v| seats.contains(&v)),
        }
    }
}

/// One observable consequence of a game operation, in the order it
/// happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SatDown {
        seat: Seat,
        nickname: String,
        robot: bool,
    },
    LeftSeat {
        seat: Seat,
    },
    FirstPlayer {
        seat: Seat,
    },
    StateChanged {
        state: GameState,
    },
    TurnStarted {
        seat: Seat,
        state: GameState,
    },
    DiceRolled {
        seat: Seat,
        total: u8,
    },
    Gained {
        seat: Seat,
        resources: ResourceSet,
        visibility: Visibility,
    },
    Lost {
        seat: Seat,
        resources: ResourceSet,
        visibility: Visibility,
    },
    DiscardRequired {
        seat: Seat,
        count: u32,
    },
    PickGoldRequired {
        seat: Seat,
        count: u32,
    },
    ChooseRobberOrPirate {
        seat: Seat,
    },
    RobberMoved {
        seat: Seat,
        hex: Coord,
        pirate: bool,
    },
    ChooseVictim {
        seat: Seat,
        candidates: Vec<Seat>,
    },
    ChooseClothOrResource {
        seat: Seat,
        victim: Seat,
    },
    Robbed {
        thief: Seat,
        victim: Seat,
    },
    ClothStolen {
        thief: Seat,
        victim: Seat,
    },
    PiecePlaced {
        seat: Seat,
        piece: PieceKind,
        coord: Coord,
    },
    BuildCancelled {
        seat: Seat,
        piece: Option<PieceKind>,
    },
    /// Only `seat` may learn which card it was.
    DevCardDrawn {
        seat: Seat,
        card: DevCard,
    },
    DevCardPlayed {
        seat: Seat,
        card: DevCard,
    },
    Monopolized {
        seat: Seat,
        rtype: ResourceType,
        total: i32,
    },
    SpecialBuildRequested {
        seat: Seat,
    },
    Forced(ForcedAction),
    GameOver {
        winner: Option<Seat>,
    },
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One seated player.
#[derive(Debug)]
pub struct Player {
    nickname: String,
    robot: bool,
    holding: Holding,
    /// Cards playable this turn.
    cards: Vec<DevCard>,
    /// Cards bought this turn; playable from the next one.
    new_cards: Vec<DevCard>,
    knights: u32,
}

impl Player {
    fn new(nickname: String, robot: bool) -> Self {
        Self {
            nickname,
            robot,
            holding: Holding::new(),
            cards: Vec::new(),
            new_cards: Vec::new(),
            knights: 0,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn is_robot(&self) -> bool {
        self.robot
    }

    pub fn holding(&self) -> &Holding {
        &self.holding
    }

    pub fn dev_card_count(&self) -> usize {
        self.cards.len() + self.new_cards.len()
    }

    pub fn knights_played(&self) -> u32 {
        self.knights
    }

    fn victory_cards(&self) -> u32 {
        let count = self
            .cards
            .iter()
            .chain(&self.new_cards)
            .filter(|c| **c == DevCard::VictoryPoint)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One game instance.
pub struct Game {
    name: String,
    machine: TurnMachine,
    board: Box<dyn BoardRules>,
    players: BTreeMap<Seat, Player>,
    deck: Vec<DevCard>,
    rng: StdRng,
    winner: Option<Seat>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("name", &self.name)
            .field("machine", &self.machine)
            .field("players", &self.players)
            .field("deck", &self.deck.len())
            .finish_non_exhaustive()
    }
}

type Outcome = Result<Vec<Effect>, GameError>;

impl Game {
    pub fn new(name: impl Into<String>, flags: GameFlags, board: Box<dyn BoardRules>) -> Self {
        Self::with_rng(name, flags, board, StdRng::from_os_rng())
    }

    /// A game whose dice, deck and forced choices follow `seed`.
    pub fn with_seed(
        name: impl Into<String>,
        flags: GameFlags,
        board: Box<dyn BoardRules>,
        seed: u64,
    ) -> Self {
        Self::with_rng(name, flags, board, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        name: impl Into<String>,
        flags: GameFlags,
        board: Box<dyn BoardRules>,
        mut rng: StdRng,
    ) -> Self {
        let mut deck = standard_deck();
        deck.shuffle(&mut rng);
        Self {
            name: name.into(),
            machine: TurnMachine::new(flags),
            board,
            players: BTreeMap::new(),
            deck,
            rng,
            winner: None,
        }
    }

    /// Rebuilds a saved game. It stays in LOADING until [`Game::resume`].
    pub fn restore(
        name: impl Into<String>,
        flags: GameFlags,
        board: Box<dyn BoardRules>,
        players: Vec<(Seat, String, bool, ResourceSet)>,
        saved: GameState,
        current: Option<Seat>,
    ) -> Self {
        let mut game = Self::new(name, flags.clone(), board);
        let seats: Vec<Seat> = players.iter().map(|(seat, ..)| *seat).collect();
        game.machine = TurnMachine::loading(flags, seats, saved, current);
        for (seat, nickname, robot, hand) in players {
            let player = Player::new(nickname, robot);
            player.holding.replace(hand);
            game.players.insert(seat, player);
        }
        game
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine(&self) -> &TurnMachine {
        &self.machine
    }

    pub fn state(&self) -> GameState {
        self.machine.state()
    }

    pub fn flags(&self) -> &GameFlags {
        self.machine.flags()
    }

    pub fn current(&self) -> Option<Seat> {
        self.machine.current()
    }

    pub fn winner(&self) -> Option<Seat> {
        self.winner
    }

    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.players.get(&seat)
    }

    pub fn players(&self) -> impl Iterator<Item = (Seat, &Player)> {
        self.players.iter().map(|(s, p)| (*s, p))
    }

    pub fn seat_of(&self, nickname: &str) -> Option<Seat> {
        self.players
            .iter()
            .find(|(_, p)| p.nickname == nickname)
            .map(|(s, _)| *s)
    }

    pub fn deck_remaining(&self) -> usize {
        self.deck.len()
    }

    pub fn victory_points(&self, seat: Seat) -> u32 {
        let cards = self.players.get(&seat).map_or(0, Player::victory_cards);
        self.board.victory_points(seat) + cards
    }

    // -- seating ------------------------------------------------------------

    pub fn sit(&mut self, seat: Seat, nickname: impl Into<String>, robot: bool) -> Outcome {
        let nickname = nickname.into();
        let (_, state_fx) = self.transition(TurnEvent::Sit { seat })?;
        self.players.insert(seat, Player::new(nickname.clone(), robot));
        let mut effects = vec![Effect::SatDown {
            seat,
            nickname,
            robot,
        }];
        effects.extend(state_fx);
        Ok(effects)
    }

    pub fn vacate(&mut self, seat: Seat) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::Vacate { seat })?;
        self.players.remove(&seat);
        let mut effects = vec![Effect::LeftSeat { seat }];
        effects.extend(state_fx);
        Ok(effects)
    }

    /// Starts the game. With no `first`, a seated player is drawn at random.
    pub fn start(&mut self, first: Option<Seat>) -> Outcome {
        let first = match first {
            Some(seat) => seat,
            None => {
                let seats: Vec<Seat> = self.machine.seats().collect();
                if seats.is_empty() {
                    return Err(StateViolation::WrongState {
                        state: self.state(),
                        trigger: "start game",
                    }
                    .into());
                }
                seats[self.rng.random_range(0..seats.len())]
            }
        };
        let (_, state_fx) = self.transition(TurnEvent::Start { first })?;
        tracing::info!(game = %self.name, %first, "game started");
        let mut effects = vec![Effect::FirstPlayer { seat: first }];
        effects.extend(state_fx);
        Ok(effects)
    }

    // -- building -----------------------------------------------------------

    pub fn place_piece(&mut self, seat: Seat, piece: PieceKind, coord: Coord) -> Outcome {
        self.machine.check(TurnEvent::PiecePlaced {
            seat,
            piece,
            gold_picks: 0,
        })?;
        let state = self.state();
        if !self.board.is_legal_placement(seat, piece, coord, state) {
            return Err(GameError::IllegalPlacement { piece, coord });
        }
        let earned = self.board.placement_yield(seat, piece, coord, state);
        let (_, state_fx) = self.transition(TurnEvent::PiecePlaced {
            seat,
            piece,
            gold_picks: earned.gold_picks,
        })?;
        self.board.commit_placement(seat, piece, coord);

        let mut effects = vec![Effect::PiecePlaced { seat, piece, coord }];
        if !earned.resources.is_empty() {
            self.gain(seat, &earned.resources, Visibility::Public, &mut effects);
        }
        if earned.gold_picks > 0 {
            effects.push(Effect::PickGoldRequired {
                seat,
                count: earned.gold_picks,
            });
        }
        effects.extend(state_fx);
        if !state.is_initial_placement() {
            self.check_victory(seat, &mut effects);
        }
        Ok(effects)
    }

    /// Pays for a piece and enters its placing phase.
    pub fn build_request(&mut self, seat: Seat, piece: PieceKind) -> Outcome {
        self.machine.check(TurnEvent::BuildRequest { seat, piece })?;
        let cost = self.board.cost(piece);
        self.charge(seat, &cost)?;
        let (_, state_fx) = self.transition(TurnEvent::BuildRequest { seat, piece })?;
        let mut effects = vec![Effect::Lost {
            seat,
            resources: cost,
            visibility: Visibility::Public,
        }];
        effects.extend(state_fx);
        Ok(effects)
    }

    /// Leaves a placing phase, refunding a paid-for piece.
    pub fn cancel_build(&mut self, seat: Seat) -> Outcome {
        let refund = paid_piece(self.state());
        let (_, state_fx) = self.transition(TurnEvent::CancelBuild { seat })?;
        let mut effects = vec![Effect::BuildCancelled {
            seat,
            piece: refund,
        }];
        if let Some(piece) = refund {
            let cost = self.board.cost(piece);
            self.gain(seat, &cost, Visibility::Public, &mut effects);
        }
        effects.extend(state_fx);
        Ok(effects)
    }

    // -- dice ---------------------------------------------------------------

    pub fn roll_dice(&mut self, seat: Seat) -> Outcome {
        let total = self.rng.random_range(1..=6u8) + self.rng.random_range(1..=6u8);
        self.roll_dice_as(seat, total)
    }

    /// Resolves a roll of `total`.
    pub fn roll_dice_as(&mut self, seat: Seat, total: u8) -> Outcome {
        let mut discards = BTreeMap::new();
        let mut production = None;
        if total == ROBBER_ROLL {
            for (s, player) in &self.players {
                let held = player.holding.total();
                if held > DISCARD_LIMIT {
                    discards.insert(*s, u32::try_from(held / 2).unwrap_or(0));
                }
            }
        } else {
            production = Some(self.board.production(total));
        }
        let gold_picks = production
            .as_ref()
            .map(|p| p.gold_picks.clone())
            .unwrap_or_default();
        let (_, state_fx) = self.transition(TurnEvent::Rolled {
            seat,
            total,
            discards,
            gold_picks,
        })?;
        tracing::debug!(game = %self.name, %seat, total, "dice rolled");

        let mut effects = vec![Effect::DiceRolled { seat, total }];
        if let Some(production) = production {
            for (s, set) in &production.resources {
                if self.players.contains_key(s) && !set.is_empty() {
                    self.gain(*s, set, Visibility::Public, &mut effects);
                }
            }
        }
        effects.extend(self.owed_effects());
        effects.extend(state_fx);
        self.prompt_robber_choice(&mut effects);
        Ok(effects)
    }

    pub fn discard(&mut self, seat: Seat, set: ResourceSet) -> Outcome {
        let count = known_count(&set)?;
        self.require_holds(seat, &set)?;
        let (_, state_fx) = self.transition(TurnEvent::Discarded { seat, count })?;
        let mut effects = Vec::new();
        self.lose(seat, &set, Visibility::Only(vec![seat]), &mut effects);
        effects.extend(state_fx);
        self.prompt_robber_choice(&mut effects);
        Ok(effects)
    }

    pub fn pick_gold(&mut self, seat: Seat, set: ResourceSet) -> Outcome {
        let count = known_count(&set)?;
        let (_, state_fx) = self.transition(TurnEvent::GoldPicked { seat, count })?;
        let mut effects = Vec::new();
        self.gain(seat, &set, Visibility::Public, &mut effects);
        effects.extend(state_fx);
        Ok(effects)
    }

    // -- robber -------------------------------------------------------------

    pub fn choose_robber_or_pirate(&mut self, seat: Seat, pirate: bool) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::ChoseRobberOrPirate { seat, pirate })?;
        Ok(state_fx)
    }

    pub fn move_robber(&mut self, seat: Seat, hex: Coord, pirate: bool) -> Outcome {
        self.machine.check(TurnEvent::RobberMoved {
            seat,
            pirate,
            victims: Vec::new(),
            cloth_choice: false,
        })?;
        let which = if pirate { "pirate" } else { "robber" };
        // The wire carries the pirate as a negated hex, so a pirate can't
        // land on 0 and neither piece can land on a negative hex.
        if hex < 0 || (pirate && hex == 0) {
            return Err(GameError::IllegalRobberHex { which, coord: hex });
        }
        let candidates = self
            .board
            .robbery_candidates(seat, hex, pirate)
            .ok_or(GameError::IllegalRobberHex { which, coord: hex })?;
        let victims: Vec<Seat> = candidates
            .into_iter()
            .filter(|v| self.can_be_robbed(*v))
            .collect();
        let cloth_choice = match victims.as_slice() {
            [victim] => self.cloth_choice(*victim),
            _ => false,
        };
        let (_, state_fx) = self.transition(TurnEvent::RobberMoved {
            seat,
            pirate,
            victims: victims.clone(),
            cloth_choice,
        })?;
        self.board.commit_robber(hex, pirate);

        let mut effects = vec![Effect::RobberMoved { seat, hex, pirate }];
        match self.state() {
            GameState::WaitingForRobChoosePlayer => effects.push(Effect::ChooseVictim {
                seat,
                candidates: victims,
            }),
            GameState::WaitingForRobClothOrResource => {
                if let Some(victim) = victims.first() {
                    effects.push(Effect::ChooseClothOrResource {
                        seat,
                        victim: *victim,
                    });
                }
            }
            _ => {
                if let Some(victim) = victims.first() {
                    self.rob(seat, *victim, &mut effects);
                }
            }
        }
        effects.extend(state_fx);
        Ok(effects)
    }

    pub fn choose_victim(&mut self, seat: Seat, victim: Seat) -> Outcome {
        let cloth_choice = self.cloth_choice(victim);
        let (_, state_fx) = self.transition(TurnEvent::ChoseVictim {
            seat,
            victim,
            cloth_choice,
        })?;
        let mut effects = Vec::new();
        if self.state() == GameState::WaitingForRobClothOrResource {
            effects.push(Effect::ChooseClothOrResource { seat, victim });
        } else {
            self.rob(seat, victim, &mut effects);
        }
        effects.extend(state_fx);
        Ok(effects)
    }

    pub fn choose_cloth_or_resource(&mut self, seat: Seat, cloth: bool) -> Outcome {
        let victim = self.machine.candidates().first().copied();
        let (_, state_fx) = self.transition(TurnEvent::ChoseClothOrResource { seat, cloth })?;
        let mut effects = Vec::new();
        if let Some(victim) = victim {
            if cloth {
                self.board.steal_cloth(victim, seat);
                effects.push(Effect::ClothStolen { thief: seat, victim });
            } else {
                self.rob(seat, victim, &mut effects);
            }
        }
        effects.extend(state_fx);
        Ok(effects)
    }

    // -- development cards --------------------------------------------------

    pub fn buy_dev_card(&mut self, seat: Seat) -> Outcome {
        self.machine.check(TurnEvent::BoughtDevCard { seat })?;
        if self.deck.is_empty() {
            return Err(GameError::DeckEmpty);
        }
        let cost = self.board.dev_card_cost();
        self.charge(seat, &cost)?;
        let (_, state_fx) = self.transition(TurnEvent::BoughtDevCard { seat })?;
        let card = self.deck.pop().ok_or(GameError::DeckEmpty)?;
        if let Some(player) = self.players.get_mut(&seat) {
            player.new_cards.push(card);
        }
        let mut effects = vec![
            Effect::Lost {
                seat,
                resources: cost,
                visibility: Visibility::Public,
            },
            Effect::DevCardDrawn { seat, card },
        ];
        effects.extend(state_fx);
        self.check_victory(seat, &mut effects);
        Ok(effects)
    }

    pub fn play_dev_card(&mut self, seat: Seat, card: DevCard) -> Outcome {
        let held = self
            .players
            .get(&seat)
            .is_some_and(|p| p.cards.contains(&card));
        if card.is_playable() && !held {
            // Let the machine report turn problems first.
            self.machine.check(TurnEvent::DevCardPlayed { seat, card })?;
            return Err(GameError::CardNotHeld { seat, card });
        }
        let (_, state_fx) = self.transition(TurnEvent::DevCardPlayed { seat, card })?;
        if let Some(player) = self.players.get_mut(&seat) {
            if let Some(index) = player.cards.iter().position(|c| *c == card) {
                player.cards.remove(index);
            }
            if card == DevCard::Knight {
                player.knights += 1;
            }
        }
        let mut effects = vec![Effect::DevCardPlayed { seat, card }];
        effects.extend(state_fx);
        self.prompt_robber_choice(&mut effects);
        Ok(effects)
    }

    /// Takes two free resources after a discovery card.
    pub fn discovery(&mut self, seat: Seat, set: ResourceSet) -> Outcome {
        let count = known_count(&set)?;
        if count != 2 {
            return Err(StateViolation::WrongCount {
                expected: 2,
                got: count,
            }
            .into());
        }
        let (_, state_fx) = self.transition(TurnEvent::DiscoveryPicked { seat })?;
        let mut effects = Vec::new();
        self.gain(seat, &set, Visibility::Public, &mut effects);
        effects.extend(state_fx);
        Ok(effects)
    }

    /// Takes every card of `rtype` from the other players.
    pub fn monopoly(&mut self, seat: Seat, rtype: ResourceType) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::MonopolyPicked { seat })?;
        let mut effects = Vec::new();
        let mut total = 0;
        let others: Vec<Seat> = self.players.keys().copied().filter(|s| *s != seat).collect();
        for other in others {
            let amount = self
                .players
                .get(&other)
                .map_or(0, |p| p.holding.snapshot().amount(rtype));
            if amount > 0 {
                self.lose(other, &ResourceSet::of(rtype, amount), Visibility::Public, &mut effects);
                total += amount;
            }
        }
        if total > 0 {
            self.gain(seat, &ResourceSet::of(rtype, total), Visibility::Public, &mut effects);
        }
        effects.push(Effect::Monopolized { seat, rtype, total });
        effects.extend(state_fx);
        Ok(effects)
    }

    // -- turn flow ----------------------------------------------------------

    pub fn end_turn(&mut self, seat: Seat) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::EndTurn { seat })?;
        self.ripen_cards(seat);
        Ok(state_fx)
    }

    pub fn request_special_build(&mut self, seat: Seat) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::SpecialBuildRequest { seat })?;
        let mut effects = vec![Effect::SpecialBuildRequested { seat }];
        effects.extend(state_fx);
        Ok(effects)
    }

    pub fn start_inv_item(&mut self, seat: Seat) -> Outcome {
        Ok(self.transition(TurnEvent::InvItemStart { seat })?.1)
    }

    pub fn place_inv_item(&mut self, seat: Seat) -> Outcome {
        Ok(self.transition(TurnEvent::InvItemPlaced { seat })?.1)
    }

    /// Applies the default response for `seat`.
    pub fn force_response(&mut self, seat: Seat) -> Outcome {
        let (transition, state_fx) = self.transition(TurnEvent::ForceResponse { seat })?;
        let Some(action) = transition.forced else {
            return Ok(state_fx);
        };
        tracing::warn!(game = %self.name, ?action, "forcing response");
        let mut effects = vec![Effect::Forced(action.clone())];
        match action {
            ForcedAction::Discard { seat, count } => {
                let set = self.random_from_hand(seat, count);
                self.lose(seat, &set, Visibility::Only(vec![seat]), &mut effects);
            }
            ForcedAction::PickGold { seat, count } => {
                let mut set = ResourceSet::new();
                for _ in 0..count {
                    let index = self.rng.random_range(0..ResourceType::ALL.len());
                    set.add(ResourceType::ALL[index], 1);
                }
                self.gain(seat, &set, Visibility::Public, &mut effects);
            }
            ForcedAction::SkipPlacement { .. } => {}
            ForcedAction::EndTurn { seat, cancelled } => {
                if let Some(piece) = paid_piece(cancelled) {
                    let cost = self.board.cost(piece);
                    self.gain(seat, &cost, Visibility::Public, &mut effects);
                }
                self.ripen_cards(seat);
            }
        }
        effects.extend(state_fx);
        self.prompt_robber_choice(&mut effects);
        Ok(effects)
    }

    // -- terminal -----------------------------------------------------------

    /// Ends the game without a winner.
    pub fn end_game(&mut self) -> Outcome {
        let (_, state_fx) = self.transition(TurnEvent::GameOver)?;
        let mut effects = state_fx;
        effects.push(Effect::GameOver { winner: None });
        Ok(effects)
    }

    /// Marks this copy as superseded by a board reset.
    pub fn mark_reset(&mut self) -> Outcome {
        Ok(self.transition(TurnEvent::Reset)?.1)
    }

    pub fn await_robots(&mut self) -> Outcome {
        Ok(self.transition(TurnEvent::AwaitRobots)?.1)
    }

    pub fn resume(&mut self) -> Outcome {
        Ok(self.transition(TurnEvent::Resume)?.1)
    }

    // -- internals ----------------------------------------------------------

    /// Applies `event` to the machine and describes the phase change.
    fn transition(&mut self, event: TurnEvent) -> Result<(Transition, Vec<Effect>), GameError> {
        let before = self.machine.current();
        let transition = self.machine.apply(event)?;
        let mut effects = Vec::new();
        match self.machine.current() {
            Some(seat) if before != Some(seat) && transition.to.is_active() => {
                effects.push(Effect::TurnStarted {
                    seat,
                    state: transition.to,
                });
            }
            _ if transition.changed() => effects.push(Effect::StateChanged {
                state: transition.to,
            }),
            _ => {}
        }
        Ok((transition, effects))
    }

    fn owed_effects(&self) -> Vec<Effect> {
        let pending = self.machine.pending();
        match self.state() {
            GameState::WaitingForDiscards => pending
                .iter()
                .map(|(seat, count)| Effect::DiscardRequired {
                    seat: *seat,
                    count: *count,
                })
                .collect(),
            GameState::WaitingForPickGoldResource => pending
                .iter()
                .map(|(seat, count)| Effect::PickGoldRequired {
                    seat: *seat,
                    count: *count,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn prompt_robber_choice(&self, effects: &mut Vec<Effect>) {
        if self.state() == GameState::WaitingForRobberOrPirate {
            if let Some(seat) = self.current() {
                effects.push(Effect::ChooseRobberOrPirate { seat });
            }
        }
    }

    fn holding(&self, seat: Seat) -> Result<&Holding, GameError> {
        self.players
            .get(&seat)
            .map(|p| &p.holding)
            .ok_or(GameError::Violation(StateViolation::SeatEmpty(seat)))
    }

    fn require_holds(&self, seat: Seat, set: &ResourceSet) -> Result<(), GameError> {
        if self.holding(seat)?.snapshot().contains(set) {
            Ok(())
        } else {
            Err(GameError::CannotAfford { seat })
        }
    }

    /// Takes `cost` from `seat` if they can pay it.
    fn charge(&self, seat: Seat, cost: &ResourceSet) -> Result<(), GameError> {
        self.require_holds(seat, cost)?;
        let _ = self.holding(seat)?.subtract_set(cost);
        Ok(())
    }

    fn gain(&self, seat: Seat, set: &ResourceSet, visibility: Visibility, effects: &mut Vec<Effect>) {
        if let Some(player) = self.players.get(&seat) {
            player.holding.add_set(set);
            effects.push(Effect::Gained {
                seat,
                resources: *set,
                visibility,
            });
        }
    }

    fn lose(&self, seat: Seat, set: &ResourceSet, visibility: Visibility, effects: &mut Vec<Effect>) {
        if let Some(player) = self.players.get(&seat) {
            if player.holding.subtract_set(set).is_desynced() {
                tracing::warn!(game = %self.name, %seat, "hand went negative; recounting");
                player.holding.resync(player.holding.total().max(0));
            }
            effects.push(Effect::Lost {
                seat,
                resources: *set,
                visibility,
            });
        }
    }

    fn can_be_robbed(&self, seat: Seat) -> bool {
        let has_cards = self
            .players
            .get(&seat)
            .is_some_and(|p| p.holding.total() > 0);
        has_cards || self.cloth_choice(seat)
    }

    fn cloth_choice(&self, victim: Seat) -> bool {
        self.flags().cloth_robbery && self.board.has_cloth(victim)
    }

    /// Moves one random card from `victim` to `thief`. Only the two of them
    /// learn its type.
    fn rob(&mut self, thief: Seat, victim: Seat, effects: &mut Vec<Effect>) {
        let stolen = self.random_from_hand(victim, 1);
        if stolen.is_empty() {
            return;
        }
        let visibility = Visibility::Only(vec![thief, victim]);
        self.lose(victim, &stolen, visibility.clone(), effects);
        self.gain(thief, &stolen, visibility, effects);
        effects.push(Effect::Robbed { thief, victim });
    }

    /// Picks `count` cards at random from a hand's known resources.
    fn random_from_hand(&mut self, seat: Seat, count: u32) -> ResourceSet {
        let hand = self
            .players
            .get(&seat)
            .map(|p| p.holding.snapshot())
            .unwrap_or_default();
        let mut pool: Vec<ResourceType> = hand
            .iter_known()
            .flat_map(|(rtype, n)| std::iter::repeat_n(rtype, usize::try_from(n).unwrap_or(0)))
            .collect();
        pool.shuffle(&mut self.rng);
        let mut picked = ResourceSet::new();
        for rtype in pool.into_iter().take(count as usize) {
            picked.add(rtype, 1);
        }
        picked
    }

    fn ripen_cards(&mut self, seat: Seat) {
        if let Some(player) = self.players.get_mut(&seat) {
            let fresh = std::mem::take(&mut player.new_cards);
            player.cards.extend(fresh);
        }
    }

    fn check_victory(&mut self, seat: Seat, effects: &mut Vec<Effect>) {
        if self.winner.is_some() || !self.state().is_active() {
            return;
        }
        if self.victory_points(seat) < self.flags().vp_to_win {
            return;
        }
        if let Ok((_, state_fx)) = self.transition(TurnEvent::GameOver) {
            tracing::info!(game = %self.name, %seat, "game over");
            self.winner = Some(seat);
            effects.extend(state_fx);
            effects.push(Effect::GameOver { winner: Some(seat) });
        }
    }

    /// Gives `seat` a card directly, as if bought on an earlier turn.
    pub fn grant_dev_card(&mut self, seat: Seat, card: DevCard) {
        if let Some(player) = self.players.get_mut(&seat) {
            player.cards.push(card);
        }
    }
}

/// The piece paid for when entering `state`, if any.
fn paid_piece(state: GameState) -> Option<PieceKind> {
    match state {
        GameState::PlacingRoad => Some(PieceKind::Road),
        GameState::PlacingSettlement => Some(PieceKind::Settlement),
        GameState::PlacingCity => Some(PieceKind::City),
        GameState::PlacingShip => Some(PieceKind::Ship),
        _ => None,
    }
}

fn known_count(set: &ResourceSet) -> Result<u32, GameError> {
    if set.unknown() != 0 {
        return Err(GameError::InvalidResources(
            "unknown resources cannot be chosen".into(),
        ));
    }
    u32::try_from(set.known_total())
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| GameError::InvalidResources("nothing selected".into()))
}

/// The standard 25-card development deck.
fn standard_deck() -> Vec<DevCard> {
    let mut deck = Vec::with_capacity(25);
    deck.extend(std::iter::repeat_n(DevCard::Knight, 14));
    deck.extend(std::iter::repeat_n(DevCard::VictoryPoint, 5));
    deck.extend(std::iter::repeat_n(DevCard::RoadBuilding, 2));
    deck.extend(std::iter::repeat_n(DevCard::Discovery, 2));
    deck.extend(std::iter::repeat_n(DevCard::Monopoly, 2));
    deck
}
