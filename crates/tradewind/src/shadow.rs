//! A client's local copy of a game, rebuilt from what the server sends.
//!
//! The server is authoritative. The shadow only ever learns from server
//! messages, so it can fall behind: another player's hand is mostly
//! unknown resources, and a loss that the shadow can't cover drives the
//! unknown bucket negative. Such a seat is flagged and recounted from the
//! next authoritative total (a `ResourceCount`, or a `SET` of the hand).

use std::collections::BTreeMap;

use tradewind_game::{
    Accounting, Coord, GameState, Holding, PieceKind, ResourceSet, ResourceType, Seat,
};
use tradewind_protocol::{CardAction, ElementAction, GameName, Message, Name, element};

/// What [`ShadowGame::apply`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    /// Not a message about this game's state.
    Ignored,
    Updated,
    /// The seat's hand no longer adds up and waits for a recount.
    Desynced(Seat),
    /// The seat's hand was recounted from an authoritative total.
    Resynced(Seat),
}

/// One seat as seen from a client.
#[derive(Debug)]
pub struct ShadowSeat {
    pub nickname: Name,
    pub robot: bool,
    hand: Holding,
    knights: i32,
    dev_cards: u32,
    pieces: [u32; 4],
}

impl ShadowSeat {
    fn new(nickname: Name, robot: bool) -> Self {
        Self {
            nickname,
            robot,
            hand: Holding::new(),
            knights: 0,
            dev_cards: 0,
            pieces: [0; 4],
        }
    }

    pub fn hand(&self) -> ResourceSet {
        self.hand.snapshot()
    }

    pub fn needs_resync(&self) -> bool {
        self.hand.needs_resync()
    }

    pub fn knights(&self) -> i32 {
        self.knights
    }

    /// Development cards drawn and not yet played.
    pub fn dev_cards(&self) -> u32 {
        self.dev_cards
    }

    pub fn pieces(&self, kind: PieceKind) -> u32 {
        self.pieces[piece_index(kind)]
    }
}

/// A mirror of one game.
#[derive(Debug)]
pub struct ShadowGame {
    name: GameName,
    state: GameState,
    current: Option<Seat>,
    first: Option<Seat>,
    dice: Option<i32>,
    robber: Option<Coord>,
    pirate: Option<Coord>,
    members: Vec<Name>,
    seats: BTreeMap<Seat, ShadowSeat>,
    discard_owed: Option<u32>,
    victims: Option<Vec<Seat>>,
}

impl ShadowGame {
    pub fn new(name: GameName) -> Self {
        Self {
            name,
            state: GameState::New,
            current: None,
            first: None,
            dice: None,
            robber: None,
            pirate: None,
            members: Vec::new(),
            seats: BTreeMap::new(),
            discard_owed: None,
            victims: None,
        }
    }

    pub fn name(&self) -> &GameName {
        &self.name
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn current(&self) -> Option<Seat> {
        self.current
    }

    pub fn first_player(&self) -> Option<Seat> {
        self.first
    }

    /// The dice total of the current turn, once rolled.
    pub fn dice(&self) -> Option<i32> {
        self.dice
    }

    pub fn robber(&self) -> Option<Coord> {
        self.robber
    }

    pub fn pirate(&self) -> Option<Coord> {
        self.pirate
    }

    pub fn members(&self) -> &[Name] {
        &self.members
    }

    pub fn seat(&self, seat: Seat) -> Option<&ShadowSeat> {
        self.seats.get(&seat)
    }

    pub fn seat_of(&self, nickname: &str) -> Option<Seat> {
        self.seats
            .iter()
            .find(|(_, s)| s.nickname.as_str() == nickname)
            .map(|(seat, _)| *seat)
    }

    pub fn seats(&self) -> impl Iterator<Item = (Seat, &ShadowSeat)> {
        self.seats.iter().map(|(seat, s)| (*seat, s))
    }

    /// The last discard request this client got, while discards are being
    /// collected.
    pub fn discard_owed(&self) -> Option<u32> {
        self.discard_owed
    }

    /// Seats this client was asked to choose among.
    pub fn victims(&self) -> Option<&[Seat]> {
        self.victims.as_deref()
    }

    /// Seats whose hands wait for a recount.
    pub fn desynced(&self) -> Vec<Seat> {
        self.seats
            .iter()
            .filter(|(_, s)| s.needs_resync())
            .map(|(seat, _)| *seat)
            .collect()
    }

    /// Applies one message from the server.
    pub fn apply(&mut self, message: &Message) -> Tracked {
        if message.game() != Some(&self.name) {
            return Tracked::Ignored;
        }
        match message {
            Message::GameMembers(m) => self.members = m.members.clone(),
            Message::JoinGame(m) => {
                if !self.members.contains(&m.nickname) {
                    self.members.push(m.nickname.clone());
                }
            }
            Message::LeaveGame(m) => {
                self.members.retain(|n| *n != m.nickname);
                if self.state <= GameState::Ready {
                    self.seats.retain(|_, s| s.nickname != m.nickname);
                }
            }
            Message::SitDown(m) => {
                self.seats
                    .insert(m.seat, ShadowSeat::new(m.nickname.clone(), m.robot));
            }
            Message::GameStateMsg(m) => self.enter(m.state),
            Message::Turn(m) => {
                self.current = Some(m.seat);
                self.dice = None;
                self.enter(m.state);
            }
            Message::FirstPlayer(m) => self.first = Some(m.seat),
            Message::DiceResult(m) => self.dice = Some(m.total),
            Message::DiscardRequest(m) => self.discard_owed = Some(m.count),
            Message::ChoosePlayerRequest(m) => self.victims = Some(m.candidates.clone()),
            Message::MoveRobber(m) => {
                if m.is_pirate() {
                    self.pirate = Some(m.hex());
                } else {
                    self.robber = Some(m.hex());
                }
            }
            Message::PutPiece(m) => {
                if let Some(seat) = self.seats.get_mut(&m.seat) {
                    seat.pieces[piece_index(m.piece)] += 1;
                    if m.piece == PieceKind::City {
                        let settlements = &mut seat.pieces[piece_index(PieceKind::Settlement)];
                        *settlements = settlements.saturating_sub(1);
                    }
                }
            }
            Message::DevCardAction(m) => {
                if let Some(seat) = self.seats.get_mut(&m.seat) {
                    match m.action {
                        CardAction::Draw | CardAction::AddNew | CardAction::AddOld => {
                            seat.dev_cards += 1;
                        }
                        CardAction::Play => seat.dev_cards = seat.dev_cards.saturating_sub(1),
                    }
                }
            }
            Message::PlayerElement(m) => {
                return self.elements(m.seat, m.action, &[(m.element, m.amount)]);
            }
            Message::PlayerElements(m) => return self.elements(m.seat, m.action, &m.elements),
            Message::ResourceCount(m) => return self.recount(m.seat, m.count),
            _ => return Tracked::Ignored,
        }
        Tracked::Updated
    }

    fn enter(&mut self, state: GameState) {
        if state != GameState::WaitingForDiscards {
            self.discard_owed = None;
        }
        if !matches!(
            state,
            GameState::WaitingForRobChoosePlayer | GameState::WaitingForRobClothOrResource
        ) {
            self.victims = None;
        }
        self.state = state;
    }

    fn elements(&mut self, seat: Seat, action: ElementAction, elements: &[(i32, i32)]) -> Tracked {
        let Some(shadow) = self.seats.get_mut(&seat) else {
            tracing::debug!(game = %self.name, %seat, "elements for an empty seat");
            return Tracked::Ignored;
        };
        let was_desynced = shadow.hand.needs_resync();
        let mut counts: Option<ResourceSet> = None;
        let mut accounting = Accounting::Balanced;

        for &(elem, amount) in elements {
            if elem == element::NUM_KNIGHTS {
                shadow.knights = match action {
                    ElementAction::Set => amount,
                    ElementAction::Gain => shadow.knights + amount,
                    ElementAction::Lose => (shadow.knights - amount).max(0),
                };
                continue;
            }
            let rtype = ResourceType::from_wire(elem);
            if rtype.is_none() && elem != element::UNKNOWN {
                continue;
            }
            let outcome = match (action, rtype) {
                (ElementAction::Gain, Some(r)) => {
                    shadow.hand.add(r, amount);
                    Accounting::Balanced
                }
                (ElementAction::Gain, None) => {
                    shadow.hand.add_unknown(amount);
                    Accounting::Balanced
                }
                (ElementAction::Lose, Some(r)) => shadow.hand.subtract(r, amount),
                (ElementAction::Lose, None) => {
                    shadow.hand.subtract_set(&ResourceSet::unknown_only(amount))
                }
                (ElementAction::Set, _) => {
                    let set = counts.get_or_insert_with(|| shadow.hand.snapshot());
                    match rtype {
                        Some(r) => set.add(r, amount - set.amount(r)),
                        None => set.add_unknown(amount - set.unknown()),
                    }
                    Accounting::Balanced
                }
            };
            if outcome.is_desynced() {
                accounting = outcome;
            }
        }

        // A SET carries the server's own counts.
        if let Some(set) = counts {
            shadow.hand.replace(set);
            if was_desynced {
                tracing::info!(game = %self.name, %seat, "hand recounted from server");
                return Tracked::Resynced(seat);
            }
            return Tracked::Updated;
        }
        if let Accounting::Desynced { unknown } = accounting {
            tracing::warn!(
                game = %self.name,
                %seat,
                unknown,
                "hand tracking went negative; waiting for a recount"
            );
            return Tracked::Desynced(seat);
        }
        Tracked::Updated
    }

    fn recount(&mut self, seat: Seat, count: i32) -> Tracked {
        let Some(shadow) = self.seats.get_mut(&seat) else {
            return Tracked::Ignored;
        };
        let flagged = shadow.hand.needs_resync();
        if shadow.hand.resync(count) || flagged {
            tracing::info!(game = %self.name, %seat, count, "hand recounted from server");
            return Tracked::Resynced(seat);
        }
        Tracked::Updated
    }
}

fn piece_index(kind: PieceKind) -> usize {
    match kind {
        PieceKind::Road => 0,
        PieceKind::Settlement => 1,
        PieceKind::City => 2,
        PieceKind::Ship => 3,
    }
}
