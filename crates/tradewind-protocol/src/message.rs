//! The message catalog.
//!
//! Every message is a plain struct implementing [`WireMessage`]; its wire
//! layout is simply its fields in declaration order, each encoded through
//! [`Param`]. Game-scoped messages get a leading `game` field.
//!
//! Adding a message takes three steps, none of which touch the decoder:
//!
//! 1. give it a type id in `message_types!`
//! 2. declare it with `wire_message!`
//! 3. list it in `catalog!`

use std::collections::HashMap;
use std::fmt;

use tradewind_game::{Coord, DevCard, GameState, PieceKind, ResourceSet, ResourceType, Seat};

use crate::codec::{Codec, HEADER_SEP, Param, ParamReader, ParamWriter};
use crate::error::ProtocolError;
use crate::text::{GameName, Name, Text};
use crate::version::FeatureSet;

// ---------------------------------------------------------------------------
// Type ids
// ---------------------------------------------------------------------------

/// A numeric message type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageType(i32);

impl MessageType {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> i32 {
        self.0
    }
}

macro_rules! message_types {
    ($($name:ident = $id:literal),* $(,)?) => {
        impl MessageType {
            $(pub const $name: Self = Self($id);)*

            /// The legacy upper-case name, or `"UNKNOWN"`.
            pub fn name(self) -> &'static str {
                match self.0 {
                    $($id => stringify!($name),)*
                    _ => "UNKNOWN",
                }
            }
        }
    };
}

message_types! {
    LEAVEALL = 1008,
    PUTPIECE = 1009,
    GAMETEXTMSG = 1010,
    LEAVEGAME = 1011,
    SITDOWN = 1012,
    JOINGAME = 1013,
    DELETEGAME = 1015,
    NEWGAME = 1016,
    GAMEMEMBERS = 1017,
    STARTGAME = 1018,
    GAMES = 1019,
    JOINGAMEAUTH = 1021,
    IMAROBOT = 1022,
    PLAYERELEMENT = 1024,
    GAMESTATE = 1025,
    TURN = 1026,
    DICERESULT = 1028,
    DISCARDREQUEST = 1029,
    ROLLDICE = 1031,
    ENDTURN = 1032,
    DISCARD = 1033,
    MOVEROBBER = 1034,
    CHOOSEPLAYER = 1035,
    CHOOSEPLAYERREQUEST = 1036,
    BUILDREQUEST = 1043,
    CANCELBUILDREQUEST = 1044,
    BUYDEVCARDREQUEST = 1045,
    DEVCARDACTION = 1046,
    PLAYDEVCARDREQUEST = 1049,
    PICKRESOURCES = 1052,
    PICKRESOURCETYPE = 1053,
    FIRSTPLAYER = 1054,
    REJECTCONNECTION = 1059,
    RESOURCECOUNT = 1063,
    STATUSMESSAGE = 1069,
    PLAYERELEMENTS = 1086,
    SIMPLEREQUEST = 1089,
    DECLINEPLAYERREQUEST = 1104,
    VERSION = 9998,
    SERVERPING = 9999,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// A message with a fixed type id and a typed parameter layout.
pub trait WireMessage: Sized {
    const TYPE: MessageType;

    fn write_params(&self, w: &mut ParamWriter);

    fn read_params(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError>;

    /// The game this message belongs to, for game-scoped messages.
    fn game(&self) -> Option<&GameName> {
        None
    }

    fn encode(&self) -> String {
        let mut w = ParamWriter::new();
        self.write_params(&mut w);
        w.finish(Self::TYPE)
    }
}

macro_rules! wire_message {
    (
        $(#[$meta:meta])*
        $name:ident = $ty:ident in game { $($(#[$fmeta:meta])* $field:ident : $fty:ty),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub game: GameName,
            $($(#[$fmeta])* pub $field: $fty,)*
        }

        impl WireMessage for $name {
            const TYPE: MessageType = MessageType::$ty;

            fn write_params(&self, w: &mut ParamWriter) {
                w.put(&self.game);
                $(w.put(&self.$field);)*
            }

            fn read_params(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
                Ok(Self {
                    game: r.take()?,
                    $($field: r.take()?,)*
                })
            }

            fn game(&self) -> Option<&GameName> {
                Some(&self.game)
            }
        }
    };
    (
        $(#[$meta:meta])*
        $name:ident = $ty:ident { $($(#[$fmeta:meta])* $field:ident : $fty:ty),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: $fty,)*
        }

        impl WireMessage for $name {
            const TYPE: MessageType = MessageType::$ty;

            #[allow(unused_variables)]
            fn write_params(&self, w: &mut ParamWriter) {
                $(w.put(&self.$field);)*
            }

            #[allow(unused_variables)]
            fn read_params(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
                Ok(Self {
                    $($field: r.take()?,)*
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Small wire enums
// ---------------------------------------------------------------------------

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl $name {
            pub fn from_wire(value: i32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn to_wire(self) -> i32 {
                self as i32
            }
        }

        impl Param for $name {
            fn write(&self, w: &mut ParamWriter) {
                w.int(self.to_wire());
            }

            fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
                let value = r.int()?;
                Self::from_wire(value).ok_or_else(|| {
                    r.malformed(format!(concat!("bad ", stringify!($name), " {}"), value))
                })
            }
        }
    };
}

wire_enum! {
    /// How a [`PlayerElement`] changes the value.
    ElementAction { Set = 100, Gain = 101, Lose = 102 }
}

wire_enum! {
    /// What happened to a development card.
    CardAction {
        Draw = 0,
        Play = 1,
        /// Added to the hand this turn (not yet playable).
        AddNew = 2,
        /// Added to the hand as already playable.
        AddOld = 3,
    }
}

wire_enum! {
    /// Why a request was declined.
    DeclineReason {
        NotNow = 1,
        NotYourTurn = 2,
        NotThisGame = 3,
        Location = 4,
        InvalidRequest = 5,
    }
}

/// Element numbers for [`PlayerElement`] and [`PlayerElements`]. Resource
/// types use their own wire numbers (1..=5, 6 for unknown).
pub mod element {
    pub const UNKNOWN: i32 = 6;
    pub const ROADS: i32 = 10;
    pub const SETTLEMENTS: i32 = 11;
    pub const CITIES: i32 = 12;
    pub const SHIPS: i32 = 13;
    pub const NUM_KNIGHTS: i32 = 15;
}

/// Status codes for [`StatusMessage`].
pub mod status {
    pub const OK: i32 = 0;
    pub const NOT_OK_GENERIC: i32 = 1;
    pub const NAME_NOT_FOUND: i32 = 2;
    pub const PW_WRONG: i32 = 3;
    pub const NAME_IN_USE: i32 = 4;
    pub const GAME_NOT_FOUND: i32 = 5;
}

/// Special values of [`ChoosePlayer::choice`].
pub mod choice {
    /// Move the robber (answer to WAITING_FOR_ROBBER_OR_PIRATE).
    pub const MOVE_ROBBER: i32 = -2;
    /// Move the pirate (answer to WAITING_FOR_ROBBER_OR_PIRATE).
    pub const MOVE_PIRATE: i32 = -3;

    /// In WAITING_FOR_ROB_CLOTH_OR_RESOURCE, `-(seat + 1)` takes cloth from
    /// `seat`; a plain seat number takes a resource.
    pub fn cloth_from(seat: tradewind_game::Seat) -> i32 {
        -(seat.to_wire() + 1)
    }
}

/// Request types for [`SimpleRequest`].
pub mod simple {
    /// Server to client: pick `value1` free resources.
    pub const PROMPT_PICK_RESOURCES: i32 = 1;
    /// Client to server: start placing the inventory item (`value1` = -1),
    /// or place it at `value1`.
    pub const PLACE_INV_ITEM: i32 = 3;
}

/// `None` travels as `-1` (a special building request).
impl Param for Option<PieceKind> {
    fn write(&self, w: &mut ParamWriter) {
        w.int(self.map_or(-1, PieceKind::to_wire));
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let value = r.int()?;
        if value == -1 {
            return Ok(None);
        }
        PieceKind::from_wire(value)
            .map(Some)
            .ok_or_else(|| r.malformed(format!("bad piece type {value}")))
    }
}

// ---------------------------------------------------------------------------
// Session-wide messages
// ---------------------------------------------------------------------------

wire_message! {
    /// First frame in each direction: software version and features.
    Version = VERSION { number: i32, display: Text, build: Text, features: FeatureSet }
}

wire_message! {
    /// A robot client identifies itself after the version handshake.
    ImARobot = IMAROBOT { nickname: Name, cookie: Text, brain: Text }
}

wire_message! {
    /// The server refuses the connection; the last frame before closing.
    RejectConnection = REJECTCONNECTION { reason: Text }
}

wire_message! {
    /// A status line for the connection, with a numeric code from [`status`].
    StatusMessage = STATUSMESSAGE { status: i32, text: Text }
}

wire_message! {
    /// Keepalive. Also sent with `sleep_time = -1` as the disconnect marker.
    ServerPing = SERVERPING { sleep_time: i32 }
}

wire_message! {
    /// The list of games on the server.
    Games = GAMES { games: Vec<GameName> }
}

wire_message! {
    /// A game was created.
    NewGame = NEWGAME { game: GameName }
}

wire_message! {
    /// A game was removed.
    DeleteGame = DELETEGAME { game: GameName }
}

wire_message! {
    /// The client leaves every game and is about to disconnect.
    LeaveAll = LEAVEALL {}
}

// ---------------------------------------------------------------------------
// Game membership
// ---------------------------------------------------------------------------

wire_message! {
    /// Join (creating if needed) a game.
    JoinGame = JOINGAME in game { nickname: Name, password: Text }
}

wire_message! {
    /// The server accepted a join; always precedes the game's state.
    JoinGameAuth = JOINGAMEAUTH in game {}
}

wire_message! {
    GameMembers = GAMEMEMBERS in game { members: Vec<Name> }
}

wire_message! {
    LeaveGame = LEAVEGAME in game { nickname: Name }
}

wire_message! {
    /// A request to sit (client) or the announcement that someone sat (server).
    SitDown = SITDOWN in game { nickname: Name, seat: Seat, robot: bool }
}

wire_message! {
    StartGame = STARTGAME in game {}
}

wire_message! {
    /// The game's phase.
    GameStateMsg = GAMESTATE in game { state: GameState }
}

wire_message! {
    /// A new current player, and the phase their turn starts in.
    Turn = TURN in game { seat: Seat, state: GameState }
}

wire_message! {
    FirstPlayer = FIRSTPLAYER in game { seat: Seat }
}

// ---------------------------------------------------------------------------
// Play
// ---------------------------------------------------------------------------

wire_message! {
    /// A piece placement: a request from the client, an announcement from
    /// the server.
    PutPiece = PUTPIECE in game { seat: Seat, piece: PieceKind, coord: Coord }
}

wire_message! {
    /// Ask to buy a piece; `None` asks for a special building phase.
    BuildRequest = BUILDREQUEST in game { piece: Option<PieceKind> }
}

wire_message! {
    CancelBuildRequest = CANCELBUILDREQUEST in game { piece: PieceKind }
}

wire_message! {
    RollDice = ROLLDICE in game {}
}

wire_message! {
    DiceResult = DICERESULT in game { total: i32 }
}

wire_message! {
    /// The recipient must discard `count` cards.
    DiscardRequest = DISCARDREQUEST in game { count: u32 }
}

wire_message! {
    Discard = DISCARD in game { resources: ResourceSet }
}

/// Robber move. A negative `coord` moves the pirate to `-coord`, so the
/// pirate can never be sent to hex 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRobber {
    pub game: GameName,
    pub seat: Seat,
    pub coord: Coord,
}

impl WireMessage for MoveRobber {
    const TYPE: MessageType = MessageType::MOVEROBBER;

    fn write_params(&self, w: &mut ParamWriter) {
        w.put(&self.game);
        w.put(&self.seat);
        w.put(&self.coord);
    }

    fn read_params(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let game = r.take()?;
        let seat = r.take()?;
        let coord: Coord = r.take()?;
        if coord == Coord::MIN {
            return Err(r.malformed(format!("hex {coord} has no positive form")));
        }
        Ok(Self { game, seat, coord })
    }

    fn game(&self) -> Option<&GameName> {
        Some(&self.game)
    }
}

wire_message! {
    /// The current player must choose among `candidates`.
    ChoosePlayerRequest = CHOOSEPLAYERREQUEST in game { candidates: Vec<Seat> }
}

wire_message! {
    /// Answer to a choice prompt; see [`choice`] for the special values.
    ChoosePlayer = CHOOSEPLAYER in game { choice: i32 }
}

wire_message! {
    EndTurn = ENDTURN in game {}
}

wire_message! {
    BuyDevCardRequest = BUYDEVCARDREQUEST in game {}
}

wire_message! {
    DevCardAction = DEVCARDACTION in game { seat: Seat, action: CardAction, card: DevCard }
}

wire_message! {
    PlayDevCardRequest = PLAYDEVCARDREQUEST in game { card: DevCard }
}

wire_message! {
    /// Free resources chosen for a discovery card or gold hex.
    PickResources = PICKRESOURCES in game { resources: ResourceSet }
}

wire_message! {
    /// The resource type named for a monopoly card.
    PickResourceType = PICKRESOURCETYPE in game { rtype: ResourceType }
}

wire_message! {
    /// One change to one of a player's counters.
    PlayerElement = PLAYERELEMENT in game {
        seat: Seat,
        action: ElementAction,
        element: i32,
        amount: i32,
    }
}

wire_message! {
    /// Several `(element, amount)` changes at once. Newer peers only.
    PlayerElements = PLAYERELEMENTS in game {
        seat: Seat,
        action: ElementAction,
        elements: Vec<(i32, i32)>,
    }
}

wire_message! {
    /// A player's total resource count.
    ResourceCount = RESOURCECOUNT in game { seat: Seat, count: i32 }
}

wire_message! {
    /// Chat or a server announcement within a game.
    GameTextMsg = GAMETEXTMSG in game { nickname: Name, text: Text }
}

wire_message! {
    /// A small request or prompt; see [`simple`].
    SimpleRequest = SIMPLEREQUEST in game {
        seat: Seat,
        request: i32,
        value1: i32,
        value2: i32,
    }
}

wire_message! {
    /// The server won't do what was asked. Newer peers only.
    DeclinePlayerRequest = DECLINEPLAYERREQUEST in game {
        reason: DeclineReason,
        detail1: i32,
        detail2: i32,
        text: Text,
    }
}

impl MoveRobber {
    pub fn robber(game: GameName, seat: Seat, hex: Coord) -> Self {
        Self { game, seat, coord: hex }
    }

    pub fn pirate(game: GameName, seat: Seat, hex: Coord) -> Self {
        Self {
            game,
            seat,
            coord: -hex,
        }
    }

    pub fn is_pirate(&self) -> bool {
        self.coord < 0
    }

    pub fn hex(&self) -> Coord {
        self.coord.saturating_abs()
    }
}

impl ServerPing {
    /// `sleep_time` of the explicit disconnect marker.
    pub const DISCONNECT: i32 = -1;

    pub fn is_disconnect(&self) -> bool {
        self.sleep_time == Self::DISCONNECT
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

type Decoder = fn(&mut ParamReader<'_>) -> Result<Message, ProtocolError>;

fn decode_as<M: WireMessage + Into<Message>>(
    r: &mut ParamReader<'_>,
) -> Result<Message, ProtocolError> {
    M::read_params(r).map(Into::into)
}

macro_rules! catalog {
    ($($variant:ident),* $(,)?) => {
        /// Any message in the catalog.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Message {
            $($variant($variant),)*
        }

        impl Message {
            pub fn message_type(&self) -> MessageType {
                match self {
                    $(Self::$variant(_) => $variant::TYPE,)*
                }
            }

            pub fn encode(&self) -> String {
                match self {
                    $(Self::$variant(m) => m.encode(),)*
                }
            }

            pub fn game(&self) -> Option<&GameName> {
                match self {
                    $(Self::$variant(m) => m.game(),)*
                }
            }
        }

        $(
            impl From<$variant> for Message {
                fn from(message: $variant) -> Self {
                    Self::$variant(message)
                }
            }
        )*

        impl MessageRegistry {
            /// The table of every message in the catalog.
            pub fn standard() -> Self {
                let mut registry = Self::empty();
                $(registry.register::<$variant>();)*
                registry
            }
        }
    };
}

catalog!(
    Version,
    ImARobot,
    RejectConnection,
    StatusMessage,
    ServerPing,
    Games,
    NewGame,
    DeleteGame,
    LeaveAll,
    JoinGame,
    JoinGameAuth,
    GameMembers,
    LeaveGame,
    SitDown,
    StartGame,
    GameStateMsg,
    Turn,
    FirstPlayer,
    PutPiece,
    BuildRequest,
    CancelBuildRequest,
    RollDice,
    DiceResult,
    DiscardRequest,
    Discard,
    MoveRobber,
    ChoosePlayerRequest,
    ChoosePlayer,
    EndTurn,
    BuyDevCardRequest,
    DevCardAction,
    PlayDevCardRequest,
    PickResources,
    PickResourceType,
    PlayerElement,
    PlayerElements,
    ResourceCount,
    GameTextMsg,
    SimpleRequest,
    DeclinePlayerRequest,
);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// An immutable type-id → decoder table.
///
/// Built once (usually [`MessageRegistry::standard`]) and shared by every
/// reader. A reader only understands the types its table lists; anything
/// else decodes to [`ProtocolError::UnknownType`].
#[derive(Clone, Default)]
pub struct MessageRegistry {
    decoders: HashMap<i32, Decoder>,
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("MessageRegistry").field("types", &ids).finish()
    }
}

impl MessageRegistry {
    /// A table that decodes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a message type.
    pub fn register<M: WireMessage + Into<Message>>(&mut self) -> &mut Self {
        self.decoders.insert(M::TYPE.id(), decode_as::<M>);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<M: WireMessage + Into<Message>>(mut self) -> Self {
        self.register::<M>();
        self
    }

    pub fn contains(&self, message: MessageType) -> bool {
        self.decoders.contains_key(&message.id())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes one line. Never panics; every failure is a [`ProtocolError`].
    pub fn decode(&self, line: &str) -> Result<Message, ProtocolError> {
        let (header, params) = match line.split_once(HEADER_SEP) {
            Some((header, params)) => (header, Some(params)),
            None => (line, None),
        };
        if header.is_empty() || !header.bytes().all(|b| b.is_ascii_digit()) {
            let shown: String = header.chars().take(16).collect();
            return Err(ProtocolError::InvalidHeader(shown));
        }
        let id: i32 = header
            .parse()
            .map_err(|_| ProtocolError::InvalidHeader(header.chars().take(16).collect()))?;
        let decoder = self
            .decoders
            .get(&id)
            .ok_or(ProtocolError::UnknownType(id))?;
        let mut reader = ParamReader::new(MessageType::new(id), params);
        let message = decoder(&mut reader)?;
        reader.finish()?;
        tracing::trace!(message = %message.message_type(), "decoded frame");
        Ok(message)
    }
}

impl Codec for MessageRegistry {
    fn encode(&self, message: &Message) -> String {
        message.encode()
    }

    fn decode(&self, line: &str) -> Result<Message, ProtocolError> {
        MessageRegistry::decode(self, line)
    }
}
