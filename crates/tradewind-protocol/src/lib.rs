//! Wire protocol for Tradewind.
//!
//! Every message is one line of text, `TYPEID|p1,p2,...`, framed by the
//! transport below. This crate knows the catalog of messages and how to
//! turn them into lines and back. It knows nothing about connections.
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Session (routing, peers)
//! ```
//!
//! # Key types
//!
//! - [`Message`]: any message in the catalog, one variant per struct
//! - [`WireMessage`]: implemented by each message struct
//! - [`MessageRegistry`]: the type-id → decoder table handed to readers
//! - [`Name`], [`GameName`], [`Text`]: text values checked against the
//!   line format at construction
//! - [`PeerVersion`]: what a peer announced in its first frame

mod codec;
mod error;
mod message;
mod text;
mod version;

pub use codec::{Codec, EMPTY_STR, HEADER_SEP, PARAM_SEP, Param, ParamReader, ParamWriter};
pub use error::ProtocolError;
pub use message::{
    BuildRequest, BuyDevCardRequest, CancelBuildRequest, CardAction, ChoosePlayer,
    ChoosePlayerRequest, DeclinePlayerRequest, DeclineReason, DeleteGame, DevCardAction,
    DiceResult, Discard, DiscardRequest, ElementAction, EndTurn, FirstPlayer, GameMembers,
    GameStateMsg, GameTextMsg, Games, ImARobot, JoinGame, JoinGameAuth, LeaveAll, LeaveGame,
    Message, MessageRegistry, MessageType, MoveRobber, NewGame, PickResourceType,
    PickResources, PlayDevCardRequest, PlayerElement, PlayerElements, PutPiece,
    RejectConnection, ResourceCount, RollDice, ServerPing, SimpleRequest, SitDown, StartGame,
    StatusMessage, Turn, Version, WireMessage, choice, element, simple, status,
};
pub use text::{GameName, MAX_NAME_LEN, MAX_TEXT_LEN, Name, Text};
pub use version::{
    CURRENT_VERSION, FEAT_SCENARIOS, FEAT_SIX_PLAYER, FEAT_SPECIAL_BUILD, FeatureSet,
    LEGACY_VERSION, PeerVersion, VERSION_DECLINE_REQUEST, VERSION_PLAYER_ELEMENTS,
};
