//! # Tradewind
//!
//! Session layer for a multiplayer turn-based board game.
//!
//! A Tradewind server keeps every participant, human clients and robots
//! alike, on one authoritative copy of each game. It accepts connections
//! over TCP and over in-process ports, runs each game on its own thread,
//! and sends each member the encoding of every event that its version
//! understands.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradewind::prelude::*;
//!
//! # fn main() -> Result<(), TradewindError> {
//! tradewind::logging::init("info");
//! let server = Server::builder().bind("0.0.0.0:8880").build()?;
//! server.run()
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! tradewind (server, clients, shadow games)
//!     ↕
//! tradewind-session (reader threads, routing, capped queues, peers)
//!     ↕
//! tradewind-protocol (messages)  +  tradewind-game (turn rules)
//!     ↕
//! tradewind-transport (TCP and in-process connections)
//! ```

mod client;
mod config;
mod error;
mod game_actor;
mod handler;
mod lobby;
pub mod logging;
mod outbound;
mod robot;
mod server;
mod shadow;
mod watchdog;

pub use client::{Client, GameListener};
pub use config::{AdvertisedVersion, ClientConfig, ServerConfig};
pub use error::TradewindError;
pub use lobby::BoardFactory;
pub use outbound::SERVER_NICKNAME;
pub use robot::{RobotClient, RobotEvent, RobotQueue};
pub use server::{Server, ServerBuilder, ServerHandle};
pub use shadow::{ShadowGame, ShadowSeat, Tracked};

/// Everything a typical server or client needs.
pub mod prelude {
    pub use crate::{
        Client, ClientConfig, GameListener, RobotClient, RobotEvent, RobotQueue, Server,
        ServerConfig, ShadowGame, Tracked, TradewindError,
    };
    pub use tradewind_game::{BoardRules, GameFlags, GameState, OpenBoard, ResourceSet, Seat};
    pub use tradewind_protocol::{GameName, Message};
    pub use tradewind_session::{AccountAuthenticator, OpenAuthenticator};
    pub use tradewind_transport::LocalRegistry;
}
