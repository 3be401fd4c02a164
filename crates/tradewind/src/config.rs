//! Server and client configuration.
//!
//! Plain structs with defaults. A server config can also be loaded from
//! JSON; missing fields keep their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tradewind_game::GameFlags;
use tradewind_protocol::{CURRENT_VERSION, FeatureSet, PeerVersion};
use tradewind_transport::MAX_FRAME_LEN;

use crate::TradewindError;

// ---------------------------------------------------------------------------
// AdvertisedVersion
// ---------------------------------------------------------------------------

/// The version a server or client announces in its first frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertisedVersion {
    pub number: i32,
    pub display: String,
    pub build: String,
    /// Feature codes, e.g. `"6pl"`.
    pub features: Vec<String>,
}

impl AdvertisedVersion {
    pub fn to_peer_version(&self) -> PeerVersion {
        PeerVersion {
            number: self.number,
            display: self.display.clone(),
            build: self.build.clone(),
            features: self.features.iter().map(String::as_str).collect::<FeatureSet>(),
        }
    }
}

impl Default for AdvertisedVersion {
    fn default() -> Self {
        let current = PeerVersion::current();
        Self {
            number: CURRENT_VERSION,
            display: current.display,
            build: current.build,
            features: current.features.iter().map(str::to_string).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP address to listen on. `None` means no socket listener.
    pub bind_addr: Option<String>,

    /// In-process port name to listen on. `None` means no local listener.
    pub local_port: Option<String>,

    /// Local clients that may wait for `accept` at once.
    pub accept_backlog: usize,

    /// Requests a game's queue holds before readers block.
    pub game_queue_capacity: usize,

    /// How often the watchdog looks at every game.
    pub watchdog_interval: Duration,

    /// How long a disconnected seat may keep a game waiting before its
    /// response is forced. Connected seats get twice as long.
    pub force_response_after: Duration,

    /// Longest line the server will send. Capped by the transport's limit.
    pub max_frame_len: usize,

    /// Options for newly created games.
    pub game_flags: GameFlags,

    /// What the server announces to each new connection.
    pub version: AdvertisedVersion,

    /// If set, robots must present this cookie or are turned away.
    pub robot_cookie: Option<String>,

    /// Seeds dice and decks of new games, for reproducible runs.
    pub dice_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            local_port: None,
            accept_backlog: 16,
            game_queue_capacity: 64,
            watchdog_interval: Duration::from_secs(5),
            force_response_after: Duration::from_secs(90),
            max_frame_len: MAX_FRAME_LEN,
            game_flags: GameFlags::default(),
            version: AdvertisedVersion::default(),
            robot_cookie: None,
            dice_seed: None,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, TradewindError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The frame limit actually enforced.
    pub fn frame_limit(&self) -> usize {
        self.max_frame_len.min(MAX_FRAME_LEN)
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Client`](crate::Client) or
/// [`RobotClient`](crate::RobotClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub nickname: String,
    pub password: String,

    /// Announce this client as a robot.
    pub robot: bool,

    /// The cookie a robot presents.
    pub robot_cookie: String,

    /// Name of the robot's strategy, for the server's logs.
    pub robot_brain: String,

    /// Messages each game's queue holds before the reader blocks.
    pub robot_queue_capacity: usize,

    pub version: AdvertisedVersion,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            password: String::new(),
            robot: false,
            robot_cookie: String::new(),
            robot_brain: "basic".to_string(),
            robot_queue_capacity: 100,
            version: AdvertisedVersion::default(),
        }
    }
}

impl ClientConfig {
    pub fn named(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_missing_fields_take_defaults() {
        let config = ServerConfig::from_json_str(
            r#"{ "local_port": "lobby", "game_flags": { "max_seats": 6 } }"#,
        )
        .unwrap();
        assert_eq!(config.local_port.as_deref(), Some("lobby"));
        assert_eq!(config.game_flags.max_seats, 6);
        assert_eq!(config.game_flags.vp_to_win, 10);
        assert_eq!(config.accept_backlog, 16);
        assert_eq!(config.bind_addr, None);
    }

    #[test]
    fn test_from_json_str_rejects_bad_json() {
        assert!(matches!(
            ServerConfig::from_json_str("{ not json"),
            Err(TradewindError::Config(_))
        ));
    }

    #[test]
    fn test_frame_limit_never_exceeds_transport() {
        let config = ServerConfig {
            max_frame_len: usize::MAX,
            ..Default::default()
        };
        assert_eq!(config.frame_limit(), MAX_FRAME_LEN);
    }

    #[test]
    fn test_advertised_version_default_is_current() {
        let version = AdvertisedVersion::default().to_peer_version();
        assert_eq!(version, PeerVersion::current());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ServerConfig {
            bind_addr: Some("127.0.0.1:8880".into()),
            robot_cookie: Some("cookie".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ServerConfig::from_json_str(&json).unwrap(), config);
    }
}
