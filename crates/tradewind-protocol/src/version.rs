//! Peer versions and optional features.
//!
//! The first frame in each direction is a [`Version`] message. The server
//! keeps the client's [`PeerVersion`] for the life of the connection and
//! uses it to pick which encoding of a data-carrying message that peer gets.

use std::collections::BTreeSet;
use std::fmt;

use crate::codec::{Param, ParamReader, ParamWriter};
use crate::error::ProtocolError;
use crate::message::Version;
use crate::text::Text;

/// First version that understands [`PlayerElements`](crate::PlayerElements).
pub const VERSION_PLAYER_ELEMENTS: i32 = 2000;

/// First version that understands
/// [`DeclinePlayerRequest`](crate::DeclinePlayerRequest).
pub const VERSION_DECLINE_REQUEST: i32 = 2500;

/// The version this build speaks.
pub const CURRENT_VERSION: i32 = 2500;

/// Assumed for a peer that never announced a version.
pub const LEGACY_VERSION: i32 = 1000;

/// Six-player tables.
pub const FEAT_SIX_PLAYER: &str = "6pl";
/// Six-player special building phase.
pub const FEAT_SPECIAL_BUILD: &str = "sb";
/// Scenario rules (pirate fleet, cloth villages, inventory items).
pub const FEAT_SCENARIOS: &str = "sc";

const FEATURE_SEP: char = ';';

/// A set of short feature codes, encoded as `;a;b;c;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every feature this build supports.
    pub fn all() -> Self {
        [FEAT_SIX_PLAYER, FEAT_SPECIAL_BUILD, FEAT_SCENARIOS]
            .into_iter()
            .collect()
    }

    pub fn with(mut self, feature: &str) -> Self {
        self.insert(feature);
        self
    }

    /// Adds a feature code. Codes containing the separator or anything the
    /// line format can't carry are ignored.
    pub fn insert(&mut self, feature: &str) {
        if !feature.is_empty() && Text::new(feature).is_ok() && !feature.contains(FEATURE_SEP) {
            self.0.insert(feature.to_string());
        }
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The features both sets have.
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// Parses `;a;b;`. Unknown codes are kept; empty segments are skipped.
    pub fn parse(encoded: &str) -> Self {
        encoded.split(FEATURE_SEP).collect()
    }

    pub fn encode(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let mut out = String::from(FEATURE_SEP);
        for feature in &self.0 {
            out.push_str(feature);
            out.push(FEATURE_SEP);
        }
        out
    }
}

impl<'a> FromIterator<&'a str> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for feature in iter {
            set.insert(feature);
        }
        set
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Param for FeatureSet {
    fn write(&self, w: &mut ParamWriter) {
        w.raw(&self.encode());
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self::parse(r.raw()?))
    }
}

/// What a connected peer announced about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerVersion {
    pub number: i32,
    pub display: String,
    pub build: String,
    pub features: FeatureSet,
}

impl PeerVersion {
    /// A peer that hasn't sent a version frame.
    pub fn legacy() -> Self {
        Self {
            number: LEGACY_VERSION,
            display: "1.0.00".to_string(),
            build: String::new(),
            features: FeatureSet::new(),
        }
    }

    /// This build.
    pub fn current() -> Self {
        Self {
            number: CURRENT_VERSION,
            display: "2.5.00".to_string(),
            build: String::new(),
            features: FeatureSet::all(),
        }
    }

    pub fn supports_player_elements(&self) -> bool {
        self.number >= VERSION_PLAYER_ELEMENTS
    }

    pub fn supports_decline(&self) -> bool {
        self.number >= VERSION_DECLINE_REQUEST
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// The announcement frame for this version.
    pub fn to_message(&self) -> Version {
        Version {
            number: self.number,
            display: Text::sanitized(&self.display),
            build: Text::sanitized(&self.build),
            features: self.features.clone(),
        }
    }
}

impl Default for PeerVersion {
    fn default() -> Self {
        Self::legacy()
    }
}

impl From<&Version> for PeerVersion {
    fn from(msg: &Version) -> Self {
        Self {
            number: msg.number,
            display: msg.display.as_str().to_string(),
            build: msg.build.as_str().to_string(),
            features: msg.features.clone(),
        }
    }
}

impl fmt::Display for PeerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WireMessage;

    #[test]
    fn test_feature_set_encoding() {
        let features = FeatureSet::new().with("sb").with("6pl");
        assert_eq!(features.encode(), ";6pl;sb;");
        assert_eq!(FeatureSet::parse(";6pl;sb;"), features);
        assert_eq!(FeatureSet::new().encode(), "");
    }

    #[test]
    fn test_feature_set_ignores_unsafe_codes() {
        let features = FeatureSet::parse(";ok;;bad,code;");
        assert!(features.contains("ok"));
        assert_eq!(features.iter().count(), 1);
    }

    #[test]
    fn test_version_message_with_no_features_uses_empty_marker() {
        let msg = PeerVersion {
            features: FeatureSet::new(),
            ..PeerVersion::legacy()
        }
        .to_message();
        assert_eq!(msg.encode(), "9998|1000,1.0.00,\t,\t");
    }

    #[test]
    fn test_thresholds() {
        assert!(!PeerVersion::legacy().supports_player_elements());
        assert!(PeerVersion::current().supports_player_elements());
        let mid = PeerVersion {
            number: 2000,
            ..PeerVersion::legacy()
        };
        assert!(mid.supports_player_elements());
        assert!(!mid.supports_decline());
    }
}
