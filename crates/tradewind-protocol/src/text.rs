//! Validated text values.
//!
//! Anything that travels as a parameter must not contain either separator,
//! and must not contain control characters (the empty-string marker is a
//! tab). These newtypes check that once, when the value is built, so the
//! encoder never has to escape anything.

use std::borrow::Borrow;
use std::fmt;

use crate::codec::{PARAM_SEP, HEADER_SEP};
use crate::error::ProtocolError;

/// Longest nickname or game name accepted.
pub const MAX_NAME_LEN: usize = 30;

/// Longest free text accepted.
pub const MAX_TEXT_LEN: usize = 1000;

fn check(value: &str, allow_empty: bool, max_len: usize) -> Result<(), ProtocolError> {
    let reason = if !allow_empty && value.is_empty() {
        Some("must not be empty")
    } else if value.contains(HEADER_SEP) || value.contains(PARAM_SEP) {
        Some("contains a separator")
    } else if value.chars().any(char::is_control) {
        Some("contains a control character")
    } else if value.chars().count() > max_len {
        Some("too long")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ProtocolError::InvalidText {
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

macro_rules! text_type {
    ($(#[$meta:meta])* $name:ident, allow_empty = $empty:expr, max = $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ProtocolError> {
                let value = value.into();
                check(&value, $empty, $max)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ProtocolError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ProtocolError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

text_type!(
    /// A player nickname.
    Name,
    allow_empty = false,
    max = MAX_NAME_LEN
);

text_type!(
    /// The name of a game; the first parameter of every game-scoped message.
    GameName,
    allow_empty = false,
    max = MAX_NAME_LEN
);

text_type!(
    /// Free text: chat, status lines, version strings. May be empty.
    Text,
    allow_empty = true,
    max = MAX_TEXT_LEN
);

impl Text {
    /// An empty text value.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Builds a text value from arbitrary input, replacing anything the
    /// line format can't carry and truncating to [`MAX_TEXT_LEN`].
    pub fn sanitized(value: &str) -> Self {
        let cleaned = value
            .chars()
            .map(|c| match c {
                HEADER_SEP => '/',
                PARAM_SEP => ';',
                c if c.is_control() => ' ',
                c => c,
            })
            .take(MAX_TEXT_LEN)
            .collect();
        Self(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rejects_separators_and_controls() {
        assert!(Name::new("alice").is_ok());
        assert!(Name::new("").is_err());
        assert!(Name::new("a|b").is_err());
        assert!(Name::new("a,b").is_err());
        assert!(Name::new("\tx").is_err());
        assert!(Name::new("x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_text_allows_empty() {
        assert_eq!(Text::new("").unwrap(), Text::empty());
        assert!(Text::new("hello, world").is_err());
    }

    #[test]
    fn test_text_sanitized_is_always_valid() {
        let text = Text::sanitized("a|b,c\nd");
        assert_eq!(text.as_str(), "a/b;c d");
        assert!(Text::new(text.as_str()).is_ok());
    }
}
