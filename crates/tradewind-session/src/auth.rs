//! Authentication hook for nicknames.
//!
//! Tradewind doesn't store accounts itself. The server calls an
//! [`Authenticator`] when a connection first names itself (on its first
//! join), and turns a failure into a status message for that connection.

use std::collections::HashMap;

use tradewind_protocol::Name;

use crate::SessionError;

/// Validates a nickname and password.
///
/// `Send + Sync + 'static` because every reader thread shares one
/// authenticator for the life of the server.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, nickname: &Name, password: &str) -> Result<(), SessionError>;
}

/// Accepts everyone. For development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthenticator;

impl Authenticator for OpenAuthenticator {
    fn authenticate(&self, _nickname: &Name, _password: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Nicknames with an account must give its password; the rest play as
/// guests.
#[derive(Debug, Clone, Default)]
pub struct AccountAuthenticator {
    accounts: HashMap<String, String>,
}

impl AccountAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, nickname: &str, password: &str) -> Self {
        self.accounts
            .insert(nickname.to_string(), password.to_string());
        self
    }
}

impl Authenticator for AccountAuthenticator {
    fn authenticate(&self, nickname: &Name, password: &str) -> Result<(), SessionError> {
        match self.accounts.get(nickname.as_str()) {
            Some(expected) if expected != password => {
                Err(SessionError::WrongPassword(nickname.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_need_their_password() {
        let auth = AccountAuthenticator::new().with_account("alice", "secret");
        let alice = Name::new("alice").unwrap();
        assert!(auth.authenticate(&alice, "secret").is_ok());
        assert!(matches!(
            auth.authenticate(&alice, "guess"),
            Err(SessionError::WrongPassword(_))
        ));
        assert!(auth.authenticate(&Name::new("guest").unwrap(), "").is_ok());
    }
}
