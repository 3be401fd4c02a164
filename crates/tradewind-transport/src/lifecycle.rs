//! Connection lifecycle flags shared by both transports.
//!
//! ```text
//! Unaccepted → (accepted) → Connected → SoftClosedIn → Closed
//!                                  └──────────────────→ Closed
//! ```
//!
//! Every flag only ever moves forward. All of them are atomics so any
//! thread may check or advance them without taking a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::TransportError;

/// A snapshot of where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unaccepted,
    Connected,
    /// Inbound reads have stopped; queued outbound data is draining.
    SoftClosedIn,
    Closed,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    accepted: AtomicBool,
    soft_closed_in: AtomicBool,
    closed: AtomicBool,
    name: OnceLock<String>,
    last_error: Mutex<Option<String>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the connection accepted. A second call is a usage error.
    pub fn mark_accepted(&self) -> Result<(), TransportError> {
        if self.accepted.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyAccepted);
        }
        Ok(())
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted.load(Ordering::Acquire)
    }

    /// Stops inbound reads. Returns `true` for the call that made the change.
    pub fn begin_soft_close(&self) -> bool {
        !self.soft_closed_in.swap(true, Ordering::AcqRel)
    }

    pub fn is_soft_closed_in(&self) -> bool {
        self.soft_closed_in.load(Ordering::Acquire)
    }

    /// Closes the connection. Returns `true` only for the call that closed
    /// it, so callers can notify the peer exactly once.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LinkState {
        if self.is_closed() {
            LinkState::Closed
        } else if self.is_soft_closed_in() {
            LinkState::SoftClosedIn
        } else if self.is_accepted() {
            LinkState::Connected
        } else {
            LinkState::Unaccepted
        }
    }

    /// Fails unless the connection is accepted and not closed.
    pub fn check_can_send(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::ConnectionClosed(
                self.last_error().unwrap_or_else(|| "closed".to_string()),
            ))
        } else if !self.is_accepted() {
            Err(TransportError::NotAccepted)
        } else {
            Ok(())
        }
    }

    pub fn set_name(&self, name: &str) -> Result<(), TransportError> {
        self.name
            .set(name.to_string())
            .map_err(|_| TransportError::NameAlreadySet)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Remembers the failure that ended the connection. The first one wins.
    pub fn record_error(&self, error: &TransportError) {
        let mut slot = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error.to_string());
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_accepted_only_once() {
        let life = Lifecycle::new();
        assert_eq!(life.state(), LinkState::Unaccepted);
        life.mark_accepted().unwrap();
        assert!(matches!(
            life.mark_accepted(),
            Err(TransportError::AlreadyAccepted)
        ));
        assert_eq!(life.state(), LinkState::Connected);
    }

    #[test]
    fn test_close_reports_first_call_only() {
        let life = Lifecycle::new();
        assert!(life.close());
        assert!(!life.close());
        assert_eq!(life.state(), LinkState::Closed);
    }

    #[test]
    fn test_send_checks() {
        let life = Lifecycle::new();
        assert!(matches!(
            life.check_can_send(),
            Err(TransportError::NotAccepted)
        ));
        life.mark_accepted().unwrap();
        assert!(life.check_can_send().is_ok());
        life.close();
        assert!(matches!(
            life.check_can_send(),
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_name_set_once() {
        let life = Lifecycle::new();
        life.set_name("alice").unwrap();
        assert!(life.set_name("bob").is_err());
        assert_eq!(life.name(), Some("alice"));
    }

    #[test]
    fn test_first_error_wins() {
        let life = Lifecycle::new();
        life.record_error(&TransportError::Shutdown);
        life.record_error(&TransportError::InvalidUtf8);
        assert_eq!(life.last_error().as_deref(), Some("transport shut down"));
    }
}
