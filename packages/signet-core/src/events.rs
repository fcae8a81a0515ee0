//! Lifecycle event bus.
//!
//! A typed `tokio::sync::broadcast` channel distributes login/logout/account
//! notifications to any number of subscribers. Each service instance owns
//! its own bus, so subscribers always know which service an event came from.

use crate::session::Account;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber before a slow one
/// starts lagging.
const DEFAULT_CAPACITY: usize = 32;

/// Lifecycle notifications emitted by an identity service instance.
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    /// A login completed and the session token was persisted.
    UserDidLogin,
    /// The session ended, either through an explicit logout or server-side
    /// token invalidation.
    UserDidLogout,
    /// A fresh account payload was cached for the active session.
    DidUpdateAccount(Account),
}

impl IdentityEvent {
    /// Stable name of the event kind, for logs and JSON output.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserDidLogin => "user_did_login",
            Self::UserDidLogout => "user_did_logout",
            Self::DidUpdateAccount(_) => "did_update_account",
        }
    }
}

/// Broadcast bus for [`IdentityEvent`]s.
///
/// Every subscriber receives a copy of every event published after it
/// subscribed. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IdentityEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning the number of subscribers that will see
    /// it.
    pub fn publish(&self, event: IdentityEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
