//! Application-wide "auth state changed" notification.

use tokio::sync::broadcast;

use crate::identity::Profile;

const DEFAULT_CAPACITY: usize = 16;

/// Payload of an auth change. `user` is `None` on sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChanged {
    pub user: Option<Profile>,
}

/// Broadcast hub for [`AuthChanged`]. Clones share subscribers.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthChanged>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthChanged> {
        self.tx.subscribe()
    }

    /// Publish a change; returns how many subscribers received it.
    pub fn notify(&self, user: Option<Profile>) -> usize {
        self.tx.send(AuthChanged { user }).unwrap_or(0)
    }
}
