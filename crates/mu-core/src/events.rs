//! Identity update notifications
//!
//! Every cache write emits an [`IdentityUpdate`] scoped to the affected
//! account. Async consumers subscribe to a broadcast channel; synchronous
//! consumers register callbacks, optionally filtered to one account.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use ulid::Ulid;

/// Action name carried by serialized updates
pub const GENERAL_UPDATE_ACTION: &str = "merged_user_general_update";

/// Something cached about an account changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename = "merged_user_general_update")]
pub struct IdentityUpdate {
    /// Account the update is scoped to
    #[serde(rename = "namespaceUserId")]
    pub namespace_user_id: String,
}

impl IdentityUpdate {
    /// Create update for an account
    #[inline]
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            namespace_user_id: user_id.into(),
        }
    }
}

/// Registered callback identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Ulid);

impl ListenerId {
    /// Generate new listener ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Callback = Arc<dyn Fn(&IdentityUpdate) + Send + Sync>;

struct Listener {
    user_id: Option<String>,
    callback: Callback,
}

/// Fan-out of identity updates
pub struct Notifier {
    updates_tx: broadcast::Sender<IdentityUpdate>,
    listeners: DashMap<ListenerId, Listener>,
}

impl Notifier {
    /// Create notifier with the given broadcast buffer
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (updates_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            updates_tx,
            listeners: DashMap::new(),
        }
    }

    /// Subscribe to every update
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityUpdate> {
        self.updates_tx.subscribe()
    }

    /// Register a callback, scoped to one account or to all when `user_id` is `None`
    pub fn on_identity_updated<F>(&self, user_id: Option<&str>, callback: F) -> ListenerId
    where
        F: Fn(&IdentityUpdate) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.listeners.insert(
            id,
            Listener {
                user_id: user_id.map(str::to_string),
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Remove a callback; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered callbacks
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Emit an update for `user_id`
    pub fn emit(&self, user_id: &str) {
        let update = IdentityUpdate::new(user_id);

        // Callbacks may register or remove listeners, so run them unlocked.
        let callbacks: Vec<Callback> = self
            .listeners
            .iter()
            .filter(|l| l.user_id.as_deref().map_or(true, |u| u == user_id))
            .map(|l| Arc::clone(&l.callback))
            .collect();
        for callback in callbacks {
            callback(&update);
        }

        if self.updates_tx.send(update).is_err() {
            trace!(user_id, "no subscribers for identity update");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.updates_tx.receiver_count())
            .finish()
    }
}
