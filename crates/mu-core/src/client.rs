//! Boundary to the Matrix client library
//!
//! Sync, HTTP and room-state bookkeeping live outside this workspace; the
//! merge logic only talks to them through [`MatrixClient`].

use crate::error::ClientError;
use crate::room::Room;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// State event naming the parent account of a localpart
pub const LINKED_ACCOUNTS_EVENT: &str = "m.linked_accounts";

/// Room membership state event
pub const ROOM_MEMBER_EVENT: &str = "m.room.member";

/// Alias prefix of per-localpart profile rooms
pub const PROFILE_ROOM_ALIAS_PREFIX: &str = "#_profile_";

/// Logged-in session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account identifier of the local user
    pub user_id: String,
    /// Server name of the local homeserver
    pub homeserver_domain: String,
}

impl Session {
    /// Create session
    #[inline]
    #[must_use]
    pub fn new(user_id: impl Into<String>, homeserver_domain: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            homeserver_domain: homeserver_domain.into(),
        }
    }
}

/// Alias of the profile room holding the linked accounts of `localpart`
#[must_use]
pub fn profile_room_alias(localpart: &str, homeserver_domain: &str) -> String {
    format!("{PROFILE_ROOM_ALIAS_PREFIX}{localpart}:{homeserver_domain}")
}

/// Operations the merge logic needs from the Matrix client
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// Current session, if logged in
    fn session(&self) -> Option<Session>;

    /// Snapshot of a known room
    fn room(&self, room_id: &str) -> Option<Arc<Room>>;

    /// Resolve a room alias to a room identifier
    async fn resolve_alias(&self, alias: &str) -> Result<String, ClientError>;

    /// Read a state event's content from a room without joining it
    ///
    /// Returns `ClientError::Forbidden` when the room does not allow peeking.
    async fn peek_state(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<Value>, ClientError>;

    /// Join a room
    async fn join_room(&self, room_id: &str) -> Result<(), ClientError>;

    /// Read a state event's content from a joined room
    async fn room_state(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<Value>, ClientError>;

    /// Fetch an account's global profile
    async fn profile_info(&self, user_id: &str) -> Result<crate::types::ProfileInfo, ClientError>;
}
