//! Room state snapshots
//!
//! Plain data handed over by the Matrix collaborator. The merge logic only
//! reads these; keeping them up to date is the collaborator's job.

use serde::{Deserialize, Serialize};

/// Membership state of a room member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Joined
    Join,
    /// Invited
    Invite,
    /// Left or kicked
    Leave,
    /// Banned
    Ban,
    /// Knocking
    Knock,
}

impl Membership {
    /// Joined or invited
    #[inline]
    #[must_use]
    pub fn is_current(self) -> bool {
        matches!(self, Self::Join | Self::Invite)
    }
}

/// One member of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    /// Account identifier
    pub user_id: String,
    /// Room the membership belongs to
    pub room_id: String,
    /// Disambiguated display name
    pub name: String,
    /// Current membership
    pub membership: Membership,
    /// Avatar content URI
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Sender of the membership event
    #[serde(default)]
    pub sender: Option<String>,
}

impl RoomMember {
    /// Create member; the display name defaults to the account identifier
    #[must_use]
    pub fn new(user_id: impl Into<String>, room_id: impl Into<String>, membership: Membership) -> Self {
        let user_id = user_id.into();
        Self {
            name: user_id.clone(),
            user_id,
            room_id: room_id.into(),
            membership,
            avatar_url: None,
            sender: None,
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With avatar
    #[inline]
    #[must_use]
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Snapshot of a room's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier
    pub room_id: String,
    /// Content of `m.room.name`, if set
    #[serde(default)]
    pub name: Option<String>,
    /// Canonical alias
    #[serde(default)]
    pub canonical_alias: Option<String>,
    /// Other published aliases
    #[serde(default)]
    pub alt_aliases: Vec<String>,
    /// Every known member, any membership
    #[serde(default)]
    pub members: Vec<RoomMember>,
    /// Server-provided summary heroes
    #[serde(default)]
    pub summary_heroes: Option<Vec<String>>,
    /// Display names of pending third-party invites
    #[serde(default)]
    pub third_party_invites: Vec<String>,
}

impl Room {
    /// Create empty room
    #[must_use]
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Self::default()
        }
    }

    /// Look up a member by account identifier
    #[must_use]
    pub fn member(&self, user_id: &str) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Members with the given membership
    #[must_use]
    pub fn members_with_membership(&self, membership: Membership) -> Vec<&RoomMember> {
        self.members
            .iter()
            .filter(|m| m.membership == membership)
            .collect()
    }

    /// Canonical alias, or failing that any alias
    #[must_use]
    pub fn any_alias(&self) -> Option<&str> {
        self.canonical_alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .or_else(|| self.alt_aliases.iter().map(String::as_str).find(|a| !a.is_empty()))
    }
}
