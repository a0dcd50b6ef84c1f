//! Core data model
//!
//! Defines the cached records and their persisted document shape:
//! - Localpart records (parent and discovered children)
//! - Profile records (global profile plus per-room overrides)
//! - The tagged result of a cache-only profile read

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display profile of an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    /// Avatar content URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileInfo {
    /// Create profile from optional parts
    #[inline]
    #[must_use]
    pub fn new(displayname: Option<String>, avatar_url: Option<String>) -> Self {
        Self {
            displayname,
            avatar_url,
        }
    }

    /// Profile with only a display name
    #[inline]
    #[must_use]
    pub fn named(displayname: impl Into<String>) -> Self {
        Self {
            displayname: Some(displayname.into()),
            avatar_url: None,
        }
    }

    /// True when neither a display name nor an avatar is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.displayname.as_deref().map_or(true, str::is_empty)
            && self.avatar_url.as_deref().map_or(true, str::is_empty)
    }
}

/// Relationship record for one localpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalpartRecord {
    /// Canonical account for the localpart
    pub parent_user_id: String,
    /// Other accounts sharing the localpart, in discovery order
    #[serde(default)]
    pub children_user_ids: Vec<String>,
}

impl LocalpartRecord {
    /// Create a record, listing `user_id` as a child unless it is the parent
    #[must_use]
    pub fn new(parent_user_id: impl Into<String>, user_id: &str) -> Self {
        let parent_user_id = parent_user_id.into();
        let children_user_ids = if user_id == parent_user_id {
            Vec::new()
        } else {
            vec![user_id.to_string()]
        };
        Self {
            parent_user_id,
            children_user_ids,
        }
    }

    /// Record a newly observed child; returns false if nothing changed
    pub fn add_child(&mut self, user_id: &str) -> bool {
        if user_id == self.parent_user_id || self.has_child(user_id) {
            return false;
        }
        self.children_user_ids.push(user_id.to_string());
        true
    }

    /// Check if `user_id` is a listed child
    #[inline]
    #[must_use]
    pub fn has_child(&self, user_id: &str) -> bool {
        self.children_user_ids.iter().any(|c| c == user_id)
    }
}

/// Cached profiles for one parent account
///
/// A room mapped to `None` means "no room-specific profile, use global";
/// a room missing from the map has never been resolved. `global` stays
/// `None` until the global profile has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Default profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<ProfileInfo>,
    /// Per-room overrides
    #[serde(default)]
    pub rooms: HashMap<String, Option<ProfileInfo>>,
}

impl ProfileRecord {
    /// Cache-only read for a room (or the global profile when no room is given)
    #[must_use]
    pub fn lookup(&self, room_id: Option<&str>) -> CachedProfile {
        let Some(room_id) = room_id else {
            return self
                .global
                .clone()
                .map_or(CachedProfile::NotCached, CachedProfile::Cached);
        };
        match self.rooms.get(room_id) {
            Some(Some(profile)) => CachedProfile::Cached(profile.clone()),
            Some(None) => CachedProfile::CachedEmpty,
            None => CachedProfile::NotCached,
        }
    }
}

/// Outcome of a cache-only profile read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedProfile {
    /// Nothing has been resolved for this account and room yet
    NotCached,
    /// Resolved: the room has no specific profile, the global one applies
    CachedEmpty,
    /// Resolved profile
    Cached(ProfileInfo),
}

impl CachedProfile {
    /// Check if anything is cached
    #[inline]
    #[must_use]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::NotCached)
    }
}

/// Persisted cache document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCache {
    /// Relationship records keyed by localpart
    #[serde(default)]
    pub localparts: HashMap<String, LocalpartRecord>,
    /// Profile records keyed by parent account
    #[serde(default)]
    pub profiles: HashMap<String, ProfileRecord>,
}

impl MergeCache {
    /// Resolve a cache-only profile read into a concrete profile
    ///
    /// `CachedEmpty` falls back to the global profile and is a miss while
    /// that has not been fetched. `NotCached` is a miss.
    #[must_use]
    pub fn resolve_profile(&self, parent_id: &str, room_id: Option<&str>) -> Option<ProfileInfo> {
        let record = self.profiles.get(parent_id)?;
        match record.lookup(room_id) {
            CachedProfile::Cached(profile) => Some(profile),
            CachedProfile::CachedEmpty => record.global.clone(),
            CachedProfile::NotCached => None,
        }
    }
}

/// Content of an `m.linked_accounts` state event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccounts {
    /// Canonical account for the localpart
    #[serde(default)]
    pub parent: Option<String>,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Localpart records held
    pub localparts: usize,
    /// Profile records held
    pub profiles: usize,
    /// Localparts currently in failure backoff (approximate)
    pub failures: u64,
    /// Lookups in flight
    pub pending: usize,
}
