//! Profile cache and resolver
//!
//! Profiles are cached per parent account: a global profile plus per-room
//! overrides. [`get_profile_fast`](MergedUsers::get_profile_fast) answers
//! from the cache; [`get_profile`](MergedUsers::get_profile) resolves misses
//! through room membership state and the global profile lookup.

use crate::client::ROOM_MEMBER_EVENT;
use crate::error::MergeError;
use crate::merged::MergedUsers;
use crate::room::RoomMember;
use crate::types::{CachedProfile, ProfileInfo};
use tracing::{debug, warn};

impl MergedUsers {
    /// Cache-only profile read for the account's parent
    ///
    /// Never triggers a refresh. Non-mergable accounts are never cached.
    #[must_use]
    pub fn cached_profile(&self, user_id: &str, room_id: Option<&str>) -> CachedProfile {
        if !self.is_mergable(user_id) {
            return CachedProfile::NotCached;
        }
        let parent = self.get_parent(user_id);
        self.read_cache(|c| {
            c.profiles
                .get(&parent)
                .map_or(CachedProfile::NotCached, |r| r.lookup(room_id))
        })
    }

    /// Cached profile of the account's parent, empty when never resolved
    ///
    /// Triggers a background refresh of the account's relationship.
    #[must_use]
    pub fn get_profile_fast(&self, user_id: &str, room_id: Option<&str>) -> ProfileInfo {
        if !self.is_mergable(user_id) {
            return ProfileInfo::default();
        }
        drop(self.track_user(user_id));
        let parent = self.get_parent(user_id);
        self.read_cache(|c| c.resolve_profile(&parent, room_id))
            .unwrap_or_default()
    }

    /// Resolve the profile of the account's parent
    ///
    /// Waits for the relationship lookup first. On a cache miss the parent's
    /// membership in `room_id` is tried, then its global profile.
    ///
    /// # Errors
    /// Returns `MergeError::ProfileLookup` if the global profile lookup fails
    pub async fn get_profile(
        &self,
        user_id: &str,
        room_id: Option<&str>,
    ) -> Result<ProfileInfo, MergeError> {
        let client = self.client();
        if client.session().is_none() {
            return Ok(ProfileInfo::default());
        }
        if !self.merge_by_localpart() || !self.is_mergable(user_id) {
            return client
                .profile_info(user_id)
                .await
                .map_err(|source| MergeError::ProfileLookup {
                    user_id: user_id.to_string(),
                    source,
                });
        }

        self.track_user(user_id).await;
        let parent = self.get_parent(user_id);

        let cached = self.read_cache(|c| c.resolve_profile(&parent, room_id));
        if let Some(profile) = cached {
            debug!(user_id, parent = %parent, "profile cache hit");
            return Ok(profile);
        }

        if let Some(room_id) = room_id {
            match client.room_state(room_id, ROOM_MEMBER_EVENT, &parent).await {
                Ok(Some(content)) => match serde_json::from_value::<ProfileInfo>(content) {
                    Ok(profile) => {
                        self.cache_profile(&parent, Some(room_id), Some(profile.clone()));
                        return Ok(profile);
                    }
                    Err(e) => warn!(room_id, parent = %parent, error = %e, "malformed membership content"),
                },
                Ok(None) => self.cache_profile(&parent, Some(room_id), None),
                Err(e) => warn!(room_id, parent = %parent, error = %e, "room profile lookup failed"),
            }
        }

        let profile = client
            .profile_info(&parent)
            .await
            .map_err(|source| MergeError::ProfileLookup {
                user_id: parent.clone(),
                source,
            })?;
        if let Some(room_id) = room_id {
            self.cache_profile(&parent, Some(room_id), Some(profile.clone()));
        }
        self.cache_profile(&parent, None, Some(profile.clone()));
        Ok(profile)
    }

    /// Best-effort profile for a room member, without waiting on anything
    #[must_use]
    pub fn get_profile_of(&self, member: &RoomMember) -> ProfileInfo {
        if !self.is_mergable(&member.user_id) {
            return member_profile(member);
        }

        let fast = self.get_profile_fast(&member.user_id, Some(&member.room_id));
        if !fast.is_empty() {
            return fast;
        }

        let parent = self.get_parent(&member.user_id);
        let room = self.client().room(&member.room_id);
        let parent_member = room.as_deref().and_then(|r| r.member(&parent));
        member_profile(parent_member.unwrap_or(member))
    }

    /// Write a profile for `parent_id` into the cache and notify listeners
    ///
    /// `room_id = None` sets the global profile (`None` forgets it). A room
    /// mapped to `None` records that the room has no specific profile.
    pub fn cache_profile(&self, parent_id: &str, room_id: Option<&str>, profile: Option<ProfileInfo>) {
        self.write_cache(|c| {
            let record = c.profiles.entry(parent_id.to_string()).or_default();
            match room_id {
                Some(room_id) => {
                    record.rooms.insert(room_id.to_string(), profile);
                }
                None => record.global = profile,
            }
        });
        self.emit(parent_id);
    }
}

fn member_profile(member: &RoomMember) -> ProfileInfo {
    ProfileInfo::new(Some(member.name.clone()), member.avatar_url.clone())
}
