//! Testing utilities for the Merged Users workspace
//!
//! An in-memory Matrix collaborator with call counters and failure switches,
//! plus fixtures for building services and rooms.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use mu_core::{
    ClientError, MatrixClient, MemoryStore, MergeConfig, MergedUsers, Membership, ProfileInfo,
    Room, RoomMember, Session, LINKED_ACCOUNTS_EVENT, ROOM_MEMBER_EVENT,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Homeserver domain used by fixtures
pub const HOME: &str = "x.org";

#[derive(Debug, Default)]
pub struct FakeClient {
    session: Mutex<Option<Session>>,
    rooms: DashMap<String, Arc<Room>>,
    aliases: DashMap<String, String>,
    linked: DashMap<String, String>,
    unpeekable: DashSet<String>,
    joined: DashSet<String>,
    profiles: DashMap<String, ProfileInfo>,
    memberships: DashMap<(String, String), ProfileInfo>,
    fail_alias: AtomicBool,
    fail_peek: AtomicBool,
    fail_join: AtomicBool,
    fail_room_state: AtomicBool,

    pub alias_lookups: AtomicUsize,
    pub peeks: AtomicUsize,
    pub joins: AtomicUsize,
    pub profile_lookups: AtomicUsize,
    pub room_state_lookups: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(user_id: &str) -> Self {
        let client = Self::new();
        client.set_session(Some(Session::new(user_id, HOME)));
        client
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock() = session;
    }

    pub fn add_room(&self, room: Room) {
        self.rooms.insert(room.room_id.clone(), Arc::new(room));
    }

    /// Publish `#_profile_<localpart>:x.org` naming `parent`
    pub fn link(&self, localpart: &str, parent: &str) {
        let room_id = format!("!profile_{localpart}:{HOME}");
        self.aliases
            .insert(format!("#_profile_{localpart}:{HOME}"), room_id.clone());
        self.linked.insert(room_id, parent.to_string());
    }

    /// Publish a profile room without a linked accounts event
    pub fn unlinked(&self, localpart: &str) {
        let room_id = format!("!profile_{localpart}:{HOME}");
        self.aliases
            .insert(format!("#_profile_{localpart}:{HOME}"), room_id);
    }

    /// Refuse peeking into the profile room of `localpart`
    pub fn forbid_peek(&self, localpart: &str) {
        self.unpeekable.insert(format!("!profile_{localpart}:{HOME}"));
    }

    pub fn set_profile(&self, user_id: &str, profile: ProfileInfo) {
        self.profiles.insert(user_id.to_string(), profile);
    }

    pub fn set_membership_profile(&self, room_id: &str, user_id: &str, profile: ProfileInfo) {
        self.memberships
            .insert((room_id.to_string(), user_id.to_string()), profile);
    }

    pub fn fail_alias_lookups(&self, fail: bool) {
        self.fail_alias.store(fail, Ordering::SeqCst);
    }

    /// Fail peeks with a network error (not a refusal)
    pub fn fail_peeks(&self, fail: bool) {
        self.fail_peek.store(fail, Ordering::SeqCst);
    }

    pub fn fail_joins(&self, fail: bool) {
        self.fail_join.store(fail, Ordering::SeqCst);
    }

    pub fn fail_room_state(&self, fail: bool) {
        self.fail_room_state.store(fail, Ordering::SeqCst);
    }

    pub fn has_joined(&self, room_id: &str) -> bool {
        self.joined.contains(room_id)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn linked_content(&self, room_id: &str) -> Option<Value> {
        self.linked.get(room_id).map(|p| json!({ "parent": p.value() }))
    }
}

#[async_trait]
impl MatrixClient for FakeClient {
    fn session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| Arc::clone(r.value()))
    }

    async fn resolve_alias(&self, alias: &str) -> Result<String, ClientError> {
        self.alias_lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_alias.load(Ordering::SeqCst) {
            return Err(ClientError::Network("alias lookup failed".into()));
        }
        self.aliases
            .get(alias)
            .map(|r| r.value().clone())
            .ok_or_else(|| ClientError::NotFound(alias.to_string()))
    }

    async fn peek_state(
        &self,
        room_id: &str,
        event_type: &str,
        _state_key: &str,
    ) -> Result<Option<Value>, ClientError> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        if self.fail_peek.load(Ordering::SeqCst) {
            return Err(ClientError::Network("peek timed out".into()));
        }
        if self.unpeekable.contains(room_id) {
            return Err(ClientError::Forbidden(room_id.to_string()));
        }
        if event_type != LINKED_ACCOUNTS_EVENT {
            return Ok(None);
        }
        Ok(self.linked_content(room_id))
    }

    async fn join_room(&self, room_id: &str) -> Result<(), ClientError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(ClientError::Forbidden(format!("cannot join {room_id}")));
        }
        self.joined.insert(room_id.to_string());
        Ok(())
    }

    async fn room_state(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<Value>, ClientError> {
        self.room_state_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_room_state.load(Ordering::SeqCst) {
            return Err(ClientError::Network("room state unavailable".into()));
        }
        match event_type {
            LINKED_ACCOUNTS_EVENT if self.joined.contains(room_id) => Ok(self.linked_content(room_id)),
            LINKED_ACCOUNTS_EVENT => Err(ClientError::Forbidden(room_id.to_string())),
            ROOM_MEMBER_EVENT => Ok(self
                .memberships
                .get(&(room_id.to_string(), state_key.to_string()))
                .map(|p| {
                    let mut content = serde_json::to_value(p.value()).unwrap_or_default();
                    content["membership"] = json!("join");
                    content
                })),
            _ => Ok(None),
        }
    }

    async fn profile_info(&self, user_id: &str) -> Result<ProfileInfo, ClientError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .get(user_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| ClientError::NotFound(user_id.to_string()))
    }
}

/// Merging enabled for `x.org` and `bridge.*`
pub fn merge_config() -> MergeConfig {
    MergeConfig::new()
        .with_mergable_hosts([HOME, "bridge.*"])
        .with_merge_by_localpart(true)
}

/// Service over a fake client and an in-memory store
pub fn setup_users(config: MergeConfig) -> (MergedUsers, Arc<FakeClient>, Arc<MemoryStore>) {
    setup_users_with(FakeClient::logged_in("@me:x.org"), config)
}

pub fn setup_users_with(
    client: FakeClient,
    config: MergeConfig,
) -> (MergedUsers, Arc<FakeClient>, Arc<MemoryStore>) {
    let client = Arc::new(client);
    let store = Arc::new(MemoryStore::new());
    let users = MergedUsers::new(client.clone(), store.clone(), config);
    users.init();
    (users, client, store)
}

pub fn member(room_id: &str, user_id: &str, name: &str, membership: Membership) -> RoomMember {
    RoomMember::new(user_id, room_id, membership).with_name(name)
}

pub fn joined(room_id: &str, user_id: &str, name: &str) -> RoomMember {
    member(room_id, user_id, name, Membership::Join)
}

/// Room with the given members
pub fn room_with(room_id: &str, members: Vec<RoomMember>) -> Room {
    let mut room = Room::new(room_id);
    room.members = members;
    room
}
