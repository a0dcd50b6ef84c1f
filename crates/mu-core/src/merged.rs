//! Merged users service
//!
//! Owns the relationship and profile caches, the failure backoff and the
//! table of in-flight lookups. Cloning is cheap; clones share state.
//!
//! # Tracking
//!
//! [`MergedUsers::track_user`] discovers whether an account is the child of
//! some parent by reading the `m.linked_accounts` state of the profile room
//! `#_profile_<localpart>:<homeserver>`. At most one lookup per localpart
//! runs at a time; concurrent callers share its [`TrackHandle`]. Failures
//! are logged, put the localpart into backoff, and never reach callers.

use crate::client::{profile_room_alias, MatrixClient, LINKED_ACCOUNTS_EVENT};
use crate::config::MergeConfig;
use crate::error::ClientError;
use crate::events::{IdentityUpdate, ListenerId, Notifier};
use crate::identity::{get_localpart, is_mergable_with};
use crate::store::{load_cache, save_cache, CacheStore};
use crate::types::{CacheStats, LinkedAccounts, LocalpartRecord, MergeCache};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, trace, warn};

/// Completion of an identity lookup, shared by every concurrent caller
pub type TrackHandle = Shared<BoxFuture<'static, ()>>;

fn settled() -> TrackHandle {
    futures::future::ready(()).boxed().shared()
}

struct PendingLookup {
    ticket: u64,
    handle: TrackHandle,
}

struct Inner {
    client: Arc<dyn MatrixClient>,
    store: Arc<dyn CacheStore>,
    config: RwLock<MergeConfig>,
    cache: RwLock<MergeCache>,
    /// Localpart -> time of the last failed lookup, expiring after the backoff
    failures: Cache<String, Instant>,
    pending: Mutex<HashMap<String, PendingLookup>>,
    next_ticket: AtomicU64,
    notifier: Notifier,
}

/// Identity merging service
#[derive(Clone)]
pub struct MergedUsers {
    inner: Arc<Inner>,
}

impl MergedUsers {
    /// Create service with empty caches
    ///
    /// Call [`init`](Self::init) to load the persisted cache.
    #[must_use]
    pub fn new(
        client: Arc<dyn MatrixClient>,
        store: Arc<dyn CacheStore>,
        config: MergeConfig,
    ) -> Self {
        let failures = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.failure_backoff)
            .build();

        Self {
            inner: Arc::new(Inner {
                client,
                store,
                config: RwLock::new(config),
                cache: RwLock::new(MergeCache::default()),
                failures,
                pending: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(0),
                notifier: Notifier::default(),
            }),
        }
    }

    /// Load the persisted cache, replacing whatever is held in memory
    pub fn init(&self) {
        let key = self.inner.config.read().storage_key.clone();
        let loaded = load_cache(self.inner.store.as_ref(), &key);
        debug!(
            localparts = loaded.localparts.len(),
            profiles = loaded.profiles.len(),
            "loaded merge cache"
        );
        *self.inner.cache.write() = loaded;
    }

    /// Drop all in-memory caches; persisted state is left alone
    pub fn clear(&self) {
        *self.inner.cache.write() = MergeCache::default();
        self.inner.failures.invalidate_all();
    }

    /// Clear caches and forget in-flight lookups
    ///
    /// Lookups already running finish in the background but their results
    /// land in the cleared cache.
    pub fn teardown(&self) {
        self.clear();
        self.inner.pending.lock().clear();
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> MergeConfig {
        self.inner.config.read().clone()
    }

    /// Change host patterns or the merge flag at runtime
    ///
    /// The failure backoff window is fixed at construction.
    pub fn update_config(&self, f: impl FnOnce(&mut MergeConfig)) {
        f(&mut self.inner.config.write());
    }

    /// Matrix collaborator
    #[inline]
    #[must_use]
    pub fn client(&self) -> &Arc<dyn MatrixClient> {
        &self.inner.client
    }

    /// Update notifier
    #[inline]
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Subscribe to identity updates
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityUpdate> {
        self.inner.notifier.subscribe()
    }

    /// Register a callback for updates scoped to `user_id`
    pub fn on_identity_updated<F>(&self, user_id: &str, callback: F) -> ListenerId
    where
        F: Fn(&IdentityUpdate) + Send + Sync + 'static,
    {
        self.inner.notifier.on_identity_updated(Some(user_id), callback)
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.cache.read();
        CacheStats {
            localparts: cache.localparts.len(),
            profiles: cache.profiles.len(),
            failures: self.inner.failures.entry_count(),
            pending: self.inner.pending.lock().len(),
        }
    }

    /// Snapshot of the whole cache document
    #[must_use]
    pub fn snapshot(&self) -> MergeCache {
        self.inner.cache.read().clone()
    }

    /// Feature flag: merge users by localpart
    #[inline]
    #[must_use]
    pub fn merge_by_localpart(&self) -> bool {
        self.inner.config.read().merge_users_by_localpart
    }

    /// Whether the account's host is configured for merging
    #[must_use]
    pub fn is_mergable(&self, user_id: &str) -> bool {
        is_mergable_with(&self.inner.config.read().mergable_hosts, user_id)
    }

    /// Cached relationship record for the account's localpart
    ///
    /// Cache-only; never triggers a lookup.
    #[must_use]
    pub fn cached_record(&self, user_id: &str) -> Option<LocalpartRecord> {
        let localpart = get_localpart(user_id);
        if localpart.is_empty() {
            return None;
        }
        self.inner.cache.read().localparts.get(localpart).cloned()
    }

    /// Discover the parent of `user_id`, updating the localpart cache
    ///
    /// Returns immediately (already settled) when merging does not apply.
    /// Outside a tokio runtime no lookup is started.
    pub fn track_user(&self, user_id: &str) -> TrackHandle {
        if user_id.is_empty() || !self.merge_by_localpart() || !self.is_mergable(user_id) {
            return settled();
        }
        let localpart = get_localpart(user_id);
        if localpart.is_empty() {
            return settled();
        }
        let Ok(runtime) = Handle::try_current() else {
            trace!(user_id, "no runtime; skipping identity lookup");
            return settled();
        };

        let mut pending = self.inner.pending.lock();
        if let Some(lookup) = pending.get(localpart) {
            trace!(user_id, localpart, "joining in-flight lookup");
            return lookup.handle.clone();
        }

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let handle = async move {
            if done_rx.await.is_err() {
                debug!("identity lookup ended before completing");
            }
        }
        .boxed()
        .shared();
        pending.insert(
            localpart.to_string(),
            PendingLookup {
                ticket,
                handle: handle.clone(),
            },
        );
        // A runtime that is shutting down drops the task in place, running
        // the guard's drop on this thread.
        drop(pending);

        let guard = PendingGuard {
            users: self.clone(),
            localpart: localpart.to_string(),
            ticket,
        };
        let user_id = user_id.to_string();
        runtime.spawn(async move {
            guard.users.lookup(&guard.localpart, &user_id).await;
            drop(guard);
            let _ = done_tx.send(());
        });
        handle
    }

    async fn lookup(&self, localpart: &str, user_id: &str) {
        if let Some(failed_at) = self.inner.failures.get(localpart).await {
            debug!(
                localpart,
                since_ms = u64::try_from(failed_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                "lookup suppressed by failure backoff"
            );
            return;
        }

        let known = {
            let mut cache = self.inner.cache.write();
            cache
                .localparts
                .get_mut(localpart)
                .map(|record| record.add_child(user_id))
        };
        match known {
            Some(true) => {
                debug!(localpart, user_id, "recorded new child account");
                self.persist();
                self.inner.notifier.emit(user_id);
                return;
            }
            Some(false) => return,
            None => {}
        }

        match self.linked_parent(localpart).await {
            Ok(Some(parent)) => {
                let record = LocalpartRecord::new(parent, user_id);
                info!(localpart, parent = %record.parent_user_id, "discovered linked accounts");
                // Last write wins if another session raced us to the profile room.
                self.inner
                    .cache
                    .write()
                    .localparts
                    .insert(localpart.to_string(), record);
                self.persist();
                self.inner.notifier.emit(user_id);
            }
            Ok(None) => debug!(localpart, "no linked accounts"),
            Err(ClientError::NoSession) => debug!(localpart, "no session; lookup skipped"),
            Err(e) => {
                warn!(localpart, error = %e, "linked accounts lookup failed");
                self.inner
                    .failures
                    .insert(localpart.to_string(), Instant::now())
                    .await;
            }
        }
    }

    /// Read the parent named by the localpart's profile room
    async fn linked_parent(&self, localpart: &str) -> Result<Option<String>, ClientError> {
        let client = &self.inner.client;
        let session = client.session().ok_or(ClientError::NoSession)?;
        let alias = profile_room_alias(localpart, &session.homeserver_domain);
        let room_id = client.resolve_alias(&alias).await?;

        let content = match client.peek_state(&room_id, LINKED_ACCOUNTS_EVENT, "").await {
            Ok(content) => content,
            Err(e) if e.is_forbidden() => {
                debug!(room_id = %room_id, "peek refused; joining profile room");
                client.join_room(&room_id).await?;
                client.room_state(&room_id, LINKED_ACCOUNTS_EVENT, "").await?
            }
            Err(e) => return Err(e),
        };

        let Some(content) = content else {
            return Ok(None);
        };
        let linked: LinkedAccounts = serde_json::from_value(content)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(linked.parent.filter(|p| !p.is_empty()))
    }

    pub(crate) fn write_cache<R>(&self, f: impl FnOnce(&mut MergeCache) -> R) -> R {
        let out = f(&mut self.inner.cache.write());
        self.persist();
        out
    }

    pub(crate) fn read_cache<R>(&self, f: impl FnOnce(&MergeCache) -> R) -> R {
        f(&self.inner.cache.read())
    }

    pub(crate) fn emit(&self, user_id: &str) {
        self.inner.notifier.emit(user_id);
    }

    fn persist(&self) {
        let key = self.inner.config.read().storage_key.clone();
        let cache = self.inner.cache.read();
        if let Err(e) = save_cache(self.inner.store.as_ref(), &key, &cache) {
            warn!(error = %e, "failed to persist merge cache");
        }
    }
}

impl std::fmt::Debug for MergedUsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedUsers")
            .field("stats", &self.stats())
            .field("notifier", &self.inner.notifier)
            .finish_non_exhaustive()
    }
}

/// Removes the in-flight entry when a lookup settles, panics or is dropped unrun
struct PendingGuard {
    users: MergedUsers,
    localpart: String,
    ticket: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.users.inner.pending.lock();
        if pending
            .get(&self.localpart)
            .is_some_and(|p| p.ticket == self.ticket)
        {
            pending.remove(&self.localpart);
        }
    }
}
