//! Relationship queries over the localpart cache
//!
//! `is_child` and friends answer from the current cache and kick off a
//! background [`track_user`](MergedUsers::track_user) refresh without
//! awaiting it. The `*_cached` variants never trigger a refresh.

use crate::identity::same_localpart;
use crate::merged::MergedUsers;

impl MergedUsers {
    /// Whether `user_id` is a known child of another account
    ///
    /// Reads the current cache and triggers a background refresh.
    #[must_use]
    pub fn is_child(&self, user_id: &str) -> bool {
        if !self.is_mergable(user_id) {
            return false;
        }
        drop(self.track_user(user_id));
        self.is_child_cached(user_id)
    }

    /// Cache-only variant of [`is_child`](Self::is_child)
    #[must_use]
    pub fn is_child_cached(&self, user_id: &str) -> bool {
        self.is_mergable(user_id)
            && self
                .cached_record(user_id)
                .is_some_and(|r| r.parent_user_id != user_id)
    }

    /// Inverse of [`is_child`](Self::is_child)
    #[inline]
    #[must_use]
    pub fn is_parent(&self, user_id: &str) -> bool {
        !self.is_child(user_id)
    }

    /// Whether `user_id` shares a localpart with any of the candidates
    ///
    /// Purely localpart based; the cache is not consulted.
    #[must_use]
    pub fn is_child_of<S: AsRef<str>>(&self, user_id: &str, candidate_parents: &[S]) -> bool {
        candidate_parents
            .iter()
            .any(|p| same_localpart(user_id, p.as_ref()))
    }

    /// Whether `user_id` is the local user or one of its linked accounts
    #[must_use]
    pub fn is_self(&self, user_id: &str) -> bool {
        let Some(session) = self.client().session() else {
            return false;
        };
        if !self.is_mergable(user_id) {
            return user_id == session.user_id;
        }
        self.is_child_of(user_id, &[session.user_id.as_str()])
    }

    /// Known children of a parent; empty for children and unknown accounts
    ///
    /// Triggers a background refresh like [`is_child`](Self::is_child).
    #[must_use]
    pub fn get_children(&self, user_id: &str) -> Vec<String> {
        if !self.is_parent(user_id) {
            return Vec::new();
        }
        self.children_cached(user_id)
    }

    /// Cache-only variant of [`get_children`](Self::get_children)
    #[must_use]
    pub fn children_cached(&self, user_id: &str) -> Vec<String> {
        if !self.is_mergable(user_id) || self.is_child_cached(user_id) {
            return Vec::new();
        }
        self.cached_record(user_id)
            .map(|r| r.children_user_ids)
            .unwrap_or_default()
    }

    /// Parent of `user_id`, or `user_id` itself when none is known
    #[must_use]
    pub fn get_parent(&self, user_id: &str) -> String {
        self.cached_parent(user_id)
            .unwrap_or_else(|| user_id.to_string())
    }

    /// Cached parent of a mergable account
    #[must_use]
    pub fn cached_parent(&self, user_id: &str) -> Option<String> {
        if !self.is_mergable(user_id) {
            return None;
        }
        self.cached_record(user_id).map(|r| r.parent_user_id)
    }

    /// Collapse `(account, payload)` pairs to one payload per logical identity
    ///
    /// Parents are kept in input order (along with id-less entries when
    /// `include_results_with_no_id` is set). Accounts whose localpart matches
    /// none of those parents are appended afterwards, so a child whose parent
    /// is absent from the list still shows up.
    pub fn get_effective_parents<T>(
        &self,
        tuples: Vec<(Option<String>, T)>,
        include_results_with_no_id: bool,
    ) -> Vec<T> {
        let mut order = Vec::with_capacity(tuples.len());
        let mut parents: Vec<&str> = Vec::new();

        for (idx, (user_id, _)) in tuples.iter().enumerate() {
            match user_id.as_deref().filter(|u| !u.is_empty()) {
                Some(uid) => {
                    if self.is_parent(uid) {
                        parents.push(uid);
                        order.push(idx);
                    }
                }
                None => {
                    if include_results_with_no_id {
                        order.push(idx);
                    }
                }
            }
        }

        for (idx, (user_id, _)) in tuples.iter().enumerate() {
            let Some(uid) = user_id.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            if !self.is_child_of(uid, &parents) {
                order.push(idx);
            }
        }

        let mut slots: Vec<Option<T>> = tuples.into_iter().map(|(_, payload)| Some(payload)).collect();
        order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}
