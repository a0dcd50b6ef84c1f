//! Merged Users Core
//!
//! Treats several Matrix accounts sharing a localpart across homeservers as
//! one logical identity: a *parent* account plus any number of *children*.
//!
//! # Core Operations
//!
//! - **Track**: discover an account's parent from its profile room
//! - **Relate**: answer child/parent/self questions from the cache
//! - **Collapse**: reduce member lists to one entry per logical identity
//! - **Resolve**: cached, per-room profile lookup for parent accounts
//!
//! # Architecture
//!
//! ```text
//! MatrixClient ──▶ track_user ──▶ MergeCache { localparts, profiles } ──▶ CacheStore
//!                      │                 │
//!                 failure backoff    Notifier (IdentityUpdate)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mu_core::{MergeConfig, MergedUsers, MemoryStore};
//!
//! # async fn example(client: std::sync::Arc<dyn mu_core::MatrixClient>) {
//! let config = MergeConfig::new()
//!     .with_mergable_hosts(["example.org", "bridge.*"])
//!     .with_merge_by_localpart(true);
//! let users = MergedUsers::new(client, std::sync::Arc::new(MemoryStore::new()), config);
//! users.init();
//!
//! users.track_user("@alice:bridge.example.net").await;
//! let parent = users.get_parent("@alice:bridge.example.net");
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod merged;
pub mod profile;
pub mod relations;
pub mod room;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use client::{MatrixClient, Session, LINKED_ACCOUNTS_EVENT, ROOM_MEMBER_EVENT};
pub use config::MergeConfig;
pub use error::{ClientError, ConfigError, MergeError, StoreError};
pub use events::{IdentityUpdate, ListenerId, Notifier};
pub use identity::{get_localpart, is_mergable_with};
pub use merged::{MergedUsers, TrackHandle};
pub use room::{Membership, Room, RoomMember};
pub use store::{CacheStore, JsonFileStore, MemoryStore};
pub use types::{CacheStats, CachedProfile, LocalpartRecord, MergeCache, ProfileInfo, ProfileRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with merged identities
    pub use crate::{
        CachedProfile, MatrixClient, MergeConfig, MergedUsers, Membership, ProfileInfo, Room,
        RoomMember, Session,
    };
}
