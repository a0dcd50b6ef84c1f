//! Merge configuration
//!
//! Sensible defaults, overridable from the environment or a TOML document.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// Default storage key for the persisted cache document
pub const DEFAULT_STORAGE_KEY: &str = "merged_users_cache";

/// Default cooldown after a failed linked-accounts lookup
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(15 * 60);

/// Identity merging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Host patterns eligible for merging (exact or trailing `*` wildcard)
    pub mergable_hosts: Vec<String>,
    /// Feature flag: merge users sharing a localpart
    pub merge_users_by_localpart: bool,
    /// How long a failed lookup suppresses retries for its localpart
    #[serde(with = "duration_secs")]
    pub failure_backoff: Duration,
    /// Key the cache document is stored under
    pub storage_key: String,
}

impl MergeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With mergable host patterns
    #[must_use]
    pub fn with_mergable_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mergable_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// With merge-by-localpart flag
    #[inline]
    #[must_use]
    pub fn with_merge_by_localpart(mut self, enabled: bool) -> Self {
        self.merge_users_by_localpart = enabled;
        self
    }

    /// With failure backoff window
    #[inline]
    #[must_use]
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// With storage key
    #[inline]
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Load from environment variables on top of defaults
    ///
    /// - `MU_MERGABLE_HOSTS`: comma separated host patterns
    /// - `MU_MERGE_BY_LOCALPART`: `true` or `1` to enable merging
    /// - `MU_FAILURE_BACKOFF_SECS`: backoff window in seconds
    /// - `MU_STORAGE_KEY`: storage key for the cache document
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(hosts) = env::var("MU_MERGABLE_HOSTS") {
            config.mergable_hosts = hosts
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("MU_MERGE_BY_LOCALPART") {
            config.merge_users_by_localpart = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = env::var("MU_FAILURE_BACKOFF_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.failure_backoff = Duration::from_secs(secs),
                Err(_) => warn!(value = %val, "ignoring invalid MU_FAILURE_BACKOFF_SECS"),
            }
        }

        if let Ok(key) = env::var("MU_STORAGE_KEY") {
            if key.trim().is_empty() {
                warn!("ignoring empty MU_STORAGE_KEY");
            } else {
                config.storage_key = key;
            }
        }

        config
    }

    /// Parse from a TOML document; missing fields take defaults
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` if the document is not valid TOML for this shape
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            mergable_hosts: Vec::new(),
            merge_users_by_localpart: false,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MergeConfig::default();
        assert!(config.mergable_hosts.is_empty());
        assert!(!config.merge_users_by_localpart);
        assert_eq!(config.failure_backoff, DEFAULT_FAILURE_BACKOFF);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn builder_methods() {
        let config = MergeConfig::new()
            .with_mergable_hosts(["example.org", "bridge.*"])
            .with_merge_by_localpart(true)
            .with_failure_backoff(Duration::from_secs(5))
            .with_storage_key("k");

        assert_eq!(config.mergable_hosts, vec!["example.org", "bridge.*"]);
        assert!(config.merge_users_by_localpart);
        assert_eq!(config.failure_backoff, Duration::from_secs(5));
        assert_eq!(config.storage_key, "k");
    }

    #[test]
    fn parses_toml() {
        let config = MergeConfig::from_toml_str(
            r#"
            mergable_hosts = ["example.org"]
            merge_users_by_localpart = true
            failure_backoff = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.mergable_hosts, vec!["example.org"]);
        assert!(config.merge_users_by_localpart);
        assert_eq!(config.failure_backoff, Duration::from_secs(60));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(MergeConfig::from_toml_str("mergable_hosts = 3").is_err());
    }
}
