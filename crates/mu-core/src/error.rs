//! Error types for Merged Users
//!
//! Provides error handling for:
//! - Matrix collaborator calls (alias resolution, peeking, profiles)
//! - Persistent cache storage
//! - Configuration parsing
//! - Profile resolution surfaced to callers

use std::path::PathBuf;

/// Errors reported by the Matrix collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// No logged-in session is available
    #[error("no active session")]
    NoSession,

    /// Requested room, alias or event does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Server refused the request (e.g. peeking is not allowed)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Transport level failure
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Check if the error means peeking was refused and joining may work
    #[inline]
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Persistent storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error on the backing file
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory the operation touched
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Cache document could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored document is malformed
    #[error("corrupt cache document: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML document could not be parsed
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors surfaced by profile resolution
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The final global profile lookup failed
    #[error("profile lookup failed for {user_id}: {source}")]
    ProfileLookup {
        /// Account whose profile was requested
        user_id: String,
        /// Collaborator failure
        #[source]
        source: ClientError,
    },
}

impl MergeError {
    /// Check if retrying the call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        let Self::ProfileLookup { source, .. } = self;
        matches!(source, ClientError::Network(_) | ClientError::NoSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_detection() {
        assert!(ClientError::Forbidden("peek".into()).is_forbidden());
        assert!(!ClientError::NotFound("#a:b".into()).is_forbidden());
    }

    #[test]
    fn retryable_errors() {
        let err = MergeError::ProfileLookup {
            user_id: "@a:b".into(),
            source: ClientError::Network("timeout".into()),
        };
        assert!(err.is_retryable());

        let err = MergeError::ProfileLookup {
            user_id: "@a:b".into(),
            source: ClientError::NotFound("@a:b".into()),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn io_error_names_path() {
        let err = StoreError::io_error(
            "/tmp/cache/merged_users_cache.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, StoreError::Io { ref path, .. } if path.ends_with("merged_users_cache.json")));
        assert_eq!(
            err.to_string(),
            "io error on /tmp/cache/merged_users_cache.json: denied"
        );
    }

    #[test]
    fn error_messages() {
        let err = MergeError::ProfileLookup {
            user_id: "@a:b".into(),
            source: ClientError::NotFound("@a:b".into()),
        };
        assert_eq!(
            err.to_string(),
            "profile lookup failed for @a:b: not found: @a:b"
        );
    }
}
