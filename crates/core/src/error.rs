//! Error types for bsync-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Versioning query failures never appear here as a surfaced error: the resolver
//! absorbs them into `VersioningMode::Unknown`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for bsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which leg of a transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Upload,
    Download,
    Restore,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferPhase::Upload => "upload",
            TransferPhase::Download => "download",
            TransferPhase::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Error types for bsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (credentials, bucket, endpoint)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid local path or project name
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A remote key does not belong to the expected project namespace
    #[error("Key '{key}' is outside project namespace '{namespace}/'")]
    Mapping { namespace: String, key: String },

    /// A single object's upload, download or restore failed
    #[error("{phase} failed for '{key}': {message}")]
    Transfer {
        phase: TransferPhase,
        key: String,
        message: String,
    },

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or protocol error
    #[error("Network error: {0}")]
    Network(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build a transfer error for `key`, keeping the cause's message
    pub fn transfer(phase: TransferPhase, key: impl Into<String>, cause: impl fmt::Display) -> Self {
        Error::Transfer {
            phase,
            key: key.into(),
            message: cause.to_string(),
        }
    }

    /// Key of the item that failed, if the error is tied to one
    pub fn failed_key(&self) -> Option<&str> {
        match self {
            Error::Transfer { key, .. } | Error::Mapping { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) => 2, // UsageError
            Error::Network(_) => 3,                        // NetworkError
            Error::Auth(_) => 4,                           // AuthError
            Error::NotFound(_) | Error::ProfileNotFound(_) => 5, // NotFound
            Error::Transfer { .. } | Error::Mapping { .. } => 6, // TransferFailed
            _ => 1,                                        // GeneralError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidPath("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::Network("test".into()).exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::ProfileNotFound("test".into()).exit_code(), 5);
        assert_eq!(
            Error::transfer(TransferPhase::Upload, "p/a.txt", "boom").exit_code(),
            6
        );
        assert_eq!(
            Error::Mapping {
                namespace: "p".into(),
                key: "q/a.txt".into()
            }
            .exit_code(),
            6
        );
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::ProfileNotFound("yc".into());
        assert_eq!(err.to_string(), "Profile not found: yc");

        let err = Error::transfer(TransferPhase::Download, "proj/x.txt", "connection reset");
        assert_eq!(
            err.to_string(),
            "download failed for 'proj/x.txt': connection reset"
        );

        let err = Error::Mapping {
            namespace: "proj".into(),
            key: "other/x.txt".into(),
        };
        assert_eq!(
            err.to_string(),
            "Key 'other/x.txt' is outside project namespace 'proj/'"
        );
    }

    #[test]
    fn test_failed_key() {
        let err = Error::transfer(TransferPhase::Upload, "proj/c.txt", "denied");
        assert_eq!(err.failed_key(), Some("proj/c.txt"));
        assert_eq!(Error::Network("x".into()).failed_key(), None);
    }
}
