//! ObjectStore trait definition
//!
//! This trait defines the object-store operations the synchronization engine
//! consumes. It keeps the engine decoupled from the S3 SDK so it can be driven
//! by the in-memory store in tests.

use std::fmt;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;

/// Bucket-level versioning configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersioningMode {
    Enabled,
    Suspended,
    Disabled,
    /// The mode could not be determined; enumerates like `Disabled`
    #[default]
    Unknown,
}

impl VersioningMode {
    /// Short label shown to users: ON, SUSPENDED, OFF or UNKNOWN
    pub const fn display_state(self) -> &'static str {
        match self {
            VersioningMode::Enabled => "ON",
            VersioningMode::Suspended => "SUSPENDED",
            VersioningMode::Disabled => "OFF",
            VersioningMode::Unknown => "UNKNOWN",
        }
    }

    /// Whether enumeration should list every stored version
    pub const fn lists_versions(self) -> bool {
        matches!(self, VersioningMode::Enabled)
    }
}

impl fmt::Display for VersioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_state())
    }
}

/// An object (or one version of it) under a project prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Full object key, including the project prefix
    pub key: String,

    /// Version id, only set by version-aware enumeration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Size in bytes, when the listing reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

impl RemoteObject {
    /// Create a current (unversioned) object entry
    pub fn current(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
            last_modified: None,
            size_bytes: None,
        }
    }

    /// Create an entry pinned to one version
    pub fn version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
            last_modified: None,
            size_bytes: None,
        }
    }
}

/// One raw entry of a listing page, as reported by the store
///
/// The key is optional because the protocol allows entries without one.
#[derive(Debug, Clone, Default)]
pub struct ListedObject {
    pub key: Option<String>,
    pub version_id: Option<String>,
    pub last_modified: Option<Timestamp>,
    pub size_bytes: Option<i64>,
}

impl ListedObject {
    /// Entry for a key, with no version information
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Convert to a [`RemoteObject`], dropping entries without a usable key
    ///
    /// The version id is kept only for version-aware listings.
    pub fn into_remote(self, versioned: bool) -> Option<RemoteObject> {
        let key = self.key.filter(|k| !k.is_empty())?;
        Some(RemoteObject {
            key,
            version_id: if versioned { self.version_id } else { None },
            last_modified: self.last_modified,
            size_bytes: self.size_bytes,
        })
    }
}

/// Position to resume a version listing from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: String,
    pub version_id_marker: Option<String>,
}

/// One page of a listing
///
/// `next` is the marker for the following page, `None` when exhausted.
#[derive(Debug, Clone)]
pub struct ListPage<M> {
    pub entries: Vec<ListedObject>,
    pub next: Option<M>,
}

/// Streamed object payload
pub struct ObjectBody {
    /// Length announced by the store, if any
    pub content_length: Option<u64>,

    /// Payload bytes
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl ObjectBody {
    pub fn new(reader: impl AsyncRead + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            content_length,
            reader: Box::pin(reader),
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for the object-store operations used by the sync engine
///
/// This trait is implemented by the S3 adapter and by the in-memory test store.
/// Transport-level retries are the implementation's concern.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Query the bucket's versioning configuration
    async fn get_versioning(&self, bucket: &str) -> Result<VersioningMode>;

    /// List one page of current objects under `prefix`
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage<String>>;

    /// List one page of object versions under `prefix`
    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> Result<ListPage<VersionMarker>>;

    /// Fetch an object, optionally pinned to a version
    ///
    /// Returns `Ok(None)` when the response carries no body.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>>;

    /// Stream the file at `source` (of `size` bytes) to `key`
    ///
    /// `progress` receives the cumulative number of bytes sent.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()>;

    /// Make `version_id` the current content of `key` by server-side copy
    async fn copy_object_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<()>;
}
