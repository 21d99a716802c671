//! In-memory object store
//!
//! Keeps current objects and their version history for a single bucket,
//! paginates listings and records every put and get so tests can assert on
//! exactly which requests the engine issued.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::traits::{ListPage, ListedObject, ObjectBody, ObjectStore, VersionMarker, VersioningMode};

/// Version id S3 reports for objects written while versioning was off
pub const NULL_VERSION_ID: &str = "null";

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    body: Option<Vec<u8>>,
    last_modified: Timestamp,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// `None` makes versioning queries fail
    mode: Option<VersioningMode>,
    /// Versions per key, oldest first
    objects: BTreeMap<String, Vec<StoredVersion>>,
    next_version: u64,
    failing_puts: HashSet<String>,
    puts: Vec<String>,
    gets: Vec<(String, Option<String>)>,
    versioning_queries: usize,
}

impl MemoryState {
    fn store(&mut self, key: &str, body: Option<Vec<u8>>) -> String {
        let versioned = self.mode == Some(VersioningMode::Enabled);
        let version_id = if versioned {
            self.next_version += 1;
            format!("v{}", self.next_version)
        } else {
            NULL_VERSION_ID.to_string()
        };

        let entry = StoredVersion {
            version_id: version_id.clone(),
            body,
            last_modified: Timestamp::now(),
        };
        let history = self.objects.entry(key.to_string()).or_default();
        if !versioned {
            history.retain(|v| v.version_id != NULL_VERSION_ID);
        }
        history.push(entry);
        version_id
    }
}

/// Object store held entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    page_size: usize,
}

impl MemoryStore {
    /// Create an empty store reporting `mode` for versioning queries
    pub fn new(mode: VersioningMode) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                mode: Some(mode),
                ..Default::default()
            }),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit listing pages to `page_size` entries
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every versioning query fail
    pub fn with_failing_versioning(self) -> Self {
        self.state().mode = None;
        self
    }

    /// Make puts to `key` fail with a network error
    pub fn fail_put(&self, key: impl Into<String>) {
        self.state().failing_puts.insert(key.into());
    }

    /// Store `body` under `key`, returning the new version id
    pub fn insert(&self, key: &str, body: impl Into<Vec<u8>>) -> String {
        self.state().store(key, Some(body.into()))
    }

    /// Store an object whose reads return no body
    pub fn insert_without_body(&self, key: &str) -> String {
        self.state().store(key, None)
    }

    /// Current content of `key`
    pub fn current(&self, key: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(key)
            .and_then(|h| h.last())
            .and_then(|v| v.body.clone())
    }

    /// Version ids stored for `key`, oldest first
    pub fn version_ids(&self, key: &str) -> Vec<String> {
        self.state()
            .objects
            .get(key)
            .map(|h| h.iter().map(|v| v.version_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Keys passed to `put_object`, in call order
    pub fn puts(&self) -> Vec<String> {
        self.state().puts.clone()
    }

    /// `(key, version_id)` pairs passed to `get_object`, in call order
    pub fn gets(&self) -> Vec<(String, Option<String>)> {
        self.state().gets.clone()
    }

    /// Number of versioning queries received
    pub fn versioning_queries(&self) -> usize {
        self.state().versioning_queries
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_versioning(&self, _bucket: &str) -> Result<VersioningMode> {
        let mut state = self.state();
        state.versioning_queries += 1;
        state
            .mode
            .ok_or_else(|| Error::Network("GetBucketVersioning: access denied".into()))
    }

    async fn list_objects(
        &self,
        _bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage<String>> {
        let state = self.state();
        let mut entries = Vec::new();
        let mut last_key = None;

        let candidates = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.as_deref().is_none_or(|after| key.as_str() > after));

        for (key, history) in candidates {
            let Some(latest) = history.last() else {
                continue;
            };
            if entries.len() == self.page_size {
                return Ok(ListPage {
                    entries,
                    next: last_key,
                });
            }
            entries.push(ListedObject {
                last_modified: Some(latest.last_modified),
                size_bytes: latest.body.as_ref().map(|b| b.len() as i64),
                ..ListedObject::new(key.clone())
            });
            last_key = Some(key.clone());
        }

        Ok(ListPage {
            entries,
            next: None,
        })
    }

    async fn list_object_versions(
        &self,
        _bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> Result<ListPage<VersionMarker>> {
        let state = self.state();

        // Newest version first within each key, like S3
        let all: Vec<(&String, &StoredVersion)> = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(key, history)| history.iter().rev().map(move |v| (key, v)))
            .collect();

        let start = match &marker {
            None => 0,
            Some(m) => all
                .iter()
                .position(|(key, v)| {
                    **key == m.key_marker
                        && m.version_id_marker.as_deref() == Some(v.version_id.as_str())
                })
                .map(|i| i + 1)
                .ok_or_else(|| Error::Network(format!("stale version marker: {m:?}")))?,
        };

        let page: Vec<_> = all.iter().skip(start).take(self.page_size).collect();
        let next = if start + page.len() < all.len() {
            page.last().map(|(key, v)| VersionMarker {
                key_marker: (*key).clone(),
                version_id_marker: Some(v.version_id.clone()),
            })
        } else {
            None
        };

        let entries = page
            .iter()
            .map(|(key, v)| ListedObject {
                version_id: Some(v.version_id.clone()),
                last_modified: Some(v.last_modified),
                size_bytes: v.body.as_ref().map(|b| b.len() as i64),
                ..ListedObject::new((*key).clone())
            })
            .collect();

        Ok(ListPage { entries, next })
    }

    async fn get_object(
        &self,
        _bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>> {
        let mut state = self.state();
        state
            .gets
            .push((key.to_string(), version_id.map(str::to_string)));

        let history = state
            .objects
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        let version = match version_id {
            Some(id) => history.iter().find(|v| v.version_id == id),
            None => history.last(),
        }
        .ok_or_else(|| Error::NotFound(format!("{key}?versionId={}", version_id.unwrap_or(""))))?;

        Ok(version.body.clone().map(|bytes| {
            let len = bytes.len() as u64;
            ObjectBody::new(std::io::Cursor::new(bytes), Some(len))
        }))
    }

    async fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        {
            let mut state = self.state();
            state.puts.push(key.to_string());
            if state.failing_puts.contains(key) {
                return Err(Error::Network(format!("PutObject {key}: connection reset")));
            }
        }

        let bytes = tokio::fs::read(source).await?;
        progress(size / 2);
        progress(bytes.len() as u64);
        self.state().store(key, Some(bytes));
        Ok(())
    }

    async fn copy_object_version(&self, _bucket: &str, key: &str, version_id: &str) -> Result<()> {
        let mut state = self.state();
        let body = state
            .objects
            .get(key)
            .and_then(|h| h.iter().find(|v| v.version_id == version_id))
            .map(|v| v.body.clone())
            .ok_or_else(|| Error::NotFound(format!("{key}?versionId={version_id}")))?;
        state.store(key, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_accumulate_when_enabled() {
        let store = MemoryStore::new(VersioningMode::Enabled);
        store.insert("p/a.txt", "one");
        store.insert("p/a.txt", "two");
        assert_eq!(store.version_ids("p/a.txt"), vec!["v1", "v2"]);
        assert_eq!(store.current("p/a.txt").unwrap(), b"two");
    }

    #[test]
    fn test_overwrite_when_disabled() {
        let store = MemoryStore::new(VersioningMode::Disabled);
        store.insert("p/a.txt", "one");
        store.insert("p/a.txt", "two");
        assert_eq!(store.version_ids("p/a.txt"), vec![NULL_VERSION_ID]);
        assert_eq!(store.current("p/a.txt").unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_flat_listing_pages() {
        let store = MemoryStore::new(VersioningMode::Disabled).with_page_size(2);
        for key in ["p/a", "p/b", "p/c", "q/d"] {
            store.insert(key, "x");
        }

        let first = store.list_objects("b", "p/", None).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.next.as_deref(), Some("p/b"));

        let second = store.list_objects("b", "p/", first.next).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].key.as_deref(), Some("p/c"));
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_failing_versioning() {
        let store = MemoryStore::new(VersioningMode::Enabled).with_failing_versioning();
        assert!(store.get_versioning("b").await.is_err());
        assert_eq!(store.versioning_queries(), 1);
    }
}
