//! Whole-project synchronization
//!
//! Uploads and downloads run one item at a time in walk or listing order. The
//! first failing item aborts the rest of the operation; items already
//! transferred stay transferred, and re-running the operation is safe.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;

use crate::enumerate::ObjectEnumerator;
use crate::error::{Error, Result, TransferPhase};
use crate::path::{
    ProjectNamespace, local_path_for, relative_key_path, to_local_relative_path, to_remote_key,
};
use crate::progress::{ItemEvent, ItemOutcome, NoProgress, ProgressSink};
use crate::traits::{ObjectStore, RemoteObject, VersioningMode};
use crate::transfer::{DownloadOutcome, TransferEngine};
use crate::versioning::VersioningResolver;
use crate::walk::walk;

/// Direction of a project sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Upload => f.write_str("upload"),
            SyncDirection::Download => f.write_str("download"),
        }
    }
}

/// Outcome of a completed project sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub project: String,
    pub direction: SyncDirection,
    /// Items whose bytes were copied
    pub transferred: usize,
    /// Downloads that had no body to copy
    pub skipped: usize,
    pub bytes: u64,
    /// Bucket versioning seen by a download; uploads leave it to the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning: Option<VersioningMode>,
}

impl SyncSummary {
    fn new(project: &ProjectNamespace, direction: SyncDirection) -> Self {
        Self {
            project: project.name().to_string(),
            direction,
            transferred: 0,
            skipped: 0,
            bytes: 0,
            versioning: None,
        }
    }
}

/// Remote contents of one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectListing {
    pub project: String,
    pub versioning: VersioningMode,
    pub objects: Vec<RemoteObject>,
}

/// Drives project-level uploads, downloads and restores against one bucket
///
/// The store client is passed in and owned for the orchestrator's lifetime;
/// every operation resolves versioning afresh.
pub struct SyncOrchestrator {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    progress: Arc<dyn ProgressSink>,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Send progress and per-item events to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn engine(&self) -> TransferEngine<'_> {
        TransferEngine::new(self.store.as_ref(), &self.bucket, self.progress.as_ref())
    }

    /// Upload every file under `local_root` to `<project>/…`
    pub async fn upload_project(
        &self,
        project: &ProjectNamespace,
        local_root: &Path,
    ) -> Result<SyncSummary> {
        ensure_directory(local_root).await?;

        let engine = self.engine();
        let mut summary = SyncSummary::new(project, SyncDirection::Upload);
        let mut files = walk(local_root);

        while let Some(file) = files.try_next().await? {
            let relative = relative_key_path(local_root, &file.absolute_path)?;
            let key = to_remote_key(project.name(), &relative);

            let bytes = engine.upload(&file.absolute_path, &key).await?;
            summary.transferred += 1;
            summary.bytes += bytes;

            self.progress.on_item(&ItemEvent {
                phase: TransferPhase::Upload,
                key,
                local_path: file.absolute_path,
                version_id: None,
                outcome: ItemOutcome::Transferred { bytes },
            });
        }

        tracing::info!(
            project = project.name(),
            bucket = %self.bucket,
            files = summary.transferred,
            bytes = summary.bytes,
            "Upload complete"
        );
        Ok(summary)
    }

    /// Download every object under `<project>/` into `local_root`
    ///
    /// With versioning enabled every stored version is fetched in listing
    /// order, each pinned by its version id and written to the same path.
    pub async fn download_project(
        &self,
        project: &ProjectNamespace,
        local_root: &Path,
    ) -> Result<SyncSummary> {
        let resolver = VersioningResolver::new(self.store.as_ref(), &self.bucket);
        let mode = resolver.resolve().await;
        let enumerator = ObjectEnumerator::new(self.store.as_ref(), &resolver);

        let engine = self.engine();
        let mut summary = SyncSummary::new(project, SyncDirection::Download);
        summary.versioning = Some(mode);

        let mut objects = enumerator.enumerate(&project.prefix()).await;
        while let Some(object) = objects.try_next().await? {
            let relative = to_local_relative_path(project.name(), &object.key)?;
            let local_path = local_path_for(local_root, project.name(), &relative)?;

            let outcome = match engine
                .download(&object.key, object.version_id.as_deref(), &local_path)
                .await?
            {
                DownloadOutcome::Written { bytes } => {
                    summary.transferred += 1;
                    summary.bytes += bytes;
                    ItemOutcome::Transferred { bytes }
                }
                DownloadOutcome::NoBody => {
                    summary.skipped += 1;
                    ItemOutcome::NoBody
                }
            };

            self.progress.on_item(&ItemEvent {
                phase: TransferPhase::Download,
                key: object.key,
                local_path,
                version_id: object.version_id,
                outcome,
            });
        }

        tracing::info!(
            project = project.name(),
            bucket = %self.bucket,
            versioning = %mode,
            objects = summary.transferred,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Download complete"
        );
        Ok(summary)
    }

    /// Everything stored under `<project>/`, every version when enabled
    pub async fn list_project(&self, project: &ProjectNamespace) -> Result<ProjectListing> {
        let resolver = VersioningResolver::new(self.store.as_ref(), &self.bucket);
        let versioning = resolver.resolve().await;
        let enumerator = ObjectEnumerator::new(self.store.as_ref(), &resolver);

        let objects = enumerator
            .enumerate(&project.prefix())
            .await
            .try_collect()
            .await?;

        Ok(ProjectListing {
            project: project.name().to_string(),
            versioning,
            objects,
        })
    }

    /// Make `version_id` of `<project>/<relative_path>` current again
    ///
    /// Returns the restored key.
    pub async fn restore_version(
        &self,
        project: &ProjectNamespace,
        relative_path: &str,
        version_id: &str,
    ) -> Result<String> {
        if version_id.is_empty() {
            return Err(Error::General("Version id cannot be empty".into()));
        }
        let relative = relative_path.trim_start_matches(['/', '\\']);
        if relative.is_empty() {
            return Err(Error::InvalidPath("Path to restore cannot be empty".into()));
        }

        let key = to_remote_key(project.name(), relative);
        self.engine().restore(&key, version_id).await?;

        tracing::info!(key = %key, version_id, "Version restored");
        Ok(key)
    }

    /// Freshly resolved versioning mode of the bucket
    pub async fn versioning_state(&self) -> VersioningMode {
        VersioningResolver::new(self.store.as_ref(), &self.bucket)
            .resolve()
            .await
    }
}

async fn ensure_directory(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::InvalidPath(format!(
            "{} is not a directory",
            path.display()
        ))),
        Err(e) => Err(Error::InvalidPath(format!("{}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::TempDir;

    fn orchestrator(store: &Arc<MemoryStore>) -> SyncOrchestrator {
        SyncOrchestrator::new(store.clone(), "bucket")
    }

    #[tokio::test]
    async fn test_upload_summary_counts_bytes() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "aaaa").unwrap();
        std::fs::write(temp.path().join("b.txt"), "bb").unwrap();

        let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
        let project = ProjectNamespace::new("proj").unwrap();
        let summary = orchestrator(&store)
            .upload_project(&project, temp.path())
            .await
            .unwrap();

        assert_eq!(summary.transferred, 2);
        assert_eq!(summary.bytes, 6);
        assert_eq!(summary.direction, SyncDirection::Upload);
        assert_eq!(summary.versioning, None);
        assert_eq!(store.versioning_queries(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
        let project = ProjectNamespace::new("proj").unwrap();
        let err = orchestrator(&store)
            .upload_project(&project, &file)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_download_counts_bodyless_objects_as_skipped() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new(VersioningMode::Suspended));
        store.insert("proj/a.txt", "abc");
        store.insert("proj/dir/", "");
        store.insert_without_body("proj/empty.txt");

        let project = ProjectNamespace::new("proj").unwrap();
        let summary = orchestrator(&store)
            .download_project(&project, temp.path())
            .await
            .unwrap();

        assert_eq!(summary.transferred, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.bytes, 3);
        assert_eq!(summary.versioning, Some(VersioningMode::Suspended));
        assert!(!temp.path().join("empty.txt").exists());
    }

    #[tokio::test]
    async fn test_list_project_reports_versions() {
        let store = Arc::new(MemoryStore::new(VersioningMode::Enabled));
        store.insert("proj/a.txt", "1");
        store.insert("proj/a.txt", "2");
        store.insert("other/a.txt", "x");

        let project = ProjectNamespace::new("proj").unwrap();
        let listing = orchestrator(&store).list_project(&project).await.unwrap();

        assert_eq!(listing.versioning, VersioningMode::Enabled);
        assert_eq!(listing.objects.len(), 2);
        assert!(listing.objects.iter().all(|o| o.version_id.is_some()));
    }

    #[tokio::test]
    async fn test_restore_version() {
        let store = Arc::new(MemoryStore::new(VersioningMode::Enabled));
        let first = store.insert("proj/docs/a.txt", "first");
        store.insert("proj/docs/a.txt", "second");

        let project = ProjectNamespace::new("proj").unwrap();
        let key = orchestrator(&store)
            .restore_version(&project, "docs\\a.txt", &first)
            .await
            .unwrap();

        assert_eq!(key, "proj/docs/a.txt");
        assert_eq!(store.current("proj/docs/a.txt").unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_restore_unknown_version_fails() {
        let store = Arc::new(MemoryStore::new(VersioningMode::Enabled));
        store.insert("proj/a.txt", "x");

        let project = ProjectNamespace::new("proj").unwrap();
        let err = orchestrator(&store)
            .restore_version(&project, "a.txt", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.failed_key(), Some("proj/a.txt"));
        assert_eq!(err.exit_code(), 6);
    }

    #[tokio::test]
    async fn test_versioning_state_is_resolved_per_call() {
        let store = Arc::new(MemoryStore::new(VersioningMode::Enabled).with_failing_versioning());
        let sync = orchestrator(&store);

        assert_eq!(sync.versioning_state().await, VersioningMode::Unknown);
        assert_eq!(sync.versioning_state().await.display_state(), "UNKNOWN");
        assert_eq!(store.versioning_queries(), 2);
    }
}
