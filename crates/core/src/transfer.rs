//! Single-object transfers
//!
//! Uploads stream a local file to a key. Downloads stream an object (the live
//! one, or a pinned version) into a temporary file next to the target and
//! rename it into place once every byte has arrived.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result, TransferPhase};
use crate::path::KEY_SEPARATOR;
use crate::progress::{ProgressSink, TransferProgress};
use crate::traits::{ObjectBody, ObjectStore};

/// Chunk size used when copying a download to disk
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix of the temporary file a download is written to
pub const PARTIAL_SUFFIX: &str = ".bsync-part";

/// Result of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The body was written to the target path
    Written { bytes: u64 },
    /// No body to copy; nothing was written
    NoBody,
}

/// Moves bytes for one object at a time between disk and the store
pub struct TransferEngine<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    progress: &'a dyn ProgressSink,
}

impl<'a> TransferEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str, progress: &'a dyn ProgressSink) -> Self {
        Self {
            store,
            bucket,
            progress,
        }
    }

    /// Upload `local_path` to `key`, overwriting (or adding a version to) it
    ///
    /// The local file is only read. Returns the number of bytes sent.
    pub async fn upload(&self, local_path: &Path, key: &str) -> Result<u64> {
        let fail = |e: Error| Error::transfer(TransferPhase::Upload, key, e);

        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| fail(e.into()))?
            .len();

        self.progress.on_start(key, Some(size));
        let report = |bytes_loaded: u64| {
            self.progress.on_progress(&TransferProgress {
                item_key: key.to_string(),
                bytes_loaded,
                bytes_total: Some(size),
            });
        };

        self.store
            .put_object(self.bucket, key, local_path, size, &report)
            .await
            .map_err(fail)?;

        report(size);
        tracing::debug!(key, bytes = size, "Uploaded");
        Ok(size)
    }

    /// Download `key` (pinned to `version_id` if given) to `local_path`
    ///
    /// Missing parent directories are created. An existing file at
    /// `local_path` is replaced. Directory-marker keys and responses without a
    /// body leave the filesystem untouched.
    pub async fn download(
        &self,
        key: &str,
        version_id: Option<&str>,
        local_path: &Path,
    ) -> Result<DownloadOutcome> {
        let fail = |e: Error| Error::transfer(TransferPhase::Download, key, e);

        if key.ends_with(KEY_SEPARATOR) {
            tracing::debug!(key, "Skipping directory marker");
            return Ok(DownloadOutcome::NoBody);
        }

        let Some(body) = self
            .store
            .get_object(self.bucket, key, version_id)
            .await
            .map_err(fail)?
        else {
            tracing::warn!(key, "Object has no body, nothing to download");
            return Ok(DownloadOutcome::NoBody);
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fail(e.into()))?;
        }

        let partial = partial_path(local_path).map_err(fail)?;
        let bytes = match self.write_body(key, body, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Best effort; the original error is what matters
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(fail(e));
            }
        };

        tokio::fs::rename(&partial, local_path)
            .await
            .map_err(|e| fail(e.into()))?;

        tracing::debug!(key, version_id, bytes, path = %local_path.display(), "Downloaded");
        Ok(DownloadOutcome::Written { bytes })
    }

    /// Make `version_id` the current content of `key`
    pub async fn restore(&self, key: &str, version_id: &str) -> Result<()> {
        self.store
            .copy_object_version(self.bucket, key, version_id)
            .await
            .map_err(|e| Error::transfer(TransferPhase::Restore, key, e))?;
        tracing::debug!(key, version_id, "Restored version");
        Ok(())
    }

    async fn write_body(&self, key: &str, body: ObjectBody, path: &Path) -> Result<u64> {
        let ObjectBody {
            content_length,
            mut reader,
        } = body;

        self.progress.on_start(key, content_length);

        let mut file = tokio::fs::File::create(path).await?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut loaded = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            loaded += n as u64;
            self.progress.on_progress(&TransferProgress {
                item_key: key.to_string(),
                bytes_loaded: loaded,
                bytes_total: content_length,
            });
        }
        file.flush().await?;

        if let Some(expected) = content_length
            && expected != loaded
        {
            return Err(Error::Network(format!(
                "body ended after {loaded} of {expected} bytes"
            )));
        }

        Ok(loaded)
    }
}

/// Temporary sibling path a download is written to before the rename
fn partial_path(target: &Path) -> Result<PathBuf> {
    let name = target.file_name().ok_or_else(|| {
        Error::InvalidPath(format!("{} has no file name", target.display()))
    })?;
    let mut partial = name.to_os_string();
    partial.push(PARTIAL_SUFFIX);
    Ok(target.with_file_name(partial))
}
