//! Bucket versioning resolution
//!
//! The versioning mode only decides how remote objects are enumerated and what
//! is shown to the user, so a failed query degrades to `Unknown` instead of
//! failing the sync. Transfer errors, by contrast, always abort.

use tokio::sync::OnceCell;

use crate::traits::{ObjectStore, VersioningMode};

/// Resolves a bucket's versioning mode once per sync operation
///
/// A new resolver is created for every operation; the mode is never carried
/// over, since it can be changed on the bucket at any time.
pub struct VersioningResolver<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    mode: OnceCell<VersioningMode>,
}

impl<'a> VersioningResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self {
            store,
            bucket,
            mode: OnceCell::new(),
        }
    }

    /// Versioning mode of the bucket, queried on first use
    ///
    /// Issues a single query with no retry. Any failure yields
    /// [`VersioningMode::Unknown`].
    pub async fn resolve(&self) -> VersioningMode {
        *self
            .mode
            .get_or_init(|| async {
                match self.store.get_versioning(self.bucket).await {
                    Ok(mode) => {
                        tracing::debug!(bucket = self.bucket, %mode, "Resolved bucket versioning");
                        mode
                    }
                    Err(e) => {
                        tracing::debug!(
                            bucket = self.bucket,
                            error = %e,
                            "Versioning query failed, continuing as UNKNOWN"
                        );
                        VersioningMode::Unknown
                    }
                }
            })
            .await
    }

    /// Mode resolved so far, if any
    #[cfg(test)]
    fn cached(&self) -> Option<VersioningMode> {
        self.mode.get().copied()
    }

    pub fn bucket(&self) -> &'a str {
        self.bucket
    }
}
