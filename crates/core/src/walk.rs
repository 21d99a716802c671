//! Recursive local directory walk
//!
//! Produces the files under a root as a lazy stream, in lexicographic
//! pre-order. Directories are only traversed, never yielded, and partial
//! downloads left behind by an interrupted run are never part of a project.

use std::path::{Path, PathBuf};

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{Error, Result};
use crate::transfer::PARTIAL_SUFFIX;

/// A file discovered under the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRef {
    pub absolute_path: PathBuf,
}

/// Lazily produced local files
pub type LocalFiles = BoxStream<'static, Result<LocalFileRef>>;

struct WalkState {
    root: Option<PathBuf>,
    /// Entries still to visit, last one next
    pending: Vec<PathBuf>,
}

impl WalkState {
    async fn push_children(&mut self, dir: &Path) -> Result<()> {
        let mut reader = tokio::fs::read_dir(dir).await.map_err(|e| {
            Error::InvalidPath(format!("Failed to read directory {}: {e}", dir.display()))
        })?;

        let mut children = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            children.push(entry.path());
        }
        children.sort_unstable_by(|a, b| b.file_name().cmp(&a.file_name()));
        self.pending.extend(children);
        Ok(())
    }

    async fn next_file(&mut self) -> Result<Option<LocalFileRef>> {
        if let Some(root) = self.root.take() {
            self.push_children(&root).await?;
        }

        while let Some(path) = self.pending.pop() {
            let file_type = tokio::fs::symlink_metadata(&path).await?.file_type();

            if file_type.is_dir() {
                self.push_children(&path).await?;
                continue;
            }

            if is_partial_download(&path) {
                tracing::debug!(path = %path.display(), "Skipping partial download");
                continue;
            }

            if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(target) if target.is_file() => {}
                    Ok(_) => {
                        tracing::warn!(path = %path.display(), "Skipping symlink to a directory");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping dangling symlink");
                        continue;
                    }
                }
            }

            return Ok(Some(LocalFileRef {
                absolute_path: path,
            }));
        }

        Ok(None)
    }
}

fn is_partial_download(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX))
}

/// Walk every file under `root`
///
/// Each call starts a new walk; dropping the stream part-way releases
/// everything it holds.
pub fn walk(root: &Path) -> LocalFiles {
    let state = WalkState {
        root: Some(root.to_path_buf()),
        pending: Vec::new(),
    };

    stream::try_unfold(state, |mut state| async move {
        let next = state.next_file().await?;
        Ok::<_, Error>(next.map(|file| (file, state)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn relative(root: &Path, files: &[LocalFileRef]) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.absolute_path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[tokio::test]
    async fn test_walk_yields_files_in_preorder() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("b.txt"), "b").unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("sub/c.txt"), "c").unwrap();
        std::fs::write(root.join("sub/deeper/d.txt"), "d").unwrap();
        std::fs::write(root.join("z.txt"), "z").unwrap();

        let files: Vec<_> = walk(root).try_collect().await.unwrap();
        assert_eq!(
            relative(root, &files),
            vec!["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt", "z.txt"]
        );
    }

    #[tokio::test]
    async fn test_walk_empty_directory() {
        let temp = TempDir::new().unwrap();
        let files: Vec<_> = walk(temp.path()).try_collect().await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_walk_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let result: Result<Vec<_>> = walk(&temp.path().join("missing")).try_collect().await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_walk_can_be_abandoned_and_restarted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();

        let mut files = walk(temp.path());
        let first = files.try_next().await.unwrap().unwrap();
        drop(files);

        let again: Vec<_> = walk(temp.path()).try_collect().await.unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0], first);
    }

    #[tokio::test]
    async fn test_walk_skips_partial_downloads() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("b.txt.bsync-part"), "half").unwrap();
        std::fs::write(root.join("sub/c.txt.bsync-part"), "half").unwrap();

        let files: Vec<_> = walk(root).try_collect().await.unwrap();
        assert_eq!(relative(root, &files), vec!["a.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_skips_symlinked_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("proj");
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::fs::write(root.join("real/file.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("loop")).unwrap();
        std::os::unix::fs::symlink(root.join("real/file.txt"), root.join("link.txt")).unwrap();

        let files: Vec<_> = walk(&root).try_collect().await.unwrap();
        assert_eq!(relative(&root, &files), vec!["link.txt", "real/file.txt"]);
    }
}
