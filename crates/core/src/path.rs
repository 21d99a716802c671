//! Mapping between project-relative local paths and namespaced remote keys
//!
//! Every object belonging to a project lives under the key prefix `<project>/`.
//! Remote keys always use `/` as separator, whatever the host filesystem uses.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Separator used in remote keys
pub const KEY_SEPARATOR: char = '/';

/// Name of a project, used as the remote key prefix `<name>/`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectNamespace {
    name: String,
}

impl ProjectNamespace {
    /// Create a namespace from an explicit project name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidPath("Project name cannot be empty".into()));
        }
        if name == "." || name == ".." {
            return Err(Error::InvalidPath(format!(
                "'{name}' is not a valid project name"
            )));
        }
        if name.contains(KEY_SEPARATOR) || name.contains('\\') {
            return Err(Error::InvalidPath(format!(
                "Project name '{name}' cannot contain path separators"
            )));
        }
        Ok(Self { name })
    }

    /// Derive the namespace from the project root's directory name
    pub fn from_dir(root: &Path) -> Result<Self> {
        let resolved = std::path::absolute(root)?;
        let name = resolved
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .next_back()
            .and_then(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .ok_or_else(|| {
                Error::InvalidPath(format!(
                    "Cannot derive a project name from '{}'",
                    root.display()
                ))
            })?;
        Self::new(name)
    }

    /// Project name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key prefix for this project, including the trailing separator
    pub fn prefix(&self) -> String {
        format!("{}{KEY_SEPARATOR}", self.name)
    }
}

impl std::fmt::Display for ProjectNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Build the remote key for a project-relative path
///
/// Backslashes are normalized to `/` so keys are identical whichever host
/// produced the relative path.
pub fn to_remote_key(project_name: &str, relative_path: &str) -> String {
    let normalized = relative_path.replace('\\', "/");
    format!("{project_name}{KEY_SEPARATOR}{normalized}")
}

/// Strip the `<project>/` prefix from a remote key
///
/// Fails with [`Error::Mapping`] when the key belongs to another namespace.
pub fn to_local_relative_path(project_name: &str, key: &str) -> Result<String> {
    key.strip_prefix(project_name)
        .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
        .map(str::to_string)
        .ok_or_else(|| Error::Mapping {
            namespace: project_name.to_string(),
            key: key.to_string(),
        })
}

/// Relative path of `file` under `root`, `/`-separated
///
/// Files whose names are not valid UTF-8 cannot become keys and are reported
/// as mapping errors rather than skipped.
pub fn relative_key_path(root: &Path, file: &Path) -> Result<String> {
    let mapping_error = || Error::Mapping {
        namespace: root.display().to_string(),
        key: file.display().to_string(),
    };

    let relative = file.strip_prefix(root).map_err(|_| mapping_error())?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(mapping_error)?),
            _ => return Err(mapping_error()),
        }
    }
    if parts.is_empty() {
        return Err(mapping_error());
    }
    Ok(parts.join("/"))
}

/// Absolute local path for a `/`-separated relative path under `root`
///
/// A trailing separator (directory marker) is allowed. Empty, `.` and `..`
/// segments are rejected so a key can never resolve outside `root`.
pub fn local_path_for(root: &Path, namespace: &str, relative_path: &str) -> Result<PathBuf> {
    let trimmed = relative_path
        .strip_suffix(KEY_SEPARATOR)
        .unwrap_or(relative_path);

    let mut path = root.to_path_buf();
    if trimmed.is_empty() {
        return Ok(path);
    }

    for segment in trimmed.split(KEY_SEPARATOR) {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(Error::Mapping {
                namespace: namespace.to_string(),
                key: to_remote_key(namespace, relative_path),
            });
        }
        path.push(segment);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_rejects_empty_and_separators() {
        assert!(ProjectNamespace::new("").is_err());
        assert!(ProjectNamespace::new("a/b").is_err());
        assert!(ProjectNamespace::new("a\\b").is_err());
        assert!(ProjectNamespace::new("..").is_err());
        assert_eq!(ProjectNamespace::new("proj").unwrap().prefix(), "proj/");
    }

    #[test]
    fn test_namespace_from_dir() {
        let ns = ProjectNamespace::from_dir(Path::new("/home/user/site")).unwrap();
        assert_eq!(ns.name(), "site");

        let ns = ProjectNamespace::from_dir(Path::new("/home/user/site/")).unwrap();
        assert_eq!(ns.name(), "site");
    }

    #[test]
    fn test_to_remote_key() {
        assert_eq!(to_remote_key("proj", "a.txt"), "proj/a.txt");
        assert_eq!(to_remote_key("proj", "sub/b.txt"), "proj/sub/b.txt");
        assert_eq!(to_remote_key("proj", "sub\\b.txt"), "proj/sub/b.txt");
    }

    #[test]
    fn test_to_local_relative_path() {
        assert_eq!(
            to_local_relative_path("proj", "proj/x/y.txt").unwrap(),
            "x/y.txt"
        );
        assert_eq!(to_local_relative_path("proj", "proj/").unwrap(), "");
    }

    #[test]
    fn test_to_local_relative_path_other_namespace() {
        let err = to_local_relative_path("proj", "other/a.txt").unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));

        // Sharing a name prefix is not the same namespace
        let err = to_local_relative_path("proj", "project/a.txt").unwrap_err();
        assert!(matches!(err, Error::Mapping { .. }));

        assert!(to_local_relative_path("proj", "proj").is_err());
    }

    #[test]
    fn test_round_trip() {
        for relative in ["a.txt", "sub/b.txt", "deep/er/c.tar.gz", "spaces in/name.md"] {
            let key = to_remote_key("proj", relative);
            assert_eq!(to_local_relative_path("proj", &key).unwrap(), relative);
        }
    }

    #[test]
    fn test_relative_key_path() {
        let root = Path::new("/work/proj");
        let file = root.join("sub").join("b.txt");
        assert_eq!(relative_key_path(root, &file).unwrap(), "sub/b.txt");
        assert!(relative_key_path(root, Path::new("/elsewhere/b.txt")).is_err());
        assert!(relative_key_path(root, root).is_err());
    }

    #[test]
    fn test_local_path_for() {
        let root = Path::new("/tmp/out");
        assert_eq!(
            local_path_for(root, "proj", "x/y.txt").unwrap(),
            root.join("x").join("y.txt")
        );
        assert_eq!(local_path_for(root, "proj", "x/").unwrap(), root.join("x"));
        assert_eq!(local_path_for(root, "proj", "").unwrap(), root);
    }

    #[test]
    fn test_local_path_for_rejects_escape() {
        let root = Path::new("/tmp/out");
        assert!(local_path_for(root, "proj", "../etc/passwd").is_err());
        assert!(local_path_for(root, "proj", "a/./b").is_err());
        assert!(local_path_for(root, "proj", "a//b").is_err());
        assert!(local_path_for(root, "proj", "a\\..\\b").is_err());
    }
}
