//! Path utilities.
//!
//! The browser reports files as absolute paths while snapshots are keyed by
//! project-relative paths, so most callers go through [`project_relative`].

use std::path::{Component, Path, PathBuf};

/// Get the pagedit configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/pagedit` if set
/// - `~/.config/pagedit` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pagedit"))
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }

    result
}

/// Resolve a browser- or user-supplied path to a path relative to `root`.
///
/// Absolute paths must live under `root`; relative paths are taken as
/// relative to `root`. Returns `None` for paths that escape the root, and
/// always for a root that normalizes to nothing (such as `.`). Callers
/// should resolve `root` to an absolute path first.
pub fn project_relative(path: &Path, root: &Path) -> Option<PathBuf> {
    let root = normalize(root);
    if root.as_os_str().is_empty() {
        return None;
    }
    let joined = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    };

    let relative = joined.strip_prefix(&root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_path_buf())
}

/// Render a relative path with forward slashes, the form stored in manifests.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
