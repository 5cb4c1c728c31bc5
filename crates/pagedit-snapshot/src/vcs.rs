//! Last-committed file contents.
//!
//! The origin version prefers the committed copy of a file over whatever is
//! on disk, so that a baseline taken after some unsaved experimentation still
//! starts from a known state. `reset_origin` uses the same source to roll
//! files back.

use git2::{ErrorCode, Repository};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of last-committed file contents.
pub trait CommittedSource: Send + Sync {
    /// Committed content of a project-relative path, if the path is tracked.
    fn committed_content(&self, relative: &str) -> Option<String>;
}

/// Used when the project is not under version control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommitted;

impl CommittedSource for NoCommitted {
    fn committed_content(&self, _relative: &str) -> Option<String> {
        None
    }
}

/// Error type for git lookups.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Path error: {0}")]
    Path(String),
}

/// Reads file contents from the `HEAD` commit of the enclosing repository.
#[derive(Debug, Clone)]
pub struct GitHead {
    project_root: PathBuf,
}

impl GitHead {
    /// Create a reader for the repository containing `project_root`.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref();
        Self {
            project_root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
        }
    }

    /// Whether `project_root` sits inside a git working tree.
    pub fn is_available(&self) -> bool {
        self.open_repo()
            .map(|repo| repo.workdir().is_some())
            .unwrap_or(false)
    }

    fn open_repo(&self) -> Result<Repository, GitError> {
        Ok(Repository::discover(&self.project_root)?)
    }

    /// Read the `HEAD` version of a project-relative path.
    ///
    /// Returns `Ok(None)` for untracked paths and for repositories without
    /// any commit yet.
    pub fn read(&self, relative: &str) -> Result<Option<String>, GitError> {
        let repo = self.open_repo()?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::Path("Repository has no working directory".to_string()))?;
        let workdir = workdir
            .canonicalize()
            .unwrap_or_else(|_| workdir.to_path_buf());

        let full_path = self.project_root.join(relative);
        let in_repo = full_path.strip_prefix(&workdir).map_err(|_| {
            GitError::Path(format!(
                "Path '{}' is outside repository {}",
                relative,
                workdir.display()
            ))
        })?;

        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tree = head.peel_to_tree()?;

        let entry = match tree.get_path(in_repo) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let object = entry.to_object(&repo)?;
        Ok(object
            .as_blob()
            .map(|blob| String::from_utf8_lossy(blob.content()).into_owned()))
    }
}

impl CommittedSource for GitHead {
    fn committed_content(&self, relative: &str) -> Option<String> {
        match self.read(relative) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = relative, error = %e, "No committed copy available");
                None
            }
        }
    }
}
