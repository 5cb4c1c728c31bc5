//! Saving browser edits back to source files.

use crate::edit::{validate, RawEdit};
use pagedit_patch::{patch_document, DocumentKind, PatchEdit, PatchError};
use pagedit_snapshot::{SnapshotError, SnapshotStore, VersionEntry};
use pagedit_util::path::to_slash;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Save errors.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result of a save request.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// Project-relative paths of the patched files.
    pub files: Vec<String>,
    /// The recorded version, `None` when no file was patched or the files
    /// matched the newest one.
    pub version: Option<VersionEntry>,
}

/// Applies batches of edits to the project and records a version for them.
pub struct EditSaveService {
    store: Arc<SnapshotStore>,
    project_root: PathBuf,
    lock: Mutex<()>,
}

impl EditSaveService {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        let project_root = store.project_root().to_path_buf();
        Self {
            store,
            project_root,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Apply a batch of edits.
    ///
    /// Invalid edits are dropped with a warning. Files are processed in the
    /// order they first appear in the batch. An I/O failure aborts the save
    /// before a version is recorded; files already written stay on disk.
    pub async fn save(&self, edits: Vec<RawEdit>) -> Result<SaveOutcome, SaveError> {
        let _guard = self.lock.lock().await;

        let received = edits.len();
        let groups = self.group_by_file(edits);
        debug!(received, files = groups.len(), "Processing save request");

        let mut changed: Vec<PathBuf> = Vec::new();
        for (relative, file_edits) in &groups {
            let path = self.project_root.join(relative);
            let kind = DocumentKind::from_path(&path);
            if kind == DocumentKind::Unsupported {
                warn!(file = %to_slash(relative), "Unsupported file type, edits ignored");
                continue;
            }

            let source = fs::read_to_string(&path)
                .await
                .map_err(|source| SaveError::Io {
                    action: "read",
                    path: to_slash(relative),
                    source,
                })?;

            let Some(outcome) = patch_document(kind, &source, file_edits)? else {
                continue;
            };
            debug!(
                file = %to_slash(relative),
                applied = outcome.applied,
                skipped = outcome.skipped,
                "Patched document"
            );

            if outcome.text != source {
                fs::write(&path, &outcome.text)
                    .await
                    .map_err(|source| SaveError::Io {
                        action: "write",
                        path: to_slash(relative),
                        source,
                    })?;
            }
            changed.push(path);
        }

        let version = if changed.is_empty() {
            None
        } else {
            self.store.create_version(&changed).await?
        };
        let files: Vec<String> = changed
            .iter()
            .filter_map(|p| p.strip_prefix(&self.project_root).ok())
            .map(to_slash)
            .collect();

        match &version {
            Some(entry) => info!(id = entry.id, files = files.len(), "Saved edits"),
            None if files.is_empty() => info!("No edits applied"),
            None => info!(files = files.len(), "Saved edits, content unchanged"),
        }

        Ok(SaveOutcome { files, version })
    }

    fn group_by_file(&self, edits: Vec<RawEdit>) -> Vec<(PathBuf, Vec<PatchEdit>)> {
        let mut groups: Vec<(PathBuf, Vec<PatchEdit>)> = Vec::new();
        for valid in edits
            .into_iter()
            .filter_map(|raw| validate(raw, &self.project_root))
        {
            match groups.iter_mut().find(|(file, _)| *file == valid.file) {
                Some((_, group)) => group.push(valid.edit),
                None => groups.push((valid.file, vec![valid.edit])),
            }
        }
        groups
    }
}
