//! Version storage implementation.

use crate::diff::diff_lines;
use crate::vcs::{CommittedSource, GitHead, NoCommitted};
use crate::version::{
    auto_label, Checkpoint, CurrentDiff, FileDiff, OriginData, RestoreReport, VersionDetails,
    VersionEntry, VersionList, ORIGIN_ID, ORIGIN_LABEL,
};
use crate::SnapshotResult;
use chrono::Utc;
use pagedit_util::path::{normalize, project_relative, to_slash};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const CHECKPOINT_FILE: &str = "checkpoint.json";
const ORIGIN_FILE: &str = "origin.json";

/// Configuration for version storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Total storage size above which a warning is logged after each save.
    pub storage_warn_bytes: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            storage_warn_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Storage for full-file versions of the edited project.
///
/// Versions are stored as plain file copies:
/// ```text
/// base_dir/
///   manifest.json      # Array of version entries
///   checkpoint.json    # {"id": n} - version live files are compared against
///   origin.json        # Origin contents, survives "delete all"
///   v<id>/
///     files/
///       <relative_path>
/// ```
///
/// Mutating operations are serialized; a single store is meant to be shared
/// by every request handler of the process.
pub struct SnapshotStore {
    /// Directory holding the manifest and version directories.
    base_dir: PathBuf,

    /// Project root as given (for resolving relative paths).
    project_root: PathBuf,

    /// Canonical form of the project root, for absolute paths that went
    /// through symlink resolution.
    canonical_root: PathBuf,

    config: SnapshotConfig,

    committed: Arc<dyn CommittedSource>,

    lock: Mutex<()>,
}

impl SnapshotStore {
    /// Create a new version store.
    ///
    /// # Arguments
    /// * `base_dir` - Directory to store versions (e.g., `.pagedit/versions`)
    /// * `project_root` - Root directory of the edited project
    /// * `config` - Storage configuration
    ///
    /// Committed contents are read from git when the project is inside a
    /// repository. A relative `project_root` is resolved against the current
    /// directory.
    pub async fn new(
        base_dir: PathBuf,
        project_root: PathBuf,
        config: SnapshotConfig,
    ) -> SnapshotResult<Self> {
        fs::create_dir_all(&base_dir).await?;

        let project_root = if project_root.is_absolute() {
            normalize(&project_root)
        } else {
            normalize(&std::env::current_dir()?.join(project_root))
        };

        let git = GitHead::new(&project_root);
        let committed: Arc<dyn CommittedSource> = if git.is_available() {
            debug!("Using git HEAD as committed source");
            Arc::new(git)
        } else {
            debug!("Project is not a git repository; origin uses disk contents");
            Arc::new(NoCommitted)
        };

        let canonical_root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.clone());

        Ok(Self {
            base_dir,
            project_root,
            canonical_root,
            config,
            committed,
            lock: Mutex::new(()),
        })
    }

    /// Replace the source of last-committed contents.
    pub fn with_committed_source(mut self, committed: Arc<dyn CommittedSource>) -> Self {
        self.committed = committed;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Create the origin version (id 0) from the given files.
    ///
    /// Idempotent: an existing origin is returned unchanged, with its
    /// directory rebuilt from the persisted origin data if it went missing.
    pub async fn create_baseline(&self, paths: &[PathBuf]) -> SnapshotResult<VersionEntry> {
        let _guard = self.lock.lock().await;
        self.create_baseline_locked(paths).await
    }

    async fn create_baseline_locked(&self, paths: &[PathBuf]) -> SnapshotResult<VersionEntry> {
        let mut manifest = self.read_manifest().await?;
        let requested = self.relative_paths(paths);

        if let Some(entry) = manifest.iter().find(|e| e.is_origin()).cloned() {
            if !self.files_dir(ORIGIN_ID).exists() {
                self.materialize_origin(&entry).await?;
            }
            debug!("Origin already exists");
            return Ok(entry);
        }

        if let Some(origin) = self.read_origin().await? {
            let entry = origin_entry(&origin, &requested);
            self.write_version_dir(ORIGIN_ID, &origin_contents(&origin, &entry))
                .await?;
            manifest.insert(0, entry.clone());
            self.write_manifest(&manifest).await?;
            if self.read_checkpoint().await?.is_none() {
                self.write_checkpoint(Some(ORIGIN_ID)).await?;
            }
            info!(files = entry.file_count, "Rebuilt origin from persisted data");
            return Ok(entry);
        }

        let mut contents = Vec::with_capacity(requested.len());
        for rel in requested {
            let content = match self.committed.committed_content(&rel) {
                Some(committed) => Some(committed),
                None => read_optional(&self.project_root.join(&rel)).await?,
            };
            match content {
                Some(text) => contents.push((rel, text)),
                None => warn!("Skipping non-existent file: {}", rel),
            }
        }

        let origin = OriginData {
            contents: contents.iter().cloned().collect(),
            timestamp: Some(Utc::now()),
        };
        self.write_origin(&origin).await?;
        self.write_version_dir(ORIGIN_ID, &contents).await?;

        let files: Vec<String> = contents.into_iter().map(|(rel, _)| rel).collect();
        let entry = VersionEntry::new(ORIGIN_ID, ORIGIN_LABEL, files);
        manifest.insert(0, entry.clone());
        self.write_manifest(&manifest).await?;
        self.write_checkpoint(Some(ORIGIN_ID)).await?;

        info!("Created origin with {} files", entry.file_count);
        Ok(entry)
    }

    /// Record a new version after `changed` files were saved.
    ///
    /// Every version is a complete snapshot of the tracked files. Returns
    /// `Ok(None)` when nothing differs from the newest existing version.
    pub async fn create_version(
        &self,
        changed: &[PathBuf],
    ) -> SnapshotResult<Option<VersionEntry>> {
        let _guard = self.lock.lock().await;

        let mut manifest = self.read_manifest().await?;
        let id = manifest.iter().map(|e| e.id).max().map_or(ORIGIN_ID, |max| max + 1);
        let changed = self.relative_paths(changed);
        let predecessor = manifest.iter().max_by_key(|e| e.id).cloned();

        let origin_files = match manifest.iter().find(|e| e.is_origin()) {
            Some(origin) => origin.files.clone(),
            None => self
                .read_origin()
                .await?
                .map(|o| o.contents.into_keys().collect())
                .unwrap_or_default(),
        };

        let mut tracked: Vec<String> = Vec::new();
        let previous_files = predecessor.iter().flat_map(|p| p.files.iter());
        for rel in origin_files.iter().chain(previous_files).chain(changed.iter()) {
            if !tracked.contains(rel) {
                tracked.push(rel.clone());
            }
        }

        let mut contents = Vec::with_capacity(tracked.len());
        for rel in tracked {
            match read_optional(&self.project_root.join(&rel)).await? {
                Some(text) => contents.push((rel, text)),
                None => debug!("Tracked file no longer exists: {}", rel),
            }
        }

        if contents.is_empty() {
            debug!("No tracked files to snapshot, skipping");
            return Ok(None);
        }

        if let Some(prev) = &predecessor {
            if self.matches_version(prev, &contents).await? {
                info!("No changes since version {}, skipping", prev.id);
                return Ok(None);
            }
        }

        if id == ORIGIN_ID && self.read_origin().await?.is_none() {
            let origin = OriginData {
                contents: contents.iter().cloned().collect(),
                timestamp: Some(Utc::now()),
            };
            self.write_origin(&origin).await?;
        }

        self.write_version_dir(id, &contents).await?;

        let files: Vec<String> = contents.into_iter().map(|(rel, _)| rel).collect();
        let entry = VersionEntry::new(id, auto_label(&changed), files);
        manifest.push(entry.clone());
        self.write_manifest(&manifest).await?;
        self.write_checkpoint(Some(id)).await?;

        info!("Created version {} ({})", entry.id, entry.label);

        // the version is already recorded; a failed size check only warns
        match self.storage_size().await {
            Ok(size) if size > self.config.storage_warn_bytes => warn!(
                "Version storage is {:.2}MB (limit: {:.2}MB)",
                size as f64 / 1024.0 / 1024.0,
                self.config.storage_warn_bytes as f64 / 1024.0 / 1024.0
            ),
            Ok(_) => {}
            Err(e) => warn!("Failed to measure version storage: {}", e),
        }

        Ok(Some(entry))
    }

    /// List all versions and the current checkpoint.
    pub async fn list_versions(&self) -> SnapshotResult<VersionList> {
        Ok(VersionList {
            versions: self.read_manifest().await?,
            checkpoint_id: self.read_checkpoint().await?,
        })
    }

    /// Get a version with per-file diffs against the checkpoint version.
    ///
    /// The checkpoint itself is its own reference point and has no diffs.
    pub async fn version_details(&self, id: u64) -> SnapshotResult<Option<VersionDetails>> {
        let manifest = self.read_manifest().await?;
        let Some(entry) = manifest.iter().find(|e| e.id == id).cloned() else {
            return Ok(None);
        };
        if !self.files_dir(id).exists() {
            warn!("Version {} is in the manifest but has no files", id);
            return Ok(None);
        }

        let checkpoint = self.read_checkpoint().await?;
        let mut diffs = Vec::new();

        if checkpoint != Some(id) {
            let reference = checkpoint.filter(|c| manifest.iter().any(|e| e.id == *c));
            for rel in &entry.files {
                let current = self.read_snapshot_file(id, rel).await?.unwrap_or_default();
                let base = match reference {
                    Some(ref_id) => self.read_snapshot_file(ref_id, rel).await?,
                    None => None,
                }
                .unwrap_or_default();

                if let Some(diff) = file_diff(rel, &base, &current) {
                    diffs.push(diff);
                }
            }
        }

        Ok(Some(VersionDetails {
            entry,
            diffs,
            storage_size: self.storage_size().await?,
        }))
    }

    /// Delete a single version. The origin can never be deleted.
    ///
    /// Returns `false` for the origin and for unknown ids.
    pub async fn delete_version(&self, id: u64) -> SnapshotResult<bool> {
        if id == ORIGIN_ID {
            warn!("Refusing to delete the origin version");
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        let mut manifest = self.read_manifest().await?;
        let Some(idx) = manifest.iter().position(|e| e.id == id) else {
            return Ok(false);
        };

        remove_dir_if_exists(&self.version_dir(id)).await?;
        manifest.remove(idx);
        self.write_manifest(&manifest).await?;

        if self.read_checkpoint().await? == Some(id) {
            let fallback = manifest.iter().map(|e| e.id).max();
            self.write_checkpoint(fallback).await?;
            debug!("Checkpoint moved to {:?}", fallback);
        }

        info!("Deleted version {}", id);
        Ok(true)
    }

    /// Delete every version except the origin.
    ///
    /// The origin directory is rebuilt from the persisted origin data, which
    /// itself is left untouched.
    pub async fn delete_all_versions(&self) -> SnapshotResult<()> {
        let _guard = self.lock.lock().await;

        let manifest = self.read_manifest().await?;
        let origin = self.read_origin().await?;

        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_version_dir(&name) && entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            }
        }

        let origin_entry = match (manifest.into_iter().find(|e| e.is_origin()), &origin) {
            (Some(entry), _) => Some(entry),
            (None, Some(data)) => Some(origin_entry(data, &[])),
            (None, None) => None,
        };

        match (&origin_entry, &origin) {
            (Some(entry), Some(data)) => {
                self.write_version_dir(ORIGIN_ID, &origin_contents(data, entry))
                    .await?;
            }
            (Some(_), None) => warn!("Origin data missing; v0 cannot be rebuilt"),
            _ => {}
        }

        let checkpoint = origin_entry.as_ref().map(|e| e.id);
        let manifest: Vec<VersionEntry> = origin_entry.into_iter().collect();
        self.write_manifest(&manifest).await?;
        self.write_checkpoint(checkpoint).await?;

        info!("Deleted all versions");
        Ok(())
    }

    /// Rename a version. Returns `false` for unknown ids.
    pub async fn update_label(&self, id: u64, label: &str) -> SnapshotResult<bool> {
        let _guard = self.lock.lock().await;
        let mut manifest = self.read_manifest().await?;

        match manifest.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.label = label.to_string();
                self.write_manifest(&manifest).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy every file of a version back into the project and make it the
    /// checkpoint.
    ///
    /// No backup version of the current state is taken first.
    pub async fn restore_version(&self, id: u64) -> SnapshotResult<Option<RestoreReport>> {
        let _guard = self.lock.lock().await;

        let manifest = self.read_manifest().await?;
        let Some(entry) = manifest.into_iter().find(|e| e.id == id) else {
            return Ok(None);
        };
        let files_dir = self.files_dir(id);
        if !files_dir.exists() {
            return Ok(None);
        }

        let mut report = RestoreReport::default();
        for rel in &entry.files {
            let src = files_dir.join(rel);
            let dst = self.project_root.join(rel);

            if !src.exists() {
                warn!("Snapshot file missing: {:?}", src);
                continue;
            }
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&src, &dst).await?;
            debug!("Restored: {}", rel);
            report.restored.push(rel.clone());
        }

        self.write_checkpoint(Some(id)).await?;
        info!("Restored version {} ({} files)", id, report.restored.len());
        Ok(Some(report))
    }

    /// Wipe the whole store, roll the given files back to their committed
    /// contents and take a fresh origin.
    pub async fn reset_origin(&self, paths: &[PathBuf]) -> SnapshotResult<VersionEntry> {
        let _guard = self.lock.lock().await;

        remove_dir_if_exists(&self.base_dir).await?;
        fs::create_dir_all(&self.base_dir).await?;

        for rel in self.relative_paths(paths) {
            match self.committed.committed_content(&rel) {
                Some(content) => {
                    let dst = self.project_root.join(&rel);
                    if let Some(parent) = dst.parent() {
                        fs::create_dir_all(parent).await?;
                    }
                    fs::write(&dst, content).await?;
                    debug!("Reset to committed content: {}", rel);
                }
                None => warn!("No committed copy of {}, keeping disk content", rel),
            }
        }

        info!("Version store reset");
        self.create_baseline_locked(paths).await
    }

    /// Diff the live files against the checkpoint version.
    pub async fn current_diff(&self) -> SnapshotResult<CurrentDiff> {
        let manifest = self.read_manifest().await?;
        let checkpoint = self.read_checkpoint().await?;

        let Some(entry) = checkpoint.and_then(|id| manifest.into_iter().find(|e| e.id == id))
        else {
            return Ok(CurrentDiff::default());
        };

        let mut current = CurrentDiff {
            compared_to: Some(entry.id),
            diffs: Vec::new(),
        };
        if !self.files_dir(entry.id).exists() {
            return Ok(current);
        }

        for rel in &entry.files {
            let snapshot = self
                .read_snapshot_file(entry.id, rel)
                .await?
                .unwrap_or_default();
            let live = read_optional(&self.project_root.join(rel))
                .await?
                .unwrap_or_default();

            if let Some(diff) = file_diff(rel, &snapshot, &live) {
                current.diffs.push(diff);
            }
        }

        Ok(current)
    }

    /// Total size in bytes of everything under the versions directory.
    pub async fn storage_size(&self) -> SnapshotResult<u64> {
        let mut total = 0;
        let mut pending = vec![self.base_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }

        Ok(total)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn version_dir(&self, id: u64) -> PathBuf {
        self.base_dir.join(format!("v{}", id))
    }

    fn files_dir(&self, id: u64) -> PathBuf {
        self.version_dir(id).join("files")
    }

    /// Map paths onto deduplicated project-relative slash paths, skipping
    /// anything outside the project.
    fn relative_paths(&self, paths: &[PathBuf]) -> Vec<String> {
        let mut result: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            let relative = project_relative(path, &self.project_root).or_else(|| {
                path.canonicalize()
                    .ok()
                    .and_then(|p| project_relative(&p, &self.canonical_root))
            });
            match relative.map(|p| to_slash(&p)) {
                Some(rel) if !result.contains(&rel) => result.push(rel),
                Some(_) => {}
                None => warn!("Path {:?} is not under project root {:?}", path, self.project_root),
            }
        }
        result
    }

    async fn read_snapshot_file(&self, id: u64, rel: &str) -> SnapshotResult<Option<String>> {
        read_optional(&self.files_dir(id).join(rel)).await
    }

    /// Whether `contents` is exactly the file set and content of `version`.
    async fn matches_version(
        &self,
        version: &VersionEntry,
        contents: &[(String, String)],
    ) -> SnapshotResult<bool> {
        if version.files.len() != contents.len() {
            return Ok(false);
        }
        for (rel, text) in contents {
            if !version.contains_file(rel) {
                return Ok(false);
            }
            if self.read_snapshot_file(version.id, rel).await?.as_deref() != Some(text.as_str()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Write a version directory via a staging directory and a rename, so a
    /// half-written version is never visible under its final name.
    async fn write_version_dir(&self, id: u64, contents: &[(String, String)]) -> SnapshotResult<()> {
        let staging = self.base_dir.join(format!("v{}.tmp", id));
        remove_dir_if_exists(&staging).await?;

        let files_dir = staging.join("files");
        fs::create_dir_all(&files_dir).await?;
        for (rel, text) in contents {
            let dst = files_dir.join(rel);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&dst, text).await?;
            debug!("Snapshotted: {}", rel);
        }

        let target = self.version_dir(id);
        remove_dir_if_exists(&target).await?;
        fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn materialize_origin(&self, entry: &VersionEntry) -> SnapshotResult<()> {
        match self.read_origin().await? {
            Some(origin) => {
                self.write_version_dir(ORIGIN_ID, &origin_contents(&origin, entry))
                    .await?;
                info!("Rebuilt origin directory from persisted data");
            }
            None => warn!("Origin directory missing and no origin data to rebuild it"),
        }
        Ok(())
    }

    async fn read_manifest(&self) -> SnapshotResult<Vec<VersionEntry>> {
        Ok(read_json(&self.base_dir.join(MANIFEST_FILE))
            .await?
            .unwrap_or_default())
    }

    async fn write_manifest(&self, manifest: &[VersionEntry]) -> SnapshotResult<()> {
        write_json(&self.base_dir.join(MANIFEST_FILE), &manifest).await
    }

    async fn read_checkpoint(&self) -> SnapshotResult<Option<u64>> {
        let checkpoint: Option<Checkpoint> = read_json(&self.base_dir.join(CHECKPOINT_FILE)).await?;
        Ok(checkpoint.and_then(|c| c.id))
    }

    async fn write_checkpoint(&self, id: Option<u64>) -> SnapshotResult<()> {
        write_json(&self.base_dir.join(CHECKPOINT_FILE), &Checkpoint { id }).await
    }

    async fn read_origin(&self) -> SnapshotResult<Option<OriginData>> {
        read_json(&self.base_dir.join(ORIGIN_FILE)).await
    }

    async fn write_origin(&self, origin: &OriginData) -> SnapshotResult<()> {
        write_json(&self.base_dir.join(ORIGIN_FILE), origin).await
    }
}

/// Origin entry for persisted data, keeping `preferred` order first.
/// `v<id>` or an interrupted `v<id>.tmp` write.
fn is_version_dir(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('v') else {
        return false;
    };
    let digits = rest.strip_suffix(".tmp").unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn origin_entry(origin: &OriginData, preferred: &[String]) -> VersionEntry {
    let mut files: Vec<String> = preferred
        .iter()
        .filter(|rel| origin.contents.contains_key(*rel))
        .cloned()
        .collect();
    for rel in origin.contents.keys() {
        if !files.contains(rel) {
            files.push(rel.clone());
        }
    }

    let mut entry = VersionEntry::new(ORIGIN_ID, ORIGIN_LABEL, files);
    if let Some(timestamp) = origin.timestamp {
        entry.timestamp = timestamp;
    }
    entry
}

fn origin_contents(origin: &OriginData, entry: &VersionEntry) -> Vec<(String, String)> {
    entry
        .files
        .iter()
        .filter_map(|rel| {
            origin
                .contents
                .get(rel)
                .map(|text| (rel.clone(), text.clone()))
        })
        .collect()
}

fn file_diff(rel: &str, old: &str, new: &str) -> Option<FileDiff> {
    let diff = diff_lines(old, new);
    if diff.is_empty() {
        return None;
    }
    Some(FileDiff {
        file: rel.to_string(),
        stats: diff.stats,
        hunks: diff.hunks,
    })
}

async fn read_optional(path: &Path) -> SnapshotResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_dir_if_exists(path: &Path) -> SnapshotResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> SnapshotResult<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write JSON atomically (write to temp file, then rename).
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> SnapshotResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FixedCommitted(HashMap<String, String>);

    impl CommittedSource for FixedCommitted {
        fn committed_content(&self, relative: &str) -> Option<String> {
            self.0.get(relative).cloned()
        }
    }

    async fn setup_test() -> (TempDir, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(
            dir.path().join(".pagedit/versions"),
            dir.path().to_path_buf(),
            SnapshotConfig::default(),
        )
        .await
        .unwrap()
        .with_committed_source(Arc::new(NoCommitted));
        (dir, store)
    }

    async fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, content).await.unwrap();
    }

    async fn read(dir: &TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join(rel)).await.unwrap()
    }

    fn paths(rels: &[&str]) -> Vec<PathBuf> {
        rels.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn baseline_is_idempotent() {
        let (dir, store) = setup_test().await;
        write(&dir, "docs/a.md", "# A").await;
        write(&dir, "src/pages/index.astro", "<h1>Home</h1>").await;
        let files = paths(&["docs/a.md", "src/pages/index.astro"]);

        let first = store.create_baseline(&files).await.unwrap();
        let origin_json = fs::read(store.base_dir().join(ORIGIN_FILE)).await.unwrap();

        write(&dir, "docs/a.md", "# A changed").await;
        let second = store.create_baseline(&files).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.label, ORIGIN_LABEL);
        assert_eq!(first.files, vec!["docs/a.md", "src/pages/index.astro"]);

        let list = store.list_versions().await.unwrap();
        assert_eq!(list.versions.len(), 1);
        assert_eq!(list.versions[0].id, ORIGIN_ID);
        assert_eq!(list.checkpoint_id, Some(ORIGIN_ID));

        let origin_after = fs::read(store.base_dir().join(ORIGIN_FILE)).await.unwrap();
        assert_eq!(origin_json, origin_after);
    }

    #[tokio::test]
    async fn baseline_prefers_committed_content() {
        let dir = TempDir::new().unwrap();
        let committed = HashMap::from([("a.md".to_string(), "committed".to_string())]);
        let store = SnapshotStore::new(
            dir.path().join("versions"),
            dir.path().to_path_buf(),
            SnapshotConfig::default(),
        )
        .await
        .unwrap()
        .with_committed_source(Arc::new(FixedCommitted(committed)));

        write(&dir, "a.md", "working copy").await;
        write(&dir, "b.md", "only on disk").await;
        store
            .create_baseline(&paths(&["a.md", "b.md", "missing.md"]))
            .await
            .unwrap();

        let v0 = store.files_dir(ORIGIN_ID);
        assert_eq!(fs::read_to_string(v0.join("a.md")).await.unwrap(), "committed");
        assert_eq!(fs::read_to_string(v0.join("b.md")).await.unwrap(), "only on disk");
        assert!(!v0.join("missing.md").exists());
    }

    #[tokio::test]
    async fn absolute_paths_are_stored_relative() {
        let (dir, store) = setup_test().await;
        write(&dir, "content/post.mdx", "hello").await;

        let entry = store
            .create_baseline(&[dir.path().join("content/post.mdx")])
            .await
            .unwrap();
        assert_eq!(entry.files, vec!["content/post.mdx"]);
    }

    #[tokio::test]
    async fn create_version_is_noop_without_changes() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "same").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();

        let result = store.create_version(&paths(&["a.md"])).await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.list_versions().await.unwrap().versions.len(), 1);
        assert!(!store.version_dir(1).exists());
        assert!(!store.base_dir().join("v1.tmp").exists());
    }

    #[tokio::test]
    async fn create_version_snapshots_all_tracked_files() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a0").await;
        write(&dir, "b.md", "b0").await;
        store.create_baseline(&paths(&["a.md", "b.md"])).await.unwrap();

        write(&dir, "a.md", "a1").await;
        let entry = store
            .create_version(&paths(&["a.md"]))
            .await
            .unwrap()
            .expect("version created");

        assert_eq!(entry.id, 1);
        assert_eq!(entry.label, "Updated a.md");
        assert_eq!(entry.files, vec!["a.md", "b.md"]);
        assert_eq!(entry.file_count, 2);

        let v1 = store.files_dir(1);
        assert_eq!(fs::read_to_string(v1.join("a.md")).await.unwrap(), "a1");
        assert_eq!(fs::read_to_string(v1.join("b.md")).await.unwrap(), "b0");
        assert_eq!(store.list_versions().await.unwrap().checkpoint_id, Some(1));
    }

    #[tokio::test]
    async fn new_files_stay_tracked_in_later_versions() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a0").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();

        write(&dir, "new.md", "fresh").await;
        let v1 = store.create_version(&paths(&["new.md"])).await.unwrap().unwrap();
        assert_eq!(v1.files, vec!["a.md", "new.md"]);

        write(&dir, "a.md", "a2").await;
        let v2 = store.create_version(&paths(&["a.md"])).await.unwrap().unwrap();
        assert_eq!(v2.files, vec!["a.md", "new.md"]);

        write(&dir, "a.md", "a3").await;
        write(&dir, "new.md", "fresher").await;
        let v3 = store
            .create_version(&paths(&["a.md", "new.md"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v3.label, "Updated 2 files");
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "0").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();

        write(&dir, "a.md", "1").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();
        write(&dir, "a.md", "2").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();
        assert!(store.delete_version(1).await.unwrap());

        write(&dir, "a.md", "3").await;
        let entry = store.create_version(&paths(&["a.md"])).await.unwrap().unwrap();
        assert_eq!(entry.id, 3);
    }

    #[tokio::test]
    async fn first_version_without_baseline_becomes_origin() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a0").await;

        let entry = store.create_version(&paths(&["a.md"])).await.unwrap().unwrap();
        assert_eq!(entry.id, ORIGIN_ID);
        assert!(store.base_dir().join(ORIGIN_FILE).exists());
        assert!(!store.delete_version(ORIGIN_ID).await.unwrap());
    }

    #[tokio::test]
    async fn origin_cannot_be_deleted() {
        let (dir, store) = setup_test().await;
        assert!(!store.delete_version(ORIGIN_ID).await.unwrap());

        write(&dir, "a.md", "a").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        assert!(!store.delete_version(ORIGIN_ID).await.unwrap());
        assert!(store.files_dir(ORIGIN_ID).exists());
    }

    #[tokio::test]
    async fn deleting_checkpoint_falls_back_to_newest() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "0").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        write(&dir, "a.md", "1").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();
        write(&dir, "a.md", "2").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();

        assert!(store.delete_version(2).await.unwrap());
        assert_eq!(store.list_versions().await.unwrap().checkpoint_id, Some(1));
        assert!(!store.version_dir(2).exists());

        assert!(!store.delete_version(2).await.unwrap());
    }

    #[tokio::test]
    async fn delete_all_then_baseline_reproduces_origin() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "original").await;
        let files = paths(&["a.md"]);
        store.create_baseline(&files).await.unwrap();

        write(&dir, "a.md", "edited").await;
        store.create_version(&files).await.unwrap();

        store.delete_all_versions().await.unwrap();
        let list = store.list_versions().await.unwrap();
        assert_eq!(list.versions.len(), 1);
        assert_eq!(list.checkpoint_id, Some(ORIGIN_ID));
        assert!(!store.version_dir(1).exists());

        // v0 must come from origin data, not from the edited disk copy
        fs::remove_dir_all(store.version_dir(ORIGIN_ID)).await.unwrap();
        store.create_baseline(&files).await.unwrap();
        let v0 = fs::read_to_string(store.files_dir(ORIGIN_ID).join("a.md"))
            .await
            .unwrap();
        assert_eq!(v0, "original");
    }

    #[tokio::test]
    async fn origin_entry_is_rebuilt_from_origin_data() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "original").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();

        fs::remove_file(store.base_dir().join(MANIFEST_FILE)).await.unwrap();
        write(&dir, "a.md", "drifted").await;

        let entry = store.create_baseline(&paths(&["a.md"])).await.unwrap();
        assert_eq!(entry.id, ORIGIN_ID);
        let v0 = fs::read_to_string(store.files_dir(ORIGIN_ID).join("a.md"))
            .await
            .unwrap();
        assert_eq!(v0, "original");
    }

    #[tokio::test]
    async fn restore_writes_version_files_and_moves_checkpoint() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a0").await;
        write(&dir, "nested/b.md", "b0").await;
        store
            .create_baseline(&paths(&["a.md", "nested/b.md"]))
            .await
            .unwrap();

        write(&dir, "a.md", "a1").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();

        fs::remove_dir_all(dir.path().join("nested")).await.unwrap();
        let report = store.restore_version(ORIGIN_ID).await.unwrap().unwrap();

        assert_eq!(report.restored, vec!["a.md", "nested/b.md"]);
        assert_eq!(read(&dir, "a.md").await, "a0");
        assert_eq!(read(&dir, "nested/b.md").await, "b0");
        assert_eq!(
            store.list_versions().await.unwrap().checkpoint_id,
            Some(ORIGIN_ID)
        );
        // no backup version is taken
        assert_eq!(store.list_versions().await.unwrap().versions.len(), 2);

        assert!(store.restore_version(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn version_details_diff_against_checkpoint() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "one\ntwo\nthree").await;
        write(&dir, "b.md", "stable").await;
        store.create_baseline(&paths(&["a.md", "b.md"])).await.unwrap();

        write(&dir, "a.md", "one\n2\nthree").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();

        let checkpoint = store.version_details(1).await.unwrap().unwrap();
        assert!(checkpoint.diffs.is_empty());
        assert!(checkpoint.storage_size > 0);

        let origin = store.version_details(ORIGIN_ID).await.unwrap().unwrap();
        assert_eq!(origin.diffs.len(), 1);
        assert_eq!(origin.diffs[0].file, "a.md");
        assert_eq!(origin.diffs[0].stats.added, 1);
        assert_eq!(origin.diffs[0].stats.removed, 1);

        assert!(store.version_details(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn current_diff_reports_unsaved_changes() {
        let (dir, store) = setup_test().await;
        assert_eq!(store.current_diff().await.unwrap(), CurrentDiff::default());

        write(&dir, "a.md", "saved").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        assert!(store.current_diff().await.unwrap().diffs.is_empty());

        write(&dir, "a.md", "saved\nunsaved").await;
        let current = store.current_diff().await.unwrap();
        assert_eq!(current.compared_to, Some(ORIGIN_ID));
        assert_eq!(current.diffs.len(), 1);
        assert_eq!(current.diffs[0].stats.added, 1);
        assert_eq!(current.diffs[0].stats.removed, 0);
    }

    #[tokio::test]
    async fn update_label_renames_only() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();

        assert!(store.update_label(ORIGIN_ID, "Launch copy").await.unwrap());
        assert!(!store.update_label(5, "nope").await.unwrap());

        let list = store.list_versions().await.unwrap();
        assert_eq!(list.versions[0].label, "Launch copy");
        assert_eq!(list.versions[0].files, vec!["a.md"]);
    }

    #[tokio::test]
    async fn reset_origin_restores_committed_content() {
        let dir = TempDir::new().unwrap();
        let committed = HashMap::from([("a.md".to_string(), "committed".to_string())]);
        let store = SnapshotStore::new(
            dir.path().join("versions"),
            dir.path().to_path_buf(),
            SnapshotConfig::default(),
        )
        .await
        .unwrap()
        .with_committed_source(Arc::new(FixedCommitted(committed)));

        write(&dir, "a.md", "first edit").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        write(&dir, "a.md", "second edit").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();

        let entry = store.reset_origin(&paths(&["a.md"])).await.unwrap();
        assert_eq!(entry.id, ORIGIN_ID);
        assert_eq!(read(&dir, "a.md").await, "committed");

        let list = store.list_versions().await.unwrap();
        assert_eq!(list.versions.len(), 1);
        let origin: OriginData = read_json(&store.base_dir().join(ORIGIN_FILE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(origin.contents["a.md"], "committed");
    }

    #[tokio::test]
    async fn create_version_without_tracked_files_records_nothing() {
        let (_dir, store) = setup_test().await;

        assert!(store.create_version(&[]).await.unwrap().is_none());
        assert!(store
            .create_version(&paths(&["missing.md"]))
            .await
            .unwrap()
            .is_none());

        let list = store.list_versions().await.unwrap();
        assert!(list.versions.is_empty());
        assert_eq!(list.checkpoint_id, None);
        assert!(!store.base_dir().join(ORIGIN_FILE).exists());
    }

    #[tokio::test]
    async fn storage_warning_does_not_fail_version() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(
            dir.path().join(".pagedit/versions"),
            dir.path().to_path_buf(),
            SnapshotConfig {
                storage_warn_bytes: 1,
            },
        )
        .await
        .unwrap()
        .with_committed_source(Arc::new(NoCommitted));

        write(&dir, "a.md", "over the limit").await;
        let entry = store.create_version(&paths(&["a.md"])).await.unwrap();
        assert_eq!(entry.map(|e| e.id), Some(ORIGIN_ID));
    }

    #[tokio::test]
    async fn delete_all_keeps_unrelated_dirs() {
        let (dir, store) = setup_test().await;
        write(&dir, "a.md", "a").await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        write(&dir, "a.md", "b").await;
        store.create_version(&paths(&["a.md"])).await.unwrap();

        for name in ["vendor", "views", "v1.tmp"] {
            fs::create_dir_all(store.base_dir().join(name)).await.unwrap();
        }

        store.delete_all_versions().await.unwrap();
        assert!(store.base_dir().join("vendor").is_dir());
        assert!(store.base_dir().join("views").is_dir());
        assert!(!store.base_dir().join("v1.tmp").exists());
        assert!(!store.version_dir(1).exists());
        assert!(store.version_dir(ORIGIN_ID).exists());
    }

    #[test]
    fn version_dir_names() {
        assert!(is_version_dir("v0"));
        assert!(is_version_dir("v12"));
        assert!(is_version_dir("v3.tmp"));
        assert!(!is_version_dir("v"));
        assert!(!is_version_dir("vendor"));
        assert!(!is_version_dir("v1a"));
        assert!(!is_version_dir("v.tmp"));
    }

    #[tokio::test]
    async fn relative_project_root_is_made_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let dir = TempDir::new_in(&cwd).unwrap();
        let name = dir.path().file_name().unwrap();
        let store = SnapshotStore::new(
            dir.path().join(".pagedit/versions"),
            PathBuf::from(name),
            SnapshotConfig::default(),
        )
        .await
        .unwrap()
        .with_committed_source(Arc::new(NoCommitted));

        assert!(store.project_root().is_absolute());
        assert_eq!(store.project_root(), normalize(&cwd.join(name)));

        write(&dir, "a.md", "a").await;
        let entry = store
            .create_version(&[dir.path().join("a.md")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.files, vec!["a.md".to_string()]);
    }

    #[tokio::test]
    async fn storage_size_counts_snapshot_bytes() {
        let (dir, store) = setup_test().await;
        assert_eq!(store.storage_size().await.unwrap(), 0);

        write(&dir, "a.md", &"x".repeat(1000)).await;
        store.create_baseline(&paths(&["a.md"])).await.unwrap();
        assert!(store.storage_size().await.unwrap() >= 2000);
    }
}
