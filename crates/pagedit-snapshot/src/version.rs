//! Version data structures.
//!
//! These types are persisted as JSON and returned verbatim by the HTTP API,
//! so field names follow the camelCase wire format.

use crate::diff::{DiffStats, Hunk};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of the immutable origin version.
pub const ORIGIN_ID: u64 = 0;

/// Label given to the origin version.
pub const ORIGIN_LABEL: &str = "Origin";

/// One recorded version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    /// Project-relative paths, in snapshot order.
    pub files: Vec<String>,
    pub file_count: usize,
}

impl VersionEntry {
    /// Create an entry stamped with the current time.
    pub fn new(id: u64, label: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            label: label.into(),
            file_count: files.len(),
            files,
        }
    }

    pub fn is_origin(&self) -> bool {
        self.id == ORIGIN_ID
    }

    /// Check if this version includes a specific file.
    pub fn contains_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }
}

/// Label for a version created from a save touching `changed` files.
pub fn auto_label(changed: &[String]) -> String {
    match changed {
        [single] => {
            let name = single.rsplit('/').next().unwrap_or(single);
            format!("Updated {}", name)
        }
        _ => format!("Updated {} files", changed.len()),
    }
}

/// Persisted origin contents, kept independently of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginData {
    pub contents: BTreeMap<String, String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Persisted checkpoint pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Option<u64>,
}

/// Manifest listing returned by `list_versions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionList {
    pub versions: Vec<VersionEntry>,
    pub checkpoint_id: Option<u64>,
}

/// Diff of one file between two states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    pub stats: DiffStats,
    pub hunks: Vec<Hunk>,
}

/// A version enriched with its diffs against the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetails {
    #[serde(flatten)]
    pub entry: VersionEntry,
    pub diffs: Vec<FileDiff>,
    pub storage_size: u64,
}

/// Live files compared against the checkpoint snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDiff {
    pub compared_to: Option<u64>,
    pub diffs: Vec<FileDiff>,
}

/// Files written back by a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restored: Vec<String>,
}
