//! Version history for pagedit.
//!
//! Every save records a complete copy of the tracked files:
//! - Version 0 is the immutable origin, taken from committed contents
//! - A checkpoint marks the version the live files are compared against
//! - Any version can be diffed, relabelled, restored or deleted
//!
//! # Example
//!
//! ```no_run
//! use pagedit_snapshot::{SnapshotConfig, SnapshotStore};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SnapshotStore::new(
//!     PathBuf::from(".pagedit/versions"),
//!     PathBuf::from("/project/root"),
//!     SnapshotConfig::default(),
//! ).await?;
//!
//! // Record the starting point
//! store.create_baseline(&[PathBuf::from("src/pages/index.astro")]).await?;
//!
//! // ... save edits to the file ...
//!
//! if let Some(version) = store.create_version(&[PathBuf::from("src/pages/index.astro")]).await? {
//!     println!("Saved as version {}", version.id);
//! }
//!
//! // Go back to the origin
//! store.restore_version(0).await?;
//! # Ok(())
//! # }
//! ```

pub mod diff;
mod error;
mod store;
pub mod vcs;
mod version;

pub use diff::{diff_lines, format_diff, DiffLine, DiffResult, DiffStats, Hunk, LineKind};
pub use error::{SnapshotError, SnapshotResult};
pub use store::{SnapshotConfig, SnapshotStore};
pub use vcs::{CommittedSource, GitHead, NoCommitted};
pub use version::{
    auto_label, CurrentDiff, FileDiff, OriginData, RestoreReport, VersionDetails, VersionEntry,
    VersionList, ORIGIN_ID, ORIGIN_LABEL,
};
