//! Edit payloads sent by the browser.

use pagedit_patch::{is_valid_tag_name, PatchEdit};
use pagedit_util::path::project_relative;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// An edit as received over the wire. Every field is optional so that one
/// malformed entry never rejects a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdit {
    /// Absolute path, or a path relative to the project root.
    #[serde(default)]
    pub file: Option<String>,
    /// `"line:column"`, both 1-indexed.
    #[serde(default)]
    pub loc: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
    /// New outer HTML of the element.
    #[serde(default)]
    pub content: Option<String>,
}

impl RawEdit {
    pub fn new(
        file: impl Into<String>,
        loc: impl Into<String>,
        tag_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file: Some(file.into()),
            loc: Some(loc.into()),
            tag_name: Some(tag_name.into()),
            content: Some(content.into()),
        }
    }
}

/// An edit that passed validation, bound to a project-relative file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEdit {
    pub file: PathBuf,
    pub edit: PatchEdit,
}

/// Parse `"line:column"` into its two numbers.
pub fn parse_loc(loc: &str) -> Option<(usize, usize)> {
    let (line, column) = loc.split_once(':')?;
    Some((line.trim().parse().ok()?, column.trim().parse().ok()?))
}

/// Decode a JSON array body, dropping entries that are not edit objects.
pub fn from_values(values: Vec<Value>) -> Vec<RawEdit> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value(value) {
            Ok(edit) => Some(edit),
            Err(e) => {
                warn!(index = idx, "Skipping malformed edit: {}", e);
                None
            }
        })
        .collect()
}

/// Validate a raw edit against the project root.
///
/// `root` should be absolute. Absolute file paths that only match `root`
/// after resolving symlinks are accepted when the file exists.
///
/// Returns `None`, after logging a warning, when the location, file or tag
/// name is missing or malformed, or the file lies outside `root`.
pub fn validate(raw: RawEdit, root: &Path) -> Option<ValidEdit> {
    let Some((line, column)) = raw.loc.as_deref().and_then(parse_loc) else {
        warn!(loc = ?raw.loc, "Skipping edit with invalid loc");
        return None;
    };

    let Some(file) = raw.file.as_deref().filter(|f| !f.is_empty()) else {
        warn!(loc = ?raw.loc, "Skipping edit without a file");
        return None;
    };
    let relative = project_relative(Path::new(file), root).or_else(|| {
        let file = Path::new(file).canonicalize().ok()?;
        project_relative(&file, &root.canonicalize().ok()?)
    });
    let Some(relative) = relative else {
        warn!(file, "Skipping edit for a file outside the project");
        return None;
    };

    let tag_name = match raw.tag_name {
        Some(tag) if is_valid_tag_name(&tag) => tag.to_ascii_lowercase(),
        other => {
            warn!(file, tag = ?other, "Skipping edit with invalid tag name");
            return None;
        }
    };

    let Some(content) = raw.content else {
        warn!(file, "Skipping edit without content");
        return None;
    };

    Some(ValidEdit {
        file: relative,
        edit: PatchEdit {
            line,
            column,
            tag_name,
            content,
        },
    })
}
