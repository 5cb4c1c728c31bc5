//! Configuration loading.
//!
//! Loading order (later sources override earlier):
//! 1. Global config from `~/.config/pagedit/config.json`
//! 2. Project config: `pagedit.jsonc` or `pagedit.json` in the project root
//!
//! Command-line flags are applied on top by the caller.

use pagedit_util::log::LogLevel;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default version storage directory, relative to the project root.
pub const DEFAULT_VERSIONS_DIR: &str = ".pagedit/versions";

/// Storage size above which a warning is logged after each save.
pub const DEFAULT_STORAGE_WARN_MB: u64 = 5;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {message}")]
    InvalidJson { path: String, message: String },
}

/// Settings read from config files. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the edit server binds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<SocketAddr>,

    /// Version storage directory; relative paths are taken from the project
    /// root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions_dir: Option<PathBuf>,

    /// Storage warning threshold in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_warn_mb: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration for a project.
    ///
    /// Returns the merged config and the files it was read from.
    pub async fn load(project_dir: &Path) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let global_dir = pagedit_util::path::config_dir();
        Self::load_from(global_dir.as_deref(), project_dir).await
    }

    async fn load_from(
        global_dir: Option<&Path>,
        project_dir: &Path,
    ) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(dir) = global_dir {
            let path = dir.join("config.json");
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        for name in &["pagedit.jsonc", "pagedit.json"] {
            let path = project_dir.join(name);
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
                break;
            }
        }

        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Merge another config into this one. Values in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            address: other.address.or(self.address),
            versions_dir: other.versions_dir.or(self.versions_dir),
            storage_warn_mb: other.storage_warn_mb.or(self.storage_warn_mb),
            log_level: other.log_level.or(self.log_level),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)))
    }

    /// Resolve the versions directory against the project root.
    pub fn versions_dir(&self, project_root: &Path) -> PathBuf {
        let dir = self
            .versions_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VERSIONS_DIR));
        if dir.is_absolute() {
            dir
        } else {
            project_root.join(dir)
        }
    }

    pub fn storage_warn_bytes(&self) -> u64 {
        self.storage_warn_mb
            .unwrap_or(DEFAULT_STORAGE_WARN_MB)
            .saturating_mul(1024 * 1024)
    }

    /// The configured log level; unknown names fall back to info.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or_default()
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> Result<Self, ConfigError> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }
}

/// Strip `//` and `/* */` comments outside of strings.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            result.push(c);
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                chars.next();
                if chars.by_ref().any(|c| c == '\n') {
                    result.push('\n');
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // keep line numbers stable for parse errors
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}
