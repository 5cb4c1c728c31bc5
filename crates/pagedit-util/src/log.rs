//! Logging setup using tracing.
//!
//! This module provides consistent logging configuration across pagedit.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose output is governed by the configured level.
const CRATES: &[&str] = &[
    "pagedit",
    "pagedit_server",
    "pagedit_snapshot",
    "pagedit_patch",
    "pagedit_util",
];

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level for the pagedit crates.
    pub level: LogLevel,
    /// Raise every pagedit crate and HTTP request logging to debug.
    pub verbose: bool,
    /// Whether to emit ANSI colors.
    pub ansi: bool,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            verbose: false,
            ansi: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Build the `EnvFilter` directive string used when `RUST_LOG` is unset.
    pub fn filter_directives(&self) -> String {
        let level = if self.verbose {
            LogLevel::Debug
        } else {
            self.level
        };

        let mut directives: Vec<String> = CRATES
            .iter()
            .map(|name| format!("{}={}", name, level.as_str()))
            .collect();
        directives.push(format!(
            "tower_http={}",
            if self.verbose { "debug" } else { "info" }
        ));
        directives.join(",")
    }
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over the configured level. Logs are written to stderr.
pub fn init(config: LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(config.ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
