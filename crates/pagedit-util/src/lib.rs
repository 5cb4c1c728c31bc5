//! Shared utilities for pagedit.
//!
//! This crate provides common utilities used across the pagedit workspace:
//! - Logging setup with tracing
//! - Path utilities for mapping browser-reported files onto the project

pub mod log;
pub mod path;

pub use log::{LogConfig, LogLevel};
