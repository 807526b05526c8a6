//! Configuration module for onionshot
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Command-line flags are applied on top by the binary.
//!
//! # Example
//!
//! ```no_run
//! use onionshot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("onionshot.toml")).unwrap();
//! println!("Scanning targets from: {}", config.input.targets.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CaptureConfig, InputConfig, OutputConfig, ProxyConfig, RunnerConfig, ScanConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::{validate, MAX_WORKERS};
