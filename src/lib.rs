//! Onionshot: document and snapshot capture through an anonymizing proxy
//!
//! This crate reads a list of targets, fetches each target's raw document
//! over a SOCKS proxy, optionally renders a full-page snapshot through a
//! headless browser routed over the same proxy, and records every event in
//! a crash-safe run log. A failed snapshot never discards a saved document.

pub mod config;
pub mod output;
pub mod scanner;
pub mod state;
pub mod targets;
pub mod transport;

use std::path::PathBuf;
use thiserror::Error;

/// Fatal error type for a scan run
///
/// Every variant aborts the run. Per-target failures are never represented
/// here; they are caught at the target boundary and counted in the tally.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot read target list {path}: {source}")]
    TargetList {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("target list is empty")]
    NoTargets,

    #[error("invalid proxy endpoint '{endpoint}': {reason}")]
    ProxyConfigInvalid { endpoint: String, reason: String },

    #[error("proxy {endpoint} unreachable: {source}")]
    ProxyUnreachable {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("cannot open {path}: {source}")]
    RunLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("output directory {path} unavailable: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ScanError {
    /// Process exit code for this fatal condition
    ///
    /// Each fatal kind maps to its own code so wrapper scripts can tell
    /// them apart. Zero is reserved for runs that reached the summary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::TargetList { .. } => 2,
            Self::NoTargets => 3,
            Self::ProxyConfigInvalid { .. } => 4,
            Self::ProxyUnreachable { .. } => 5,
            Self::RunLog { .. } => 6,
            Self::OutputDir { .. } => 7,
            Self::Config(_) => 8,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::ScanConfig;
pub use output::{artifact_basename, ArtifactRecord, RunLog, Tally};
pub use scanner::{run_scan, CaptureError, FetchError, Orchestrator, TargetOutcome};
pub use state::{RunState, TargetState};
pub use targets::{load_targets, parse_targets, Target};
pub use transport::{provision, ProxyEndpoint, Transport};
