//! Output module for scan artifacts and records
//!
//! This module handles:
//! - Deterministic artifact naming
//! - Output directory layout and atomic artifact writes
//! - The crash-safe run log
//! - The per-run success/failure tally

mod artifacts;
mod naming;
mod run_log;
pub mod stats;

pub use artifacts::{write_artifact, ArtifactRecord, OutputLayout, WriteError};
pub use naming::{artifact_basename, HASH_BYTES, PREFIX_MAX_LEN};
pub use run_log::{LogTag, RunLog};
pub use stats::Tally;
