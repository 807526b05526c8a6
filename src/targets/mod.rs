//! Target list handling
//!
//! A target list is newline-delimited text. Blank lines and `#` comments are
//! skipped, and a leading `-` is tolerated so YAML-style lists load as-is:
//!
//! ```text
//! # onion services
//! - http://example.onion/
//! http://another.onion/index.html
//! ```

use crate::ScanError;
use std::fmt;
use std::path::Path;

/// One identifier to fetch and optionally snapshot
///
/// Targets are opaque: they are never normalized or validated as URLs, and
/// duplicates are kept in their original order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses target list text, preserving order
///
/// Returns an empty vector when nothing survives filtering; callers decide
/// whether that is fatal.
pub fn parse_targets(content: &str) -> Vec<Target> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_prefix('-').unwrap_or(line).trim())
        .filter(|line| !line.is_empty())
        .map(Target::new)
        .collect()
}

/// Reads and parses a target list file
///
/// # Returns
///
/// * `Ok(Vec<Target>)` - At least one target, in file order
/// * `Err(ScanError::TargetList)` - The file could not be read
/// * `Err(ScanError::NoTargets)` - Only blanks and comments remained
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|source| ScanError::TargetList {
        path: path.to_path_buf(),
        source,
    })?;

    let targets = parse_targets(&content);
    if targets.is_empty() {
        return Err(ScanError::NoTargets);
    }

    Ok(targets)
}
