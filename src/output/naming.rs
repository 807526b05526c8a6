//! Artifact naming
//!
//! Basenames are `<sanitized prefix>_<short hash>`. The prefix keeps names
//! readable; the hash of the unsanitized target keeps them distinct when two
//! targets collapse to the same prefix.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Maximum length of the human-readable prefix
pub const PREFIX_MAX_LEN: usize = 60;

/// Digest bytes kept in the basename (12 hex characters)
pub const HASH_BYTES: usize = 6;

static NON_SAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").unwrap());

/// Maps a target to a stable, filesystem-safe basename
///
/// Pure and deterministic: the same target yields the same name in every run.
///
/// # Example
///
/// ```
/// use onionshot::artifact_basename;
///
/// let name = artifact_basename("http://example.onion/a b");
/// assert!(name.starts_with("http_example.onion_a_b_"));
/// assert_eq!(name, artifact_basename("http://example.onion/a b"));
/// ```
pub fn artifact_basename(target: &str) -> String {
    let mut prefix = NON_SAFE.replace_all(target, "_").into_owned();
    // Only ASCII survives the replacement, so any byte index is a char boundary
    prefix.truncate(PREFIX_MAX_LEN);

    format!("{}_{}", prefix, short_hash(target))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..HASH_BYTES])
}
