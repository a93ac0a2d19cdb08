//! Glob expansion for watch patterns.

use std::path::PathBuf;

/// Expand `pattern` into the set of currently existing matching paths.
///
/// Standard glob semantics (`*`, `?`, bracket classes) with no implicit
/// recursion. A pattern that matches nothing yields an empty set, which is
/// not an error. Matches that cannot be read while walking the pattern are
/// skipped with a warning. An invalid pattern logs at error severity and
/// yields nothing; configuration validation normally rejects those before a
/// scan ever sees them.
pub fn matching_paths(pattern: &str) -> Vec<PathBuf> {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Invalid watch pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => tracing::warn!("Skipping unreadable match for {}: {}", pattern, e),
        }
    }
    paths
}
