//! Scan pass orchestration.
//!
//! One [`ScanEngine::scan`] call is a pure function of the current
//! filesystem state and the tracker's contents: expand each spec's pattern,
//! pick out the new-or-changed files, parse them, and return one event per
//! file. Failures are isolated per file and the pass always runs to
//! completion over its matched set.

use crate::watch::config::WatchSpec;
use crate::watch::matcher;
use crate::watch::parser::{self, DescriptorRecord};
use crate::watch::tracker::ChangeTracker;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

/// Tag prefix attached to emitted events when none is configured.
pub const DEFAULT_EVENT_PREFIX: &str = "add_virtual_node";

/// One emitted change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorEvent {
    /// `<prefix>/<base-filename>` of the descriptor that changed.
    pub tag: String,
    /// Parsed descriptor contents plus path-derived metadata.
    pub data: DescriptorRecord,
}

/// Runs scan passes over a set of watch specs.
///
/// The engine holds no per-path state of its own; everything that survives
/// between passes lives in the [`ChangeTracker`] the caller owns and passes
/// in. Scheduling is equally the caller's: `scan` neither sleeps nor spawns,
/// it just walks the matched set once.
#[derive(Debug)]
pub struct ScanEngine {
    event_prefix: String,
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanEngine {
    /// Create an engine tagging events with [`DEFAULT_EVENT_PREFIX`].
    pub fn new() -> Self {
        Self {
            event_prefix: DEFAULT_EVENT_PREFIX.to_string(),
        }
    }

    /// Override the tag prefix attached to emitted events.
    pub fn with_event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.event_prefix = prefix.into();
        self
    }

    /// Run one scan pass over `specs`.
    ///
    /// A matched path produces an event exactly when its mtime is newer than
    /// what `tracker` has recorded for it and its contents could be read in
    /// full. The tracker advances only for paths that produced an event, so
    /// a file that failed to read stays eligible on the next pass. An error
    /// on one file never aborts the rest of the pass; whatever was
    /// successfully produced is returned.
    pub fn scan(&self, tracker: &mut ChangeTracker, specs: &[WatchSpec]) -> Vec<DescriptorEvent> {
        let mut events = Vec::new();

        for spec in specs {
            let pattern = spec.pattern();
            let paths = matcher::matching_paths(pattern);
            tracing::debug!("Found {} files matching pattern {}", paths.len(), pattern);

            for path in paths {
                if let Some(event) = self.scan_path(tracker, &path) {
                    events.push(event);
                }
            }
        }

        events
    }

    /// Process one matched path, returning its event if one is due.
    fn scan_path(&self, tracker: &mut ChangeTracker, path: &Path) -> Option<DescriptorEvent> {
        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Benign race: the file vanished between match and stat.
                tracing::debug!("File {} vanished before stat", path.display());
                return None;
            }
            Err(e) => {
                tracing::error!("Error reading metadata for {}: {}", path.display(), e);
                return None;
            }
        };

        if let Some(prev) = tracker.get(path) {
            if mtime <= prev {
                tracing::debug!(
                    "File {} has not been modified since last check",
                    path.display()
                );
                return None;
            }
        }

        tracing::info!("File {} is new or modified", path.display());

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::error!("Permission denied when accessing file: {}", path.display());
                return None;
            }
            Err(e) => {
                tracing::error!("Error processing file {}: {}", path.display(), e);
                return None;
            }
        };

        let data = parser::parse(path, &contents);
        let tag = format!("{}/{}", self.event_prefix, base_name(path));

        tracker.record(path, mtime);

        Some(DescriptorEvent { tag, data })
    }
}

/// Base file name, lossily decoded; the whole path if it has no final
/// segment.
fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn write_descriptor(root: &Path, hypervisor: &str, name: &str, contents: &str) -> PathBuf {
        let dir = root.join("hosts").join(hypervisor);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn specs_for(root: &Path) -> Vec<WatchSpec> {
        vec![WatchSpec {
            base_path: Some(root.join("hosts/*/add_*").to_string_lossy().into_owned()),
        }]
    }

    fn bump_mtime(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(2))
            .unwrap();
    }

    #[test]
    fn test_emits_one_event_per_new_file() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\nmemory: 8192\n");

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let events = engine.scan(&mut tracker, &specs_for(temp.path()));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, "add_virtual_node/add_sensor");
        assert_eq!(events[0].data.hypervisor.as_deref(), Some("host1"));
        assert_eq!(events[0].data.nodetype.as_deref(), Some("sensor"));
        assert_eq!(events[0].data.fields.get("cpu").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_unchanged_file_is_not_re_emitted() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\n");

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let specs = specs_for(temp.path());

        assert_eq!(engine.scan(&mut tracker, &specs).len(), 1);
        assert!(engine.scan(&mut tracker, &specs).is_empty());
    }

    #[test]
    fn test_modification_triggers_exactly_one_more_event() {
        let temp = tempdir().unwrap();
        let path = write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\n");

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let specs = specs_for(temp.path());

        assert_eq!(engine.scan(&mut tracker, &specs).len(), 1);

        fs::write(&path, "cpu: 8\n").unwrap();
        bump_mtime(&path);

        let events = engine.scan(&mut tracker, &specs);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.fields.get("cpu").map(String::as_str), Some("8"));

        assert!(engine.scan(&mut tracker, &specs).is_empty());
    }

    #[test]
    fn test_unreadable_match_is_isolated_and_stays_eligible() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\n");
        write_descriptor(temp.path(), "host2", "add_manager", "cpu: 8\n");
        // A directory matching the pattern fails the content read.
        let broken = temp.path().join("hosts/host3/add_search");
        fs::create_dir_all(&broken).unwrap();

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let specs = specs_for(temp.path());

        let events = engine.scan(&mut tracker, &specs);
        assert_eq!(events.len(), 2);

        // The failed path was not recorded, so it is retried next pass.
        assert!(tracker.get(&broken).is_none());
        assert!(engine.scan(&mut tracker, &specs).is_empty());
        assert!(tracker.get(&broken).is_none());
    }

    #[test]
    fn test_empty_match_set_produces_no_events() {
        let temp = tempdir().unwrap();

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let events = engine.scan(&mut tracker, &specs_for(temp.path()));

        assert!(events.is_empty());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_scans_every_spec_in_order() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\n");
        let other_root = temp.path().join("other");
        write_descriptor(&other_root, "host9", "add_manager", "cpu: 8\n");

        let engine = ScanEngine::new();
        let mut tracker = ChangeTracker::new();
        let mut specs = specs_for(temp.path());
        specs.extend(specs_for(&other_root));

        let events = engine.scan(&mut tracker, &specs);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tag, "add_virtual_node/add_sensor");
        assert_eq!(events[1].tag, "add_virtual_node/add_manager");
    }

    #[test]
    fn test_custom_event_prefix_shows_up_in_tags() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "host1", "add_sensor", "cpu: 4\n");

        let engine = ScanEngine::new().with_event_prefix("provision");
        let mut tracker = ChangeTracker::new();
        let events = engine.scan(&mut tracker, &specs_for(temp.path()));

        assert_eq!(events[0].tag, "provision/add_sensor");
    }
}
