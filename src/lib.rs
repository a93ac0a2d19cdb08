//! Virtual Node Descriptor Watcher
//!
//! This crate watches hypervisor descriptor files for new "add virtual node"
//! requests and emits one event per observed change, never re-emitting a
//! file that has not changed since it was last seen.
//!
//! ## How a change becomes an event
//!
//! ```text
//! Host poll tick
//!        ↓
//! ScanEngine::scan()
//!        ↓
//! matcher (glob expansion per WatchSpec)
//!        ↓
//! ChangeTracker (mtime gate: new-or-changed only)
//!        ↓
//! parser (key/value record + path metadata)
//!        ↓
//! DescriptorEvent { tag, data }
//!        ↓
//! EventSink::deliver() [once per pass]
//! ```
//!
//! The scan core is synchronous and owns no timer: the host decides when to
//! poll, and everything that survives between passes lives in the
//! [`ChangeTracker`](watch::ChangeTracker) the host owns. Per-file failures
//! are logged and isolated within a pass; the only failure a caller ever
//! sees is configuration validation, before any scanning starts.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use virtnode_watcher::prelude::*;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = serde_json::json!([
//!         { "base_path": "/data/hypervisor/hosts/*/add_*" },
//!     ]);
//!     let specs = virtnode_watcher::watch::validate(&config)?;
//!
//!     let engine = ScanEngine::new();
//!     let mut tracker = ChangeTracker::new();
//!
//!     // One poll tick; the host decides the cadence.
//!     let events = engine.scan(&mut tracker, &specs);
//!     for event in &events {
//!         println!("{}: {:?}", event.tag, event.data);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`watch`]: the scan core
//!   - [`watch::config`]: watch specs and configuration validation
//!   - [`watch::engine`]: scan pass orchestration
//!   - [`watch::parser`]: descriptor parsing and path metadata
//!   - [`watch::tracker`]: last-seen modification times
//! - [`sink`]: event delivery seam and broadcast reference sink
//! - [`provision`]: wrappers for the system provisioning scripts

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod provision;
pub mod sink;
pub mod watch;

/// Re-exports for convenience.
pub mod prelude {
    pub use crate::sink::{ChannelSink, EventSink};
    pub use crate::watch::{
        ChangeTracker, ConfigError, DescriptorEvent, DescriptorRecord, ScanEngine, WatchSpec,
    };
}

use sink::EventSink;
use watch::{ChangeTracker, ScanEngine, WatchSpec};

/// Run the host-side scan loop.
///
/// Scans on every tick of `poll_interval_ms` and hands each non-empty batch
/// of events to `sink`. The loop never returns on its own; run it under
/// `tokio::select!` or in a task the host can drop.
///
/// # Arguments
/// * `engine` - The scan engine to drive
/// * `tracker` - The host-owned change tracker
/// * `specs` - Validated watch specs
/// * `sink` - Where each pass's events go
/// * `poll_interval_ms` - Time between scan passes
///
/// # Example
///
/// ```rust,no_run
/// use virtnode_watcher::{prelude::*, run_scan_loop};
///
/// #[tokio::main]
/// async fn main() {
///     let specs = vec![WatchSpec::default()];
///     let engine = ScanEngine::new();
///     let mut tracker = ChangeTracker::new();
///     let (sink, _events) = ChannelSink::new(256);
///
///     run_scan_loop(&engine, &mut tracker, &specs, &sink, 1_000).await;
/// }
/// ```
pub async fn run_scan_loop(
    engine: &ScanEngine,
    tracker: &mut ChangeTracker,
    specs: &[WatchSpec],
    sink: &impl EventSink,
    poll_interval_ms: u64,
) {
    let poll_interval = std::time::Duration::from_millis(poll_interval_ms);

    loop {
        let events = engine.scan(tracker, specs);
        if !events.is_empty() {
            sink.deliver(events);
        }

        tokio::time::sleep(poll_interval).await;
    }
}
