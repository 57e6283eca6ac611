//! Scan progress reporting and outcome counters.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Entries read from directories so far.
    pub entries_seen: u64,
    /// Nodes created and kept so far.
    pub nodes_added: u64,
    /// Directories entered so far.
    pub dirs_scanned: u64,
    /// Directory being read.
    pub current_path: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            entries_seen: 0,
            nodes_added: 0,
            dirs_scanned: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to the entries of one scan.
///
/// None of the skip counters represent errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries read, excluding `.` and `..`.
    pub entries_seen: u64,
    /// Directories entered, including the starting one.
    pub dirs_scanned: u64,
    /// Nodes created and kept.
    pub added: u64,
    /// Nodes created and then discarded by the callback.
    pub pruned: u64,
    /// Entries removed by a type flag.
    pub filtered: u64,
    /// Entries removed because they live on another device.
    pub cross_device: u64,
    /// Directories merged into an existing node under `NoDir`.
    pub merged: u64,
    /// Directories skipped under `NoDir` for lack of an existing node.
    pub merge_missed: u64,
    /// Entries flagged as additional names of an already seen inode.
    pub hard_links: u64,
    /// Entries on a different device than their directory.
    pub mount_points: u64,
    /// Wall time of the scan.
    pub duration: Duration,
}

impl ScanStats {
    /// Total entries that did not end up as new nodes.
    pub fn skipped(&self) -> u64 {
        self.pruned + self.filtered + self.cross_device + self.merge_missed
    }
}

/// Throttled progress publisher for one scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    interval: u64,
    tx: broadcast::Sender<ScanProgress>,
}

impl ProgressTracker {
    pub fn new(tx: broadcast::Sender<ScanProgress>, interval: u64) -> Self {
        Self {
            start_time: Instant::now(),
            interval,
            tx,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Publish a snapshot if `stats.entries_seen` hit the interval.
    pub fn tick(&self, stats: &ScanStats, current: &Path) {
        if self.interval > 0 && stats.entries_seen % self.interval == 0 {
            self.publish(stats, current);
        }
    }

    pub fn publish(&self, stats: &ScanStats, current: &Path) {
        // No subscribers is fine.
        let _ = self.tx.send(ScanProgress {
            entries_seen: stats.entries_seen,
            nodes_added: stats.added,
            dirs_scanned: stats.dirs_scanned,
            current_path: current.to_path_buf(),
            elapsed: self.elapsed(),
        });
    }
}
