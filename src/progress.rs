//! Progress reporting seam.
//!
//! The pipeline performs no direct console I/O; it reports through an
//! injected observer so headless runs and tests stay silent.

use tracing::info;

/// Pipeline stage a progress tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// One stopover query per (day, station) pair.
    Discovery,
    /// One detail fetch per unique trip id.
    TripDetail,
}

/// Observer invoked once per unit of work, with its 1-based index.
pub trait Progress: Send + Sync {
    fn on_progress(&self, stage: Stage, index: usize, total: usize);
}

/// Default observer, reporting through `tracing`.
pub struct LogProgress;

impl Progress for LogProgress {
    fn on_progress(&self, stage: Stage, index: usize, total: usize) {
        match stage {
            Stage::Discovery => info!(index, total, "stopover query"),
            Stage::TripDetail => info!(index, total, "trip detail"),
        }
    }
}

/// Observer that discards all ticks.
pub struct NullProgress;

impl Progress for NullProgress {
    fn on_progress(&self, _stage: Stage, _index: usize, _total: usize) {}
}
