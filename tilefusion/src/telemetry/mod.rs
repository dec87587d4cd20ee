//! Run counters.
//!
//! Cheap atomic counters shared across fusion workers. Sampled at channel
//! boundaries for progress logging and exposed to callers through
//! [`FusionMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters accumulated over one fusion run.
#[derive(Debug, Default)]
pub struct FusionMetrics {
    units_fused: AtomicU64,
    units_skipped: AtomicU64,
    tiles_composited: AtomicU64,
    blocks_written: AtomicU64,
    bytes_written: AtomicU64,
    channels_completed: AtomicU64,
}

impl FusionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unit_fused(&self, tiles: u64) {
        self.units_fused.fetch_add(1, Ordering::Relaxed);
        self.tiles_composited.fetch_add(tiles, Ordering::Relaxed);
    }

    pub fn record_unit_skipped(&self) {
        self.units_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_written(&self, bytes: u64) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_channel_completed(&self) {
        self.channels_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            units_fused: self.units_fused.load(Ordering::Relaxed),
            units_skipped: self.units_skipped.load(Ordering::Relaxed),
            tiles_composited: self.tiles_composited.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            channels_completed: self.channels_completed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub units_fused: u64,
    pub units_skipped: u64,
    pub tiles_composited: u64,
    pub blocks_written: u64,
    pub bytes_written: u64,
    pub channels_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = FusionMetrics::new();
        metrics.record_unit_fused(3);
        metrics.record_unit_fused(2);
        metrics.record_unit_skipped();
        metrics.record_block_written(4096);
        metrics.record_channel_completed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.units_fused, 2);
        assert_eq!(snapshot.units_skipped, 1);
        assert_eq!(snapshot.tiles_composited, 5);
        assert_eq!(snapshot.blocks_written, 1);
        assert_eq!(snapshot.bytes_written, 4096);
        assert_eq!(snapshot.channels_completed, 1);
    }

    #[test]
    fn test_snapshot_is_stable_copy() {
        let metrics = FusionMetrics::new();
        metrics.record_unit_skipped();
        let before = metrics.snapshot();
        metrics.record_unit_skipped();
        assert_eq!(before.units_skipped, 1);
        assert_eq!(metrics.snapshot().units_skipped, 2);
    }
}
