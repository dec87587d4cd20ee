//! Fusion run orchestration.
//!
//! Splits the fused volume into work units, fans them out over a thread
//! pool and writes the resulting blocks to a [`ChunkedStore`]. Work units
//! are whole multiples of the storage chunk, so the chunk sets touched by
//! distinct units are disjoint and every block is written exactly once.
//! Channels whose output dataset already exists are skipped, which makes
//! an interrupted run resumable by simply running it again.

mod grid;

pub use grid::{
    chunk_grid_position, grid_offset, normalize_voxel_spacing, optimal_chunk_size, work_unit_size,
};

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::adjacency::AdjacencyMap;
use crate::flatfield::FlatfieldPair;
use crate::fusion::{fuse_tiles_within_cell, FusionError, FusionMode};
use crate::geometry::{divide_space, estimate_bounding_box, find_tiles_within_region, Interval};
use crate::storage::{ChunkedStore, Compression, DatasetAttributes, StoreError};
use crate::telemetry::FusionMetrics;
use crate::tile::{SampleKind, Tile, TileSource};

/// Upper bound on the number of parallel work units per channel. Above
/// this the per-unit bookkeeping dominates, so neighboring units are
/// batched onto one task instead.
pub const MAX_WORK_UNITS: usize = 15_000;

/// Default chunk extent along the finest-resolution axis.
pub const DEFAULT_CHUNK_BASE: i64 = 128;

/// Settings for one fusion run.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Overlap-resolution policy.
    pub mode: FusionMode,
    /// Target chunk extent along the finest axis; coarser axes get
    /// proportionally smaller chunks.
    pub chunk_base: i64,
    /// Physical voxel spacing override. Taken from the tiles' recorded
    /// resolution when absent.
    pub voxel_spacing: Option<Vec<f64>>,
    /// Value for output pixels no tile covers. Defaults to zero.
    pub background: Option<f64>,
    /// Restrict fusion to this region, expressed relative to the lower
    /// corner of the tiles' union bounding box.
    pub region_of_interest: Option<Interval>,
    /// Keep only pixels covered by a verified tile-pair overlap. Requires
    /// an adjacency map on every channel.
    pub export_overlaps: bool,
    /// Cap on per-channel task granularity.
    pub max_work_units: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            mode: FusionMode::default(),
            chunk_base: DEFAULT_CHUNK_BASE,
            voxel_spacing: None,
            background: None,
            region_of_interest: None,
            export_overlaps: false,
            max_work_units: MAX_WORK_UNITS,
        }
    }
}

/// One channel's inputs.
///
/// The flatfield and adjacency tables are shared with every worker thread,
/// so they are handed over as `Arc`s.
#[derive(Clone)]
pub struct ChannelInput {
    pub tiles: Vec<Tile>,
    pub flatfield: Option<Arc<FlatfieldPair>>,
    pub adjacency: Option<Arc<AdjacencyMap>>,
}

/// Errors aborting a fusion run.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no channels to fuse")]
    NoChannels,

    #[error("channel {channel} has no tiles")]
    EmptyChannel { channel: usize },

    #[error("channel {channel} mixes sample kinds")]
    MixedSampleKinds { channel: usize },

    #[error("channel {channel} mixes tile dimensionalities")]
    DimensionMismatch { channel: usize },

    #[error("channel {channel} has no adjacency map but overlaps-only export was requested")]
    MissingAdjacency { channel: usize },

    #[error("region of interest does not intersect the tiles' bounding box")]
    EmptyRegionOfInterest,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fusion(#[from] FusionError),
}

/// Runs fusion over all channels of an acquisition.
pub struct FusionScheduler<'a> {
    store: &'a dyn ChunkedStore,
    source: &'a dyn TileSource,
    config: FusionConfig,
    metrics: Arc<FusionMetrics>,
}

impl<'a> FusionScheduler<'a> {
    pub fn new(store: &'a dyn ChunkedStore, source: &'a dyn TileSource, config: FusionConfig) -> Self {
        Self {
            store,
            source,
            config,
            metrics: Arc::new(FusionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<FusionMetrics> {
        &self.metrics
    }

    /// Dataset path of one channel's full-resolution output.
    pub fn dataset_path(&self, channel: usize) -> String {
        let prefix = if self.config.export_overlaps {
            "overlaps/"
        } else {
            ""
        };
        format!("{prefix}c{channel}/s0")
    }

    /// Fuse every channel and return the achieved per-axis chunk size.
    ///
    /// The grid is derived once from the union of all channels' tiles, so
    /// the channels of one acquisition line up block for block. Channels
    /// whose dataset already exists are left untouched.
    pub fn run(&self, channels: &[ChannelInput]) -> Result<Vec<i64>, ScheduleError> {
        if channels.is_empty() {
            return Err(ScheduleError::NoChannels);
        }
        let kinds = validate_channels(channels, self.config.export_overlaps)?;

        // Tile sizes are uniform within an acquisition; the first tile
        // stands in for all of them when sizing work units.
        let reference = &channels[0].tiles[0];
        let n = reference.num_dimensions();
        let spacing = match &self.config.voxel_spacing {
            Some(spacing) => spacing.clone(),
            None if reference.pixel_resolution().is_empty() => vec![1.0; n],
            None => reference.pixel_resolution().to_vec(),
        };
        let normalized = normalize_voxel_spacing(&spacing);
        let chunk = optimal_chunk_size(self.config.chunk_base, &normalized);
        let unit = work_unit_size(&chunk, reference.size());

        let boxes: Vec<Interval> = channels
            .iter()
            .flat_map(|channel| channel.tiles.iter())
            .map(estimate_bounding_box)
            .collect();
        let mut bbox = crate::geometry::bounding_box(&boxes).ok_or(ScheduleError::NoChannels)?;
        if let Some(roi) = &self.config.region_of_interest {
            let world = roi.translate(bbox.min_slice());
            let within = crate::geometry::intersection_region(&bbox, &world)
                .ok_or(ScheduleError::EmptyRegionOfInterest)?;
            bbox = within.translate(bbox.min_slice());
        }

        let cells = divide_space(&bbox, &unit);
        // Grid positions are array-relative: subtracting the bounding-box
        // min before dividing keeps the coordinates non-negative, so
        // truncating division cannot collapse two units onto one chunk.
        let positions: Vec<Vec<i64>> = cells
            .iter()
            .map(|cell| chunk_grid_position(cell.interval().min_slice(), &chunk, bbox.min_slice()))
            .collect();
        let offset = grid_offset(positions.iter().map(|p| p.as_slice()))
            .ok_or(ScheduleError::NoChannels)?;
        let min_len = (cells.len() + self.config.max_work_units - 1)
            / self.config.max_work_units.max(1);

        info!(
            channels = channels.len(),
            work_units = cells.len(),
            chunk = ?chunk,
            unit = ?unit,
            bounding_box = ?bbox.dimensions(),
            "starting fusion run"
        );

        for (index, channel) in channels.iter().enumerate() {
            let path = self.dataset_path(index);
            if self.store.dataset_exists(&path)? {
                info!(channel = index, path = %path, "dataset exists, skipping channel");
                continue;
            }
            self.store.create_dataset(
                &path,
                &DatasetAttributes::new(
                    bbox.dimensions(),
                    chunk.clone(),
                    kinds[index],
                    Compression::Gzip,
                ),
            )?;

            // Shared lookup tables for this channel's workers, released as
            // soon as the channel is done. Unit-to-tile assignment goes
            // through the transform-aware bounding boxes, the same geometry
            // the dataset extent was derived from.
            let flatfield = channel.flatfield.clone();
            let adjacency = if self.config.export_overlaps {
                channel.adjacency.clone()
            } else {
                None
            };
            let tile_boxes: HashMap<usize, Interval> = channel
                .tiles
                .iter()
                .map(|tile| (tile.index(), estimate_bounding_box(tile)))
                .collect();
            let tiles_by_index: HashMap<usize, Tile> = channel
                .tiles
                .iter()
                .map(|tile| (tile.index(), tile.clone()))
                .collect();

            cells
                .par_iter()
                .zip(positions.par_iter())
                .with_min_len(min_len.max(1))
                .try_for_each(|(cell, position)| {
                    self.fuse_unit(
                        &tiles_by_index,
                        &tile_boxes,
                        kinds[index],
                        cell.interval(),
                        position,
                        &offset,
                        &path,
                        flatfield.as_deref(),
                        adjacency.as_deref(),
                    )
                })?;

            drop(flatfield);
            drop(adjacency);
            self.metrics.record_channel_completed();
            let snapshot = self.metrics.snapshot();
            info!(
                channel = index,
                path = %path,
                units_fused = snapshot.units_fused,
                units_skipped = snapshot.units_skipped,
                blocks_written = snapshot.blocks_written,
                "channel complete"
            );
        }

        Ok(chunk)
    }

    #[allow(clippy::too_many_arguments)]
    fn fuse_unit(
        &self,
        tiles: &HashMap<usize, Tile>,
        tile_boxes: &HashMap<usize, Interval>,
        kind: SampleKind,
        cell: &Interval,
        position: &[i64],
        offset: &[i64],
        path: &str,
        flatfield: Option<&FlatfieldPair>,
        adjacency: Option<&AdjacencyMap>,
    ) -> Result<(), ScheduleError> {
        let within: Vec<Tile> = find_tiles_within_region(tile_boxes, cell)
            .iter()
            .filter_map(|index| tiles.get(index))
            .cloned()
            .collect();
        if within.is_empty() {
            self.metrics.record_unit_skipped();
            return Ok(());
        }

        debug!(path = %path, cell = ?cell.min_slice(), tiles = within.len(), "fusing work unit");
        let fused = fuse_tiles_within_cell(
            self.source,
            self.config.mode,
            &within,
            cell,
            kind,
            self.config.background,
            flatfield,
            adjacency,
        )?;
        self.metrics.record_unit_fused(within.len() as u64);

        let grid: Vec<i64> = position.iter().zip(offset).map(|(p, o)| p - o).collect();
        let bytes = fused.byte_len() as u64;
        self.store.write_block(path, &grid, fused)?;
        self.metrics.record_block_written(bytes);
        Ok(())
    }
}

fn validate_channels(
    channels: &[ChannelInput],
    export_overlaps: bool,
) -> Result<Vec<SampleKind>, ScheduleError> {
    let mut kinds = Vec::with_capacity(channels.len());
    for (index, channel) in channels.iter().enumerate() {
        let first = channel
            .tiles
            .first()
            .ok_or(ScheduleError::EmptyChannel { channel: index })?;
        if channel
            .tiles
            .iter()
            .any(|tile| tile.sample() != first.sample())
        {
            return Err(ScheduleError::MixedSampleKinds { channel: index });
        }
        if channel
            .tiles
            .iter()
            .any(|tile| tile.num_dimensions() != first.num_dimensions())
        {
            return Err(ScheduleError::DimensionMismatch { channel: index });
        }
        if export_overlaps && channel.adjacency.is_none() {
            return Err(ScheduleError::MissingAdjacency { channel: index });
        }
        kinds.push(first.sample());
    }
    Ok(kinds)
}
