//! The fusion compositor.
//!
//! Given a target output region and the tiles overlapping it, produces one
//! pixel buffer of the requested sample kind. Two overlap-resolution
//! policies are supported:
//!
//! - **Blending** ([`FusionMode::Blending`]): every tile contributes to
//!   every output pixel it covers, weighted by a smooth distance to its own
//!   border; the output is the weighted mean.
//! - **Max-min-distance** ([`FusionMode::MaxMinDistance`]): winner-take-all;
//!   each pixel takes the value of the tile whose interior reaches deepest
//!   at that position.
//!
//! Both modes optionally apply flatfield correction and can restrict the
//! output to verified overlaps via an [`AdjacencyMap`]. A third, simple
//! path ([`simple::fuse_simple_with_downsampling`]) produces quick
//! low-resolution previews without weighting.

mod sampler;
mod simple;
mod weights;

pub use simple::fuse_simple_with_downsampling;

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::adjacency::AdjacencyMap;
use crate::flatfield::FlatfieldPair;
use crate::geometry::{estimate_bounding_box, for_each_pixel, overlap_intervals, Interval};
use crate::tile::{PixelBuffer, SampleKind, Tile, TileSource, TileSourceError};

use sampler::TileSampler;
use weights::blending_weight;

/// Default fraction of a tile's extent that participates in blending.
pub const DEFAULT_BLEND_FRACTION: f64 = 0.2;

/// Overlap-resolution policy for compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionMode {
    /// Weighted blending with a raised-cosine ramp near tile borders.
    Blending { blend_fraction: f64 },
    /// Winner-take-all by largest min-border-distance. Ties keep the
    /// first-processed tile, so the result depends on tile iteration
    /// order for exactly coincident borders.
    MaxMinDistance,
}

impl Default for FusionMode {
    fn default() -> Self {
        FusionMode::Blending {
            blend_fraction: DEFAULT_BLEND_FRACTION,
        }
    }
}

/// Errors that can occur during compositing.
#[derive(Debug, Error)]
pub enum FusionError {
    /// A supplied tile does not intersect the target region. This is a
    /// scheduler bug, never a recoverable condition.
    #[error(
        "tile {tile_index} at {tile_position:?} of size {tile_size:?} does not intersect \
         the output cell at {cell_min:?} of size {cell_dims:?}"
    )]
    TileOutsideCell {
        tile_index: usize,
        tile_position: Vec<f64>,
        tile_size: Vec<i64>,
        cell_min: Vec<i64>,
        cell_dims: Vec<i64>,
    },

    /// The simple fuse path requires a uniform sample kind.
    #[error("cannot fuse tiles of mixed sample kinds: {found:?}")]
    MixedSampleKinds { found: Vec<SampleKind> },

    /// The simple fuse path was given no tiles to determine a kind from.
    #[error("no tiles supplied for fusion")]
    NoTiles,

    /// Downsample factors must leave at least one output sample per axis.
    #[error("invalid downsample factors {factors:?} for cell of size {cell_dims:?}")]
    InvalidDownsampleFactors {
        factors: Vec<i64>,
        cell_dims: Vec<i64>,
    },

    /// Failure loading tile pixel data.
    #[error(transparent)]
    Source(#[from] TileSourceError),
}

/// A tile's placement within a target cell.
struct TilePlacement {
    /// `tile.position - target.min`, real-valued.
    offset: Vec<f64>,
    /// Intersection of tile and cell in cell-local integer coordinates.
    intersection: Interval,
}

/// Place a tile within the target cell using the same transform-aware
/// bounding box the scheduler selects tiles with. Sampling itself is a
/// translation: a tile carrying an affine transform is anchored at its
/// transformed origin, so pure-translation transforms composite exactly
/// and a general affine contributes its translation component.
fn place_tile(tile: &Tile, target: &Interval) -> Result<TilePlacement, FusionError> {
    let bounds = estimate_bounding_box(tile);
    if !overlap_intervals(&bounds, target) {
        return Err(FusionError::TileOutsideCell {
            tile_index: tile.index(),
            tile_position: tile.position().to_vec(),
            tile_size: tile.size().to_vec(),
            cell_min: target.min_slice().to_vec(),
            cell_dims: target.dimensions(),
        });
    }

    let n = target.num_dimensions();
    let origin = match tile.transform() {
        Some(transform) => transform.apply(&vec![0.0; n]),
        None => tile.position().to_vec(),
    };
    let mut offset = vec![0.0; n];
    let mut min = vec![0; n];
    let mut max = vec![0; n];
    for d in 0..n {
        offset[d] = origin[d] - target.min(d) as f64;
        min[d] = bounds.min(d).max(target.min(d)) - target.min(d);
        max[d] = bounds.max(d).min(target.max(d)) - target.min(d);
    }
    Ok(TilePlacement {
        offset,
        intersection: Interval::new(min, max),
    })
}

/// Fuse the given tiles into one pixel buffer covering `target`.
///
/// Every tile must intersect `target`; the caller is expected to have
/// selected the tile set with a bounding-box test. Optional flatfield
/// correction (`v * S + T`) is applied per sample, and an optional
/// adjacency map restricts the output to verified overlaps: a pixel is
/// retained only if at least one pair among its contributing tiles is
/// connected, otherwise it is reset to `background`.
///
/// # Errors
///
/// Returns [`FusionError::TileOutsideCell`] if a tile does not intersect
/// the target region, or a source error if pixel data cannot be loaded.
#[allow(clippy::too_many_arguments)]
pub fn fuse_tiles_within_cell(
    source: &dyn TileSource,
    mode: FusionMode,
    tiles: &[Tile],
    target: &Interval,
    kind: SampleKind,
    background: Option<f64>,
    flatfield: Option<&FlatfieldPair>,
    connections: Option<&AdjacencyMap>,
) -> Result<PixelBuffer, FusionError> {
    match mode {
        FusionMode::Blending { blend_fraction } => fuse_blending(
            source,
            tiles,
            target,
            kind,
            background,
            blend_fraction,
            flatfield,
            connections,
        ),
        FusionMode::MaxMinDistance => fuse_max_min_distance(
            source,
            tiles,
            target,
            kind,
            background,
            flatfield,
            connections,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn fuse_blending(
    source: &dyn TileSource,
    tiles: &[Tile],
    target: &Interval,
    kind: SampleKind,
    background: Option<f64>,
    blend_fraction: f64,
    flatfield: Option<&FlatfieldPair>,
    connections: Option<&AdjacencyMap>,
) -> Result<PixelBuffer, FusionError> {
    let dims = target.dimensions();
    let len = target.num_elements() as usize;

    // Running weighted sum and weight sum over the whole cell.
    let mut weights = vec![0.0f32; len];
    let mut values = vec![0.0f32; len];
    let mut contributors: Option<Vec<HashSet<usize>>> =
        connections.map(|_| vec![HashSet::new(); len]);

    for tile in tiles {
        let placement = place_tile(tile, target)?;
        debug!(
            tile = tile.index(),
            path = tile.source_path(),
            "loading tile for blending"
        );
        let raw = source.load_tile(tile)?;
        let tile_sampler = TileSampler::new(&raw, tile.size(), &placement.offset);
        let field_samplers = flatfield.map(|pair| {
            (
                TileSampler::with_clamp(
                    pair.scale(),
                    pair.scale().dims(),
                    tile.size(),
                    &placement.offset,
                ),
                TileSampler::with_clamp(
                    pair.offset(),
                    pair.offset().dims(),
                    tile.size(),
                    &placement.offset,
                ),
            )
        });

        let mut local = vec![0.0; dims.len()];
        for_each_pixel(&placement.intersection, &dims, |index, position| {
            let mut value = tile_sampler.sample(position);
            if let Some((scale, offset_field)) = &field_samplers {
                value = value * scale.sample(position) + offset_field.sample(position);
            }

            for d in 0..local.len() {
                local[d] = position[d] as f64 - placement.offset[d];
            }
            let weight = blending_weight(&local, tile.size(), blend_fraction);

            weights[index] += weight as f32;
            values[index] += (value * weight) as f32;
            if let Some(contributors) = contributors.as_mut() {
                contributors[index].insert(tile.index());
            }
        });
    }

    let fill = background.unwrap_or(0.0);
    let mut out = PixelBuffer::new(kind, len);
    for i in 0..len {
        let weight = weights[i];
        out.set(
            i,
            if weight == 0.0 {
                fill
            } else {
                (values[i] / weight) as f64
            },
        );
    }

    if let (Some(contributors), Some(map)) = (&contributors, connections) {
        retain_connected_pixels(&mut out, contributors, map, fill);
    }
    Ok(out)
}

fn fuse_max_min_distance(
    source: &dyn TileSource,
    tiles: &[Tile],
    target: &Interval,
    kind: SampleKind,
    background: Option<f64>,
    flatfield: Option<&FlatfieldPair>,
    connections: Option<&AdjacencyMap>,
) -> Result<PixelBuffer, FusionError> {
    let dims = target.dimensions();
    let len = target.num_elements() as usize;

    let fill = background.unwrap_or(0.0);
    let mut out = PixelBuffer::new(kind, len);
    out.fill(fill);

    // Largest min-border-distance seen per pixel, plus whether any tile
    // has claimed the pixel at all (so a zero-distance border sample still
    // wins over the background but never steals an exact tie).
    let mut distances = vec![0.0f32; len];
    let mut claimed = vec![false; len];
    let mut contributors: Option<Vec<HashSet<usize>>> =
        connections.map(|_| vec![HashSet::new(); len]);

    for tile in tiles {
        let placement = place_tile(tile, target)?;
        debug!(
            tile = tile.index(),
            path = tile.source_path(),
            "loading tile for max-min-distance fusion"
        );
        let raw = source.load_tile(tile)?;
        let tile_sampler = TileSampler::new(&raw, tile.size(), &placement.offset);
        let field_samplers = flatfield.map(|pair| {
            (
                TileSampler::with_clamp(
                    pair.scale(),
                    pair.scale().dims(),
                    tile.size(),
                    &placement.offset,
                ),
                TileSampler::with_clamp(
                    pair.offset(),
                    pair.offset().dims(),
                    tile.size(),
                    &placement.offset,
                ),
            )
        });

        for_each_pixel(&placement.intersection, &dims, |index, position| {
            // Raw min axis-wise distance to the tile's own border, in
            // tile-local coordinates; not smoothed.
            let mut min_distance = f64::MAX;
            for d in 0..dims.len() {
                let p = position[d] as f64;
                let dx = (p - placement.offset[d])
                    .min((tile.size()[d] - 1) as f64 + placement.offset[d] - p);
                if dx < min_distance {
                    min_distance = dx;
                }
            }

            let distance = min_distance as f32;
            if distance > distances[index] || (!claimed[index] && distance >= distances[index]) {
                distances[index] = distance;
                claimed[index] = true;
                let mut value = tile_sampler.sample(position);
                if let Some((scale, offset_field)) = &field_samplers {
                    value = value * scale.sample(position) + offset_field.sample(position);
                }
                out.set(index, value);
            }
            if let Some(contributors) = contributors.as_mut() {
                contributors[index].insert(tile.index());
            }
        });
    }

    if let (Some(contributors), Some(map)) = (&contributors, connections) {
        retain_connected_pixels(&mut out, contributors, map, fill);
    }
    Ok(out)
}

/// Reset every pixel whose contributor set holds no connected tile pair.
fn retain_connected_pixels(
    out: &mut PixelBuffer,
    contributors: &[HashSet<usize>],
    map: &AdjacencyMap,
    fill: f64,
) {
    for (index, tiles_at_pixel) in contributors.iter().enumerate() {
        if !map.any_connected_pair(tiles_at_pixel) {
            out.set(index, fill);
        }
    }
}
