//! Spatial partitioning and geometry operations.
//!
//! Pure geometric operations on tiles and intervals, no I/O: overlap tests,
//! intersections, bounding boxes, interval padding and the partitioning of a
//! region of space into non-overlapping cells. The scheduler builds its work
//! units from these primitives and the compositor relies on them for the
//! tile-to-cell placement.
//!
//! # Conventions
//!
//! Intervals have inclusive bounds; a tile of size `s` placed at position
//! `p` spans the real box `[p, p + s - 1]`. Flat pixel buffers are indexed
//! with the first axis fastest (`stride[0] = 1`), and partition cells are
//! numbered with the last axis fastest.

mod types;

pub use types::{AffineTransform, Interval, RealInterval};

use std::collections::HashMap;

use crate::tile::Tile;

/// A cell of a space partition: an interval plus its dense index within the
/// partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    index: usize,
    interval: Interval,
}

impl Cell {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }
}

/// An unordered pair of tile indices reported as genuinely overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePair {
    pub first: usize,
    pub second: usize,
}

/// True iff the two real boxes intersect on every axis.
///
/// This is the deliberately strict test used throughout the library: with
/// the inclusive `[p, p + s - 1]` bounds convention, tiles that merely touch
/// at an edge or a corner produce disjoint boxes and are NOT overlapping.
pub fn overlap(a: &RealInterval, b: &RealInterval) -> bool {
    for d in 0..a.num_dimensions() {
        let (min1, max1) = (a.min(d), a.max(d));
        let (min2, max2) = (b.min(d), b.max(d));
        if !((min2 >= min1 && min2 <= max1) || (min1 >= min2 && min1 <= max2)) {
            return false;
        }
    }
    true
}

/// Integer-interval variant of [`overlap`].
pub fn overlap_intervals(a: &Interval, b: &Interval) -> bool {
    overlap(&a.to_real(), &b.to_real())
}

/// True iff the bounding boxes of the two tiles overlap.
pub fn tiles_overlap(t1: &Tile, t2: &Tile) -> bool {
    overlap_intervals(&estimate_bounding_box(t1), &estimate_bounding_box(t2))
}

/// The overlap of two intervals in coordinates relative to `a`, or `None`
/// if they do not overlap.
pub fn intersection_region(a: &Interval, b: &Interval) -> Option<Interval> {
    if !overlap_intervals(a, b) {
        return None;
    }
    let n = a.num_dimensions();
    let mut min = vec![0; n];
    let mut max = vec![0; n];
    for d in 0..n {
        min[d] = 0.max(b.min(d) - a.min(d));
        max[d] = (a.max(d) - a.min(d)).min(b.max(d) - a.min(d));
    }
    Some(Interval::new(min, max))
}

/// The overlap of two tiles in coordinates relative to the first tile.
pub fn overlapping_region(t1: &Tile, t2: &Tile) -> Option<Interval> {
    intersection_region(&estimate_bounding_box(t1), &estimate_bounding_box(t2))
}

/// The overlap of two tiles in world coordinates.
pub fn overlapping_region_global(t1: &Tile, t2: &Tile) -> Option<Interval> {
    let region = overlapping_region(t1, t2)?;
    Some(region.translate(estimate_bounding_box(t1).min_slice()))
}

/// The minimal interval containing all of the given boxes, or `None` on an
/// empty input.
pub fn bounding_box<'a>(boxes: impl IntoIterator<Item = &'a Interval>) -> Option<Interval> {
    let mut iter = boxes.into_iter();
    let first = iter.next()?;
    let mut min = first.min_slice().to_vec();
    let mut max = first.max_slice().to_vec();
    for interval in iter {
        for d in 0..min.len() {
            min[d] = min[d].min(interval.min(d));
            max[d] = max[d].max(interval.max(d));
        }
    }
    Some(Interval::new(min, max))
}

/// The world-space bounding box of a tile as the smallest containing
/// integer interval.
///
/// Tiles carrying an affine transform are transformed from their zero-based
/// bounds; untransformed tiles sit axis-aligned at their world position.
pub fn estimate_bounding_box(tile: &Tile) -> Interval {
    match tile.transform() {
        None => tile.real_bounds().smallest_containing_interval(),
        Some(transform) => {
            let n = tile.num_dimensions();
            let zero_based = RealInterval::new(
                vec![0.0; n],
                (0..n).map(|d| (tile.size()[d] - 1) as f64).collect(),
            );
            transform
                .estimate_bounds(&zero_based)
                .smallest_containing_interval()
        }
    }
}

/// Expand `interval` by `padding / 2` per side, clamped to the outer space
/// `[0, outer_dims - 1]`.
///
/// When the padding is clamped on one side, the unused remainder is pushed
/// to the opposite side (never exceeding the outer space). Odd padding
/// biases the extra unit toward the lower bound.
pub fn pad_interval(interval: &Interval, outer_dims: &[i64], padding: &[i64]) -> Interval {
    let n = interval.num_dimensions();
    let mut padded_min = vec![0; n];
    let mut padded_max = vec![0; n];
    for d in 0..n {
        padded_min[d] = (interval.min(d) - padding[d] / 2).max(0);
        padded_max[d] = (interval.max(d) + padding[d] / 2).min(outer_dims[d] - 1);

        let remainder =
            padding[d] - (interval.min(d) - padded_min[d]) - (padded_max[d] - interval.max(d));
        if remainder > 0 {
            if padded_min[d] == 0 {
                padded_max[d] = (padded_max[d] + remainder).min(outer_dims[d] - 1);
            } else {
                padded_min[d] = (padded_min[d] - remainder).max(0);
            }
        }
    }
    Interval::new(padded_min, padded_max)
}

/// Partition `space` into a grid of non-overlapping cells of `cell_dims`,
/// truncating the final cell per axis to the remaining extent.
///
/// Cells receive dense indices in row-major order over all axes (first axis
/// outermost, last axis fastest).
pub fn divide_space(space: &Interval, cell_dims: &[i64]) -> Vec<Cell> {
    divide_space_with_remainder(space, cell_dims, &vec![0; space.num_dimensions()])
}

/// Partition `space` into exactly `counts[d]` cells along each axis with
/// near-equal sizes: the first `extent - count * base` cells along an axis
/// are one unit larger, so cell sizes differ by at most one unit.
pub fn divide_space_by_count(space: &Interval, counts: &[i64]) -> Vec<Cell> {
    let n = space.num_dimensions();
    let mut cell_dims = vec![0; n];
    let mut plus_one = vec![0; n];
    for d in 0..n {
        cell_dims[d] = space.dimension(d) / counts[d];
        plus_one[d] = space.dimension(d) - counts[d] * cell_dims[d];
    }
    divide_space_with_remainder(space, &cell_dims, &plus_one)
}

fn divide_space_with_remainder(space: &Interval, cell_dims: &[i64], plus_one: &[i64]) -> Vec<Cell> {
    let n = space.num_dimensions();

    // Per-axis segment lists; the first plus_one[d] segments get one extra
    // unit so the remainder is spread over the leading cells.
    let mut segments: Vec<Vec<(i64, i64)>> = Vec::with_capacity(n);
    for d in 0..n {
        let mut axis = Vec::new();
        let mut coord = space.min(d);
        let mut i = 0;
        while coord <= space.max(d) {
            let mut size = cell_dims[d].min(space.max(d) - coord + 1);
            if i < plus_one[d] {
                size += 1;
            }
            axis.push((coord, size));
            coord += size;
            i += 1;
        }
        segments.push(axis);
    }

    let mut cells = Vec::new();
    let mut cursor = vec![0usize; n];
    'grid: loop {
        let mut min = vec![0; n];
        let mut size = vec![0; n];
        for d in 0..n {
            let (coord, extent) = segments[d][cursor[d]];
            min[d] = coord;
            size[d] = extent;
        }
        cells.push(Cell {
            index: cells.len(),
            interval: Interval::from_min_size(&min, &size),
        });

        // Advance with the last axis fastest.
        for d in (0..n).rev() {
            cursor[d] += 1;
            if cursor[d] < segments[d].len() {
                continue 'grid;
            }
            cursor[d] = 0;
        }
        break;
    }
    cells
}

/// All pairs of tiles whose bounding boxes genuinely overlap.
pub fn find_overlapping_tiles(tiles: &[Tile]) -> Vec<TilePair> {
    let boxes: Vec<Interval> = tiles.iter().map(estimate_bounding_box).collect();
    let mut pairs = Vec::new();
    for i in 0..tiles.len() {
        for j in i + 1..tiles.len() {
            if overlap_intervals(&boxes[i], &boxes[j]) {
                pairs.push(TilePair {
                    first: tiles[i].index(),
                    second: tiles[j].index(),
                });
            }
        }
    }
    pairs
}

/// Indices of the tiles whose bounding boxes overlap the given region.
///
/// This is the cheap box test the scheduler runs before loading any pixel
/// data. The result is sorted so that downstream tile iteration order is
/// deterministic.
pub fn find_tiles_within_region(
    boxes: &HashMap<usize, Interval>,
    region: &Interval,
) -> Vec<usize> {
    let mut within: Vec<usize> = boxes
        .iter()
        .filter(|(_, interval)| overlap_intervals(interval, region))
        .map(|(&index, _)| index)
        .collect();
    within.sort_unstable();
    within
}

/// Apply `f` to every pixel of `interval` within a flat buffer laid out
/// over `space_dims`, passing the linear index and the position.
///
/// Traversal is odometer-style with the first axis fastest, matching the
/// flat layout of [`crate::tile::PixelBuffer`].
pub fn for_each_pixel(interval: &Interval, space_dims: &[i64], mut f: impl FnMut(usize, &[i64])) {
    let n = interval.num_dimensions();
    debug_assert_eq!(n, space_dims.len());
    let mut strides = vec![1i64; n];
    for d in 1..n {
        strides[d] = strides[d - 1] * space_dims[d - 1];
    }
    let mut position = interval.min_slice().to_vec();
    'traversal: loop {
        let index: i64 = position.iter().zip(&strides).map(|(p, s)| p * s).sum();
        f(index as usize, &position);
        for d in 0..n {
            position[d] += 1;
            if position[d] <= interval.max(d) {
                continue 'traversal;
            }
            position[d] = interval.min(d);
        }
        break;
    }
}
