//! The tile data model.
//!
//! A [`Tile`] is one acquired image placed at a resolved world position,
//! possibly followed by a registration-resolved affine transform. Tiles are
//! created by the upstream registration step and are read-only during
//! fusion. Pixel data never lives on the tile itself; it is fetched on
//! demand through the [`TileSource`] seam.

mod sample;
mod source;

pub use sample::{PixelBuffer, SampleKind};
pub use source::{MemoryTileSource, TileSource, TileSourceError};

use serde::{Deserialize, Serialize};

use crate::geometry::{AffineTransform, Interval, RealInterval};

/// One acquired image tile with its resolved placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    index: usize,
    position: Vec<f64>,
    size: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transform: Option<AffineTransform>,
    sample: SampleKind,
    #[serde(default)]
    pixel_resolution: Vec<f64>,
    #[serde(default)]
    source_path: String,
}

impl Tile {
    /// # Panics
    ///
    /// Panics if position and size differ in rank.
    pub fn new(index: usize, position: Vec<f64>, size: Vec<i64>, sample: SampleKind) -> Self {
        assert_eq!(
            position.len(),
            size.len(),
            "tile position and size must match in rank"
        );
        Self {
            index,
            position,
            size,
            transform: None,
            sample,
            pixel_resolution: Vec::new(),
            source_path: String::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_dimensions(&self) -> usize {
        self.position.len()
    }

    /// Resolved world position of the tile's lower corner.
    pub fn position(&self) -> &[f64] {
        &self.position
    }

    /// Per-axis size in samples.
    pub fn size(&self) -> &[i64] {
        &self.size
    }

    /// Total number of samples in the tile.
    pub fn num_elements(&self) -> i64 {
        self.size.iter().product()
    }

    pub fn sample(&self) -> SampleKind {
        self.sample
    }

    pub fn transform(&self) -> Option<&AffineTransform> {
        self.transform.as_ref()
    }

    pub fn set_transform(&mut self, transform: AffineTransform) {
        self.transform = Some(transform);
    }

    pub fn pixel_resolution(&self) -> &[f64] {
        &self.pixel_resolution
    }

    pub fn set_pixel_resolution(&mut self, resolution: Vec<f64>) {
        self.pixel_resolution = resolution;
    }

    /// Reference to the tile's pixel source, interpreted by the
    /// [`TileSource`] implementation.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn set_source_path(&mut self, path: impl Into<String>) {
        self.source_path = path.into();
    }

    /// The tile's untransformed real-valued bounds `[pos, pos + size - 1]`.
    pub fn real_bounds(&self) -> RealInterval {
        let max = self
            .position
            .iter()
            .zip(&self.size)
            .map(|(p, s)| p + (s - 1) as f64)
            .collect();
        RealInterval::new(self.position.clone(), max)
    }
}

/// A sub-region carved out of a tile: geometry plus the identity of the
/// owning tile. Never owns pixel data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTile {
    index: usize,
    tile_index: usize,
    interval: Interval,
}

impl SubTile {
    pub fn new(index: usize, tile_index: usize, interval: Interval) -> Self {
        Self {
            index,
            tile_index,
            interval,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the full tile this sub-region belongs to.
    pub fn tile_index(&self) -> usize {
        self.tile_index
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }
}
