//! Tile pixel source abstraction.
//!
//! The fusion engine never reads image files itself; it asks a
//! [`TileSource`] for a tile's pixel buffer. Implementations must be
//! thread-safe (`Send + Sync`) because work units load tiles from parallel
//! workers.

use std::collections::HashMap;

use thiserror::Error;

use crate::tile::{PixelBuffer, Tile};

/// Errors that can occur while loading tile pixel data.
#[derive(Debug, Error)]
pub enum TileSourceError {
    /// The source has no pixel data for the tile.
    #[error("no pixel data for tile {index} ({path})")]
    NotFound { index: usize, path: String },

    /// The loaded buffer does not match the tile's declared geometry.
    #[error("tile {index} has {actual} samples, expected {expected}")]
    SampleCountMismatch {
        index: usize,
        actual: usize,
        expected: usize,
    },

    /// The loaded buffer does not match the tile's declared sample kind.
    #[error("tile {index} loaded as {actual:?}, expected {expected:?}")]
    KindMismatch {
        index: usize,
        actual: crate::tile::SampleKind,
        expected: crate::tile::SampleKind,
    },

    /// I/O failure reading the underlying pixel source.
    #[error("I/O error reading tile {index} ({path}): {source}")]
    Io {
        index: usize,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Provides pixel buffers for tiles, type-preserving.
pub trait TileSource: Send + Sync {
    /// Load the tile's pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns `TileSourceError` if the tile is unknown, the data cannot be
    /// read, or the buffer disagrees with the tile's declared geometry or
    /// sample kind.
    fn load_tile(&self, tile: &Tile) -> Result<PixelBuffer, TileSourceError>;
}

/// A map-backed tile source holding all pixel buffers in memory.
///
/// Used by the test suite and for small preview runs where the tile set
/// fits in memory.
#[derive(Debug, Default)]
pub struct MemoryTileSource {
    buffers: HashMap<usize, PixelBuffer>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pixel buffer for a tile index, replacing any previous
    /// buffer.
    pub fn insert(&mut self, tile_index: usize, buffer: PixelBuffer) {
        self.buffers.insert(tile_index, buffer);
    }
}

impl TileSource for MemoryTileSource {
    fn load_tile(&self, tile: &Tile) -> Result<PixelBuffer, TileSourceError> {
        let buffer = self
            .buffers
            .get(&tile.index())
            .ok_or_else(|| TileSourceError::NotFound {
                index: tile.index(),
                path: tile.source_path().to_string(),
            })?;
        let expected = tile.num_elements() as usize;
        if buffer.len() != expected {
            return Err(TileSourceError::SampleCountMismatch {
                index: tile.index(),
                actual: buffer.len(),
                expected,
            });
        }
        if buffer.kind() != tile.sample() {
            return Err(TileSourceError::KindMismatch {
                index: tile.index(),
                actual: buffer.kind(),
                expected: tile.sample(),
            });
        }
        Ok(buffer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SampleKind;

    #[test]
    fn test_memory_source_returns_registered_buffer() {
        let tile = Tile::new(1, vec![0.0], vec![4], SampleKind::U8);
        let mut source = MemoryTileSource::new();
        source.insert(1, PixelBuffer::U8(vec![10, 20, 30, 40]));

        let buffer = source.load_tile(&tile).expect("tile is registered");
        assert_eq!(buffer.get(2), 30.0);
    }

    #[test]
    fn test_memory_source_missing_tile_errors() {
        let tile = Tile::new(9, vec![0.0], vec![4], SampleKind::U8);
        let source = MemoryTileSource::new();
        let err = source.load_tile(&tile).unwrap_err();
        assert!(matches!(err, TileSourceError::NotFound { index: 9, .. }));
    }

    #[test]
    fn test_memory_source_rejects_wrong_sample_count() {
        let tile = Tile::new(1, vec![0.0], vec![4], SampleKind::U8);
        let mut source = MemoryTileSource::new();
        source.insert(1, PixelBuffer::U8(vec![1, 2]));
        let err = source.load_tile(&tile).unwrap_err();
        assert!(matches!(
            err,
            TileSourceError::SampleCountMismatch {
                actual: 2,
                expected: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_memory_source_rejects_wrong_kind() {
        let tile = Tile::new(1, vec![0.0], vec![2], SampleKind::U16);
        let mut source = MemoryTileSource::new();
        source.insert(1, PixelBuffer::U8(vec![1, 2]));
        let err = source.load_tile(&tile).unwrap_err();
        assert!(matches!(err, TileSourceError::KindMismatch { .. }));
    }

    #[test]
    fn test_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn TileSource>();
    }
}
