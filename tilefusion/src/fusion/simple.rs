//! Quick preview fusion.
//!
//! No blending and no winner selection: tiles are painted into the cell in
//! order (later tiles overwrite earlier ones), then the result is reduced
//! by box averaging. Meant for thumbnails and sanity checks while a full
//! run is still in flight, not for export.

use tracing::debug;

use crate::geometry::{for_each_pixel, Interval};
use crate::tile::{PixelBuffer, SampleKind, Tile, TileSource};

use super::sampler::TileSampler;
use super::{place_tile, FusionError};

/// Paint the tiles into `target` with last-writer-wins overlap resolution
/// and reduce the result by the given per-axis downsample factors.
///
/// The output buffer covers `target.dimensions() / factors` samples per
/// axis; trailing samples that do not fill a whole block are dropped. The
/// sample kind is taken from the tiles, which must all agree.
///
/// # Errors
///
/// Returns [`FusionError::NoTiles`] for an empty tile set,
/// [`FusionError::MixedSampleKinds`] if the tiles disagree on sample kind,
/// and [`FusionError::InvalidDownsampleFactors`] if any factor is below
/// one or exceeds the cell extent on its axis.
pub fn fuse_simple_with_downsampling(
    source: &dyn TileSource,
    tiles: &[Tile],
    target: &Interval,
    factors: &[i64],
) -> Result<PixelBuffer, FusionError> {
    let kind = uniform_sample_kind(tiles)?;

    let dims = target.dimensions();
    let out_dims: Vec<i64> = dims.iter().zip(factors).map(|(d, f)| d / f).collect();
    if factors.iter().any(|&f| f < 1) || out_dims.iter().any(|&d| d < 1) {
        return Err(FusionError::InvalidDownsampleFactors {
            factors: factors.to_vec(),
            cell_dims: dims,
        });
    }

    let len = target.num_elements() as usize;
    let mut full = vec![0.0f32; len];
    for tile in tiles {
        let placement = place_tile(tile, target)?;
        debug!(
            tile = tile.index(),
            path = tile.source_path(),
            "loading tile for preview fusion"
        );
        let raw = source.load_tile(tile)?;
        let sampler = TileSampler::new(&raw, tile.size(), &placement.offset);
        for_each_pixel(&placement.intersection, &dims, |index, position| {
            full[index] = sampler.sample(position) as f32;
        });
    }

    Ok(box_downsample(&full, &dims, &out_dims, factors, kind))
}

fn uniform_sample_kind(tiles: &[Tile]) -> Result<SampleKind, FusionError> {
    let mut kinds: Vec<SampleKind> = Vec::new();
    for tile in tiles {
        if !kinds.contains(&tile.sample()) {
            kinds.push(tile.sample());
        }
    }
    match kinds.as_slice() {
        [] => Err(FusionError::NoTiles),
        [kind] => Ok(*kind),
        _ => Err(FusionError::MixedSampleKinds { found: kinds }),
    }
}

/// Reduce a full-resolution buffer by averaging `factors`-sized blocks.
fn box_downsample(
    full: &[f32],
    dims: &[i64],
    out_dims: &[i64],
    factors: &[i64],
    kind: SampleKind,
) -> PixelBuffer {
    let n = dims.len();
    let mut strides = vec![1i64; n];
    for d in 1..n {
        strides[d] = strides[d - 1] * dims[d - 1];
    }

    let block_len: i64 = factors.iter().product();
    let out_len = out_dims.iter().product::<i64>() as usize;
    let mut out = PixelBuffer::new(kind, out_len);

    let out_region = Interval::from_dimensions(out_dims);
    for_each_pixel(&out_region, out_dims, |out_index, out_position| {
        // Flat index of the block's low corner in the full buffer.
        let mut base = 0i64;
        for d in 0..n {
            base += out_position[d] * factors[d] * strides[d];
        }

        let mut sum = 0.0f64;
        let block = Interval::from_dimensions(factors);
        for_each_pixel(&block, dims, |_, block_position| {
            let mut index = base;
            for d in 0..n {
                index += block_position[d] * strides[d];
            }
            sum += full[index as usize] as f64;
        });
        out.set(out_index, sum / block_len as f64);
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::MemoryTileSource;

    fn tile_with_values(
        index: usize,
        position: Vec<f64>,
        size: Vec<i64>,
        values: Vec<u16>,
        source: &mut MemoryTileSource,
    ) -> Tile {
        let tile = Tile::new(index, position, size, SampleKind::U16);
        source.insert(index, PixelBuffer::U16(values));
        tile
    }

    #[test]
    fn test_identity_factors_reproduce_tile_values() {
        let mut source = MemoryTileSource::new();
        let tile = tile_with_values(0, vec![0.0], vec![4], vec![10, 20, 30, 40], &mut source);
        let target = Interval::new(vec![0], vec![3]);

        let out = fuse_simple_with_downsampling(&source, &[tile], &target, &[1])
            .expect("preview fusion succeeds");

        assert_eq!(out.len(), 4);
        for (i, expected) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            assert_eq!(out.get(i), expected);
        }
    }

    #[test]
    fn test_box_downsampling_averages_blocks() {
        let mut source = MemoryTileSource::new();
        let tile = tile_with_values(0, vec![0.0], vec![6], vec![10, 20, 30, 40, 50, 60], &mut source);
        let target = Interval::new(vec![0], vec![5]);

        let out = fuse_simple_with_downsampling(&source, &[tile], &target, &[2])
            .expect("preview fusion succeeds");

        assert_eq!(out.len(), 3);
        assert_eq!(out.get(0), 15.0);
        assert_eq!(out.get(1), 35.0);
        assert_eq!(out.get(2), 55.0);
    }

    #[test]
    fn test_trailing_remainder_is_dropped() {
        let mut source = MemoryTileSource::new();
        let tile = tile_with_values(0, vec![0.0], vec![5], vec![10, 20, 30, 40, 99], &mut source);
        let target = Interval::new(vec![0], vec![4]);

        let out = fuse_simple_with_downsampling(&source, &[tile], &target, &[2])
            .expect("preview fusion succeeds");

        // 5 / 2 = 2 output samples; the fifth input sample is ignored.
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0), 15.0);
        assert_eq!(out.get(1), 35.0);
    }

    #[test]
    fn test_later_tiles_overwrite_earlier_ones() {
        let mut source = MemoryTileSource::new();
        let t1 = tile_with_values(0, vec![0.0], vec![4], vec![10; 4], &mut source);
        let t2 = tile_with_values(1, vec![2.0], vec![4], vec![90; 4], &mut source);
        let target = Interval::new(vec![0], vec![5]);

        let out = fuse_simple_with_downsampling(&source, &[t1, t2], &target, &[1])
            .expect("preview fusion succeeds");

        assert_eq!(out.get(0), 10.0);
        assert_eq!(out.get(1), 10.0);
        for i in 2..6 {
            assert_eq!(out.get(i), 90.0, "pixel {} belongs to the later tile", i);
        }
    }

    #[test]
    fn test_empty_tile_set_errors() {
        let source = MemoryTileSource::new();
        let target = Interval::new(vec![0], vec![3]);
        let err = fuse_simple_with_downsampling(&source, &[], &target, &[1]).unwrap_err();
        assert!(matches!(err, FusionError::NoTiles));
    }

    #[test]
    fn test_mixed_sample_kinds_error() {
        let mut source = MemoryTileSource::new();
        let t1 = tile_with_values(0, vec![0.0], vec![2], vec![1, 2], &mut source);
        let t2 = Tile::new(1, vec![2.0], vec![2], SampleKind::F32);
        source.insert(1, PixelBuffer::F32(vec![1.0, 2.0]));
        let target = Interval::new(vec![0], vec![3]);

        let err = fuse_simple_with_downsampling(&source, &[t1, t2], &target, &[1]).unwrap_err();
        assert!(matches!(err, FusionError::MixedSampleKinds { .. }));
    }

    #[test]
    fn test_oversized_factor_errors() {
        let mut source = MemoryTileSource::new();
        let tile = tile_with_values(0, vec![0.0], vec![4], vec![0; 4], &mut source);
        let target = Interval::new(vec![0], vec![3]);

        let err = fuse_simple_with_downsampling(&source, &[tile], &target, &[8]).unwrap_err();
        assert!(matches!(err, FusionError::InvalidDownsampleFactors { .. }));
    }

    #[test]
    fn test_2d_downsampling() {
        let mut source = MemoryTileSource::new();
        // 4x2 tile, first axis fastest.
        let tile = tile_with_values(
            0,
            vec![0.0, 0.0],
            vec![4, 2],
            vec![10, 20, 30, 40, 50, 60, 70, 80],
            &mut source,
        );
        let target = Interval::new(vec![0, 0], vec![3, 1]);

        let out = fuse_simple_with_downsampling(&source, &[tile], &target, &[2, 2])
            .expect("preview fusion succeeds");

        assert_eq!(out.len(), 2);
        // Block (0,0): samples 10, 20, 50, 60.
        assert_eq!(out.get(0), 35.0);
        // Block (1,0): samples 30, 40, 70, 80.
        assert_eq!(out.get(1), 55.0);
    }
}
