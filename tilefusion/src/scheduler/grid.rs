//! Chunk-grid arithmetic.
//!
//! The output volume is divided into fixed-size chunks. Chunk extents are
//! derived from the physical voxel spacing so that chunks are roughly
//! isotropic in physical space, and work units are sized as whole multiples
//! of the chunk so that no two units ever share a chunk.

/// Scale voxel spacing so the finest axis becomes `1.0`.
pub fn normalize_voxel_spacing(spacing: &[f64]) -> Vec<f64> {
    let finest = spacing.iter().cloned().fold(f64::MAX, f64::min);
    spacing.iter().map(|s| s / finest).collect()
}

/// Per-axis chunk extent for a target physical chunk extent.
///
/// Axes with coarser spacing get proportionally fewer samples per chunk,
/// never fewer than one.
pub fn optimal_chunk_size(base: i64, normalized_spacing: &[f64]) -> Vec<i64> {
    normalized_spacing
        .iter()
        .map(|s| ((base as f64 / s).round() as i64).max(1))
        .collect()
}

/// Per-axis work-unit extent: the smallest whole multiple of the chunk
/// that covers a typical tile.
///
/// Fusing at tile granularity keeps each unit's input set small, and
/// rounding up to whole chunks keeps the chunk sets of distinct units
/// disjoint.
pub fn work_unit_size(chunk_size: &[i64], tile_size: &[i64]) -> Vec<i64> {
    chunk_size
        .iter()
        .zip(tile_size)
        .map(|(&chunk, &tile)| {
            let chunks_per_tile = (tile + chunk - 1) / chunk;
            chunk * chunks_per_tile.max(1)
        })
        .collect()
}

/// Grid position of the chunk containing `min`, relative to `offset`.
pub fn chunk_grid_position(min: &[i64], chunk_size: &[i64], offset: &[i64]) -> Vec<i64> {
    min.iter()
        .zip(chunk_size)
        .zip(offset)
        .map(|((&m, &c), &o)| (m - o) / c)
        .collect()
}

/// Per-axis minimum over a set of grid positions.
///
/// Subtracting this from every position shifts the written blocks so the
/// dataset starts at grid position zero on every axis.
pub fn grid_offset<'a>(positions: impl IntoIterator<Item = &'a [i64]>) -> Option<Vec<i64>> {
    let mut iter = positions.into_iter();
    let mut offset = iter.next()?.to_vec();
    for position in iter {
        for (o, &p) in offset.iter_mut().zip(position) {
            if p < *o {
                *o = p;
            }
        }
    }
    Some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_voxel_spacing() {
        let normalized = normalize_voxel_spacing(&[0.097, 0.097, 0.18]);
        assert_eq!(normalized[0], 1.0);
        assert_eq!(normalized[1], 1.0);
        assert!((normalized[2] - 0.18 / 0.097).abs() < 1e-12);
    }

    #[test]
    fn test_optimal_chunk_size_shrinks_coarse_axes() {
        let chunk = optimal_chunk_size(128, &[1.0, 1.0, 2.0]);
        assert_eq!(chunk, vec![128, 128, 64]);
    }

    #[test]
    fn test_optimal_chunk_size_never_below_one() {
        let chunk = optimal_chunk_size(1, &[1.0, 4.0]);
        assert_eq!(chunk, vec![1, 1]);
    }

    #[test]
    fn test_work_unit_covers_tile_in_whole_chunks() {
        // Tile of 200 with chunks of 64 needs 4 chunks.
        assert_eq!(work_unit_size(&[64], &[200]), vec![256]);
        // Exact multiples stay exact.
        assert_eq!(work_unit_size(&[64], &[128]), vec![128]);
        // A tile smaller than a chunk still gets one whole chunk.
        assert_eq!(work_unit_size(&[64], &[10]), vec![64]);
    }

    #[test]
    fn test_chunk_grid_position() {
        assert_eq!(chunk_grid_position(&[128, 256], &[64, 64], &[0, 0]), vec![2, 4]);
        assert_eq!(chunk_grid_position(&[128, 256], &[64, 64], &[128, 0]), vec![0, 4]);
    }

    #[test]
    fn test_grid_offset_is_per_axis_min() {
        let positions = [vec![2, 5], vec![2, 6], vec![3, 5]];
        let offset = grid_offset(positions.iter().map(|p| p.as_slice())).unwrap();
        assert_eq!(offset, vec![2, 5]);

        let shifted: Vec<Vec<i64>> = positions
            .iter()
            .map(|p| p.iter().zip(&offset).map(|(v, o)| v - o).collect())
            .collect();
        assert_eq!(shifted, vec![vec![0, 0], vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_grid_offset_empty_set() {
        assert!(grid_offset(std::iter::empty()).is_none());
    }
}
