//! Resampling of tile pixel data into the output cell's coordinate frame.
//!
//! A tile's resolved position is real-valued, so its samples generally land
//! between output pixels. The sampler evaluates the tile at output pixel
//! positions with n-linear interpolation, extending the border value
//! outside the tile bounds. Flatfield correction fields are resampled
//! through the exact same translation, clamped to the tile's extent.

use crate::flatfield::CorrectionField;
use crate::tile::PixelBuffer;

/// Interpolation scratch space is stack-allocated; eight axes is far above
/// any acquisition this pipeline sees.
const MAX_SAMPLER_DIMS: usize = 8;

/// Anything that can be read as real-valued samples from a flat buffer.
pub(crate) trait RealSamples {
    fn value_at(&self, index: usize) -> f64;
}

impl RealSamples for PixelBuffer {
    fn value_at(&self, index: usize) -> f64 {
        self.get(index)
    }
}

impl RealSamples for CorrectionField {
    fn value_at(&self, index: usize) -> f64 {
        self.get(index)
    }
}

/// Samples a flat buffer at output-cell pixel positions.
///
/// `offset` is the tile's placement within the target cell
/// (`tile.position - target.min`); sampling at output position `p` reads
/// the buffer at the real local coordinate `p - offset`.
pub(crate) struct TileSampler<'a, S: RealSamples> {
    samples: &'a S,
    strides: Vec<i64>,
    clamp_max: Vec<i64>,
    offset: &'a [f64],
}

impl<'a, S: RealSamples> TileSampler<'a, S> {
    /// Sampler over a buffer whose layout and extent are both `dims`.
    pub fn new(samples: &'a S, dims: &[i64], offset: &'a [f64]) -> Self {
        Self::with_clamp(samples, dims, dims, offset)
    }

    /// Sampler whose border extension is clamped to `clamp_dims` while the
    /// buffer itself is laid out over `layout_dims`.
    ///
    /// Used for correction fields that may be larger than the tile they
    /// correct: only the tile-sized window participates.
    pub fn with_clamp(
        samples: &'a S,
        layout_dims: &[i64],
        clamp_dims: &[i64],
        offset: &'a [f64],
    ) -> Self {
        let n = layout_dims.len();
        assert!(n <= MAX_SAMPLER_DIMS, "sampler supports up to 8 dimensions");
        let mut strides = vec![1i64; n];
        for d in 1..n {
            strides[d] = strides[d - 1] * layout_dims[d - 1];
        }
        let clamp_max = clamp_dims
            .iter()
            .zip(layout_dims)
            .map(|(c, l)| (c - 1).min(l - 1))
            .collect();
        Self {
            samples,
            strides,
            clamp_max,
            offset,
        }
    }

    /// Evaluate the buffer at an output-cell pixel position.
    pub fn sample(&self, position: &[i64]) -> f64 {
        let n = self.strides.len();
        debug_assert_eq!(n, position.len());

        // Tile-local real coordinate of the output pixel.
        let mut base = [0i64; MAX_SAMPLER_DIMS];
        let mut frac = [0.0f64; MAX_SAMPLER_DIMS];
        for d in 0..n {
            let local = position[d] as f64 - self.offset[d];
            let floor = local.floor();
            base[d] = floor as i64;
            frac[d] = local - floor;
        }

        // n-linear interpolation over the 2^n surrounding samples, with
        // border extension via clamping.
        let mut accumulated = 0.0;
        for corner in 0..(1usize << n) {
            let mut weight = 1.0;
            let mut index = 0i64;
            for d in 0..n {
                let upper = (corner >> d) & 1 == 1;
                weight *= if upper { frac[d] } else { 1.0 - frac[d] };
                let coord = (base[d] + upper as i64).clamp(0, self.clamp_max[d]);
                index += coord * self.strides[d];
            }
            if weight != 0.0 {
                accumulated += weight * self.samples.value_at(index as usize);
            }
        }
        accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SampleKind;

    #[test]
    fn test_integer_offset_reads_exact_samples() {
        let buffer = PixelBuffer::U8(vec![10, 20, 30, 40]);
        let offset = [1.0];
        let sampler = TileSampler::new(&buffer, &[4], &offset);
        assert_eq!(sampler.sample(&[1]), 10.0);
        assert_eq!(sampler.sample(&[2]), 20.0);
        assert_eq!(sampler.sample(&[4]), 40.0);
    }

    #[test]
    fn test_fractional_offset_interpolates_linearly() {
        let buffer = PixelBuffer::U8(vec![0, 100]);
        let offset = [0.5];
        let sampler = TileSampler::new(&buffer, &[2], &offset);
        // Output pixel 1 sits at tile-local coordinate 0.5.
        assert_eq!(sampler.sample(&[1]), 50.0);
    }

    #[test]
    fn test_border_extension_clamps_outside_samples() {
        let buffer = PixelBuffer::U8(vec![7, 9]);
        let offset = [0.0];
        let sampler = TileSampler::new(&buffer, &[2], &offset);
        assert_eq!(sampler.sample(&[-3]), 7.0);
        assert_eq!(sampler.sample(&[5]), 9.0);
    }

    #[test]
    fn test_bilinear_interpolation_2d() {
        // 2x2 buffer, first axis fastest: [(0,0)=0, (1,0)=100, (0,1)=50, (1,1)=150]
        let buffer = PixelBuffer::F32(vec![0.0, 100.0, 50.0, 150.0]);
        let offset = [-0.5, -0.5];
        let sampler = TileSampler::new(&buffer, &[2, 2], &offset);
        // Output pixel (0,0) sits at tile-local (0.5, 0.5): mean of all four.
        assert_eq!(sampler.sample(&[0, 0]), 75.0);
    }

    #[test]
    fn test_clamped_field_window() {
        // 4-sample field, but only the first 2 samples participate.
        let field =
            crate::flatfield::CorrectionField::new(vec![4], vec![1.0, 2.0, 8.0, 9.0]).unwrap();
        let offset = [0.0];
        let sampler = TileSampler::with_clamp(&field, &[4], &[2], &offset);
        assert_eq!(sampler.sample(&[1]), 2.0);
        // Beyond the clamp window the border value is extended.
        assert_eq!(sampler.sample(&[3]), 2.0);
    }

    #[test]
    fn test_sampler_over_buffer_kind() {
        let buffer = PixelBuffer::new(SampleKind::U16, 3);
        let offset = [0.0];
        let sampler = TileSampler::new(&buffer, &[3], &offset);
        assert_eq!(sampler.sample(&[0]), 0.0);
    }
}
