//! Core geometric types: integer and real-valued n-dimensional boxes,
//! and affine transforms assigned to tiles by upstream registration.

use serde::{Deserialize, Serialize};

/// An n-dimensional integer box with inclusive bounds on every axis.
///
/// Intervals are the storage-aligned currency of the library: tile bounding
/// boxes, output cells, chunks and overlap regions are all expressed as
/// intervals. An interval with `min == max` on an axis spans exactly one
/// sample along that axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    min: Vec<i64>,
    max: Vec<i64>,
}

impl Interval {
    /// Create an interval from inclusive per-axis bounds.
    ///
    /// # Panics
    ///
    /// Panics if the bound vectors differ in length or `min > max` on any
    /// axis. Both indicate a caller bug, not a runtime condition.
    pub fn new(min: Vec<i64>, max: Vec<i64>) -> Self {
        assert_eq!(min.len(), max.len(), "interval bounds must match in rank");
        for d in 0..min.len() {
            assert!(
                min[d] <= max[d],
                "interval min {} exceeds max {} on axis {}",
                min[d],
                max[d],
                d
            );
        }
        Self { min, max }
    }

    /// Create an interval from a lower corner and per-axis sizes.
    pub fn from_min_size(min: &[i64], size: &[i64]) -> Self {
        let max = min.iter().zip(size).map(|(m, s)| m + s - 1).collect();
        Self::new(min.to_vec(), max)
    }

    /// Create a zero-based interval covering the given dimensions.
    pub fn from_dimensions(dims: &[i64]) -> Self {
        Self::from_min_size(&vec![0; dims.len()], dims)
    }

    pub fn num_dimensions(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self, d: usize) -> i64 {
        self.min[d]
    }

    pub fn max(&self, d: usize) -> i64 {
        self.max[d]
    }

    pub fn min_slice(&self) -> &[i64] {
        &self.min
    }

    pub fn max_slice(&self) -> &[i64] {
        &self.max
    }

    /// Extent along axis `d` (number of samples).
    pub fn dimension(&self, d: usize) -> i64 {
        self.max[d] - self.min[d] + 1
    }

    /// Per-axis extents.
    pub fn dimensions(&self) -> Vec<i64> {
        (0..self.num_dimensions()).map(|d| self.dimension(d)).collect()
    }

    /// Total number of samples contained in the interval.
    pub fn num_elements(&self) -> i64 {
        (0..self.num_dimensions()).map(|d| self.dimension(d)).product()
    }

    /// Translate the interval by the given per-axis offsets.
    pub fn translate(&self, by: &[i64]) -> Self {
        let min = self.min.iter().zip(by).map(|(m, o)| m + o).collect();
        let max = self.max.iter().zip(by).map(|(m, o)| m + o).collect();
        Self { min, max }
    }

    /// View the interval as a real-valued box with the same bounds.
    pub fn to_real(&self) -> RealInterval {
        RealInterval::new(
            self.min.iter().map(|&m| m as f64).collect(),
            self.max.iter().map(|&m| m as f64).collect(),
        )
    }
}

/// An n-dimensional real-valued box with inclusive bounds.
///
/// Used for geometry computations before rounding: resolved tile positions
/// are real-valued, so overlap tests and intersections are carried out in
/// real coordinates and only converted to [`Interval`]s at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealInterval {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl RealInterval {
    /// # Panics
    ///
    /// Panics if the bound vectors differ in length.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        assert_eq!(min.len(), max.len(), "interval bounds must match in rank");
        Self { min, max }
    }

    pub fn num_dimensions(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self, d: usize) -> f64 {
        self.min[d]
    }

    pub fn max(&self, d: usize) -> f64 {
        self.max[d]
    }

    /// The smallest integer interval that contains this real box.
    pub fn smallest_containing_interval(&self) -> Interval {
        Interval::new(
            self.min.iter().map(|m| m.floor() as i64).collect(),
            self.max.iter().map(|m| m.ceil() as i64).collect(),
        )
    }
}

/// An n-dimensional affine transform stored as an n x (n+1) row-major
/// matrix (the last column is the translation component).
///
/// Upstream registration resolves each tile either to a plain world
/// position or to a full affine transform; tiles without a transform are
/// treated as axis-aligned translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    ndim: usize,
    matrix: Vec<f64>,
}

impl AffineTransform {
    /// Create a transform from a row-major n x (n+1) matrix.
    ///
    /// # Panics
    ///
    /// Panics if the matrix length does not match the dimensionality.
    pub fn new(ndim: usize, matrix: Vec<f64>) -> Self {
        assert_eq!(
            matrix.len(),
            ndim * (ndim + 1),
            "affine matrix must be n x (n+1) row-major"
        );
        Self { ndim, matrix }
    }

    /// The identity transform in `ndim` dimensions.
    pub fn identity(ndim: usize) -> Self {
        let mut matrix = vec![0.0; ndim * (ndim + 1)];
        for d in 0..ndim {
            matrix[d * (ndim + 1) + d] = 1.0;
        }
        Self { ndim, matrix }
    }

    /// A pure translation transform.
    pub fn translation(offsets: &[f64]) -> Self {
        let ndim = offsets.len();
        let mut transform = Self::identity(ndim);
        for d in 0..ndim {
            transform.matrix[d * (ndim + 1) + ndim] = offsets[d];
        }
        transform
    }

    pub fn num_dimensions(&self) -> usize {
        self.ndim
    }

    /// Apply the transform to a point.
    pub fn apply(&self, point: &[f64]) -> Vec<f64> {
        let n = self.ndim;
        let mut out = vec![0.0; n];
        for r in 0..n {
            let row = &self.matrix[r * (n + 1)..(r + 1) * (n + 1)];
            let mut value = row[n];
            for c in 0..n {
                value += row[c] * point[c];
            }
            out[r] = value;
        }
        out
    }

    /// The axis-aligned real bounding box of the transformed interval,
    /// computed by transforming all 2^n corners.
    pub fn estimate_bounds(&self, interval: &RealInterval) -> RealInterval {
        let n = self.ndim;
        let mut min = vec![f64::INFINITY; n];
        let mut max = vec![f64::NEG_INFINITY; n];
        let mut corner = vec![0.0; n];
        for mask in 0..(1usize << n) {
            for d in 0..n {
                corner[d] = if (mask >> d) & 1 == 1 {
                    interval.max(d)
                } else {
                    interval.min(d)
                };
            }
            let transformed = self.apply(&corner);
            for d in 0..n {
                min[d] = min[d].min(transformed[d]);
                max[d] = max[d].max(transformed[d]);
            }
        }
        RealInterval::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_min_size() {
        let interval = Interval::from_min_size(&[10, -5], &[4, 3]);
        assert_eq!(interval.min_slice(), &[10, -5]);
        assert_eq!(interval.max_slice(), &[13, -3]);
        assert_eq!(interval.dimensions(), vec![4, 3]);
        assert_eq!(interval.num_elements(), 12);
    }

    #[test]
    #[should_panic(expected = "exceeds max")]
    fn test_interval_rejects_inverted_bounds() {
        Interval::new(vec![3], vec![2]);
    }

    #[test]
    fn test_interval_translate() {
        let interval = Interval::new(vec![0, 0], vec![4, 9]).translate(&[-2, 5]);
        assert_eq!(interval.min_slice(), &[-2, 5]);
        assert_eq!(interval.max_slice(), &[2, 14]);
    }

    #[test]
    fn test_smallest_containing_interval_rounds_outward() {
        let real = RealInterval::new(vec![0.25, -1.75], vec![3.5, 2.0]);
        let interval = real.smallest_containing_interval();
        assert_eq!(interval.min_slice(), &[0, -2]);
        assert_eq!(interval.max_slice(), &[4, 2]);
    }

    #[test]
    fn test_affine_identity_is_noop() {
        let transform = AffineTransform::identity(3);
        assert_eq!(transform.apply(&[1.5, -2.0, 7.0]), vec![1.5, -2.0, 7.0]);
    }

    #[test]
    fn test_affine_translation_shifts_bounds() {
        let transform = AffineTransform::translation(&[10.0, -4.5]);
        let bounds =
            transform.estimate_bounds(&RealInterval::new(vec![0.0, 0.0], vec![9.0, 19.0]));
        assert_eq!(bounds.min(0), 10.0);
        assert_eq!(bounds.max(0), 19.0);
        assert_eq!(bounds.min(1), -4.5);
        assert_eq!(bounds.max(1), 14.5);
    }

    #[test]
    fn test_affine_rotation_bounding_box() {
        // 90 degree rotation in 2-D maps [0,2]x[0,1] onto [-1,0]x[0,2].
        let transform = AffineTransform::new(2, vec![0.0, -1.0, 0.0, 1.0, 0.0, 0.0]);
        let bounds =
            transform.estimate_bounds(&RealInterval::new(vec![0.0, 0.0], vec![2.0, 1.0]));
        assert_eq!(bounds.min(0), -1.0);
        assert_eq!(bounds.max(0), 0.0);
        assert_eq!(bounds.min(1), 0.0);
        assert_eq!(bounds.max(1), 2.0);
    }
}
