//! Blending weight function.
//!
//! Each contributing sample is weighted by a smooth multiplicative
//! "distance to the tile's own border" so that tile seams fade into each
//! other instead of producing hard edges.

use std::f64::consts::PI;

/// Weight floor for samples at or beyond the tile border. Never exactly
/// zero so a tile's contribution is minimized rather than destroyed; the
/// magnitude is an empirically chosen tunable, not a load-bearing
/// invariant.
pub(crate) const WEIGHT_FLOOR: f64 = 1e-7;

/// Compute the blending weight of a sample at tile-local coordinates
/// `local` within a tile of extents `dims`.
///
/// Per axis, the distance to the nearer border (floored at one sample) is
/// scaled to `[0, 1]` within the blend margin
/// `round(blend_fraction * (extent - 1) / 2)` and left at `1` beyond it.
/// The per-axis factors multiply; a product of `1` means a fully interior
/// sample (weight `1`), and anything between is mapped through a
/// raised-cosine ramp.
pub(crate) fn blending_weight(local: &[f64], dims: &[i64], blend_fraction: f64) -> f64 {
    let mut min_distance = 1.0;

    for (d, &position) in local.iter().enumerate() {
        let extent = (dims[d] - 1) as f64;
        let mut value = f64::max(1.0, f64::min(position, extent - position));
        let margin = (blend_fraction * 0.5 * extent).round();
        if value < margin {
            value /= margin;
        } else {
            value = 1.0;
        }
        min_distance *= value;
    }

    if min_distance == 1.0 {
        1.0
    } else if min_distance <= 0.0 {
        WEIGHT_FLOOR
    } else {
        (((1.0 - min_distance) * PI).cos() + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRACTION: f64 = 0.2;

    #[test]
    fn test_interior_sample_has_full_weight() {
        // Center of a 101-sample tile: distance 50, margin 10.
        assert_eq!(blending_weight(&[50.0], &[101], FRACTION), 1.0);
    }

    #[test]
    fn test_weight_ramps_up_within_margin() {
        // Margin for extent 101 is round(0.2 * 0.5 * 100) = 10.
        let near_border = blending_weight(&[2.0], &[101], FRACTION);
        let mid_margin = blending_weight(&[5.0], &[101], FRACTION);
        let at_margin = blending_weight(&[10.0], &[101], FRACTION);

        assert!(near_border < mid_margin, "weight must grow with distance");
        assert!(mid_margin < at_margin);
        assert_eq!(at_margin, 1.0);

        // Raised cosine at half margin: (cos(0.5 * pi) + 1) / 2 = 0.5.
        assert!((mid_margin - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_border_sample_keeps_small_positive_weight() {
        let weight = blending_weight(&[0.0], &[101], FRACTION);
        assert!(weight > 0.0);
        assert!(weight < 0.05);
    }

    #[test]
    fn test_axes_multiply() {
        let one_axis = blending_weight(&[5.0, 50.0], &[101, 101], FRACTION);
        let both_axes = blending_weight(&[5.0, 5.0], &[101, 101], FRACTION);
        assert!(both_axes < one_axis);
    }

    #[test]
    fn test_tiny_tile_is_fully_interior() {
        // Margin rounds to zero for very small extents; every sample is
        // treated as interior.
        assert_eq!(blending_weight(&[1.0], &[4], FRACTION), 1.0);
    }
}
