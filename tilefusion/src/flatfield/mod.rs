//! Flatfield (illumination) correction fields.
//!
//! A channel may carry a pair of per-pixel correction fields computed by an
//! external estimation step: a multiplicative scale field `S` and an
//! additive offset field `T`. During compositing a raw sample `v` becomes
//! `v * S + T`, with both fields resampled through the same translation as
//! the tile itself. Missing fields simply disable the feature.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while loading correction fields.
#[derive(Debug, Error)]
pub enum FlatfieldError {
    /// Field data disagrees with its declared dimensions.
    #[error("correction field has {actual} samples, expected {expected}")]
    ShapeMismatch { actual: usize, expected: usize },

    /// The two fields of a pair disagree in shape.
    #[error("scale and offset fields differ in shape: {scale:?} vs {offset:?}")]
    PairShapeMismatch { scale: Vec<i64>, offset: Vec<i64> },

    /// I/O failure reading a field.
    #[error("I/O error reading correction field {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single real-valued correction field laid out like a tile buffer
/// (first axis fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionField {
    dims: Vec<i64>,
    data: Vec<f32>,
}

impl CorrectionField {
    pub fn new(dims: Vec<i64>, data: Vec<f32>) -> Result<Self, FlatfieldError> {
        let expected = dims.iter().product::<i64>() as usize;
        if data.len() != expected {
            return Err(FlatfieldError::ShapeMismatch {
                actual: data.len(),
                expected,
            });
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn get(&self, index: usize) -> f64 {
        self.data[index] as f64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The scale/offset field pair of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatfieldPair {
    scale: CorrectionField,
    offset: CorrectionField,
}

impl FlatfieldPair {
    pub fn new(scale: CorrectionField, offset: CorrectionField) -> Result<Self, FlatfieldError> {
        if scale.dims() != offset.dims() {
            return Err(FlatfieldError::PairShapeMismatch {
                scale: scale.dims().to_vec(),
                offset: offset.dims().to_vec(),
            });
        }
        Ok(Self { scale, offset })
    }

    pub fn scale(&self) -> &CorrectionField {
        &self.scale
    }

    pub fn offset(&self) -> &CorrectionField {
        &self.offset
    }
}

/// Loads correction field pairs from an external location.
///
/// Returning `Ok(None)` means the fields are absent and flatfield
/// correction is disabled for the channel; this is not an error.
pub trait FlatfieldProvider: Send + Sync {
    fn load_correction_fields(
        &self,
        scale_path: &Path,
        offset_path: &Path,
        ndim: usize,
    ) -> Result<Option<FlatfieldPair>, FlatfieldError>;
}
