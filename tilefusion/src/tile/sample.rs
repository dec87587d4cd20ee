//! Sample kinds and flat pixel buffers.
//!
//! The pipeline supports a closed set of numeric sample kinds selected at
//! configuration time. Compositing always runs on a real-valued
//! intermediate representation and converts back to the target kind when
//! the output buffer is written, clamping on the integer kinds.

use serde::{Deserialize, Serialize};

/// The numeric kind of a tile's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit float.
    F32,
}

impl SampleKind {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleKind::U8 => 1,
            SampleKind::U16 => 2,
            SampleKind::F32 => 4,
        }
    }
}

/// A flat pixel buffer of one of the supported sample kinds.
///
/// Buffers are laid out with the first axis fastest (`stride[0] = 1`);
/// callers carry the dimensions separately. All access goes through an
/// `f64` intermediate so the compositor can stay kind-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelBuffer {
    /// A zero-filled buffer of the given kind and length.
    pub fn new(kind: SampleKind, len: usize) -> Self {
        match kind {
            SampleKind::U8 => PixelBuffer::U8(vec![0; len]),
            SampleKind::U16 => PixelBuffer::U16(vec![0; len]),
            SampleKind::F32 => PixelBuffer::F32(vec![0.0; len]),
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            PixelBuffer::U8(_) => SampleKind::U8,
            PixelBuffer::U16(_) => SampleKind::U16,
            PixelBuffer::F32(_) => SampleKind::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(data) => data.len(),
            PixelBuffer::U16(data) => data.len(),
            PixelBuffer::F32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().bytes_per_sample()
    }

    /// Read the sample at `index` as a real value.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            PixelBuffer::U8(data) => data[index] as f64,
            PixelBuffer::U16(data) => data[index] as f64,
            PixelBuffer::F32(data) => data[index] as f64,
        }
    }

    /// Write a real value to the sample at `index`, rounding and clamping
    /// to the integer kinds' ranges.
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            PixelBuffer::U8(data) => data[index] = value.round().clamp(0.0, u8::MAX as f64) as u8,
            PixelBuffer::U16(data) => {
                data[index] = value.round().clamp(0.0, u16::MAX as f64) as u16
            }
            PixelBuffer::F32(data) => data[index] = value as f32,
        }
    }

    /// Fill the whole buffer with a real value.
    pub fn fill(&mut self, value: f64) {
        for i in 0..self.len() {
            self.set(i, value);
        }
    }
}
