//! Chunked output storage.
//!
//! The fused volume is written as a chunked dataset: a flat namespace of
//! datasets addressed by path, each holding fixed-size blocks addressed by
//! grid position. The scheduler guarantees that no two work units touch
//! the same block, so implementations only need per-block atomicity.

mod memory;

pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::{PixelBuffer, SampleKind};

/// Block compression applied by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Raw,
    Gzip,
}

/// Shape and encoding of one chunked dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttributes {
    /// Full extent of the dataset per axis.
    pub dimensions: Vec<i64>,
    /// Extent of one block per axis.
    pub block_size: Vec<i64>,
    /// Sample kind of every block.
    pub sample: SampleKind,
    pub compression: Compression,
}

impl DatasetAttributes {
    pub fn new(
        dimensions: Vec<i64>,
        block_size: Vec<i64>,
        sample: SampleKind,
        compression: Compression,
    ) -> Self {
        assert_eq!(
            dimensions.len(),
            block_size.len(),
            "dimensions and block size must agree in rank"
        );
        Self {
            dimensions,
            block_size,
            sample,
            compression,
        }
    }
}

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset {path} already exists")]
    DatasetExists { path: String },

    #[error("dataset {path} does not exist")]
    DatasetNotFound { path: String },

    #[error("dataset {path} holds {expected:?} samples, block carries {actual:?}")]
    KindMismatch {
        path: String,
        expected: SampleKind,
        actual: SampleKind,
    },

    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A chunked dataset store.
///
/// Implementations must be safe to call from multiple worker threads at
/// once; the scheduler writes disjoint blocks concurrently.
pub trait ChunkedStore: Send + Sync {
    /// Whether a dataset exists at the given path.
    fn dataset_exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Create an empty dataset. Fails if one already exists at the path.
    fn create_dataset(&self, path: &str, attributes: &DatasetAttributes) -> Result<(), StoreError>;

    /// Attributes of an existing dataset.
    fn attributes(&self, path: &str) -> Result<DatasetAttributes, StoreError>;

    /// Write one block at the given grid position, overwriting any
    /// previous content of that block.
    fn write_block(
        &self,
        path: &str,
        grid_position: &[i64],
        block: PixelBuffer,
    ) -> Result<(), StoreError>;

    /// Read one block back, or `None` if it was never written.
    fn read_block(&self, path: &str, grid_position: &[i64])
        -> Result<Option<PixelBuffer>, StoreError>;
}
