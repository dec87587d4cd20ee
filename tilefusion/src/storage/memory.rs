//! In-memory store for tests and single-process runs.

use dashmap::DashMap;

use crate::tile::PixelBuffer;

use super::{ChunkedStore, DatasetAttributes, StoreError};

struct MemoryDataset {
    attributes: DatasetAttributes,
    blocks: DashMap<Vec<i64>, PixelBuffer>,
}

/// A [`ChunkedStore`] keeping every block in memory.
#[derive(Default)]
pub struct MemoryStore {
    datasets: DashMap<String, MemoryDataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks written to a dataset so far.
    pub fn block_count(&self, path: &str) -> usize {
        self.datasets
            .get(path)
            .map(|dataset| dataset.blocks.len())
            .unwrap_or(0)
    }

    /// Copy of one block, for inspection in tests.
    pub fn block(&self, path: &str, grid_position: &[i64]) -> Option<PixelBuffer> {
        self.datasets
            .get(path)?
            .blocks
            .get(grid_position)
            .map(|block| block.clone())
    }
}

impl ChunkedStore for MemoryStore {
    fn dataset_exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.datasets.contains_key(path))
    }

    fn create_dataset(&self, path: &str, attributes: &DatasetAttributes) -> Result<(), StoreError> {
        if self.datasets.contains_key(path) {
            return Err(StoreError::DatasetExists {
                path: path.to_string(),
            });
        }
        self.datasets.insert(
            path.to_string(),
            MemoryDataset {
                attributes: attributes.clone(),
                blocks: DashMap::new(),
            },
        );
        Ok(())
    }

    fn attributes(&self, path: &str) -> Result<DatasetAttributes, StoreError> {
        self.datasets
            .get(path)
            .map(|dataset| dataset.attributes.clone())
            .ok_or_else(|| StoreError::DatasetNotFound {
                path: path.to_string(),
            })
    }

    fn write_block(
        &self,
        path: &str,
        grid_position: &[i64],
        block: PixelBuffer,
    ) -> Result<(), StoreError> {
        let dataset = self
            .datasets
            .get(path)
            .ok_or_else(|| StoreError::DatasetNotFound {
                path: path.to_string(),
            })?;
        if block.kind() != dataset.attributes.sample {
            return Err(StoreError::KindMismatch {
                path: path.to_string(),
                expected: dataset.attributes.sample,
                actual: block.kind(),
            });
        }
        dataset.blocks.insert(grid_position.to_vec(), block);
        Ok(())
    }

    fn read_block(
        &self,
        path: &str,
        grid_position: &[i64],
    ) -> Result<Option<PixelBuffer>, StoreError> {
        let dataset = self
            .datasets
            .get(path)
            .ok_or_else(|| StoreError::DatasetNotFound {
                path: path.to_string(),
            })?;
        Ok(dataset.blocks.get(grid_position).map(|block| block.clone()))
    }
}
