//! Confirmed tile-pair overlap relation.
//!
//! Upstream pairwise matching produces, for every candidate tile pair, a
//! result that is either validated (a genuine overlap confirmed by the
//! match) or rejected. The [`AdjacencyMap`] collects the validated pairs
//! and drives the compositor's "export only verified overlaps" mode: a
//! fused pixel is retained only if at least one pair among its
//! contributing tiles is connected in the map.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading pairwise match results.
#[derive(Debug, Error)]
pub enum AdjacencyError {
    #[error("failed to read pairwise matches from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pairwise match file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One pairwise matching result between two tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseMatch {
    /// Indices of the two matched tiles.
    pub tile_pair: [usize; 2],
    /// Whether the match confirmed a genuine overlap.
    pub valid: bool,
    /// Estimated displacement between the tiles, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displacement: Vec<f64>,
    /// Correlation score of the match.
    #[serde(default)]
    pub cross_correlation: f64,
}

/// Mapping from tile index to the set of tile indices it was confirmed to
/// genuinely overlap. Symmetric by construction.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyMap {
    connections: HashMap<usize, HashSet<usize>>,
}

impl AdjacencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from pairwise results, keeping only validated pairs.
    pub fn from_matches<'a>(matches: impl IntoIterator<Item = &'a PairwiseMatch>) -> Self {
        let mut map = Self::new();
        for result in matches {
            if result.valid {
                map.connect(result.tile_pair[0], result.tile_pair[1]);
            }
        }
        map
    }

    /// Record a confirmed connection between two tiles (both directions).
    pub fn connect(&mut self, a: usize, b: usize) {
        self.connections.entry(a).or_default().insert(b);
        self.connections.entry(b).or_default().insert(a);
    }

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.connections
            .get(&a)
            .map(|set| set.contains(&b))
            .unwrap_or(false)
    }

    pub fn neighbors(&self, tile: usize) -> Option<&HashSet<usize>> {
        self.connections.get(&tile)
    }

    /// Number of tiles with at least one confirmed connection.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// True iff some pair of tiles within the given contributor set is
    /// connected in the map.
    pub fn any_connected_pair(&self, contributors: &HashSet<usize>) -> bool {
        for &tile in contributors {
            if let Some(connected) = self.connections.get(&tile) {
                if !connected.is_disjoint(contributors) {
                    return true;
                }
            }
        }
        false
    }
}

/// Load pairwise matching results from a JSON file.
pub fn load_pairwise_matches(path: &Path) -> Result<Vec<PairwiseMatch>, AdjacencyError> {
    let file = File::open(path).map_err(|source| AdjacencyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| AdjacencyError::Parse {
        path: path.display().to_string(),
        source,
    })
}
