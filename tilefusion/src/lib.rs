//! TileFusion - Distributed fusion of overlapping microscope image tiles
//!
//! This library merges a large collection of overlapping, independently
//! positioned rectangular image tiles into one seamless large-scale volume.
//! Fusion is computed in parallel over small output regions and persisted
//! into a chunked on-disk array through a pluggable storage backend.
//!
//! # Architecture
//!
//! ```text
//! geometry  ──► fusion ──► scheduler ──► storage (ChunkedStore)
//!    ▲            ▲            │
//!    │            │            └── telemetry (metrics)
//!  tile ──────────┤
//!  flatfield ─────┤
//!  adjacency ─────┘
//! ```
//!
//! - [`geometry`] - interval arithmetic, bounding boxes, space partitioning
//! - [`tile`] - the tile data model, sample kinds and the pixel source seam
//! - [`fusion`] - the pixel-level compositor (blending, max-min-distance)
//! - [`flatfield`] - illumination correction field pairs
//! - [`adjacency`] - confirmed tile-pair overlap relation
//! - [`scheduler`] - work-unit partitioning, parallel fan-out, chunk writes
//! - [`storage`] - chunked array storage abstraction
//! - [`telemetry`] - lock-free fusion metrics

pub mod adjacency;
pub mod flatfield;
pub mod fusion;
pub mod geometry;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod tile;

pub use adjacency::AdjacencyMap;
pub use flatfield::FlatfieldPair;
pub use fusion::{fuse_tiles_within_cell, FusionError, FusionMode};
pub use geometry::{Interval, RealInterval};
pub use scheduler::{ChannelInput, FusionConfig, FusionScheduler, ScheduleError};
pub use storage::{ChunkedStore, DatasetAttributes, MemoryStore, StoreError};
pub use tile::{PixelBuffer, SampleKind, Tile, TileSource};
