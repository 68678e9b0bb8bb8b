//! Common types used by the off-mesh navigation crates

mod ids;

pub use ids::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("tile {tile:?} exceeds its off-mesh link capacity of {capacity}")]
    TileLinkCapacity { tile: TileId, capacity: usize },

    #[error("off-mesh link error: {0}")]
    OffMeshLink(String),
}

/// Result type for off-mesh navigation operations
pub type Result<T> = std::result::Result<T, Error>;
