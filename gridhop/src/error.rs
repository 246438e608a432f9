//! Setup errors.
//!
//! Runtime outcomes (no path, ignored request, out-of-bounds lookup) are plain
//! values. Only misconfiguration is reported as an error.

use crate::grid::GridCoord;
use crate::mover::MoverId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("grid must have at least one cell, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    #[error("obstacle map is {map_width}x{map_height} but the grid is {grid_width}x{grid_height}")]
    DimensionMismatch {
        grid_width: usize,
        grid_height: usize,
        map_width: usize,
        map_height: usize,
    },

    #[error("obstacle list holds {actual} flags, expected {expected}")]
    ObstacleListLength { expected: usize, actual: usize },

    #[error("spawn cell {0} is outside the grid")]
    SpawnOutOfBounds(GridCoord),

    #[error("spawn cell {0} is not walkable")]
    SpawnNotWalkable(GridCoord),

    #[error("spawn cell {0} is already occupied")]
    SpawnOccupied(GridCoord),

    #[error("no mover with id {0:?}")]
    UnknownMover(MoverId),

    #[error("mover ids exhausted")]
    MoverIdsExhausted,

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
