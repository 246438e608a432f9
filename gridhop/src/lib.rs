//! Gridhop - grid pathfinding and hop-by-hop movement for tile boards.
//!
//! A [`Board`] owns the grid, the obstacle map and every mover on it. Movers
//! follow A* paths one tile at a time: turn, hop, settle.

pub mod board;
pub mod config;
pub mod error;
pub mod grid;
pub mod layout;
pub mod math;
pub mod mover;
pub mod obstacles;
pub mod pathfinding;

pub use crate::board::{Board, ListenerId};
pub use crate::config::{BoardConfig, SpawnConfig, SpawnKind};
pub use crate::error::ConfigError;
pub use crate::grid::{Cell, CellTag, Grid, GridCoord};
pub use crate::layout::{TileLayout, WorldLayout};
pub use crate::math::{Quat, Transform, Vec3};
pub use crate::mover::{Arrival, Mover, MoverConfig, MoverEvent, MoverId, MoverKind, Phase};
pub use crate::obstacles::{MarkerSet, ObstacleMap, ObstacleSource, ObstacleVisuals, SyncReport};
pub use crate::pathfinding::{AStarPathfinder, Path};
