//! Mapping from grid coordinates to world-space points.

use crate::error::ConfigError;
use crate::grid::GridCoord;
use crate::math::Vec3;

/// Anything that can place a cell in the world.
pub trait WorldLayout {
    /// World position of the center of the cell at `coord`.
    fn world_position(&self, coord: GridCoord) -> Vec3;
}

impl<F> WorldLayout for F
where
    F: Fn(GridCoord) -> Vec3,
{
    fn world_position(&self, coord: GridCoord) -> Vec3 {
        self(coord)
    }
}

/// Tiles laid out on the XZ plane around a center point.
///
/// Columns advance along +X and rows along +Z. The tile count per axis is the
/// world size divided by the tile diameter, rounded.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TileLayout {
    pub center: Vec3,
    /// Extent of the grid along X and Z.
    pub world_size: (f32, f32),
    pub tile_radius: f32,
}

impl TileLayout {
    pub fn new(center: Vec3, world_size: (f32, f32), tile_radius: f32) -> Result<Self, ConfigError> {
        if tile_radius.is_nan() || tile_radius <= 0.0 {
            return Err(ConfigError::InvalidSetting {
                name: "tile_radius",
                reason: format!("must be positive, got {tile_radius}"),
            });
        }
        Ok(Self {
            center,
            world_size,
            tile_radius,
        })
    }

    /// Layout sized to exactly `width` by `height` tiles.
    pub fn for_grid(center: Vec3, width: usize, height: usize, tile_radius: f32) -> Result<Self, ConfigError> {
        let diameter = tile_radius * 2.0;
        Self::new(
            center,
            (width as f32 * diameter, height as f32 * diameter),
            tile_radius,
        )
    }

    pub fn tile_diameter(&self) -> f32 {
        self.tile_radius * 2.0
    }

    /// Number of tiles along X and Z.
    pub fn tile_counts(&self) -> (usize, usize) {
        let diameter = self.tile_diameter();
        (
            (self.world_size.0 / diameter).round().max(0.0) as usize,
            (self.world_size.1 / diameter).round().max(0.0) as usize,
        )
    }

    pub fn bottom_left(&self) -> Vec3 {
        self.center - Vec3::new(self.world_size.0 / 2.0, 0.0, self.world_size.1 / 2.0)
    }
}

impl WorldLayout for TileLayout {
    fn world_position(&self, coord: GridCoord) -> Vec3 {
        let diameter = self.tile_diameter();
        self.bottom_left()
            + Vec3::new(
                coord.x as f32 * diameter + self.tile_radius,
                0.0,
                coord.y as f32 * diameter + self.tile_radius,
            )
    }
}
