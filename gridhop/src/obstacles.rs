//! Obstacle map and walkability synchronization.
//!
//! The obstacle map is the single source of truth for which cells are
//! blocked. [`synchronize`] copies it onto the grid and rebuilds the obstacle
//! markers; running it again without edits changes nothing.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{Grid, GridCoord};
use crate::layout::WorldLayout;
use crate::math::Vec3;

/// Obstacle markers float this far above their cell.
pub const MARKER_HEIGHT: f32 = 1.0;

/// Read/write access to per-cell blocked flags.
pub trait ObstacleSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn is_blocked(&self, x: i32, y: i32) -> bool;
    fn set_blocked(&mut self, x: i32, y: i32, blocked: bool);
}

/// Flat row-major blocked flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleMap {
    width: usize,
    height: usize,
    obstacles: Vec<bool>,
}

impl ObstacleMap {
    /// A map with nothing blocked.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            obstacles: vec![false; width * height],
        }
    }

    /// Build from an existing flag list, which must hold `width * height` entries.
    pub fn from_flags(width: usize, height: usize, obstacles: Vec<bool>) -> Result<Self, ConfigError> {
        let map = Self {
            width,
            height,
            obstacles,
        };
        map.validate()?;
        Ok(map)
    }

    /// Check the flag list against the declared dimensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = self.width * self.height;
        if self.obstacles.len() != expected {
            return Err(ConfigError::ObstacleListLength {
                expected,
                actual: self.obstacles.len(),
            });
        }
        Ok(())
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Flip one cell. Out-of-bounds coordinates are ignored.
    pub fn toggle(&mut self, x: i32, y: i32) {
        let blocked = self.is_blocked(x, y);
        self.set_blocked(x, y, !blocked);
    }

    /// Unblock every cell.
    pub fn clear_all(&mut self) {
        for flag in &mut self.obstacles {
            *flag = false;
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.obstacles.iter().filter(|flag| **flag).count()
    }

    /// Serialize this map to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize and validate a map from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: Self = serde_json::from_str(json)?;
        map.validate()?;
        Ok(map)
    }

    /// Save this map to a file.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| anyhow!("Failed to write obstacle map {:?}: {}", path, e))?;
        Ok(())
    }

    /// Load a map from a file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read obstacle map {:?}: {}", path, e))?;
        Self::from_json(&json)
    }
}

impl ObstacleSource for ObstacleMap {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    /// Out-of-bounds cells report as blocked.
    fn is_blocked(&self, x: i32, y: i32) -> bool {
        match self.index_of(x, y) {
            Some(index) => self.obstacles.get(index).copied().unwrap_or(true),
            None => {
                log::error!("Obstacle lookup ({}, {}) is out of bounds", x, y);
                true
            }
        }
    }

    fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        match self.index_of(x, y) {
            Some(index) => {
                if let Some(flag) = self.obstacles.get_mut(index) {
                    *flag = blocked;
                }
            }
            None => log::error!("Obstacle edit ({}, {}) is out of bounds", x, y),
        }
    }
}

/// Sink for obstacle visuals.
pub trait ObstacleVisuals {
    /// Remove every marker placed so far.
    fn clear(&mut self);
    /// Place a marker for a blocked cell.
    fn place(&mut self, coord: GridCoord, position: Vec3);
    fn count(&self) -> usize;
}

/// In-memory obstacle markers, for headless use and tests.
#[derive(Clone, Debug, Default)]
pub struct MarkerSet {
    markers: Vec<(GridCoord, Vec3)>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[(GridCoord, Vec3)] {
        &self.markers
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        self.markers.iter().any(|(marked, _)| *marked == coord)
    }
}

impl ObstacleVisuals for MarkerSet {
    fn clear(&mut self) {
        self.markers.clear();
    }

    fn place(&mut self, coord: GridCoord, position: Vec3) {
        self.markers.push((coord, position));
    }

    fn count(&self) -> usize {
        self.markers.len()
    }
}

/// Outcome of one synchronization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub blocked: usize,
    pub walkable: usize,
    /// Cells whose walkable flag changed in this pass.
    pub changed: usize,
}

/// Fail unless the obstacle map has the grid's shape.
pub fn check_dimensions(grid: &Grid, source: &dyn ObstacleSource) -> Result<(), ConfigError> {
    if grid.width() != source.width() || grid.height() != source.height() {
        return Err(ConfigError::DimensionMismatch {
            grid_width: grid.width(),
            grid_height: grid.height(),
            map_width: source.width(),
            map_height: source.height(),
        });
    }
    Ok(())
}

/// Copy blocked flags onto the grid and rebuild the markers.
///
/// Occupied cells get no special treatment here; editing surfaces refuse to
/// block them.
pub fn synchronize(
    grid: &mut Grid,
    source: &dyn ObstacleSource,
    layout: &dyn WorldLayout,
    visuals: &mut dyn ObstacleVisuals,
) -> Result<SyncReport, ConfigError> {
    check_dimensions(grid, source)?;

    visuals.clear();
    let mut report = SyncReport::default();
    for cell in grid.iter_mut() {
        let coord = cell.coord();
        let walkable = !source.is_blocked(coord.x, coord.y);
        if cell.walkable != walkable {
            report.changed += 1;
        }
        cell.walkable = walkable;

        if walkable {
            report.walkable += 1;
        } else {
            report.blocked += 1;
            let position = layout.world_position(coord) + Vec3::new(0.0, MARKER_HEIGHT, 0.0);
            visuals.place(coord, position);
        }
    }

    Ok(report)
}
