//! Board configuration, loadable from JSON.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::GridCoord;
use crate::mover::MoverConfig;

/// How a configured mover picks its destinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    Controlled,
    /// Chases the mover declared at index `target` in [`BoardConfig::spawns`].
    Follower { target: usize },
}

/// One mover to place when the board is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub coord: GridCoord,
    pub kind: SpawnKind,
    /// Overrides [`BoardConfig::mover`] for this mover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mover: Option<MoverConfig>,
}

impl SpawnConfig {
    pub fn controlled(x: i32, y: i32) -> Self {
        Self {
            coord: GridCoord::new(x, y),
            kind: SpawnKind::Controlled,
            mover: None,
        }
    }

    pub fn follower(x: i32, y: i32, target: usize) -> Self {
        Self {
            coord: GridCoord::new(x, y),
            kind: SpawnKind::Follower { target },
            mover: None,
        }
    }

    #[must_use]
    pub fn with_mover(mut self, mover: MoverConfig) -> Self {
        self.mover = Some(mover);
        self
    }
}

/// Everything needed to build a [`crate::Board`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    pub tile_radius: f32,
    /// World position of the grid's center.
    pub origin: [f32; 3],
    /// Search budget per path request; `None` searches the whole grid.
    pub max_expansions: Option<usize>,
    /// Default movement tuning.
    pub mover: MoverConfig,
    pub spawns: Vec<SpawnConfig>,
    /// Initial row-major blocked flags; all clear when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstacles: Option<Vec<bool>>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            tile_radius: 0.5,
            origin: [0.0, 0.0, 0.0],
            max_expansions: None,
            mover: MoverConfig::default(),
            spawns: Vec::new(),
            obstacles: None,
        }
    }
}

impl BoardConfig {
    #[must_use]
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_tile_radius(mut self, tile_radius: f32) -> Self {
        self.tile_radius = tile_radius;
        self
    }

    #[must_use]
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = Some(max_expansions);
        self
    }

    #[must_use]
    pub fn with_mover(mut self, mover: MoverConfig) -> Self {
        self.mover = mover;
        self
    }

    #[must_use]
    pub fn with_spawn(mut self, spawn: SpawnConfig) -> Self {
        self.spawns.push(spawn);
        self
    }

    #[must_use]
    pub fn with_obstacles(mut self, obstacles: Vec<bool>) -> Self {
        self.obstacles = Some(obstacles);
        self
    }

    /// Check references between spawns and the obstacle list length.
    ///
    /// Cell-level checks (bounds, walkability, occupancy) happen when the
    /// board places each mover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(obstacles) = &self.obstacles {
            let expected = self.width * self.height;
            if obstacles.len() != expected {
                return Err(ConfigError::ObstacleListLength {
                    expected,
                    actual: obstacles.len(),
                });
            }
        }
        self.mover.validate()?;
        for (index, spawn) in self.spawns.iter().enumerate() {
            if let Some(mover) = &spawn.mover {
                mover.validate()?;
            }
            if let SpawnKind::Follower { target } = spawn.kind {
                if target >= index {
                    return Err(ConfigError::InvalidSetting {
                        name: "spawns",
                        reason: format!(
                            "follower #{index} targets #{target}, which must be declared before it"
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize this config to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save this config to a file.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| anyhow!("Failed to write config {:?}: {}", path, e))?;
        Ok(())
    }

    /// Load a config from a file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {:?}: {}", path, e))?;
        Self::from_json(&json)
    }
}
