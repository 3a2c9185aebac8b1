//! RealmGuard configuration types — loaded from `config.toml`.
//! Zones themselves live in the zone store; config only has server-wide constants.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level config file layout. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    pub world: WorldBounds,
    pub index: IndexConfig,
    pub resolution: ResolutionConfig,
    pub permissions: PermissionsConfig,
}

/// Extent of every world. Volumes entirely outside these bounds are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    /// Horizontal half-width around the origin, on both x and z.
    pub radius: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            radius: 30_000_000.0,
            min_y: -64.0,
            max_y: 320.0,
        }
    }
}

impl WorldBounds {
    #[must_use]
    pub fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        x.abs() <= self.radius && z.abs() <= self.radius && y >= self.min_y && y <= self.max_y
    }
}

/// Volume tree tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Side length of one horizontal grid cell, in blocks.
    pub cell_size: f64,
    /// Volumes covering more cells than this are kept in the always-checked list.
    pub max_cells_per_volume: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cell_size: 64.0,
            max_cells_per_volume: 4096,
        }
    }
}

/// How zones of equal priority are ordered against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The zone created first wins.
    #[default]
    OldestFirst,
    /// The zone created last wins.
    NewestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub tie_break: TieBreak,
    /// When false, denied flags in union settings are ignored and union is purely additive.
    pub honour_denials: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::OldestFirst,
            honour_denials: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Players holding this permission ignore restrictive settings unless a target is
    /// marked indiscriminate.
    pub unrestricted: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            unrestricted: realmguard_types::DEFAULT_UNRESTRICTED_PERMISSION.to_owned(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# RealmGuard configuration

[world]
# Horizontal half-width of every world, in blocks.
radius = 30000000.0
min_y = -64.0
max_y = 320.0

[index]
# Side of one horizontal lookup cell, in blocks.
cell_size = 64.0
# Volumes wider than this many cells are checked on every lookup instead.
max_cells_per_volume = 4096

[resolution]
# "oldest-first" or "newest-first" for zones sharing a priority.
tie_break = "oldest-first"
# Let higher zones remove flags granted by lower ones.
honour_denials = true

[permissions]
unrestricted = "realmguard.unrestricted"
"#;

impl RealmConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("realmguard: No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&s)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the commented default config if nothing exists at `path`.
    pub fn ensure(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG)?;
        log::info!("realmguard: Created default config at {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.index.cell_size.is_finite() && self.index.cell_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "index.cell_size must be positive, is {}",
                self.index.cell_size
            )));
        }
        if self.world.radius <= 0.0 || self.world.min_y >= self.world.max_y {
            return Err(ConfigError::Invalid("world bounds are empty".to_owned()));
        }
        Ok(())
    }
}
