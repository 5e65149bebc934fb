//! Tunable combat configuration

use dice_core::DieKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading combat configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading '{path}': {error}")]
    Io {
        error: std::io::Error,
        path: PathBuf,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Combat tunables, passed explicitly to each orchestrator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CombatConfig {
    #[serde(default)]
    pub dice: DiceConfig,
    #[serde(default)]
    pub rolls: RollConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

impl CombatConfig {
    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            error,
            path: path.to_path_buf(),
        })?;
        Self::parse(&content)
    }

    /// Parse a config from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: CombatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dice.pool.is_empty() {
            return Err(ConfigError::Validation(
                "dice pool must contain at least one die".to_string(),
            ));
        }
        if self.rolls.per_wave == 0 {
            return Err(ConfigError::Validation(
                "rolls per wave must be at least 1".to_string(),
            ));
        }
        if self.targeting.damage_per_target <= 0 {
            return Err(ConfigError::Validation(format!(
                "damage_per_target must be positive, got {}",
                self.targeting.damage_per_target
            )));
        }
        if !self.pipeline.crit_multiplier.is_finite() || self.pipeline.crit_multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "crit_multiplier must be at least 1.0, got {}",
                self.pipeline.crit_multiplier
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceConfig {
    /// Dice the pool is built from at the start of each wave
    #[serde(default = "default_pool")]
    pub pool: Vec<DieKind>,
}

impl Default for DiceConfig {
    fn default() -> Self {
        DiceConfig {
            pool: default_pool(),
        }
    }
}

fn default_pool() -> Vec<DieKind> {
    vec![DieKind::D6; 5]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollConfig {
    #[serde(default = "default_rolls_per_wave")]
    pub per_wave: u32,
}

impl Default for RollConfig {
    fn default() -> Self {
        RollConfig {
            per_wave: default_rolls_per_wave(),
        }
    }
}

fn default_rolls_per_wave() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingConfig {
    /// Random hands with no fixed count hit one enemy per this much damage
    #[serde(default = "default_damage_per_target")]
    pub damage_per_target: i32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        TargetingConfig {
            damage_per_target: default_damage_per_target(),
        }
    }
}

fn default_damage_per_target() -> i32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum `DiceRerolled` passes after a single roll
    #[serde(default = "default_max_reroll_passes")]
    pub max_reroll_passes: u32,
    /// Critical strike multiplier (1.5 = 150%)
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_reroll_passes: default_max_reroll_passes(),
            crit_multiplier: default_crit_multiplier(),
        }
    }
}

fn default_max_reroll_passes() -> u32 {
    2
}

fn default_crit_multiplier() -> f64 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Keep attacking with leftover dice after each hand
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Auto-fire a lone leftover die as a Sum attack
    #[serde(default = "default_true")]
    pub force_last_die: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            enabled: true,
            force_last_die: true,
        }
    }
}

fn default_true() -> bool {
    true
}
