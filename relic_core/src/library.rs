use crate::effect::RelicEffect;
use crate::relic::Relic;
use crate::{ConfigError, RelicError};
use dice_core::{HandCatalog, TargetShape, STRAIGHT_MASTERY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// On-disk shape of a relic file (`[[relics]]` tables, or a `relics` JSON array)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelicFileConfig {
    #[serde(default)]
    pub relics: Vec<Relic>,
}

/// Catalog of relic definitions, keyed by id
#[derive(Debug, Clone, Default)]
pub struct RelicLibrary {
    relics: BTreeMap<String, Relic>,
}

impl RelicLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all relic definitions from a directory (recursively)
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut library = Self::new();
        library.load_dir(dir)?;
        Ok(library)
    }

    fn load_dir(&mut self, dir: &Path) -> Result<(), ConfigError> {
        if !dir.exists() {
            return Ok(());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(dir.to_path_buf()),
        })?;

        // Sorted so duplicate-id errors are reported against the same file every time
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Io {
                error: e,
                path: Some(dir.to_path_buf()),
            })?;
            paths.push(entry.path());
        }
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.load_dir(&path)?;
            } else if path.extension().is_some_and(|ext| ext == "toml") {
                self.load_file(&path)?;
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            error: e,
            path: Some(path.to_path_buf()),
        })?;

        let config: RelicFileConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            error: e,
            path: path.to_path_buf(),
        })?;

        self.extend(config).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse relic definitions from a JSON document
    pub fn parse_json(content: &str) -> Result<Self, ConfigError> {
        let config: RelicFileConfig =
            serde_json::from_str(content).map_err(|error| ConfigError::Json { error })?;
        let mut library = Self::new();
        library
            .extend(config)
            .map_err(|e| ConfigError::Validation {
                message: e.to_string(),
                path: None,
            })?;
        Ok(library)
    }

    fn extend(&mut self, config: RelicFileConfig) -> Result<(), RelicError> {
        for relic in config.relics {
            self.insert(relic)?;
        }
        Ok(())
    }

    /// Add one definition; ids must be unique
    pub fn insert(&mut self, relic: Relic) -> Result<(), RelicError> {
        relic.validate()?;
        if self.relics.contains_key(&relic.id) {
            return Err(RelicError::Validation {
                relic: relic.id,
                message: "duplicate relic id".to_string(),
            });
        }
        self.relics.insert(relic.id.clone(), relic);
        Ok(())
    }

    /// Get a relic by ID
    pub fn get(&self, id: &str) -> Option<&Relic> {
        self.relics.get(id)
    }

    /// Get a relic by ID, or fail with `UnknownRelic`
    pub fn require(&self, id: &str) -> Result<&Relic, RelicError> {
        self.get(id)
            .ok_or_else(|| RelicError::UnknownRelic(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.relics.contains_key(id)
    }

    /// All relic IDs, sorted
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.relics.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.relics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relics.is_empty()
    }

    /// Check that every hand a relic names exists in the catalog
    pub fn validate_hands(&self, catalog: &HandCatalog) -> Result<(), RelicError> {
        for relic in self.relics.values() {
            if let Some(hand) = relic.effect.referenced_hand() {
                if !catalog.contains(hand) {
                    return Err(RelicError::Validation {
                        relic: relic.id.clone(),
                        message: format!("unknown hand '{}'", hand),
                    });
                }
            }
        }
        Ok(())
    }

    /// A small built-in set matching the standard hand catalog
    pub fn standard() -> Self {
        let mut library = Self::new();
        for relic in standard_relics() {
            if let Err(e) = library.insert(relic) {
                warn!("Skipping built-in relic: {}", e);
            }
        }
        library
    }
}

fn standard_relics() -> Vec<Relic> {
    vec![
        Relic::new("whetstone", "Whetstone", RelicEffect::FlatDamage { amount: 3 })
            .with_description("+3 damage on every attack")
            .with_max_stacks(3),
        Relic::new(
            "war_drum",
            "War Drum",
            RelicEffect::DamageMultiplier { multiplier: 1.2 },
        )
        .with_description("x1.2 damage")
        .with_max_stacks(2),
        Relic::new(
            "loaded_purse",
            "Loaded Purse",
            RelicEffect::GoldMultiplier { multiplier: 1.5 },
        )
        .with_description("x1.5 gold from attacks"),
        Relic::new(
            "trident",
            "Trident",
            RelicEffect::HandDamage {
                hand: "Triple".to_string(),
                amount: 10,
            },
        )
        .with_description("+10 damage with Triple"),
        Relic::new(
            "thunderhead",
            "Thunderhead",
            RelicEffect::ShapeDamage {
                shape: TargetShape::Aoe,
                amount: 5,
            },
        )
        .with_description("+5 damage on attacks that hit everyone"),
        Relic::new(
            "blood_pact",
            "Blood Pact",
            RelicEffect::DamagePerMissingHp {
                per_hp: 10,
                amount: 2,
            },
        )
        .with_description("+2 damage per 10 missing HP"),
        Relic::new(
            "lucky_coin",
            "Lucky Coin",
            RelicEffect::Critical { chance: 0.15 },
        )
        .with_description("15% chance to crit")
        .with_max_stacks(3),
        Relic::new(
            "momentum",
            "Momentum",
            RelicEffect::ChainDamage { amount: 4 },
        )
        .with_description("+4 damage per earlier attack this turn"),
        Relic::new(
            "vampire_fang",
            "Vampire Fang",
            RelicEffect::LifeSteal { fraction: 0.1 },
        )
        .with_description("Heal 10% of damage dealt"),
        Relic::new(
            "second_chance",
            "Second Chance",
            RelicEffect::RerollBelow {
                threshold: 2,
                max_dice: 2,
            },
        )
        .with_description("Reroll up to two 1s or 2s once per turn"),
        Relic::new("hourglass", "Hourglass", RelicEffect::FreeFirstRoll)
            .with_description("The first roll of each wave is free"),
        Relic::new(
            "last_stand",
            "Last Stand",
            RelicEffect::CancelHitBelowHp { threshold: 0.2 },
        )
        .with_description("Once per zone, ignore a hit taken below 20% HP"),
        Relic::new("buckler", "Buckler", RelicEffect::DamageReduction { amount: 2 })
            .with_description("Take 2 less damage")
            .with_max_stacks(3),
        Relic::new(
            "phoenix_feather",
            "Phoenix Feather",
            RelicEffect::Revive { hp_fraction: 0.5 },
        )
        .with_description("Revive once with half HP"),
        Relic::new(
            "piggy_bank",
            "Piggy Bank",
            RelicEffect::Interest {
                per_gold: 10,
                amount: 1,
                cap: 5,
            },
        )
        .with_description("1 gold per 10 held at wave end, up to 5"),
        Relic::new(
            "compass",
            "Compass",
            RelicEffect::CatalogFlag {
                flag: STRAIGHT_MASTERY.to_string(),
            },
        )
        .with_description("Small Straight is gone; Large Straight hits harder"),
    ]
}
