//! TOML loading for hand catalogs

use crate::hand::{HandCatalog, HandTemplate};
use crate::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// TOML layout of a hand catalog file
#[derive(Debug, Deserialize)]
pub struct HandFileConfig {
    #[serde(default)]
    pub hands: Vec<HandTemplate>,
}

/// Load a catalog from a TOML file
pub fn load_hands(path: &Path) -> Result<HandCatalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        error: e,
        path: Some(path.to_path_buf()),
    })?;
    build_catalog(&content, path.to_path_buf())
}

/// Parse a catalog from a TOML string
pub fn parse_hands(toml: &str) -> Result<HandCatalog, ConfigError> {
    build_catalog(toml, PathBuf::from("<inline>"))
}

fn build_catalog(content: &str, path: PathBuf) -> Result<HandCatalog, ConfigError> {
    let config: HandFileConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        error: e,
        path: path.clone(),
    })?;

    if config.hands.is_empty() {
        return Err(ConfigError::Validation {
            message: "catalog defines no hands".to_string(),
            path,
        });
    }

    HandCatalog::from_templates(config.hands)
        .map_err(|error| ConfigError::Hand { error, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{CatalogFlags, HandPredicate, UsedDice, ValueRule};
    use crate::types::TargetShape;
    use crate::HandError;
    use std::io::Write;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
[[hands]]
name = "Pair"
shape = "single"
predicate = { kind = "group", size = 2 }
damage = { used_sum = { factor = 2 } }
gold = { fixed = 1 }
used_dice = "pattern"

[[hands]]
name = "Cleave"
shape = "hybrid"
predicate = { kind = "groups", sizes = [3, 2] }
damage = { fixed = 40 }
required_targets = 1
sub_attack = { shape = "random", target_count = 2, damage = { fixed = 8 } }

[[hands]]
name = "Run"
shape = "random"
predicate = { kind = "straight", length = 4 }
damage = { fixed = 30 }
hidden_by = "straight_mastery"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_hands(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);

        let pair = catalog.get("Pair").unwrap();
        assert_eq!(pair.shape, TargetShape::Single);
        assert_eq!(pair.predicate, HandPredicate::Group { size: 2 });
        assert_eq!(pair.damage, ValueRule::UsedSum { factor: 2 });
        assert_eq!(pair.used_dice, UsedDice::Pattern);
        assert_eq!(pair.required_targets, 1);

        let cleave = catalog.get("Cleave").unwrap();
        let sub = cleave.sub_attack.unwrap();
        assert_eq!(sub.shape, TargetShape::Random);
        assert_eq!(sub.target_count, 2);
        assert_eq!(cleave.gold, ValueRule::Fixed(0));

        let hands = catalog.evaluate_values(&[5, 5, 1], &CatalogFlags::new());
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].damage(), 20);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hands.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = HandCatalog::load(&path).unwrap();
        assert!(catalog.contains("Run"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = load_hands(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_hybrid_rejected() {
        let toml = r#"
[[hands]]
name = "Broken"
shape = "hybrid"
predicate = { kind = "always" }
damage = { fixed = 1 }
"#;
        assert!(matches!(
            parse_hands(toml),
            Err(ConfigError::Hand {
                error: HandError::MissingSubAttack(_),
                ..
            })
        ));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(parse_hands(""), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_bad_syntax_is_parse_error() {
        assert!(matches!(
            parse_hands("[[hands]\nname ="),
            Err(ConfigError::Parse { .. })
        ));
    }
}
