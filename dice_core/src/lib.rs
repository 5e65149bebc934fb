//! dice_core - Dice pool and hand evaluation
//!
//! This library provides:
//! - DiceSet: the player's dice with lock/preserve state and stable ids
//! - HandTemplate: immutable scoring-hand definitions
//! - HandCatalog: evaluates which hands a set of dice values achieves
//! - AchievedHand: resolved, independent result of one evaluation
//!
//! # Quick Start
//!
//! ```rust
//! use dice_core::{CatalogFlags, DiceSet, DieKind, HandCatalog};
//! use rand::SeedableRng;
//!
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
//! let mut dice = DiceSet::build(&[DieKind::D6; 5]);
//! dice.roll(&mut rng);
//!
//! let catalog = HandCatalog::standard();
//! let hands = catalog.evaluate(&dice.available(), &CatalogFlags::new());
//! assert!(!hands.is_empty());
//! ```

mod config;
pub mod dice;
pub mod hand;
pub mod types;

pub use config::{load_hands, parse_hands, HandFileConfig};
pub use dice::{DiceSet, Die, DieId, DieValue, RemovalReport};
pub use hand::{
    AchievedHand, CatalogFlags, FlagBoost, HandCatalog, HandPredicate, HandTemplate, SubAttack,
    SubAttackTemplate, UsedDice, ValueRule, STRAIGHT_MASTERY, SUM_HAND,
};
pub use types::{DieKind, DieState, TargetShape};

use std::path::PathBuf;
use thiserror::Error;

/// Error defining or registering a hand template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandError {
    #[error("Hand name must not be empty")]
    EmptyName,
    #[error("Invalid predicate for '{hand}': {message}")]
    InvalidPredicate { hand: String, message: String },
    #[error("Hand '{hand}' ({shape}) needs at least one target")]
    NoTargets { hand: String, shape: TargetShape },
    #[error("Hybrid hand '{0}' needs a sub_attack")]
    MissingSubAttack(String),
    #[error("Sub-attack of '{0}' must resolve without player input")]
    InteractiveSubAttack(String),
    #[error("Duplicate hand '{0}'")]
    Duplicate(String),
}

/// Error loading hand catalog configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading '{path:?}': {error}")]
    Io {
        error: std::io::Error,
        path: Option<PathBuf>,
    },
    #[error("Parse error in '{path}': {error}")]
    Parse {
        error: toml::de::Error,
        path: PathBuf,
    },
    #[error("Validation error in '{path}': {message}")]
    Validation { message: String, path: PathBuf },
    #[error("Invalid hand in '{path}': {error}")]
    Hand { error: HandError, path: PathBuf },
}
