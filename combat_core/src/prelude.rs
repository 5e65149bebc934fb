//! Prelude module for convenient imports
//!
//! ```rust
//! use combat_core::prelude::*;
//! ```

// Orchestration
pub use crate::combat::{
    AttackOutcome, Orchestrator, Phase, PlayerHit, RollReport, TurnOutcome, TurnReport,
};
pub use crate::CombatError;

// Targeting
pub use crate::targeting::{TargetSelector, TargetState};

// Collaborators
pub use crate::enemy::{AttackPresentation, Economy, Enemy, EnemyId, Presenter, SilentPresenter};

// Config
pub use crate::config::CombatConfig;

// Re-exports from the dice and relic crates
pub use dice_core::{AchievedHand, DiceSet, DieKind, HandCatalog, TargetShape};
pub use relic_core::{EventBus, GameEvent, Relic, RelicEffect, RelicLibrary};
pub use rand_chacha::ChaCha8Rng;
