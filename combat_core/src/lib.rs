//! combat_core - Targeting and chain-attack turn orchestration
//!
//! This library provides:
//! - TargetSelector: the per-attack targeting state machine
//! - Orchestrator: rolls, hand selection, resolution and chaining for one fight
//! - Enemy / Economy / Presenter: the collaborators a fight calls into
//! - CombatConfig: TOML-backed tuning for pools, rolls and chaining
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use combat_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let config = CombatConfig::load(Path::new("config/combat.toml"))?;
//! let mut bus = EventBus::with_seed(42);
//! bus.acquire(library.require("whetstone")?.clone())?;
//!
//! let mut fight = Orchestrator::new(
//!     config,
//!     HandCatalog::standard(),
//!     bus,
//!     player,
//!     SilentPresenter,
//!     ChaCha8Rng::seed_from_u64(42),
//! )?;
//!
//! fight.start_zone()?;
//! fight.start_wave(vec![Box::new(slime), Box::new(bat)])?;
//!
//! fight.roll()?;
//! if fight.select_hand(0)? == TargetState::AwaitingTargets {
//!     fight.toggle_target(EnemyId(1));
//!     fight.confirm_targets()?;
//! }
//! // Presentation calls impact(i) as each projectile lands, then:
//! match fight.complete_attack()? {
//!     TurnOutcome::ContinueTurn => { /* pick another hand or roll again */ }
//!     TurnOutcome::WaveCleared => println!("cleared!"),
//!     TurnOutcome::WaveFailed => println!("out of rolls"),
//! }
//! ```

pub mod combat;
pub mod config;
pub mod enemy;
pub mod prelude;
pub mod targeting;

#[cfg(test)]
pub(crate) mod testing;

// Core API
pub use combat::{
    AttackOutcome, Orchestrator, Phase, PlayerHit, RollReport, TurnOutcome, TurnReport,
};
pub use enemy::{AttackPresentation, Economy, Enemy, EnemyId, Presenter, SilentPresenter};
pub use targeting::{random_target_count, TargetSelector, TargetState};

// Configuration
pub use config::{
    ChainConfig, CombatConfig, ConfigError, DiceConfig, PipelineConfig, RollConfig,
    TargetingConfig,
};

use relic_core::RelicError;
use thiserror::Error;

/// Error driving a fight
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("Cannot {operation} during {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },
    #[error("An attack is still resolving")]
    ResolutionInFlight,
    #[error("No hand at index {0}")]
    NoSuchHand(usize),
    #[error("A wave needs at least one enemy")]
    EmptyRoster,
    #[error("Attack needs {required} targets, {selected} selected")]
    InvalidTargets { required: usize, selected: usize },
    #[error("Relic error: {0}")]
    Relic(#[from] RelicError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
