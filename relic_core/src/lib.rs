//! relic_core - Relic modifiers and the ordered event pipeline
//!
//! This library provides:
//! - GameEvent / EventPayload: the fixed event catalog and its payloads
//! - Context records (AttackContext, RollContext, ...) with `final_*` folds
//! - RelicEffect: the tagged effect kinds and their dispatcher
//! - EventBus: owned relics applied in acquisition order, with stacks and charges
//! - RelicLibrary: relic definitions loaded from TOML directories or JSON
//!
//! # Quick Start
//!
//! ```rust
//! use dice_core::{AchievedHand, DieId, DieValue};
//! use relic_core::{AttackContext, EventBus, EventPayload, PlayerSnapshot, Relic, RelicEffect};
//!
//! let mut bus = EventBus::with_seed(7);
//! bus.acquire(Relic::new("whetstone", "Whetstone", RelicEffect::FlatDamage { amount: 3 }))
//!     .unwrap();
//! bus.acquire(Relic::new(
//!     "war_drum",
//!     "War Drum",
//!     RelicEffect::DamageMultiplier { multiplier: 2.0 },
//! ))
//! .unwrap();
//!
//! let hand = AchievedHand::forced_sum(DieValue::new(DieId(0), 4));
//! let mut ctx = AttackContext::new(hand, PlayerSnapshot::new(30, 30, 0), true, 0, 1, 1.5);
//! bus.publish(&mut EventPayload::BeforeAttack(&mut ctx));
//! assert_eq!(ctx.final_damage(), 14);
//! ```

pub mod bus;
pub mod context;
pub mod effect;
pub mod event;
pub mod library;
pub mod relic;

pub use bus::EventBus;
pub use context::{
    AcquireContext, AttackContext, DamageContext, DeathContext, GoldContext, HandContext,
    HealContext, PlayerSnapshot, ProgressContext, RollContext, ShopContext,
};
pub use effect::{ChargeScope, RelicEffect};
pub use event::{EventPayload, GameEvent};
pub use library::{RelicFileConfig, RelicLibrary};
pub use relic::{Relic, RelicInstance};

use std::path::PathBuf;
use thiserror::Error;

/// Error acquiring or looking up relics
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelicError {
    #[error("Invalid relic '{relic}': {message}")]
    Validation { relic: String, message: String },
    #[error("Relic '{relic}' is already at its stack limit of {max}")]
    StackLimit { relic: String, max: u32 },
    #[error("Unknown relic: {0}")]
    UnknownRelic(String),
}

/// Error loading relic definitions
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
    #[error("JSON parse error: {error}")]
    Json { error: serde_json::Error },
    #[error("Validation error in '{path:?}': {message}")]
    Validation {
        message: String,
        path: Option<PathBuf>,
    },
}
