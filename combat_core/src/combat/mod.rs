//! Chain-attack turn orchestration

mod orchestrator;
mod report;

pub use orchestrator::Orchestrator;
pub use report::{AttackOutcome, PlayerHit, RollReport, TurnOutcome, TurnReport};

use serde::{Deserialize, Serialize};

/// Where the orchestrator is in the turn loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No wave running
    Idle,
    RollPending,
    HandSelection,
    Targeting,
    /// An attack is in flight; only `impact`/`complete_attack` advance it
    Resolving,
    TurnEnd,
    WaveOver { cleared: bool },
}

impl Phase {
    /// Phases in which a wave is being fought
    pub fn in_wave(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::WaveOver { .. })
    }
}
