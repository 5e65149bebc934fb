//! Serializable summaries of what the orchestrator did

use crate::enemy::EnemyId;
use dice_core::{AchievedHand, DieId, DieValue, TargetShape};
use serde::{Deserialize, Serialize};

/// How a turn (or the wave it belongs to) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// The wave goes on: another hand, a forced attack or a new roll
    ContinueTurn,
    WaveCleared,
    WaveFailed,
}

impl TurnOutcome {
    pub fn is_wave_over(&self) -> bool {
        !matches!(self, TurnOutcome::ContinueTurn)
    }
}

/// Result of one roll, after relic rerolls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollReport {
    pub dice: Vec<DieValue>,
    pub rerolled: Vec<DieId>,
    pub preserved: Vec<DieId>,
    pub hands: Vec<AchievedHand>,
    /// False when a relic refunded the roll
    pub consumed_roll: bool,
    pub rolls_remaining: u32,
    /// Set when the roll produced no hand and no roll is left
    pub outcome: Option<TurnOutcome>,
}

/// One resolved attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub hand: String,
    pub shape: TargetShape,
    pub targets: Vec<EnemyId>,
    pub sub_targets: Vec<EnemyId>,
    pub damage: i32,
    pub sub_damage: i32,
    pub gold: i32,
    pub critical: bool,
    pub damage_dealt: i32,
    pub kills: u32,
    pub healed: i32,
    pub dice_used: Vec<DieId>,
    /// Lone leftover die fired automatically
    pub forced: bool,
    pub relics_triggered: Vec<String>,
}

/// Everything that happened between a roll and the turn end
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TurnReport {
    pub wave: u32,
    pub turn: u32,
    pub rolls: Vec<Vec<u32>>,
    pub attacks: Vec<AttackOutcome>,
    pub rolls_remaining: u32,
    pub outcome: Option<TurnOutcome>,
}

impl TurnReport {
    pub fn total_damage(&self) -> i32 {
        self.attacks.iter().map(|a| a.damage_dealt).sum()
    }

    pub fn total_gold(&self) -> i32 {
        self.attacks.iter().map(|a| a.gold).sum()
    }
}

/// Result of damage aimed at the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerHit {
    pub requested: i32,
    pub dealt: i32,
    pub cancelled_by: Option<String>,
    pub revived_by: Option<String>,
    /// Player is at zero HP and nothing revived them
    pub dead: bool,
}
