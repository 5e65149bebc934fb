use serde::{Deserialize, Serialize};
use std::fmt;

/// Polyhedral die types available to the dice pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DieKind {
    D4,
    #[default]
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl DieKind {
    /// Highest face value this die can show
    pub fn max_face(&self) -> u32 {
        match self {
            DieKind::D4 => 4,
            DieKind::D6 => 6,
            DieKind::D8 => 8,
            DieKind::D10 => 10,
            DieKind::D12 => 12,
            DieKind::D20 => 20,
        }
    }

    /// Get all die kinds
    pub fn all() -> &'static [DieKind] {
        &[
            DieKind::D4,
            DieKind::D6,
            DieKind::D8,
            DieKind::D10,
            DieKind::D12,
            DieKind::D20,
        ]
    }
}

impl fmt::Display for DieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.max_face())
    }
}

/// Per-die state inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DieState {
    #[default]
    Normal,
    /// Excluded from available values until the counter reaches zero
    Locked { remaining: u32 },
    /// Survives the next removal-after-attack
    Preserved,
}

impl DieState {
    pub fn is_locked(&self) -> bool {
        matches!(self, DieState::Locked { .. })
    }

    pub fn is_preserved(&self) -> bool {
        matches!(self, DieState::Preserved)
    }
}

/// Which enemies a hand applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetShape {
    /// Every living enemy
    Aoe,
    /// Exactly `required_targets` enemies picked by the player
    #[default]
    Single,
    /// Enemies sampled without replacement
    Random,
    /// Player-picked primary targets plus a sub-attack on the rest
    Hybrid,
    /// No enemy targets; the payout goes to the player
    SelfBuff,
}

impl TargetShape {
    /// Whether resolving this shape needs player target input
    pub fn needs_player_targets(&self) -> bool {
        matches!(self, TargetShape::Single | TargetShape::Hybrid)
    }
}

impl fmt::Display for TargetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetShape::Aoe => write!(f, "AoE"),
            TargetShape::Single => write!(f, "Single"),
            TargetShape::Random => write!(f, "Random"),
            TargetShape::Hybrid => write!(f, "Hybrid"),
            TargetShape::SelfBuff => write!(f, "Self"),
        }
    }
}
