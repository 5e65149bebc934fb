//! Hand templates and the achieved hands produced from them

mod catalog;
mod predicate;

pub use catalog::{CatalogFlags, HandCatalog, STRAIGHT_MASTERY};
pub use predicate::HandPredicate;

use crate::dice::{DieId, DieValue};
use crate::types::TargetShape;
use crate::HandError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used for the single-die fallback attack
pub const SUM_HAND: &str = "Sum";

/// How a hand turns dice values into a damage or gold number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRule {
    Fixed(i32),
    /// Sum of every evaluated value times `factor`
    Sum { factor: i32 },
    /// Sum of the dice the hand consumes times `factor`
    UsedSum { factor: i32 },
    /// Highest value times `factor`
    Highest { factor: i32 },
    /// `amount` per consumed die
    PerDie { amount: i32 },
}

impl ValueRule {
    /// Resolve against all evaluated values and the consumed subset
    pub fn resolve(&self, values: &[u32], used: &[u32]) -> i32 {
        match *self {
            ValueRule::Fixed(n) => n,
            ValueRule::Sum { factor } => values.iter().sum::<u32>() as i32 * factor,
            ValueRule::UsedSum { factor } => used.iter().sum::<u32>() as i32 * factor,
            ValueRule::Highest { factor } => {
                values.iter().copied().max().unwrap_or(0) as i32 * factor
            }
            ValueRule::PerDie { amount } => used.len() as i32 * amount,
        }
    }
}

impl Default for ValueRule {
    fn default() -> Self {
        ValueRule::Fixed(0)
    }
}

/// Which dice a matched hand consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsedDice {
    /// Every evaluated die
    #[default]
    All,
    /// Only the dice forming the predicate's pattern
    Pattern,
}

/// Secondary attack carried by hybrid hands, aimed at enemies outside the primary set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAttackTemplate {
    pub shape: TargetShape,
    /// Used by random sub-attacks; zero derives the count from damage
    #[serde(default)]
    pub target_count: usize,
    pub damage: ValueRule,
}

/// Resolved sub-attack on an achieved hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAttack {
    pub shape: TargetShape,
    pub target_count: usize,
    pub damage: i32,
}

/// Extra payout granted while a catalog flag is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagBoost {
    pub flag: String,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub gold: i32,
}

/// Immutable definition of a scoring hand
///
/// Templates are only ever read during evaluation; every match produces a new
/// [`AchievedHand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shape: TargetShape,
    pub predicate: HandPredicate,
    pub damage: ValueRule,
    #[serde(default)]
    pub gold: ValueRule,
    #[serde(default)]
    pub used_dice: UsedDice,
    #[serde(default = "default_required_targets")]
    pub required_targets: usize,
    /// Zero means one target per `damage_per_target` points of damage
    #[serde(default)]
    pub random_targets: usize,
    #[serde(default)]
    pub sub_attack: Option<SubAttackTemplate>,
    /// Template is skipped while this flag is active
    #[serde(default)]
    pub hidden_by: Option<String>,
    #[serde(default)]
    pub boost: Option<FlagBoost>,
}

fn default_required_targets() -> usize {
    1
}

impl HandTemplate {
    /// Create a fixed-payout template with defaults for the shape parameters
    pub fn new(
        name: impl Into<String>,
        shape: TargetShape,
        predicate: HandPredicate,
        damage: ValueRule,
        gold: ValueRule,
    ) -> Self {
        HandTemplate {
            name: name.into(),
            description: String::new(),
            shape,
            predicate,
            damage,
            gold,
            used_dice: UsedDice::All,
            required_targets: 1,
            random_targets: 0,
            sub_attack: None,
            hidden_by: None,
            boost: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_used_dice(mut self, used_dice: UsedDice) -> Self {
        self.used_dice = used_dice;
        self
    }

    pub fn with_required_targets(mut self, count: usize) -> Self {
        self.required_targets = count;
        self
    }

    pub fn with_random_targets(mut self, count: usize) -> Self {
        self.random_targets = count;
        self
    }

    pub fn with_sub_attack(mut self, sub_attack: SubAttackTemplate) -> Self {
        self.sub_attack = Some(sub_attack);
        self
    }

    pub fn hidden_by(mut self, flag: impl Into<String>) -> Self {
        self.hidden_by = Some(flag.into());
        self
    }

    pub fn with_boost(mut self, flag: impl Into<String>, damage: i32, gold: i32) -> Self {
        self.boost = Some(FlagBoost {
            flag: flag.into(),
            damage,
            gold,
        });
        self
    }

    /// Validate shape parameters
    pub fn validate(&self) -> Result<(), HandError> {
        if self.name.trim().is_empty() {
            return Err(HandError::EmptyName);
        }
        let invalid = |message: &str| HandError::InvalidPredicate {
            hand: self.name.clone(),
            message: message.to_string(),
        };
        match &self.predicate {
            HandPredicate::Group { size } if *size == 0 => {
                return Err(invalid("group size must be at least 1"));
            }
            HandPredicate::Groups { sizes } if sizes.is_empty() || sizes.contains(&0) => {
                return Err(invalid("groups need non-zero sizes"));
            }
            HandPredicate::Straight { length } if *length == 0 => {
                return Err(invalid("straight length must be at least 1"));
            }
            _ => {}
        }
        if self.shape.needs_player_targets() && self.required_targets == 0 {
            return Err(HandError::NoTargets {
                hand: self.name.clone(),
                shape: self.shape,
            });
        }
        match (self.shape, &self.sub_attack) {
            (TargetShape::Hybrid, None) => Err(HandError::MissingSubAttack(self.name.clone())),
            (TargetShape::Hybrid, Some(sub)) if sub.shape.needs_player_targets() => {
                Err(HandError::InteractiveSubAttack(self.name.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// A template matched against real dice values
///
/// Snapshot values only; nothing here refers back to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievedHand {
    name: String,
    shape: TargetShape,
    damage: i32,
    gold: i32,
    required_targets: usize,
    random_targets: usize,
    sub_attack: Option<SubAttack>,
    used_dice: Vec<DieId>,
    used_values: Vec<u32>,
}

impl AchievedHand {
    /// Resolve `template` against `dice`, which must satisfy its predicate
    pub(crate) fn from_template(template: &HandTemplate, dice: &[DieValue], boost: bool) -> Self {
        let values: Vec<u32> = dice.iter().map(|d| d.value).collect();
        let positions = match template.used_dice {
            UsedDice::All => (0..dice.len()).collect(),
            UsedDice::Pattern => template.predicate.pattern_positions(&values),
        };
        let used_dice: Vec<DieId> = positions.iter().map(|&i| dice[i].id).collect();
        let used_values: Vec<u32> = positions.iter().map(|&i| values[i]).collect();

        let mut damage = template.damage.resolve(&values, &used_values);
        let mut gold = template.gold.resolve(&values, &used_values);
        if boost {
            if let Some(b) = &template.boost {
                damage += b.damage;
                gold += b.gold;
            }
        }

        let sub_attack = template.sub_attack.map(|sub| SubAttack {
            shape: sub.shape,
            target_count: sub.target_count,
            damage: sub.damage.resolve(&values, &used_values),
        });

        AchievedHand {
            name: template.name.clone(),
            shape: template.shape,
            damage,
            gold,
            required_targets: template.required_targets,
            random_targets: template.random_targets,
            sub_attack,
            used_dice,
            used_values,
        }
    }

    /// Single-die fallback: a random-target attack worth the die's value
    pub fn forced_sum(die: DieValue) -> Self {
        let value = die.value as i32;
        AchievedHand {
            name: SUM_HAND.to_string(),
            shape: TargetShape::Random,
            damage: value,
            gold: value,
            required_targets: 1,
            random_targets: 1,
            sub_attack: None,
            used_dice: vec![die.id],
            used_values: vec![die.value],
        }
    }

    /// Copy of this hand carrying final (post-modifier) numbers
    pub fn with_payout(&self, damage: i32, gold: i32) -> Self {
        AchievedHand {
            damage,
            gold,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TargetShape {
        self.shape
    }

    pub fn damage(&self) -> i32 {
        self.damage
    }

    pub fn gold(&self) -> i32 {
        self.gold
    }

    pub fn required_targets(&self) -> usize {
        self.required_targets
    }

    pub fn random_targets(&self) -> usize {
        self.random_targets
    }

    pub fn sub_attack(&self) -> Option<&SubAttack> {
        self.sub_attack.as_ref()
    }

    pub fn used_dice(&self) -> &[DieId] {
        &self.used_dice
    }

    pub fn used_values(&self) -> &[u32] {
        &self.used_values
    }
}

impl fmt::Display for AchievedHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} dmg, {} gold)",
            self.name, self.shape, self.damage, self.gold
        )
    }
}
