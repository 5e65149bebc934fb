//! Mutable context records carried by pipeline events
//!
//! Each record splits into situational fields, readable through accessors, and
//! public fields that relic handlers are allowed to change. The orchestrator
//! builds a record right before publishing and folds it with the `final_*`
//! methods right after.

use dice_core::{AchievedHand, DieId, DieValue};
use serde::{Deserialize, Serialize};

/// Player resources as seen by relic handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub hp: i32,
    pub max_hp: i32,
    pub gold: i32,
}

impl PlayerSnapshot {
    pub fn new(hp: i32, max_hp: i32, gold: i32) -> Self {
        PlayerSnapshot { hp, max_hp, gold }
    }

    /// Current HP as a fraction of max (0.0 when max is not positive)
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        self.hp as f64 / self.max_hp as f64
    }

    pub fn missing_hp(&self) -> i32 {
        (self.max_hp - self.hp).max(0)
    }
}

/// Round to nearest, halves away from zero, never below zero
fn round_non_negative(value: f64) -> i32 {
    value.round().max(0.0) as i32
}

/// Payload of `DiceRolled` and `DiceRerolled`
#[derive(Debug, Clone, PartialEq)]
pub struct RollContext {
    dice: Vec<DieValue>,
    is_first_roll: bool,
    rolls_remaining: u32,
    /// Dice to reroll before hands are evaluated
    pub reroll: Vec<DieId>,
    /// Dice to mark preserved
    pub preserve: Vec<DieId>,
    /// Whether this roll spends one of the wave's rolls
    pub consume_roll: bool,
}

impl RollContext {
    pub fn new(dice: Vec<DieValue>, is_first_roll: bool, rolls_remaining: u32) -> Self {
        RollContext {
            dice,
            is_first_roll,
            rolls_remaining,
            reroll: Vec::new(),
            preserve: Vec::new(),
            consume_roll: true,
        }
    }

    pub fn dice(&self) -> &[DieValue] {
        &self.dice
    }

    pub fn is_first_roll(&self) -> bool {
        self.is_first_roll
    }

    pub fn rolls_remaining(&self) -> u32 {
        self.rolls_remaining
    }

    /// Queue a reroll, ignoring duplicates and dice not in this roll
    pub fn request_reroll(&mut self, id: DieId) -> bool {
        if self.reroll.contains(&id) || !self.dice.iter().any(|d| d.id == id) {
            return false;
        }
        self.reroll.push(id);
        true
    }

    pub fn request_preserve(&mut self, id: DieId) -> bool {
        if self.preserve.contains(&id) || !self.dice.iter().any(|d| d.id == id) {
            return false;
        }
        self.preserve.push(id);
        true
    }
}

/// Payload of `HandComplete`
#[derive(Debug, Clone, PartialEq)]
pub struct HandContext {
    hand: AchievedHand,
    /// Flat damage folded into the attack this hand launches
    pub bonus_damage: i32,
    /// Flat gold folded into the attack this hand launches
    pub bonus_gold: i32,
}

impl HandContext {
    pub fn new(hand: AchievedHand) -> Self {
        HandContext {
            hand,
            bonus_damage: 0,
            bonus_gold: 0,
        }
    }

    pub fn hand(&self) -> &AchievedHand {
        &self.hand
    }
}

/// Payload of `BeforeAttack` and `AfterAttack`
///
/// Final numbers compose in a fixed order: flat bonuses first, then every
/// multiplier in the order relics applied them, then the critical multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackContext {
    hand: AchievedHand,
    player: PlayerSnapshot,
    is_first_attack_this_wave: bool,
    attacks_this_turn: u32,
    target_count: usize,
    damage_dealt: i32,
    kills: u32,

    pub flat_damage: i32,
    pub flat_gold: i32,
    pub damage_multiplier: f64,
    pub gold_multiplier: f64,
    pub critical: bool,
    pub crit_multiplier: f64,
    /// Healed once the attack lands
    pub heal_after_attack: i32,
    /// Gold paid once the attack lands
    pub gold_after_attack: i32,
}

impl AttackContext {
    pub fn new(
        hand: AchievedHand,
        player: PlayerSnapshot,
        is_first_attack_this_wave: bool,
        attacks_this_turn: u32,
        target_count: usize,
        crit_multiplier: f64,
    ) -> Self {
        AttackContext {
            hand,
            player,
            is_first_attack_this_wave,
            attacks_this_turn,
            target_count,
            damage_dealt: 0,
            kills: 0,
            flat_damage: 0,
            flat_gold: 0,
            damage_multiplier: 1.0,
            gold_multiplier: 1.0,
            critical: false,
            crit_multiplier,
            heal_after_attack: 0,
            gold_after_attack: 0,
        }
    }

    /// Record what the attack did before `AfterAttack` is published
    pub fn record_outcome(&mut self, damage_dealt: i32, kills: u32) {
        self.damage_dealt = damage_dealt;
        self.kills = kills;
    }

    pub fn hand(&self) -> &AchievedHand {
        &self.hand
    }

    pub fn base_damage(&self) -> i32 {
        self.hand.damage()
    }

    pub fn base_gold(&self) -> i32 {
        self.hand.gold()
    }

    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }

    pub fn is_first_attack_this_wave(&self) -> bool {
        self.is_first_attack_this_wave
    }

    /// Attacks already resolved earlier in this turn's chain
    pub fn attacks_this_turn(&self) -> u32 {
        self.attacks_this_turn
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn damage_dealt(&self) -> i32 {
        self.damage_dealt
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    fn total_damage_multiplier(&self) -> f64 {
        if self.critical {
            self.damage_multiplier * self.crit_multiplier
        } else {
            self.damage_multiplier
        }
    }

    /// `round((base + flat) * multipliers [* crit])`, clamped at zero
    pub fn final_damage(&self) -> i32 {
        let pre = (self.base_damage() + self.flat_damage) as f64;
        round_non_negative(pre * self.total_damage_multiplier())
    }

    /// `round((base + flat) * gold multipliers)`, clamped at zero
    pub fn final_gold(&self) -> i32 {
        let pre = (self.base_gold() + self.flat_gold) as f64;
        round_non_negative(pre * self.gold_multiplier)
    }

    /// Sub-attack damage scaled by the same multipliers; flat bonuses stay with the primary hit
    pub fn final_sub_damage(&self, base: i32) -> i32 {
        round_non_negative(base as f64 * self.total_damage_multiplier())
    }
}

/// Payload of `BeforePlayerDamaged`
#[derive(Debug, Clone, PartialEq)]
pub struct DamageContext {
    amount: i32,
    source: String,
    player: PlayerSnapshot,
    /// Voids the hit entirely
    pub cancelled: bool,
    /// Relic that cancelled the hit
    pub cancelled_by: Option<String>,
    pub reduction: i32,
}

impl DamageContext {
    pub fn new(amount: i32, source: impl Into<String>, player: PlayerSnapshot) -> Self {
        DamageContext {
            amount,
            source: source.into(),
            player,
            cancelled: false,
            cancelled_by: None,
            reduction: 0,
        }
    }

    pub fn amount(&self) -> i32 {
        self.amount
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }

    pub fn final_amount(&self) -> i32 {
        if self.cancelled {
            0
        } else {
            (self.amount - self.reduction).max(0)
        }
    }
}

/// Payload of `PlayerDeath`
#[derive(Debug, Clone, PartialEq)]
pub struct DeathContext {
    player: PlayerSnapshot,
    /// HP to come back with; `Some` short-circuits game over
    pub revive_hp: Option<i32>,
    pub revived_by: Option<String>,
}

impl DeathContext {
    pub fn new(player: PlayerSnapshot) -> Self {
        DeathContext {
            player,
            revive_hp: None,
            revived_by: None,
        }
    }

    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }
}

/// Payload of `GoldGain`
#[derive(Debug, Clone, PartialEq)]
pub struct GoldContext {
    amount: i32,
    pub flat: i32,
    pub multiplier: f64,
}

impl GoldContext {
    pub fn new(amount: i32) -> Self {
        GoldContext {
            amount,
            flat: 0,
            multiplier: 1.0,
        }
    }

    pub fn amount(&self) -> i32 {
        self.amount
    }

    pub fn final_amount(&self) -> i32 {
        round_non_negative((self.amount + self.flat) as f64 * self.multiplier)
    }
}

/// Payload of `PlayerHeal`
#[derive(Debug, Clone, PartialEq)]
pub struct HealContext {
    amount: i32,
    pub flat: i32,
    pub multiplier: f64,
}

impl HealContext {
    pub fn new(amount: i32) -> Self {
        HealContext {
            amount,
            flat: 0,
            multiplier: 1.0,
        }
    }

    pub fn amount(&self) -> i32 {
        self.amount
    }

    pub fn final_amount(&self) -> i32 {
        round_non_negative((self.amount + self.flat) as f64 * self.multiplier)
    }
}

/// Payload of the wave, zone and turn lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressContext {
    zone: u32,
    wave: u32,
    turn: u32,
    player: PlayerSnapshot,
    cleared: bool,
    rolls_remaining: u32,
    pub bonus_gold: i32,
    pub bonus_heal: i32,
    pub extra_rolls: u32,
}

impl ProgressContext {
    pub fn new(zone: u32, wave: u32, turn: u32, player: PlayerSnapshot) -> Self {
        ProgressContext {
            zone,
            wave,
            turn,
            player,
            cleared: false,
            rolls_remaining: 0,
            bonus_gold: 0,
            bonus_heal: 0,
            extra_rolls: 0,
        }
    }

    /// Attach a wave outcome (used by `WaveEnd`)
    pub fn with_outcome(mut self, cleared: bool, rolls_remaining: u32) -> Self {
        self.cleared = cleared;
        self.rolls_remaining = rolls_remaining;
        self
    }

    pub fn zone(&self) -> u32 {
        self.zone
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }

    pub fn cleared(&self) -> bool {
        self.cleared
    }

    pub fn rolls_remaining(&self) -> u32 {
        self.rolls_remaining
    }
}

/// Payload of `ShopRefresh`
#[derive(Debug, Clone, PartialEq)]
pub struct ShopContext {
    base_cost: i32,
    pub discount: i32,
    pub cost_multiplier: f64,
}

impl ShopContext {
    pub fn new(base_cost: i32) -> Self {
        ShopContext {
            base_cost,
            discount: 0,
            cost_multiplier: 1.0,
        }
    }

    pub fn base_cost(&self) -> i32 {
        self.base_cost
    }

    pub fn final_cost(&self) -> i32 {
        round_non_negative((self.base_cost - self.discount) as f64 * self.cost_multiplier)
    }
}

/// Payload of `RelicAcquire`
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireContext {
    relic_id: String,
    pub max_hp_bonus: i32,
    pub bonus_gold: i32,
}

impl AcquireContext {
    pub fn new(relic_id: impl Into<String>) -> Self {
        AcquireContext {
            relic_id: relic_id.into(),
            max_hp_bonus: 0,
            bonus_gold: 0,
        }
    }

    pub fn relic_id(&self) -> &str {
        &self.relic_id
    }
}
