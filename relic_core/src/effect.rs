//! Relic effect kinds and the dispatcher that applies them to event payloads
//!
//! Effects are plain data; [`RelicEffect::apply`] matches the effect against the
//! payload of the event being published and updates only the context's public
//! fields. Flat amounts scale linearly with stacks, multipliers compose once per
//! stack.

use crate::context::{
    AcquireContext, AttackContext, DamageContext, DeathContext, GoldContext, HandContext,
    HealContext, ProgressContext, RollContext, ShopContext,
};
use crate::event::{EventPayload, GameEvent};
use dice_core::TargetShape;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long a limited-use effect waits before its charges come back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeScope {
    /// Refilled on `TurnStart`
    Turn,
    /// Refilled on `WaveStart`
    Wave,
    /// Refilled on `ZoneStart`
    Zone,
    /// Never refilled
    Run,
}

impl ChargeScope {
    /// The event that refills charges of this scope
    pub fn reset_event(&self) -> Option<GameEvent> {
        match self {
            ChargeScope::Turn => Some(GameEvent::TurnStart),
            ChargeScope::Wave => Some(GameEvent::WaveStart),
            ChargeScope::Zone => Some(GameEvent::ZoneStart),
            ChargeScope::Run => None,
        }
    }
}

/// Every effect a relic can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelicEffect {
    // === BeforeAttack ===
    FlatDamage { amount: i32 },
    FlatGold { amount: i32 },
    DamageMultiplier { multiplier: f64 },
    GoldMultiplier { multiplier: f64 },
    HandDamage { hand: String, amount: i32 },
    HandMultiplier { hand: String, multiplier: f64 },
    HandGold { hand: String, amount: i32 },
    ShapeDamage { shape: TargetShape, amount: i32 },
    /// `amount` per `per_hp` missing HP
    DamagePerMissingHp { per_hp: i32, amount: i32 },
    /// `amount` per `per_gold` held, up to `cap`
    DamagePerGold { per_gold: i32, amount: i32, cap: i32 },
    FirstAttackMultiplier { multiplier: f64 },
    /// Applies while HP is at or below `threshold` of max
    LowHpMultiplier { threshold: f64, multiplier: f64 },
    Critical { chance: f64 },
    CritMultiplier { bonus: f64 },
    /// `amount` per attack already made this turn
    ChainDamage { amount: i32 },
    DamagePerDie { amount: i32 },

    // === AfterAttack ===
    HealAfterAttack { amount: i32 },
    HealOnHand { hand: String, amount: i32 },
    LifeSteal { fraction: f64 },
    GoldPerKill { amount: i32 },

    // === DiceRolled / DiceRerolled ===
    /// Reroll up to `max_dice` of the lowest dice at or below `threshold`, once per turn
    RerollBelow { threshold: u32, max_dice: u32 },
    /// Reroll every die showing `value`, `per_turn` times per turn
    RerollValue { value: u32, per_turn: u32 },
    /// First roll of a wave does not spend a roll
    FreeFirstRoll,
    PreserveValue { value: u32 },

    // === HandComplete ===
    HandCompleteGold {
        #[serde(default)]
        hand: Option<String>,
        amount: i32,
    },
    HandCompleteDamage {
        #[serde(default)]
        hand: Option<String>,
        amount: i32,
    },

    // === BeforePlayerDamaged ===
    /// Cancel one hit per zone while HP is at or below `threshold` of max
    CancelHitBelowHp { threshold: f64 },
    /// Cancel the first hit of each wave
    CancelFirstHit,
    DamageReduction { amount: i32 },

    // === PlayerDeath ===
    /// Come back once with `hp_fraction` of max HP
    Revive { hp_fraction: f64 },

    // === Wave / Zone / Turn ===
    WaveStartGold { amount: i32 },
    WaveStartHeal { amount: i32 },
    ExtraRolls { count: u32 },
    WaveClearGold { amount: i32 },
    /// `amount` per `per_gold` held at wave end, up to `cap`
    Interest { per_gold: i32, amount: i32, cap: i32 },
    /// Gold per unused roll when a wave is cleared
    RollRefundGold { amount: i32 },
    ZoneStartGold { amount: i32 },
    ZoneEndHeal { amount: i32 },
    TurnStartHeal { amount: i32 },

    // === GoldGain ===
    GoldGainMultiplier { multiplier: f64 },
    GoldGainFlat { amount: i32 },

    // === ShopRefresh ===
    ShopDiscount { amount: i32 },
    /// One free refresh per zone
    FreeRefresh,

    // === RelicAcquire ===
    MaxHpPerRelic { amount: i32 },
    AcquireGold { amount: i32 },

    // === PlayerHeal ===
    HealMultiplier { multiplier: f64 },
    HealFlat { amount: i32 },

    // === Passive ===
    /// Sets a hand catalog flag while owned
    CatalogFlag { flag: String },
}

fn flat(amount: i32, stacks: u32) -> i32 {
    amount * stacks as i32
}

fn compound(multiplier: f64, stacks: u32) -> f64 {
    multiplier.powi(stacks as i32)
}

fn hand_matches(filter: &Option<String>, name: &str) -> bool {
    filter.as_deref().map_or(true, |h| h == name)
}

impl RelicEffect {
    /// Events this effect reacts to
    pub fn listens_to(&self) -> &'static [GameEvent] {
        use RelicEffect::*;
        match self {
            FlatDamage { .. }
            | FlatGold { .. }
            | DamageMultiplier { .. }
            | GoldMultiplier { .. }
            | HandDamage { .. }
            | HandMultiplier { .. }
            | HandGold { .. }
            | ShapeDamage { .. }
            | DamagePerMissingHp { .. }
            | DamagePerGold { .. }
            | FirstAttackMultiplier { .. }
            | LowHpMultiplier { .. }
            | Critical { .. }
            | CritMultiplier { .. }
            | ChainDamage { .. }
            | DamagePerDie { .. } => &[GameEvent::BeforeAttack],
            HealAfterAttack { .. } | HealOnHand { .. } | LifeSteal { .. } | GoldPerKill { .. } => {
                &[GameEvent::AfterAttack]
            }
            RerollBelow { .. } | FreeFirstRoll => &[GameEvent::DiceRolled],
            RerollValue { .. } | PreserveValue { .. } => {
                &[GameEvent::DiceRolled, GameEvent::DiceRerolled]
            }
            HandCompleteGold { .. } | HandCompleteDamage { .. } => &[GameEvent::HandComplete],
            CancelHitBelowHp { .. } | CancelFirstHit | DamageReduction { .. } => {
                &[GameEvent::BeforePlayerDamaged]
            }
            Revive { .. } => &[GameEvent::PlayerDeath],
            WaveStartGold { .. } | WaveStartHeal { .. } | ExtraRolls { .. } => {
                &[GameEvent::WaveStart]
            }
            WaveClearGold { .. } | Interest { .. } | RollRefundGold { .. } => &[GameEvent::WaveEnd],
            ZoneStartGold { .. } => &[GameEvent::ZoneStart],
            ZoneEndHeal { .. } => &[GameEvent::ZoneEnd],
            TurnStartHeal { .. } => &[GameEvent::TurnStart],
            GoldGainMultiplier { .. } | GoldGainFlat { .. } => &[GameEvent::GoldGain],
            ShopDiscount { .. } | FreeRefresh => &[GameEvent::ShopRefresh],
            MaxHpPerRelic { .. } | AcquireGold { .. } => &[GameEvent::RelicAcquire],
            HealMultiplier { .. } | HealFlat { .. } => &[GameEvent::PlayerHeal],
            CatalogFlag { .. } => &[],
        }
    }

    /// Limited-use effects: scope and charges per stack
    pub fn charges(&self) -> Option<(ChargeScope, u32)> {
        match self {
            RelicEffect::RerollBelow { .. } => Some((ChargeScope::Turn, 1)),
            RelicEffect::RerollValue { per_turn, .. } => Some((ChargeScope::Turn, *per_turn)),
            RelicEffect::FreeFirstRoll => Some((ChargeScope::Wave, 1)),
            RelicEffect::CancelHitBelowHp { .. } => Some((ChargeScope::Zone, 1)),
            RelicEffect::CancelFirstHit => Some((ChargeScope::Wave, 1)),
            RelicEffect::Revive { .. } => Some((ChargeScope::Run, 1)),
            RelicEffect::FreeRefresh => Some((ChargeScope::Zone, 1)),
            _ => None,
        }
    }

    /// Catalog flag contributed while the relic is owned
    pub fn catalog_flag(&self) -> Option<&str> {
        match self {
            RelicEffect::CatalogFlag { flag } => Some(flag),
            _ => None,
        }
    }

    /// Hand names this effect refers to
    pub fn referenced_hand(&self) -> Option<&str> {
        match self {
            RelicEffect::HandDamage { hand, .. }
            | RelicEffect::HandMultiplier { hand, .. }
            | RelicEffect::HandGold { hand, .. }
            | RelicEffect::HealOnHand { hand, .. } => Some(hand),
            RelicEffect::HandCompleteGold { hand, .. }
            | RelicEffect::HandCompleteDamage { hand, .. } => hand.as_deref(),
            _ => None,
        }
    }

    /// Check parameters at construction time
    pub fn validate(&self) -> Result<(), String> {
        use RelicEffect::*;
        let positive_multiplier = |m: f64| {
            if m.is_finite() && m > 0.0 {
                Ok(())
            } else {
                Err(format!("multiplier must be positive and finite, got {}", m))
            }
        };
        let fraction = |f: f64| {
            if f.is_finite() && f > 0.0 && f <= 1.0 {
                Ok(())
            } else {
                Err(format!("fraction must be in (0, 1], got {}", f))
            }
        };
        let positive = |n: i32, what: &str| {
            if n > 0 {
                Ok(())
            } else {
                Err(format!("{} must be positive, got {}", what, n))
            }
        };

        match self {
            HandMultiplier { hand, .. } if hand.trim().is_empty() => {
                Err("hand name must not be empty".to_string())
            }
            DamageMultiplier { multiplier }
            | GoldMultiplier { multiplier }
            | HandMultiplier { multiplier, .. }
            | FirstAttackMultiplier { multiplier }
            | GoldGainMultiplier { multiplier }
            | HealMultiplier { multiplier } => positive_multiplier(*multiplier),
            LowHpMultiplier {
                threshold,
                multiplier,
            } => {
                fraction(*threshold)?;
                positive_multiplier(*multiplier)
            }
            Critical { chance } | LifeSteal { fraction: chance } => fraction(*chance),
            CritMultiplier { bonus } => {
                if bonus.is_finite() && *bonus >= 0.0 {
                    Ok(())
                } else {
                    Err(format!("crit bonus must be non-negative, got {}", bonus))
                }
            }
            CancelHitBelowHp { threshold } => fraction(*threshold),
            Revive { hp_fraction } => fraction(*hp_fraction),
            DamagePerMissingHp { per_hp, .. } => positive(*per_hp, "per_hp"),
            DamagePerGold { per_gold, cap, .. } | Interest { per_gold, cap, .. } => {
                positive(*per_gold, "per_gold")?;
                positive(*cap, "cap")
            }
            RerollBelow { max_dice, .. } => positive(*max_dice as i32, "max_dice"),
            RerollValue { value, per_turn } => {
                positive(*value as i32, "value")?;
                positive(*per_turn as i32, "per_turn")
            }
            PreserveValue { value } => positive(*value as i32, "value"),
            HandDamage { hand, .. } | HandGold { hand, .. } | HealOnHand { hand, .. }
                if hand.trim().is_empty() =>
            {
                Err("hand name must not be empty".to_string())
            }
            CatalogFlag { flag } if flag.trim().is_empty() => {
                Err("catalog flag must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply this effect to a payload
    ///
    /// Returns true when the effect changed the context. Charge accounting is
    /// the caller's job.
    pub fn apply<R: Rng>(
        &self,
        relic_id: &str,
        stacks: u32,
        payload: &mut EventPayload<'_>,
        rng: &mut R,
    ) -> bool {
        match payload {
            EventPayload::BeforeAttack(ctx) => self.before_attack(stacks, ctx, rng),
            EventPayload::AfterAttack(ctx) => self.after_attack(stacks, ctx),
            EventPayload::DiceRolled(ctx) => self.on_roll(stacks, ctx, true),
            EventPayload::DiceRerolled(ctx) => self.on_roll(stacks, ctx, false),
            EventPayload::HandComplete(ctx) => self.hand_complete(stacks, ctx),
            EventPayload::BeforePlayerDamaged(ctx) => self.before_damaged(relic_id, stacks, ctx),
            EventPayload::PlayerDeath(ctx) => self.player_death(relic_id, ctx),
            EventPayload::WaveStart(ctx) => self.wave_start(stacks, ctx),
            EventPayload::WaveEnd(ctx) => self.wave_end(stacks, ctx),
            EventPayload::ZoneStart(ctx) => match self {
                RelicEffect::ZoneStartGold { amount } => {
                    ctx.bonus_gold += flat(*amount, stacks);
                    true
                }
                _ => false,
            },
            EventPayload::ZoneEnd(ctx) => match self {
                RelicEffect::ZoneEndHeal { amount } => {
                    ctx.bonus_heal += flat(*amount, stacks);
                    true
                }
                _ => false,
            },
            EventPayload::TurnStart(ctx) => match self {
                RelicEffect::TurnStartHeal { amount } => {
                    ctx.bonus_heal += flat(*amount, stacks);
                    true
                }
                _ => false,
            },
            EventPayload::GoldGain(ctx) => self.gold_gain(stacks, ctx),
            EventPayload::ShopRefresh(ctx) => self.shop_refresh(stacks, ctx),
            EventPayload::RelicAcquire(ctx) => self.relic_acquire(stacks, ctx),
            EventPayload::PlayerHeal(ctx) => self.player_heal(stacks, ctx),
        }
    }

    fn before_attack<R: Rng>(&self, stacks: u32, ctx: &mut AttackContext, rng: &mut R) -> bool {
        use RelicEffect::*;
        let hand = ctx.hand().name().to_string();
        match self {
            FlatDamage { amount } => ctx.flat_damage += flat(*amount, stacks),
            FlatGold { amount } => ctx.flat_gold += flat(*amount, stacks),
            DamageMultiplier { multiplier } => ctx.damage_multiplier *= compound(*multiplier, stacks),
            GoldMultiplier { multiplier } => ctx.gold_multiplier *= compound(*multiplier, stacks),
            HandDamage { hand: h, amount } if *h == hand => ctx.flat_damage += flat(*amount, stacks),
            HandMultiplier { hand: h, multiplier } if *h == hand => {
                ctx.damage_multiplier *= compound(*multiplier, stacks)
            }
            HandGold { hand: h, amount } if *h == hand => ctx.flat_gold += flat(*amount, stacks),
            ShapeDamage { shape, amount } if *shape == ctx.hand().shape() => {
                ctx.flat_damage += flat(*amount, stacks)
            }
            DamagePerMissingHp { per_hp, amount } => {
                let steps = ctx.player().missing_hp() / per_hp;
                if steps == 0 {
                    return false;
                }
                ctx.flat_damage += flat(steps * amount, stacks);
            }
            DamagePerGold {
                per_gold,
                amount,
                cap,
            } => {
                let bonus = ((ctx.player().gold.max(0) / per_gold) * amount).min(*cap);
                if bonus == 0 {
                    return false;
                }
                ctx.flat_damage += flat(bonus, stacks);
            }
            FirstAttackMultiplier { multiplier } if ctx.is_first_attack_this_wave() => {
                ctx.damage_multiplier *= compound(*multiplier, stacks)
            }
            LowHpMultiplier {
                threshold,
                multiplier,
            } if ctx.player().hp_fraction() <= *threshold => {
                ctx.damage_multiplier *= compound(*multiplier, stacks)
            }
            Critical { chance } => {
                if ctx.critical {
                    return false;
                }
                let chance = (chance * stacks as f64).min(1.0);
                if rng.gen::<f64>() >= chance {
                    return false;
                }
                ctx.critical = true;
            }
            CritMultiplier { bonus } => ctx.crit_multiplier += bonus * stacks as f64,
            ChainDamage { amount } if ctx.attacks_this_turn() > 0 => {
                ctx.flat_damage += flat(amount * ctx.attacks_this_turn() as i32, stacks)
            }
            DamagePerDie { amount } => {
                let dice = ctx.hand().used_dice().len() as i32;
                ctx.flat_damage += flat(amount * dice, stacks)
            }
            _ => return false,
        }
        true
    }

    fn after_attack(&self, stacks: u32, ctx: &mut AttackContext) -> bool {
        use RelicEffect::*;
        match self {
            HealAfterAttack { amount } => ctx.heal_after_attack += flat(*amount, stacks),
            HealOnHand { hand, amount } if hand == ctx.hand().name() => {
                ctx.heal_after_attack += flat(*amount, stacks)
            }
            LifeSteal { fraction } if ctx.damage_dealt() > 0 => {
                let healed = (ctx.damage_dealt() as f64 * fraction * stacks as f64).round() as i32;
                if healed == 0 {
                    return false;
                }
                ctx.heal_after_attack += healed;
            }
            GoldPerKill { amount } if ctx.kills() > 0 => {
                ctx.gold_after_attack += flat(amount * ctx.kills() as i32, stacks)
            }
            _ => return false,
        }
        true
    }

    fn on_roll(&self, stacks: u32, ctx: &mut RollContext, first_pass: bool) -> bool {
        use RelicEffect::*;
        match self {
            RerollBelow {
                threshold,
                max_dice,
            } if first_pass => {
                let mut low: Vec<_> = ctx
                    .dice()
                    .iter()
                    .filter(|d| d.value <= *threshold)
                    .copied()
                    .collect();
                low.sort_by_key(|d| d.value);
                let limit = (*max_dice * stacks) as usize;
                let mut any = false;
                for die in low.into_iter().take(limit) {
                    any |= ctx.request_reroll(die.id);
                }
                any
            }
            RerollValue { value, .. } => {
                let ids: Vec<_> = ctx
                    .dice()
                    .iter()
                    .filter(|d| d.value == *value)
                    .map(|d| d.id)
                    .collect();
                let mut any = false;
                for id in ids {
                    any |= ctx.request_reroll(id);
                }
                any
            }
            FreeFirstRoll if first_pass && ctx.is_first_roll() && ctx.consume_roll => {
                ctx.consume_roll = false;
                true
            }
            PreserveValue { value } => {
                let ids: Vec<_> = ctx
                    .dice()
                    .iter()
                    .filter(|d| d.value == *value)
                    .map(|d| d.id)
                    .collect();
                let mut any = false;
                for id in ids {
                    any |= ctx.request_preserve(id);
                }
                any
            }
            _ => false,
        }
    }

    fn hand_complete(&self, stacks: u32, ctx: &mut HandContext) -> bool {
        match self {
            RelicEffect::HandCompleteGold { hand, amount }
                if hand_matches(hand, ctx.hand().name()) =>
            {
                ctx.bonus_gold += flat(*amount, stacks);
                true
            }
            RelicEffect::HandCompleteDamage { hand, amount }
                if hand_matches(hand, ctx.hand().name()) =>
            {
                ctx.bonus_damage += flat(*amount, stacks);
                true
            }
            _ => false,
        }
    }

    fn before_damaged(&self, relic_id: &str, stacks: u32, ctx: &mut DamageContext) -> bool {
        // First cancelling relic in acquisition order wins
        if ctx.cancelled {
            return false;
        }
        match self {
            RelicEffect::CancelHitBelowHp { threshold }
                if ctx.player().hp_fraction() <= *threshold =>
            {
                ctx.cancelled = true;
                ctx.cancelled_by = Some(relic_id.to_string());
                true
            }
            RelicEffect::CancelFirstHit => {
                ctx.cancelled = true;
                ctx.cancelled_by = Some(relic_id.to_string());
                true
            }
            RelicEffect::DamageReduction { amount } => {
                ctx.reduction += flat(*amount, stacks);
                true
            }
            _ => false,
        }
    }

    fn player_death(&self, relic_id: &str, ctx: &mut DeathContext) -> bool {
        match self {
            RelicEffect::Revive { hp_fraction } if ctx.revive_hp.is_none() => {
                let hp = (ctx.player().max_hp as f64 * hp_fraction).round() as i32;
                ctx.revive_hp = Some(hp.max(1));
                ctx.revived_by = Some(relic_id.to_string());
                true
            }
            _ => false,
        }
    }

    fn wave_start(&self, stacks: u32, ctx: &mut ProgressContext) -> bool {
        match self {
            RelicEffect::WaveStartGold { amount } => ctx.bonus_gold += flat(*amount, stacks),
            RelicEffect::WaveStartHeal { amount } => ctx.bonus_heal += flat(*amount, stacks),
            RelicEffect::ExtraRolls { count } => ctx.extra_rolls += count * stacks,
            _ => return false,
        }
        true
    }

    fn wave_end(&self, stacks: u32, ctx: &mut ProgressContext) -> bool {
        match self {
            RelicEffect::WaveClearGold { amount } if ctx.cleared() => {
                ctx.bonus_gold += flat(*amount, stacks)
            }
            RelicEffect::Interest {
                per_gold,
                amount,
                cap,
            } => {
                let interest = ((ctx.player().gold.max(0) / per_gold) * amount).min(*cap);
                if interest == 0 {
                    return false;
                }
                ctx.bonus_gold += flat(interest, stacks);
            }
            RelicEffect::RollRefundGold { amount } if ctx.cleared() && ctx.rolls_remaining() > 0 => {
                ctx.bonus_gold += flat(amount * ctx.rolls_remaining() as i32, stacks)
            }
            _ => return false,
        }
        true
    }

    fn gold_gain(&self, stacks: u32, ctx: &mut GoldContext) -> bool {
        match self {
            RelicEffect::GoldGainMultiplier { multiplier } => {
                ctx.multiplier *= compound(*multiplier, stacks)
            }
            RelicEffect::GoldGainFlat { amount } => ctx.flat += flat(*amount, stacks),
            _ => return false,
        }
        true
    }

    fn shop_refresh(&self, stacks: u32, ctx: &mut ShopContext) -> bool {
        match self {
            RelicEffect::ShopDiscount { amount } => ctx.discount += flat(*amount, stacks),
            RelicEffect::FreeRefresh => ctx.cost_multiplier = 0.0,
            _ => return false,
        }
        true
    }

    fn relic_acquire(&self, stacks: u32, ctx: &mut AcquireContext) -> bool {
        match self {
            RelicEffect::MaxHpPerRelic { amount } => ctx.max_hp_bonus += flat(*amount, stacks),
            RelicEffect::AcquireGold { amount } => ctx.bonus_gold += flat(*amount, stacks),
            _ => return false,
        }
        true
    }

    fn player_heal(&self, stacks: u32, ctx: &mut HealContext) -> bool {
        match self {
            RelicEffect::HealMultiplier { multiplier } => {
                ctx.multiplier *= compound(*multiplier, stacks)
            }
            RelicEffect::HealFlat { amount } => ctx.flat += flat(*amount, stacks),
            _ => return false,
        }
        true
    }
}
