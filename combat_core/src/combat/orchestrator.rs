//! The chain-attack turn loop
//!
//! One orchestrator owns everything a fight mutates: the dice pool, the hand
//! catalog, the relic bus, the enemy roster and the RNG. Each public operation
//! advances the loop by one step:
//!
//! ```text
//! RollPending -> HandSelection -> Targeting -> Resolving -> HandSelection (chain)
//!                                                       \-> TurnEnd -> RollPending | WaveOver
//! ```
//!
//! While an attack is `Resolving` the presentation layer owns the clock: hits
//! land on `impact(index)` and the attack finishes on `complete_attack()`.

use super::report::{AttackOutcome, PlayerHit, RollReport, TurnOutcome, TurnReport};
use super::Phase;
use crate::config::CombatConfig;
use crate::enemy::{AttackPresentation, Economy, Enemy, EnemyId, Presenter};
use crate::targeting::{TargetSelector, TargetState};
use crate::CombatError;
use dice_core::{AchievedHand, DiceSet, DieId, DieState, DieValue, HandCatalog, TargetShape};
use relic_core::{
    AcquireContext, AttackContext, DamageContext, DeathContext, EventBus, EventPayload,
    GoldContext, HandContext, HealContext, PlayerSnapshot, ProgressContext, Relic, RollContext,
    ShopContext,
};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::mem;
use tracing::{debug, info, trace, warn};

/// A hand picked for the current attack, before targets are final
#[derive(Debug, Clone)]
struct PendingChoice {
    hand: AchievedHand,
    bonus_damage: i32,
    bonus_gold: i32,
    relics: Vec<String>,
    forced: bool,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    target: EnemyId,
    damage: i32,
    landed: bool,
}

/// The attack currently in flight
#[derive(Debug)]
struct PendingAttack {
    hand: AchievedHand,
    ctx: AttackContext,
    hits: Vec<Hit>,
    targets: Vec<EnemyId>,
    sub_targets: Vec<EnemyId>,
    damage: i32,
    sub_damage: i32,
    gold: i32,
    relics: Vec<String>,
    forced: bool,
    damage_dealt: i32,
    kills: u32,
}

/// Land one hit; returns damage dealt and whether the target died
fn deliver_hit(
    enemies: &mut [Box<dyn Enemy>],
    hand: &AchievedHand,
    gold: i32,
    hit: &Hit,
) -> Option<(i32, bool)> {
    let enemy = enemies
        .iter_mut()
        .find(|e| e.id() == hit.target && e.is_alive())?;
    let resolved = hand.with_payout(hit.damage, gold);
    let amount = enemy.calculate_damage_taken(&resolved).max(0);
    let died = enemy.take_damage(amount, &resolved);
    enemy.on_damage_taken(amount, &resolved);
    trace!(target = %hit.target, amount, died, "hit landed");
    Some((amount, died))
}

/// Drop repeated relic ids, keeping each at its first position
fn first_seen(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

pub struct Orchestrator<E, P> {
    config: CombatConfig,
    catalog: HandCatalog,
    bus: EventBus,
    dice: DiceSet,
    enemies: Vec<Box<dyn Enemy>>,
    economy: E,
    presenter: P,
    rng: ChaCha8Rng,
    selector: TargetSelector,
    phase: Phase,
    hands: Vec<AchievedHand>,
    choice: Option<PendingChoice>,
    pending: Option<PendingAttack>,
    zone: u32,
    wave: u32,
    turn: u32,
    rolls_remaining: u32,
    first_roll_of_wave: bool,
    first_attack_of_wave: bool,
    attacks_this_turn: u32,
    turn_started: bool,
    report: TurnReport,
    last_report: Option<TurnReport>,
}

impl<E: Economy, P: Presenter> Orchestrator<E, P> {
    pub fn new(
        config: CombatConfig,
        catalog: HandCatalog,
        bus: EventBus,
        economy: E,
        presenter: P,
        rng: ChaCha8Rng,
    ) -> Result<Self, CombatError> {
        config.validate()?;
        let dice = DiceSet::build(&config.dice.pool);
        Ok(Orchestrator {
            config,
            catalog,
            bus,
            dice,
            enemies: Vec::new(),
            economy,
            presenter,
            rng,
            selector: TargetSelector::new(),
            phase: Phase::Idle,
            hands: Vec::new(),
            choice: None,
            pending: None,
            zone: 0,
            wave: 0,
            turn: 0,
            rolls_remaining: 0,
            first_roll_of_wave: false,
            first_attack_of_wave: false,
            attacks_this_turn: 0,
            turn_started: false,
            report: TurnReport::default(),
            last_report: None,
        })
    }

    // === Accessors ===

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Achievable hands, highest damage first
    pub fn hands(&self) -> &[AchievedHand] {
        &self.hands
    }

    pub fn dice(&self) -> &DiceSet {
        &self.dice
    }

    pub fn catalog(&self) -> &HandCatalog {
        &self.catalog
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn economy(&self) -> &E {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut E {
        &mut self.economy
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    pub fn enemies(&self) -> &[Box<dyn Enemy>] {
        &self.enemies
    }

    pub fn enemy(&self, id: EnemyId) -> Option<&dyn Enemy> {
        self.enemies.iter().find(|e| e.id() == id).map(|e| e.as_ref())
    }

    pub fn living_enemies(&self) -> Vec<EnemyId> {
        self.enemies
            .iter()
            .filter(|e| e.is_alive())
            .map(|e| e.id())
            .collect()
    }

    pub fn rolls_remaining(&self) -> u32 {
        self.rolls_remaining
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

    /// Report of the most recently finished turn
    pub fn last_report(&self) -> Option<&TurnReport> {
        self.last_report.as_ref()
    }

    fn player(&self) -> PlayerSnapshot {
        PlayerSnapshot::new(
            self.economy.player_hp(),
            self.economy.player_max_hp(),
            self.economy.gold(),
        )
    }

    fn expect_phase(&self, expected: Phase, operation: &'static str) -> Result<(), CombatError> {
        if self.pending.is_some() {
            return Err(CombatError::ResolutionInFlight);
        }
        if self.phase != expected {
            warn!(operation, phase = ?self.phase, "operation rejected");
            return Err(CombatError::InvalidPhase {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    // === Zone and wave lifecycle ===

    /// Enter the next zone; zone-scoped relic charges come back
    pub fn start_zone(&mut self) -> Result<(), CombatError> {
        if self.pending.is_some() {
            return Err(CombatError::ResolutionInFlight);
        }
        self.zone += 1;
        let mut ctx = ProgressContext::new(self.zone, self.wave, self.turn, self.player());
        self.bus.publish(&mut EventPayload::ZoneStart(&mut ctx));
        self.apply_progress(&ctx);
        info!(zone = self.zone, "zone started");
        Ok(())
    }

    pub fn end_zone(&mut self) -> Result<(), CombatError> {
        if self.phase.in_wave() {
            return Err(CombatError::InvalidPhase {
                operation: "end_zone",
                phase: self.phase,
            });
        }
        let mut ctx = ProgressContext::new(self.zone, self.wave, self.turn, self.player());
        self.bus.publish(&mut EventPayload::ZoneEnd(&mut ctx));
        self.apply_progress(&ctx);
        info!(zone = self.zone, "zone ended");
        Ok(())
    }

    /// Begin a wave against `roster`; the dice pool is rebuilt from scratch
    pub fn start_wave(&mut self, roster: Vec<Box<dyn Enemy>>) -> Result<(), CombatError> {
        if self.pending.is_some() {
            return Err(CombatError::ResolutionInFlight);
        }
        if self.phase.in_wave() {
            return Err(CombatError::InvalidPhase {
                operation: "start_wave",
                phase: self.phase,
            });
        }
        if roster.is_empty() {
            warn!("wave started with an empty roster");
            return Err(CombatError::EmptyRoster);
        }

        self.enemies = roster;
        let ids: Vec<EnemyId> = self.enemies.iter().map(|e| e.id()).collect();
        for enemy in self.enemies.iter_mut() {
            enemy.on_wave_start(&ids);
        }

        self.wave += 1;
        self.turn = 1;
        self.rolls_remaining = self.config.rolls.per_wave;
        self.first_roll_of_wave = true;
        self.first_attack_of_wave = true;
        self.attacks_this_turn = 0;
        self.turn_started = false;
        self.hands.clear();
        self.choice = None;
        self.selector = TargetSelector::new();
        self.dice = DiceSet::build(self.dice.composition());

        let mut ctx = ProgressContext::new(self.zone, self.wave, 0, self.player());
        self.bus.publish(&mut EventPayload::WaveStart(&mut ctx));
        self.rolls_remaining += ctx.extra_rolls;
        self.apply_progress(&ctx);

        self.report = TurnReport {
            wave: self.wave,
            turn: self.turn,
            ..Default::default()
        };
        self.phase = Phase::RollPending;
        info!(
            wave = self.wave,
            enemies = ids.len(),
            rolls = self.rolls_remaining,
            "wave started"
        );
        Ok(())
    }

    fn apply_progress(&mut self, ctx: &ProgressContext) {
        if ctx.bonus_gold > 0 {
            self.gain_gold(ctx.bonus_gold);
        }
        if ctx.bonus_heal > 0 {
            self.heal_player(ctx.bonus_heal);
        }
    }

    // === Rolling ===

    /// Roll every Normal die and evaluate the hands they make
    pub fn roll(&mut self) -> Result<RollReport, CombatError> {
        self.roll_with(None)
    }

    /// Roll with predetermined faces (replays, scripted encounters)
    ///
    /// Values go to the rollable dice in pool order; relic rerolls still use
    /// the RNG.
    pub fn roll_values(&mut self, values: &[u32]) -> Result<RollReport, CombatError> {
        self.roll_with(Some(values))
    }

    fn roll_with(&mut self, scripted: Option<&[u32]>) -> Result<RollReport, CombatError> {
        self.expect_phase(Phase::RollPending, "roll")?;
        if self.rolls_remaining == 0 {
            return Err(CombatError::InvalidPhase {
                operation: "roll",
                phase: self.phase,
            });
        }

        if !self.turn_started {
            self.turn_started = true;
            let mut ctx = ProgressContext::new(self.zone, self.wave, self.turn, self.player());
            self.bus.publish(&mut EventPayload::TurnStart(&mut ctx));
            self.apply_progress(&ctx);
        }

        match scripted {
            Some(values) => {
                let rollable: Vec<_> = self
                    .dice
                    .dice()
                    .iter()
                    .filter(|d| d.state == DieState::Normal)
                    .map(|d| d.id)
                    .collect();
                for (id, value) in rollable.into_iter().zip(values) {
                    self.dice.set_value(id, *value);
                }
            }
            None => self.dice.roll(&mut self.rng),
        }

        let mut ctx = RollContext::new(
            self.dice.available(),
            self.first_roll_of_wave,
            self.rolls_remaining,
        );
        self.bus.publish(&mut EventPayload::DiceRolled(&mut ctx));
        self.first_roll_of_wave = false;
        let consumed_roll = ctx.consume_roll;
        if consumed_roll {
            self.rolls_remaining = self.rolls_remaining.saturating_sub(1);
        } else {
            debug!("roll refunded");
        }

        let mut preserved = self.apply_preserves(&ctx.preserve);
        let mut rerolled = Vec::new();
        let mut queued = ctx.reroll;
        let mut passes = 0;
        while !queued.is_empty() && passes < self.config.pipeline.max_reroll_passes {
            passes += 1;
            let done = self.dice.reroll(&queued, &mut self.rng);
            debug!(pass = passes, dice = done.len(), "relic reroll");
            rerolled.extend(done);

            let mut again = RollContext::new(self.dice.available(), false, self.rolls_remaining);
            self.bus.publish(&mut EventPayload::DiceRerolled(&mut again));
            preserved.extend(self.apply_preserves(&again.preserve));
            queued = again.reroll;
        }

        let values = self.dice.available_values();
        for enemy in self.enemies.iter_mut().filter(|e| e.is_alive()) {
            enemy.on_player_roll(&values);
        }
        self.report.rolls.push(values);

        let available = self.available_with_lock_retry();
        let hands = self.catalog.evaluate(&available, &self.bus.active_flags());
        let mut outcome = None;
        if hands.is_empty() {
            if self.rolls_remaining > 0 {
                debug!(rolls = self.rolls_remaining, "no achievable hand, roll again");
                self.phase = Phase::RollPending;
            } else {
                outcome = Some(self.end_turn());
            }
        } else {
            self.phase = Phase::HandSelection;
        }
        self.hands = hands;

        Ok(RollReport {
            dice: self.dice.available(),
            rerolled,
            preserved,
            hands: self.hands.clone(),
            consumed_roll,
            rolls_remaining: self.rolls_remaining,
            outcome,
        })
    }

    fn apply_preserves(&mut self, ids: &[DieId]) -> Vec<DieId> {
        ids.iter()
            .copied()
            .filter(|id| self.dice.preserve(*id))
            .collect()
    }

    /// Available dice; if none are free but some are locked, tick locks once first
    fn available_with_lock_retry(&mut self) -> Vec<DieValue> {
        let available = self.dice.available();
        if available.is_empty() && self.dice.locked_count() > 0 {
            let released = self.dice.decrement_locks();
            debug!(released = released.len(), "all dice locked, ticking locks once");
            return self.dice.available();
        }
        available
    }

    /// Lock a die for `turns` turns
    ///
    /// Refused while an attack is being targeted or resolved, and during hand
    /// selection when no hand would be left.
    pub fn lock_die(&mut self, id: DieId, turns: u32) -> bool {
        self.change_dice(|dice| dice.lock(id, turns))
    }

    /// Keep a die in the pool through the next attack that uses it
    pub fn preserve_die(&mut self, id: DieId) -> bool {
        self.change_dice(|dice| dice.preserve(id))
    }

    fn change_dice(&mut self, change: impl FnOnce(&mut DiceSet) -> bool) -> bool {
        if self.pending.is_some() || matches!(self.phase, Phase::Targeting | Phase::Resolving) {
            return false;
        }
        let before = self.dice.clone();
        if !change(&mut self.dice) {
            return false;
        }
        if self.phase == Phase::HandSelection {
            let hands = self.evaluate();
            if hands.is_empty() {
                debug!("dice change would leave no hand");
                self.dice = before;
                return false;
            }
            self.hands = hands;
        }
        true
    }

    fn evaluate(&self) -> Vec<AchievedHand> {
        self.catalog
            .evaluate(&self.dice.available(), &self.bus.active_flags())
    }

    // === Hand selection and targeting ===

    /// Pick the hand at `index` of [`hands`](Self::hands)
    ///
    /// Returns the targeting state: `AwaitingTargets` when the player must pick
    /// enemies, `Resolving` when the attack started right away.
    pub fn select_hand(&mut self, index: usize) -> Result<TargetState, CombatError> {
        self.expect_phase(Phase::HandSelection, "select_hand")?;
        let hand = self
            .hands
            .get(index)
            .cloned()
            .ok_or(CombatError::NoSuchHand(index))?;
        self.choose_hand(hand, false)
    }

    /// Pick the highest-damage hand, choosing the weakest enemies if asked for targets
    pub fn auto_select_hand(&mut self) -> Result<TargetState, CombatError> {
        let state = self.select_hand(0)?;
        if state == TargetState::AwaitingTargets {
            self.auto_pick_targets()?;
        }
        Ok(self.selector.state())
    }

    fn choose_hand(&mut self, hand: AchievedHand, forced: bool) -> Result<TargetState, CombatError> {
        let mut ctx = HandContext::new(hand.clone());
        let relics = self.bus.publish(&mut EventPayload::HandComplete(&mut ctx));

        let living = self.living_enemies();
        let state = self.selector.choose(
            &hand,
            &living,
            self.config.targeting.damage_per_target,
            &mut self.rng,
        );
        debug!(hand = %hand.name(), forced, ?state, "hand selected");

        self.choice = Some(PendingChoice {
            hand,
            bonus_damage: ctx.bonus_damage,
            bonus_gold: ctx.bonus_gold,
            relics,
            forced,
        });

        match state {
            TargetState::AwaitingTargets => {
                self.phase = Phase::Targeting;
            }
            TargetState::Confirmed => {
                self.phase = Phase::Targeting;
                self.begin_resolution()?;
            }
            stale => {
                warn!(state = ?stale, "target selector was not idle");
                self.choice = None;
                return Err(CombatError::InvalidPhase {
                    operation: "select_hand",
                    phase: self.phase,
                });
            }
        }
        Ok(self.selector.state())
    }

    /// Toggle an enemy in the manual selection; false if rejected
    pub fn toggle_target(&mut self, id: EnemyId) -> bool {
        self.phase == Phase::Targeting && self.selector.toggle(id)
    }

    /// Confirm the manual selection and start the attack
    pub fn confirm_targets(&mut self) -> Result<(), CombatError> {
        self.expect_phase(Phase::Targeting, "confirm_targets")?;
        if !self.selector.confirm() {
            return Err(CombatError::InvalidTargets {
                required: self.selector.required(),
                selected: self.selector.selected().len(),
            });
        }
        self.begin_resolution()
    }

    /// Back out of target selection to the same list of hands
    ///
    /// Nothing is consumed and no event is published.
    pub fn cancel_targets(&mut self) -> bool {
        if self.pending.is_some() || self.phase != Phase::Targeting || !self.selector.cancel() {
            return false;
        }
        self.choice = None;
        self.hands = self.evaluate();
        self.phase = Phase::HandSelection;
        debug!(hands = self.hands.len(), "targeting cancelled");
        true
    }

    fn auto_pick_targets(&mut self) -> Result<(), CombatError> {
        let mut candidates: Vec<(i32, EnemyId)> = self
            .enemies
            .iter()
            .filter(|e| e.is_alive() && !self.selector.selected().contains(&e.id()))
            .map(|e| (e.hp(), e.id()))
            .collect();
        candidates.sort();
        for (_, id) in candidates {
            if self.selector.selected().len() >= self.selector.required() {
                break;
            }
            self.selector.toggle(id);
        }
        self.confirm_targets()
    }

    // === Resolution ===

    fn begin_resolution(&mut self) -> Result<(), CombatError> {
        if self.pending.is_some() {
            return Err(CombatError::ResolutionInFlight);
        }
        let choice = self.choice.take().ok_or(CombatError::InvalidPhase {
            operation: "resolve",
            phase: self.phase,
        })?;
        let targets = self
            .selector
            .begin_resolving()
            .ok_or(CombatError::InvalidTargets {
                required: self.selector.required(),
                selected: self.selector.selected().len(),
            })?;

        let dpt = self.config.targeting.damage_per_target;
        let hand = choice.hand;
        let sub_targets = match hand.sub_attack() {
            Some(sub) => self.selector.sub_targets(sub, dpt, &mut self.rng),
            None => Vec::new(),
        };

        let mut ctx = AttackContext::new(
            hand.clone(),
            self.player(),
            self.first_attack_of_wave,
            self.attacks_this_turn,
            targets.len(),
            self.config.pipeline.crit_multiplier,
        );
        ctx.flat_damage += choice.bonus_damage;
        ctx.flat_gold += choice.bonus_gold;
        let mut relics = choice.relics;
        relics.extend(self.bus.publish(&mut EventPayload::BeforeAttack(&mut ctx)));

        let damage = ctx.final_damage();
        let gold = ctx.final_gold();
        let sub_damage = hand
            .sub_attack()
            .map_or(0, |sub| ctx.final_sub_damage(sub.damage));

        let hits: Vec<Hit> = targets
            .iter()
            .map(|&target| Hit {
                target,
                damage,
                landed: false,
            })
            .chain(sub_targets.iter().map(|&target| Hit {
                target,
                damage: sub_damage,
                landed: false,
            }))
            .collect();

        let presentation = AttackPresentation {
            hand: hand.name().to_string(),
            shape: hand.shape(),
            from: hand.used_dice().to_vec(),
            to: hits.iter().map(|h| h.target).collect(),
            damage: hits.iter().map(|h| h.damage).collect(),
            critical: ctx.critical,
        };

        info!(
            hand = %hand.name(),
            damage,
            gold,
            targets = targets.len(),
            sub_targets = sub_targets.len(),
            critical = ctx.critical,
            forced = choice.forced,
            "attack resolving"
        );

        self.pending = Some(PendingAttack {
            hand,
            ctx,
            hits,
            targets,
            sub_targets,
            damage,
            sub_damage,
            gold,
            relics,
            forced: choice.forced,
            damage_dealt: 0,
            kills: 0,
        });
        self.phase = Phase::Resolving;
        self.presenter.play_attack(&presentation);
        Ok(())
    }

    /// Land the hit at `index` of the current presentation
    ///
    /// Returns false with no attack in flight, for an unknown index, or for a
    /// hit that already landed.
    pub fn impact(&mut self, index: usize) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let Some(hit) = pending.hits.get_mut(index) else {
            return false;
        };
        if hit.landed {
            return false;
        }
        hit.landed = true;
        let hit = *hit;
        if let Some((amount, died)) =
            deliver_hit(&mut self.enemies, &pending.hand, pending.gold, &hit)
        {
            pending.damage_dealt += amount;
            if died {
                pending.kills += 1;
            }
        }
        true
    }

    /// Finish the attack in flight and decide what the turn does next
    pub fn complete_attack(&mut self) -> Result<TurnOutcome, CombatError> {
        let Some(mut pending) = self.pending.take() else {
            return Err(CombatError::InvalidPhase {
                operation: "complete_attack",
                phase: self.phase,
            });
        };

        for hit in pending.hits.iter_mut().filter(|h| !h.landed) {
            hit.landed = true;
            if let Some((amount, died)) =
                deliver_hit(&mut self.enemies, &pending.hand, pending.gold, hit)
            {
                pending.damage_dealt += amount;
                if died {
                    pending.kills += 1;
                }
            }
        }

        let mut healed = 0;
        if pending.hand.shape() == TargetShape::SelfBuff {
            healed += self.heal_player(pending.damage);
        }
        let mut gold = if pending.gold > 0 {
            self.gain_gold(pending.gold)
        } else {
            0
        };

        let mut ctx = pending.ctx;
        ctx.record_outcome(pending.damage_dealt, pending.kills);
        pending
            .relics
            .extend(self.bus.publish(&mut EventPayload::AfterAttack(&mut ctx)));
        if ctx.heal_after_attack > 0 {
            healed += self.heal_player(ctx.heal_after_attack);
        }
        if ctx.gold_after_attack > 0 {
            gold += self.gain_gold(ctx.gold_after_attack);
        }

        let removal = self.dice.remove_by_ids(pending.hand.used_dice());
        if !removal.missing.is_empty() {
            warn!(missing = removal.missing.len(), "attack used dice no longer in the pool");
        }

        self.selector.finish();
        self.attacks_this_turn += 1;
        self.first_attack_of_wave = false;

        let relics = first_seen(pending.relics);
        self.report.attacks.push(AttackOutcome {
            hand: pending.hand.name().to_string(),
            shape: pending.hand.shape(),
            targets: pending.targets,
            sub_targets: pending.sub_targets,
            damage: pending.damage,
            sub_damage: pending.sub_damage,
            gold,
            critical: ctx.critical,
            damage_dealt: pending.damage_dealt,
            kills: pending.kills,
            healed,
            dice_used: pending.hand.used_dice().to_vec(),
            forced: pending.forced,
            relics_triggered: relics,
        });
        info!(
            dealt = pending.damage_dealt,
            kills = pending.kills,
            gold,
            healed,
            "attack complete"
        );

        Ok(self.advance_chain())
    }

    /// Chain into another hand, fire a lone die, or end the turn
    fn advance_chain(&mut self) -> TurnOutcome {
        if self.living_enemies().is_empty() || !self.config.chain.enabled {
            return self.end_turn();
        }

        let available = self.available_with_lock_retry();
        if available.len() >= 2 {
            let hands = self.catalog.evaluate(&available, &self.bus.active_flags());
            if !hands.is_empty() {
                debug!(dice = available.len(), hands = hands.len(), "chain continues");
                self.hands = hands;
                self.phase = Phase::HandSelection;
                return TurnOutcome::ContinueTurn;
            }
        } else if available.len() == 1 && self.config.chain.force_last_die {
            let hand = AchievedHand::forced_sum(available[0]);
            debug!(value = available[0].value, "firing the last die");
            self.hands.clear();
            match self.choose_hand(hand, true) {
                Ok(_) if self.pending.is_some() => return TurnOutcome::ContinueTurn,
                Ok(state) => warn!(?state, "forced attack did not start"),
                Err(e) => warn!(error = %e, "forced attack failed"),
            }
            self.selector.finish();
            self.choice = None;
        }

        self.end_turn()
    }

    fn end_turn(&mut self) -> TurnOutcome {
        self.phase = Phase::TurnEnd;
        self.hands.clear();
        self.dice.decrement_locks();

        let outcome = if self.living_enemies().is_empty() {
            self.finish_wave(true)
        } else if self.rolls_remaining == 0 {
            self.finish_wave(false)
        } else {
            TurnOutcome::ContinueTurn
        };

        let mut finished = mem::take(&mut self.report);
        finished.outcome = Some(outcome);
        finished.rolls_remaining = self.rolls_remaining;
        debug!(
            turn = finished.turn,
            attacks = finished.attacks.len(),
            ?outcome,
            "turn ended"
        );
        self.last_report = Some(finished);

        if outcome == TurnOutcome::ContinueTurn {
            self.dice.refill();
            self.turn += 1;
            self.attacks_this_turn = 0;
            self.turn_started = false;
            self.phase = Phase::RollPending;
        }
        self.report = TurnReport {
            wave: self.wave,
            turn: self.turn,
            ..Default::default()
        };
        outcome
    }

    fn finish_wave(&mut self, cleared: bool) -> TurnOutcome {
        let mut ctx = ProgressContext::new(self.zone, self.wave, self.turn, self.player())
            .with_outcome(cleared, self.rolls_remaining);
        self.bus.publish(&mut EventPayload::WaveEnd(&mut ctx));
        self.apply_progress(&ctx);
        self.economy
            .process_wave_clear(cleared, self.rolls_remaining);
        self.phase = Phase::WaveOver { cleared };
        info!(
            wave = self.wave,
            cleared,
            rolls_remaining = self.rolls_remaining,
            "wave over"
        );
        if cleared {
            TurnOutcome::WaveCleared
        } else {
            TurnOutcome::WaveFailed
        }
    }

    /// Play until the current turn ends, choosing hands and targets automatically
    pub fn play_auto_turn(&mut self) -> Result<TurnReport, CombatError> {
        if !self.phase.in_wave() {
            return Err(CombatError::InvalidPhase {
                operation: "play_auto_turn",
                phase: self.phase,
            });
        }
        let turn = self.turn;
        loop {
            match self.phase {
                Phase::RollPending if self.turn != turn => break,
                Phase::RollPending => {
                    self.roll()?;
                }
                Phase::HandSelection => {
                    self.auto_select_hand()?;
                }
                Phase::Targeting => self.auto_pick_targets()?,
                Phase::Resolving => {
                    self.complete_attack()?;
                }
                Phase::TurnEnd | Phase::Idle | Phase::WaveOver { .. } => break,
            }
        }
        Ok(self.last_report.clone().unwrap_or_default())
    }

    // === Player and economy ===

    /// Damage aimed at the player, routed through hit cancellation and revives
    pub fn damage_player(&mut self, amount: i32, source: &str) -> PlayerHit {
        let mut ctx = DamageContext::new(amount, source, self.player());
        self.bus
            .publish(&mut EventPayload::BeforePlayerDamaged(&mut ctx));
        let dealt = ctx.final_amount();

        let mut hit = PlayerHit {
            requested: amount,
            dealt,
            cancelled_by: ctx.cancelled_by,
            revived_by: None,
            dead: false,
        };
        if dealt == 0 {
            debug!(source, cancelled = hit.cancelled_by.is_some(), "player hit absorbed");
            return hit;
        }

        self.economy.damage_player(dealt, source);
        if self.economy.player_hp() <= 0 {
            let mut death = DeathContext::new(self.player());
            self.bus.publish(&mut EventPayload::PlayerDeath(&mut death));
            match death.revive_hp {
                Some(hp) => {
                    self.economy.set_player_hp(hp);
                    info!(hp, relic = ?death.revived_by, "player revived");
                    hit.revived_by = death.revived_by;
                }
                None => {
                    info!(source, "player died");
                    hit.dead = true;
                }
            }
        }
        hit
    }

    /// Heal the player through the heal modifiers; returns the amount applied
    pub fn heal_player(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let mut ctx = HealContext::new(amount);
        self.bus.publish(&mut EventPayload::PlayerHeal(&mut ctx));
        let healed = ctx.final_amount();
        if healed > 0 {
            self.economy.heal_player(healed);
        }
        healed
    }

    /// Credit gold through the gold modifiers; returns the amount credited
    pub fn gain_gold(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let mut ctx = GoldContext::new(amount);
        self.bus.publish(&mut EventPayload::GoldGain(&mut ctx));
        let gained = ctx.final_amount();
        if gained > 0 {
            self.economy.add_gold(gained);
        }
        gained
    }

    /// Acquire (or stack) a relic; returns its stack count
    pub fn acquire_relic(&mut self, relic: Relic) -> Result<u32, CombatError> {
        let id = relic.id.clone();
        let stacks = self.bus.acquire(relic)?;

        let mut ctx = AcquireContext::new(id);
        self.bus.publish(&mut EventPayload::RelicAcquire(&mut ctx));
        if ctx.max_hp_bonus != 0 {
            self.economy.add_max_hp(ctx.max_hp_bonus);
        }
        if ctx.bonus_gold > 0 {
            self.gain_gold(ctx.bonus_gold);
        }

        // A new catalog flag can change what the current dice make
        if self.phase == Phase::HandSelection {
            self.hands = self.evaluate();
        }
        Ok(stacks)
    }

    /// Cost of refreshing the shop after discounts
    pub fn refresh_shop(&mut self, base_cost: i32) -> i32 {
        let mut ctx = ShopContext::new(base_cost);
        self.bus.publish(&mut EventPayload::ShopRefresh(&mut ctx));
        ctx.final_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Dummy, HookLog, Ledger, RecordingPresenter};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use relic_core::{RelicEffect, RelicLibrary};

    type TestOrchestrator = Orchestrator<Ledger, RecordingPresenter>;

    fn config(dice: usize) -> CombatConfig {
        let mut config = CombatConfig::default();
        config.dice.pool = vec![dice_core::DieKind::D6; dice];
        config
    }

    fn orchestrator_with(config: CombatConfig, ledger: Ledger) -> TestOrchestrator {
        orchestrator_with_catalog(config, HandCatalog::standard(), ledger)
    }

    fn orchestrator_with_catalog(
        config: CombatConfig,
        catalog: HandCatalog,
        ledger: Ledger,
    ) -> TestOrchestrator {
        Orchestrator::new(
            config,
            catalog,
            EventBus::with_seed(7),
            ledger,
            RecordingPresenter::default(),
            ChaCha8Rng::seed_from_u64(12345),
        )
        .unwrap()
    }

    fn orchestrator(dice: usize) -> TestOrchestrator {
        orchestrator_with(config(dice), Ledger::new(50, 100))
    }

    fn roster(hps: &[i32]) -> Vec<Box<dyn Enemy>> {
        hps.iter()
            .enumerate()
            .map(|(i, &hp)| Dummy::new(i as u32, hp).boxed())
            .collect()
    }

    fn hand_index(o: &TestOrchestrator, name: &str) -> usize {
        o.hands().iter().position(|h| h.name() == name).unwrap()
    }

    fn hp(o: &TestOrchestrator, id: u32) -> i32 {
        o.enemy(EnemyId(id)).unwrap().hp()
    }

    /// Only Yacht, so most rolls make no hand at all
    fn yacht_only(config: CombatConfig) -> TestOrchestrator {
        let yacht = HandCatalog::standard()
            .templates()
            .iter()
            .filter(|t| t.name == "Yacht")
            .cloned()
            .collect();
        let catalog = HandCatalog::from_templates(yacht).unwrap();
        orchestrator_with_catalog(config, catalog, Ledger::new(50, 100))
    }

    fn standard_relic(id: &str) -> Relic {
        RelicLibrary::standard().get(id).unwrap().clone()
    }

    #[test]
    fn test_full_house_sorts_first() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100])).unwrap();
        let report = o.roll_values(&[6, 6, 6, 2, 2]).unwrap();

        assert_eq!(o.phase(), Phase::HandSelection);
        assert_eq!(report.hands[0].name(), "Full House");
        assert!(report.hands.iter().any(|h| h.name() == "Triple"));
        assert_eq!(report.rolls_remaining, 2);
    }

    #[test]
    fn test_two_targets_against_two_enemies_skip_selection() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100, 100])).unwrap();
        o.roll_values(&[3, 3, 5, 5, 1]).unwrap();

        let state = o.select_hand(hand_index(&o, "Two Pair")).unwrap();
        assert_eq!(state, TargetState::Resolving);
        assert_eq!(o.phase(), Phase::Resolving);
        assert!(o.selector().auto_selected());
        assert_eq!(o.presenter().attacks[0].to, vec![EnemyId(0), EnemyId(1)]);
    }

    #[test]
    fn test_last_die_fires_as_sum() {
        let mut o = orchestrator(3);
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[6, 6, 4]).unwrap();

        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        assert_eq!(o.complete_attack().unwrap(), TurnOutcome::ContinueTurn);

        // The lone 4 is already in flight
        assert_eq!(o.phase(), Phase::Resolving);
        let forced = &o.presenter().attacks[1];
        assert_eq!(forced.hand, dice_core::SUM_HAND);
        assert_eq!(forced.to, vec![EnemyId(0)]);
        assert_eq!(forced.damage, vec![4]);

        assert_eq!(o.complete_attack().unwrap(), TurnOutcome::ContinueTurn);
        assert_eq!(o.phase(), Phase::RollPending);
        assert_eq!(hp(&o, 0), 86);

        let report = o.last_report().unwrap();
        assert_eq!(report.attacks.len(), 2);
        assert!(!report.attacks[0].forced);
        assert!(report.attacks[1].forced);
        assert_eq!(report.total_damage(), 14);
        assert_eq!(o.dice().len(), 3);
    }

    #[test]
    fn test_forced_die_goes_through_pipeline() {
        let mut o = orchestrator(3);
        o.acquire_relic(Relic::new(
            "whetstone",
            "Whetstone",
            RelicEffect::FlatDamage { amount: 3 },
        ))
        .unwrap();
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[6, 6, 4]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();
        assert_eq!(o.presenter().attacks[1].damage, vec![7]);
    }

    #[test]
    fn test_cancel_hit_below_hp_once_per_zone() {
        let mut o = orchestrator_with(config(5), Ledger::new(15, 100));
        o.acquire_relic(standard_relic("last_stand")).unwrap();
        o.start_zone().unwrap();

        let first = o.damage_player(10, "orc");
        assert_eq!(first.dealt, 0);
        assert_eq!(first.cancelled_by.as_deref(), Some("last_stand"));
        assert_eq!(o.economy().hp, 15);

        let second = o.damage_player(3, "orc");
        assert_eq!(second.dealt, 3);
        assert_eq!(second.cancelled_by, None);
        assert_eq!(o.economy().hp, 12);

        o.start_zone().unwrap();
        assert!(o.damage_player(10, "orc").cancelled_by.is_some());
        assert_eq!(o.economy().hp, 12);
    }

    #[test]
    fn test_cancel_targeting_restores_hand_selection() {
        let mut o = orchestrator(5);
        o.acquire_relic(Relic::new(
            "tip_jar",
            "Tip Jar",
            RelicEffect::HandCompleteGold {
                hand: None,
                amount: 5,
            },
        ))
        .unwrap();
        o.start_wave(roster(&[30, 30, 30])).unwrap();
        o.roll_values(&[4, 4, 1, 2, 6]).unwrap();

        let before = o.hands().to_vec();
        let state = o.select_hand(hand_index(&o, "One Pair")).unwrap();
        assert_eq!(state, TargetState::AwaitingTargets);
        assert_eq!(o.phase(), Phase::Targeting);
        assert!(o.toggle_target(EnemyId(1)));

        assert!(o.cancel_targets());
        assert_eq!(o.phase(), Phase::HandSelection);
        assert_eq!(o.hands(), before.as_slice());
        assert_eq!(o.dice().len(), 5);
        assert!(o.presenter().attacks.is_empty());
        assert_eq!(o.economy().gold, 0);
        assert!(!o.cancel_targets());
    }

    #[test]
    fn test_only_one_resolution_in_flight() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100, 100, 100])).unwrap();
        o.roll_values(&[1, 2, 3, 4, 5]).unwrap();

        o.select_hand(hand_index(&o, "Large Straight")).unwrap();
        assert_eq!(o.phase(), Phase::Resolving);

        assert!(matches!(o.select_hand(0), Err(CombatError::ResolutionInFlight)));
        assert!(matches!(o.roll(), Err(CombatError::ResolutionInFlight)));
        assert!(matches!(
            o.confirm_targets(),
            Err(CombatError::ResolutionInFlight)
        ));
        assert!(!o.cancel_targets());
        assert!(matches!(
            o.start_wave(roster(&[1])),
            Err(CombatError::ResolutionInFlight)
        ));
        assert_eq!(o.presenter().attacks.len(), 1);

        o.complete_attack().unwrap();
        assert!(matches!(
            o.complete_attack(),
            Err(CombatError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_impacts_gate_damage() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[50, 50])).unwrap();
        o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        o.select_hand(hand_index(&o, "Large Straight")).unwrap();

        assert_eq!(hp(&o, 0), 50);
        assert!(o.impact(0));
        assert!(!o.impact(0));
        assert!(!o.impact(5));
        assert_eq!(hp(&o, 0), 5);
        assert_eq!(hp(&o, 1), 50);

        o.complete_attack().unwrap();
        assert_eq!(hp(&o, 1), 5);
        assert!(!o.impact(1));
    }

    #[test]
    fn test_manual_targets() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[30, 30, 30])).unwrap();
        o.roll_values(&[4, 4, 1, 2, 6]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();

        assert!(matches!(
            o.confirm_targets(),
            Err(CombatError::InvalidTargets {
                required: 1,
                selected: 0
            })
        ));
        assert_eq!(o.phase(), Phase::Targeting);
        assert!(!o.toggle_target(EnemyId(9)));
        assert!(o.toggle_target(EnemyId(2)));
        o.confirm_targets().unwrap();

        assert_eq!(o.presenter().attacks[0].to, vec![EnemyId(2)]);
        o.complete_attack().unwrap();
        assert_eq!(hp(&o, 2), 20);
        assert_eq!(hp(&o, 0), 30);
    }

    #[test]
    fn test_hybrid_sub_attack_hits_the_rest() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100, 100, 100])).unwrap();
        o.roll_values(&[6, 6, 6, 2, 2]).unwrap();
        o.select_hand(hand_index(&o, "Full House")).unwrap();
        o.toggle_target(EnemyId(1));
        o.confirm_targets().unwrap();

        let attack = &o.presenter().attacks[0];
        assert_eq!(attack.to, vec![EnemyId(1), EnemyId(0), EnemyId(2)]);
        assert_eq!(attack.damage, vec![40, 10, 10]);

        o.complete_attack().unwrap();
        assert_eq!(hp(&o, 1), 60);
        assert_eq!(hp(&o, 0), 90);
        let report = o.last_report().unwrap();
        assert_eq!(report.attacks[0].sub_targets, vec![EnemyId(0), EnemyId(2)]);
    }

    #[test]
    fn test_relics_modify_attack() {
        let mut o = orchestrator(3);
        o.acquire_relic(Relic::new(
            "whetstone",
            "Whetstone",
            RelicEffect::FlatDamage { amount: 5 },
        ))
        .unwrap();
        o.acquire_relic(Relic::new(
            "war_drum",
            "War Drum",
            RelicEffect::DamageMultiplier { multiplier: 2.0 },
        ))
        .unwrap();
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[6, 6, 1]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();

        assert_eq!(o.presenter().attacks[0].damage, vec![30]);
        o.complete_attack().unwrap();
        // (1 + 5) * 2 for the leftover die
        assert_eq!(o.presenter().attacks[1].damage, vec![12]);
        o.complete_attack().unwrap();
        let attack = &o.last_report().unwrap().attacks[0];
        assert_eq!(
            attack.relics_triggered,
            vec!["whetstone".to_string(), "war_drum".to_string()]
        );
    }

    #[test]
    fn test_wave_cleared() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[5])).unwrap();
        o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        o.select_hand(hand_index(&o, "Large Straight")).unwrap();

        assert_eq!(o.complete_attack().unwrap(), TurnOutcome::WaveCleared);
        assert_eq!(o.phase(), Phase::WaveOver { cleared: true });
        assert_eq!(o.economy().wave_results, vec![(true, 2)]);
        assert_eq!(o.economy().gold, 10);
        let report = o.last_report().unwrap();
        assert_eq!(report.outcome, Some(TurnOutcome::WaveCleared));
        assert_eq!(report.attacks[0].kills, 1);
    }

    #[test]
    fn test_wave_failed_when_rolls_run_out() {
        let mut cfg = config(5);
        cfg.rolls.per_wave = 1;
        let mut o = orchestrator_with(cfg, Ledger::new(50, 100));
        o.start_wave(roster(&[10_000])).unwrap();

        let report = o.play_auto_turn().unwrap();
        assert_eq!(report.outcome, Some(TurnOutcome::WaveFailed));
        assert!(!report.attacks.is_empty());
        assert_eq!(o.economy().wave_results, vec![(false, 0)]);
        assert!(matches!(o.roll(), Err(CombatError::InvalidPhase { .. })));
    }

    #[test]
    fn test_locked_dice_tick_once_before_giving_up() {
        let mut o = orchestrator(3);
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[5, 5, 2]).unwrap();
        let two = o.dice().dice()[2].id;
        assert!(o.lock_die(two, 1));

        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();

        // The locked 2 was released and fired on its own
        let forced = &o.presenter().attacks[1];
        assert_eq!(forced.from, vec![two]);
        assert_eq!(forced.damage, vec![2]);
    }

    #[test]
    fn test_relic_reroll_reported() {
        let mut o = orchestrator(5);
        o.acquire_relic(Relic::new(
            "snake_eyes",
            "Snake Eyes",
            RelicEffect::RerollValue {
                value: 1,
                per_turn: 1,
            },
        ))
        .unwrap();
        o.start_wave(roster(&[100])).unwrap();

        let report = o.roll_values(&[1, 2, 3, 4, 6]).unwrap();
        assert_eq!(report.rerolled, vec![DieId(0)]);
        assert!(report.preserved.is_empty());
        let rest: Vec<u32> = report.dice[1..].iter().map(|d| d.value).collect();
        assert_eq!(rest, vec![2, 3, 4, 6]);
        assert!((1..=6).contains(&report.dice[0].value));
        // One charge per turn, so a rerolled 1 stays a 1
        assert_eq!(o.bus().get("snake_eyes").unwrap().remaining_charges(), Some(0));
    }

    #[test]
    fn test_preserved_dice_stay_for_the_next_attack() {
        let mut o = orchestrator(3);
        o.acquire_relic(Relic::new(
            "amber",
            "Amber",
            RelicEffect::PreserveValue { value: 6 },
        ))
        .unwrap();
        o.start_wave(roster(&[100])).unwrap();

        let report = o.roll_values(&[6, 6, 1]).unwrap();
        assert_eq!(report.preserved, vec![DieId(0), DieId(1)]);
        assert!(report.rerolled.is_empty());

        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        assert_eq!(o.complete_attack().unwrap(), TurnOutcome::ContinueTurn);
        assert_eq!(o.dice().len(), 3);
        assert_eq!(o.phase(), Phase::HandSelection);
        assert!(o.hands().iter().any(|h| h.name() == "One Pair"));

        // Preservation lasts one attack
        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();
        assert!(o.dice().dice().iter().all(|d| d.value != 6));
    }

    #[test]
    fn test_reroll_passes_are_capped() {
        let rerolled = |passes: Option<u32>| {
            let mut cfg = config(5);
            if let Some(passes) = passes {
                cfg.pipeline.max_reroll_passes = passes;
            }
            let mut o = orchestrator_with(cfg, Ledger::new(50, 100));
            // Every face asks for a reroll on every pass
            for value in 1..=6 {
                o.acquire_relic(Relic::new(
                    format!("reroll_{}", value),
                    "Restless",
                    RelicEffect::RerollValue {
                        value,
                        per_turn: 10,
                    },
                ))
                .unwrap();
            }
            o.start_wave(roster(&[100])).unwrap();
            o.roll_values(&[1, 2, 3, 4, 5]).unwrap().rerolled.len()
        };

        assert_eq!(rerolled(None), 10);
        assert_eq!(rerolled(Some(3)), 15);
        assert_eq!(rerolled(Some(0)), 0);
    }

    #[test]
    fn test_turn_charges_reset_each_turn() {
        let mut cfg = config(5);
        cfg.rolls.per_wave = 4;
        let mut o = yacht_only(cfg);
        o.acquire_relic(Relic::new(
            "loaded_die",
            "Loaded Die",
            RelicEffect::RerollBelow {
                threshold: 1,
                max_dice: 1,
            },
        ))
        .unwrap();
        o.start_wave(roster(&[500])).unwrap();

        let first = o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(first.rerolled, vec![DieId(0)]);
        assert_eq!(o.phase(), Phase::RollPending);

        // Same turn: the charge is gone
        let second = o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        assert!(second.rerolled.is_empty());

        o.roll_values(&[6, 6, 6, 6, 6]).unwrap();
        o.select_hand(0).unwrap();
        assert_eq!(o.complete_attack().unwrap(), TurnOutcome::ContinueTurn);
        assert_eq!(o.turn(), 2);

        let next_turn = o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(next_turn.rerolled.len(), 1);
    }

    #[test]
    fn test_no_hand_rolls_again_then_fails_wave() {
        let mut cfg = config(5);
        cfg.rolls.per_wave = 2;
        let mut o = yacht_only(cfg);
        o.start_wave(roster(&[100])).unwrap();

        let first = o.roll_values(&[1, 2, 3, 4, 5]).unwrap();
        assert!(first.hands.is_empty());
        assert_eq!(first.outcome, None);
        assert_eq!(first.rolls_remaining, 1);
        assert_eq!(o.phase(), Phase::RollPending);

        let last = o.roll_values(&[1, 2, 3, 4, 6]).unwrap();
        assert!(last.hands.is_empty());
        assert_eq!(last.outcome, Some(TurnOutcome::WaveFailed));
        assert_eq!(o.phase(), Phase::WaveOver { cleared: false });
        assert_eq!(o.economy().wave_results, vec![(false, 0)]);
        assert_eq!(
            o.last_report().unwrap().outcome,
            Some(TurnOutcome::WaveFailed)
        );
    }

    #[test]
    fn test_locking_a_die_refreshes_hands() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[6, 6, 6, 1, 2]).unwrap();
        assert!(o.hands().iter().any(|h| h.name() == "Triple"));

        assert!(o.lock_die(DieId(0), 2));
        assert!(o.hands().iter().all(|h| h.name() != "Triple"));
        assert!(o
            .hands()
            .iter()
            .all(|h| !h.used_dice().contains(&DieId(0))));

        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        assert_eq!(o.phase(), Phase::Resolving);
        assert!(!o.lock_die(DieId(3), 1));
        assert!(!o.preserve_die(DieId(3)));

        o.complete_attack().unwrap();
        let locked = o.dice().dice().iter().find(|d| d.id == DieId(0)).unwrap();
        assert!(locked.state.is_locked());
    }

    #[test]
    fn test_lock_refused_when_no_hand_would_remain() {
        let mut o = orchestrator(2);
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[3, 4]).unwrap();

        assert!(o.lock_die(DieId(0), 1));
        assert!(!o.lock_die(DieId(1), 1));
        assert!(!o.hands().is_empty());
        assert_eq!(o.dice().available().len(), 1);
    }

    #[test]
    fn test_relics_triggered_listed_once_in_firing_order() {
        let mut o = orchestrator(2);
        for relic in [
            Relic::new(
                "mender",
                "Mender",
                RelicEffect::HealAfterAttack { amount: 2 },
            ),
            Relic::new("whetstone", "Whetstone", RelicEffect::FlatDamage { amount: 1 }),
            Relic::new(
                "tithe",
                "Tithe",
                RelicEffect::HandCompleteGold {
                    hand: None,
                    amount: 1,
                },
            ),
        ] {
            o.acquire_relic(relic).unwrap();
        }
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[6, 6]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();

        let attack = &o.last_report().unwrap().attacks[0];
        assert_eq!(
            attack.relics_triggered,
            vec![
                "tithe".to_string(),
                "whetstone".to_string(),
                "mender".to_string()
            ]
        );
    }

    #[test]
    fn test_first_seen_drops_repeats() {
        let ids = ["war_drum", "whetstone", "war_drum", "mender", "whetstone"]
            .map(String::from)
            .to_vec();
        assert_eq!(
            first_seen(ids),
            vec![
                "war_drum".to_string(),
                "whetstone".to_string(),
                "mender".to_string()
            ]
        );
    }

    #[test]
    fn test_self_buff_heals() {
        let mut o = orchestrator(5);
        o.start_wave(roster(&[100])).unwrap();
        o.roll_values(&[2, 4, 6, 2, 4]).unwrap();
        o.select_hand(hand_index(&o, "All Even")).unwrap();
        assert!(o.presenter().attacks[0].to.is_empty());

        o.complete_attack().unwrap();
        assert_eq!(o.economy().hp, 68);
        assert_eq!(o.economy().gold, 18);
        assert_eq!(hp(&o, 0), 100);
    }

    #[test]
    fn test_free_first_roll() {
        let mut o = orchestrator(5);
        o.acquire_relic(standard_relic("hourglass")).unwrap();
        o.start_wave(roster(&[100])).unwrap();

        let first = o.roll().unwrap();
        assert!(!first.consumed_roll);
        assert_eq!(first.rolls_remaining, 3);
    }

    #[test]
    fn test_enemy_hook_order() {
        let log: HookLog = Default::default();
        let mut o = orchestrator(3);
        o.start_wave(vec![Dummy::new(0, 100).with_log(log.clone()).boxed()])
            .unwrap();
        o.roll_values(&[6, 6, 1]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();

        let entries = log.borrow().clone();
        assert_eq!(entries[0], "0:wave:1");
        assert_eq!(entries[1], "0:roll:[6, 6, 1]");
        assert_eq!(entries[2], "0:hit:10");
        assert_eq!(entries[3], "0:taken:10");
    }

    #[test]
    fn test_enemy_armour_applies() {
        let mut o = orchestrator(3);
        o.start_wave(vec![Dummy::new(0, 100).with_armour(4).boxed()])
            .unwrap();
        o.roll_values(&[6, 6, 1]).unwrap();
        o.select_hand(hand_index(&o, "One Pair")).unwrap();
        o.complete_attack().unwrap();
        o.complete_attack().unwrap();
        let report = o.last_report().unwrap();
        assert_eq!(report.attacks[0].damage_dealt, 6);
        assert_eq!(report.attacks[1].damage_dealt, 0);
    }

    #[test]
    fn test_revive() {
        let mut o = orchestrator_with(config(5), Ledger::new(5, 40));
        o.acquire_relic(standard_relic("phoenix_feather")).unwrap();

        let hit = o.damage_player(10, "ogre");
        assert_eq!(hit.revived_by.as_deref(), Some("phoenix_feather"));
        assert!(!hit.dead);
        assert_eq!(o.economy().hp, 20);

        let hit = o.damage_player(30, "ogre");
        assert!(hit.dead);
        assert_eq!(o.economy().hp, 0);
    }

    #[test]
    fn test_acquire_and_shop() {
        let mut o = orchestrator(5);
        o.acquire_relic(Relic::new(
            "heart",
            "Heart Stone",
            RelicEffect::MaxHpPerRelic { amount: 5 },
        ))
        .unwrap();
        assert_eq!(o.economy().max_hp, 105);

        o.acquire_relic(Relic::new(
            "coupon",
            "Coupon",
            RelicEffect::ShopDiscount { amount: 2 },
        ))
        .unwrap();
        assert_eq!(o.economy().max_hp, 110);
        assert_eq!(o.refresh_shop(10), 8);
        assert!(matches!(
            o.acquire_relic(Relic::new(
                "coupon",
                "Coupon",
                RelicEffect::ShopDiscount { amount: 2 },
            )),
            Err(CombatError::Relic(_))
        ));
    }

    #[test]
    fn test_start_wave_guards() {
        let mut o = orchestrator(5);
        assert!(matches!(o.start_wave(Vec::new()), Err(CombatError::EmptyRoster)));
        assert!(matches!(o.roll(), Err(CombatError::InvalidPhase { .. })));
        o.start_wave(roster(&[10])).unwrap();
        assert!(matches!(
            o.start_wave(roster(&[10])),
            Err(CombatError::InvalidPhase { .. })
        ));
        assert!(matches!(o.select_hand(0), Err(CombatError::InvalidPhase { .. })));
        o.roll().unwrap();
        assert!(matches!(o.select_hand(99), Err(CombatError::NoSuchHand(99))));
    }

    proptest! {
        #[test]
        fn prop_one_attack_in_flight(
            values in proptest::collection::vec(1u32..=6, 5),
            enemies in 1usize..4,
        ) {
            let mut o = orchestrator(5);
            o.start_wave(roster(&[1000].repeat(enemies))).unwrap();
            o.roll_values(&values).unwrap();

            let mut completed = 0;
            loop {
                match o.phase() {
                    Phase::HandSelection => {
                        o.auto_select_hand().unwrap();
                    }
                    Phase::Resolving => {
                        prop_assert!(matches!(
                            o.select_hand(0),
                            Err(CombatError::ResolutionInFlight)
                        ));
                        prop_assert_eq!(o.presenter().attacks.len(), completed + 1);
                        o.complete_attack().unwrap();
                        completed += 1;
                    }
                    _ => break,
                }
            }
            prop_assert!(completed > 0);
            prop_assert_eq!(o.last_report().unwrap().attacks.len(), completed);
        }
    }

    #[test]
    fn test_seeded_fights_reproducible() {
        let fight = || {
            let mut o = orchestrator(5);
            o.acquire_relic(standard_relic("lucky_coin")).unwrap();
            o.start_wave(roster(&[60, 60, 60])).unwrap();
            let mut reports = Vec::new();
            for _ in 0..10 {
                let report = o.play_auto_turn().unwrap();
                let over = report.outcome.is_some_and(|r| r.is_wave_over());
                reports.push(report);
                if over {
                    break;
                }
            }
            serde_json::to_string(&reports).unwrap()
        };
        assert_eq!(fight(), fight());
    }
}
