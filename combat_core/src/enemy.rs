//! Collaborators the combat core calls into but does not own

use dice_core::{AchievedHand, DieId, TargetShape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an enemy within a wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(pub u32);

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enemy#{}", self.0)
    }
}

/// An enemy on the field
///
/// The hand passed to the damage hooks carries the final, post-modifier
/// damage of the hit being delivered.
pub trait Enemy: fmt::Debug {
    fn id(&self) -> EnemyId;

    fn hp(&self) -> i32;

    fn max_hp(&self) -> i32;

    fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    /// Damage this enemy would actually take from `hand`
    fn calculate_damage_taken(&self, hand: &AchievedHand) -> i32;

    /// Apply damage; returns true if the enemy died
    fn take_damage(&mut self, amount: i32, hand: &AchievedHand) -> bool;

    /// Called after every roll, before hands are evaluated
    fn on_player_roll(&mut self, _values: &[u32]) {}

    /// Called once per wave with the ids of every enemy in it
    fn on_wave_start(&mut self, _allies: &[EnemyId]) {}

    /// Called right after `take_damage`
    fn on_damage_taken(&mut self, _amount: i32, _hand: &AchievedHand) {}
}

/// Player resources and progression
pub trait Economy {
    fn player_hp(&self) -> i32;

    fn player_max_hp(&self) -> i32;

    fn gold(&self) -> i32;

    fn add_gold(&mut self, amount: i32);

    fn heal_player(&mut self, amount: i32);

    fn damage_player(&mut self, amount: i32, source: &str);

    /// Set HP directly (revives)
    fn set_player_hp(&mut self, hp: i32);

    fn add_max_hp(&mut self, amount: i32);

    /// Wave outcome report; the economy decides what a failure costs
    fn process_wave_clear(&mut self, success: bool, rolls_remaining: u32);
}

/// One attack handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPresentation {
    pub hand: String,
    pub shape: TargetShape,
    /// Dice the attack flies from
    pub from: Vec<DieId>,
    /// One impact per entry; `impact(index)` refers to this order
    pub to: Vec<EnemyId>,
    pub damage: Vec<i32>,
    pub critical: bool,
}

/// Plays attacks; the orchestrator waits for `impact`/`complete_attack` calls
pub trait Presenter {
    fn play_attack(&mut self, attack: &AttackPresentation);
}

/// Presenter that shows nothing; callers complete attacks immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPresenter;

impl Presenter for SilentPresenter {
    fn play_attack(&mut self, _attack: &AttackPresentation) {}
}
