//! Target selection state machine
//!
//! ```text
//! Idle -> HandChosen -> Confirmed -> Resolving -> Idle
//!                   \-> AwaitingTargets -> Confirmed
//!                             \-> Cancelled -> Idle
//! ```
//!
//! AoE, Random and SelfBuff hands confirm immediately. Single and Hybrid hands
//! wait for exactly `required_targets` toggled enemies, unless there are no more
//! living enemies than that, in which case all of them are picked up front.

use crate::enemy::EnemyId;
use dice_core::{AchievedHand, SubAttack, TargetShape};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetState {
    #[default]
    Idle,
    HandChosen,
    AwaitingTargets,
    Confirmed,
    Resolving,
    Cancelled,
}

/// Number of random targets for a hand: its fixed count, or one per
/// `damage_per_target` damage (minimum one) when the count is zero
pub fn random_target_count(fixed: usize, damage: i32, damage_per_target: i32) -> usize {
    if fixed > 0 {
        return fixed;
    }
    let per = damage_per_target.max(1);
    ((damage.max(0) / per) as usize).max(1)
}

fn sample<R: Rng>(pool: &[EnemyId], count: usize, rng: &mut R) -> Vec<EnemyId> {
    let mut picked: Vec<EnemyId> = pool.choose_multiple(rng, count).copied().collect();
    // Impact order follows roster order regardless of draw order
    picked.sort_by_key(|id| pool.iter().position(|p| p == id));
    picked
}

#[derive(Debug, Clone, Default)]
pub struct TargetSelector {
    state: TargetState,
    shape: Option<TargetShape>,
    required: usize,
    living: Vec<EnemyId>,
    selected: Vec<EnemyId>,
    auto_selected: bool,
}

impl TargetSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Shape of the hand being targeted
    pub fn shape(&self) -> Option<TargetShape> {
        self.shape
    }

    pub fn selected(&self) -> &[EnemyId] {
        &self.selected
    }

    /// Targets still needed before `confirm` succeeds
    pub fn required(&self) -> usize {
        self.required
    }

    /// Whether the selection was filled without player input
    pub fn auto_selected(&self) -> bool {
        self.auto_selected
    }

    /// Start targeting for `hand` against the living roster
    ///
    /// Returns `Confirmed` when no input is needed, `AwaitingTargets` otherwise.
    /// Only legal from `Idle`; any other state is returned unchanged.
    pub fn choose<R: Rng>(
        &mut self,
        hand: &AchievedHand,
        living: &[EnemyId],
        damage_per_target: i32,
        rng: &mut R,
    ) -> TargetState {
        if self.state != TargetState::Idle {
            debug!(state = ?self.state, "target selection already in progress");
            return self.state;
        }

        self.state = TargetState::HandChosen;
        self.shape = Some(hand.shape());
        self.living = living.to_vec();
        self.selected.clear();
        self.auto_selected = false;
        self.required = 0;

        match hand.shape() {
            TargetShape::Aoe => {
                self.selected = self.living.clone();
                self.state = TargetState::Confirmed;
            }
            TargetShape::Random => {
                let count =
                    random_target_count(hand.random_targets(), hand.damage(), damage_per_target);
                self.selected = sample(&self.living, count, rng);
                self.state = TargetState::Confirmed;
            }
            TargetShape::SelfBuff => {
                self.state = TargetState::Confirmed;
            }
            TargetShape::Single | TargetShape::Hybrid => {
                self.required = hand.required_targets();
                if self.living.len() <= self.required {
                    self.selected = self.living.clone();
                    self.auto_selected = true;
                    self.state = TargetState::Confirmed;
                } else {
                    self.state = TargetState::AwaitingTargets;
                }
            }
        }

        debug!(
            hand = %hand.name(),
            shape = %hand.shape(),
            state = ?self.state,
            selected = self.selected.len(),
            "hand chosen for targeting"
        );
        self.state
    }

    /// Add or remove one enemy from the selection
    ///
    /// Rejects enemies not alive at selection time and additions past the
    /// required count; returns whether the selection changed.
    pub fn toggle(&mut self, id: EnemyId) -> bool {
        if self.state != TargetState::AwaitingTargets {
            return false;
        }
        if let Some(pos) = self.selected.iter().position(|s| *s == id) {
            self.selected.remove(pos);
            trace!(target = %id, "target removed");
            return true;
        }
        if !self.living.contains(&id) || self.selected.len() >= self.required {
            trace!(target = %id, "target rejected");
            return false;
        }
        self.selected.push(id);
        trace!(target = %id, "target added");
        true
    }

    /// Confirm a manual selection of exactly the required size
    pub fn confirm(&mut self) -> bool {
        if self.state != TargetState::AwaitingTargets || self.selected.len() != self.required {
            return false;
        }
        self.state = TargetState::Confirmed;
        true
    }

    /// Back out of manual selection; nothing else can be cancelled
    pub fn cancel(&mut self) -> bool {
        if self.state != TargetState::AwaitingTargets {
            return false;
        }
        self.state = TargetState::Cancelled;
        debug!("target selection cancelled");
        self.reset();
        true
    }

    /// Lock in the confirmed selection and return it
    pub fn begin_resolving(&mut self) -> Option<Vec<EnemyId>> {
        if self.state != TargetState::Confirmed {
            return None;
        }
        self.state = TargetState::Resolving;
        Some(self.selected.clone())
    }

    /// Living enemies outside the primary selection, or all of them if none are left
    pub fn complement(&self) -> Vec<EnemyId> {
        let rest: Vec<EnemyId> = self
            .living
            .iter()
            .filter(|id| !self.selected.contains(id))
            .copied()
            .collect();
        if rest.is_empty() {
            self.living.clone()
        } else {
            rest
        }
    }

    /// Targets for a hybrid hand's sub-attack, drawn from the complement
    pub fn sub_targets<R: Rng>(
        &self,
        sub: &SubAttack,
        damage_per_target: i32,
        rng: &mut R,
    ) -> Vec<EnemyId> {
        let pool = self.complement();
        match sub.shape {
            TargetShape::Random => {
                let count = random_target_count(sub.target_count, sub.damage, damage_per_target);
                sample(&pool, count, rng)
            }
            TargetShape::SelfBuff => Vec::new(),
            _ => pool,
        }
    }

    /// Return to `Idle` once resolution is over
    pub fn finish(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.state = TargetState::Idle;
        self.shape = None;
        self.required = 0;
        self.living.clear();
        self.selected.clear();
        self.auto_selected = false;
    }
}
