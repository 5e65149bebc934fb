//! Dice pool - identities, values and lock/preserve state

use crate::types::{DieKind, DieState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Stable identity of a die within one pool build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DieId(pub usize);

impl fmt::Display for DieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "die#{}", self.0)
    }
}

/// A single die in the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Die {
    pub id: DieId,
    pub kind: DieKind,
    pub value: u32,
    pub state: DieState,
}

impl Die {
    pub fn new(id: DieId, kind: DieKind) -> Self {
        Die {
            id,
            kind,
            value: 1,
            state: DieState::Normal,
        }
    }

    /// Whether this die contributes to available values
    pub fn is_available(&self) -> bool {
        !self.state.is_locked()
    }
}

/// A die value paired with the die it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DieValue {
    pub id: DieId,
    pub value: u32,
}

impl DieValue {
    pub fn new(id: DieId, value: u32) -> Self {
        DieValue { id, value }
    }

    /// Positional ids for a bare value list (tests, previews)
    pub fn from_values(values: &[u32]) -> Vec<DieValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| DieValue::new(DieId(i), value))
            .collect()
    }
}

/// What happened to each die passed to [`DiceSet::remove_by_ids`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<DieId>,
    /// Preserved dice that stayed in the pool
    pub kept: Vec<DieId>,
    /// Ids that were not in the pool
    pub missing: Vec<DieId>,
}

/// The player's dice pool
///
/// Dice keep their [`DieId`] from the moment the pool is built until they are
/// removed or the pool is rebuilt, so an id returned by [`DiceSet::available`]
/// always refers to the same die until the next removal or rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiceSet {
    dice: Vec<Die>,
    /// Composition the pool is rebuilt from
    kinds: Vec<DieKind>,
    next_id: usize,
}

impl DiceSet {
    /// Build a pool with one die per entry of `kinds`
    pub fn build(kinds: &[DieKind]) -> Self {
        let mut set = DiceSet {
            dice: Vec::with_capacity(kinds.len()),
            kinds: kinds.to_vec(),
            next_id: 0,
        };
        set.refill();
        set
    }

    /// Discard every die and rebuild the pool from its composition
    ///
    /// Lock counters carry over positionally so a die locked for several turns
    /// stays locked across the rebuild.
    pub fn refill(&mut self) {
        let carried: Vec<DieState> = self
            .dice
            .iter()
            .filter(|d| d.state.is_locked())
            .map(|d| d.state)
            .collect();

        self.dice.clear();
        for (slot, &kind) in self.kinds.iter().enumerate() {
            let id = DieId(self.next_id);
            self.next_id += 1;
            let mut die = Die::new(id, kind);
            if let Some(state) = carried.get(slot) {
                die.state = *state;
            }
            self.dice.push(die);
        }
        debug!(dice = self.dice.len(), locked = carried.len(), "dice pool rebuilt");
    }

    /// Add an extra die to the composition and the live pool
    pub fn add_die(&mut self, kind: DieKind) -> DieId {
        let id = DieId(self.next_id);
        self.next_id += 1;
        self.kinds.push(kind);
        self.dice.push(Die::new(id, kind));
        id
    }

    /// Roll every Normal die
    ///
    /// Locked dice and preserved dice keep their current value.
    pub fn roll<R: Rng>(&mut self, rng: &mut R) {
        for die in &mut self.dice {
            if die.state == DieState::Normal {
                die.value = rng.gen_range(1..=die.kind.max_face());
            }
        }
        trace!(values = ?self.values(), "dice rolled");
    }

    /// Reroll specific dice regardless of preserve state; locked dice are skipped
    ///
    /// Returns the ids that were actually rerolled.
    pub fn reroll<R: Rng>(&mut self, ids: &[DieId], rng: &mut R) -> Vec<DieId> {
        let mut rerolled = Vec::new();
        for die in &mut self.dice {
            if ids.contains(&die.id) && !die.state.is_locked() && !rerolled.contains(&die.id) {
                die.value = rng.gen_range(1..=die.kind.max_face());
                rerolled.push(die.id);
            }
        }
        rerolled
    }

    /// Values of every die that is not locked, in pool order
    pub fn available(&self) -> Vec<DieValue> {
        self.dice
            .iter()
            .filter(|d| d.is_available())
            .map(|d| DieValue::new(d.id, d.value))
            .collect()
    }

    /// Just the available values
    pub fn available_values(&self) -> Vec<u32> {
        self.available().into_iter().map(|d| d.value).collect()
    }

    /// Every die value, locked or not
    pub fn values(&self) -> Vec<u32> {
        self.dice.iter().map(|d| d.value).collect()
    }

    /// Lock a die for `turns` turn-ends
    ///
    /// Returns false if the die does not exist or `turns` is zero.
    pub fn lock(&mut self, id: DieId, turns: u32) -> bool {
        if turns == 0 {
            return false;
        }
        match self.get_mut(id) {
            Some(die) => {
                die.state = DieState::Locked { remaining: turns };
                true
            }
            None => false,
        }
    }

    /// Tick every lock down once; dice reaching zero become Normal again
    ///
    /// Returns the ids that were released by this call.
    pub fn decrement_locks(&mut self) -> Vec<DieId> {
        let mut released = Vec::new();
        for die in &mut self.dice {
            if let DieState::Locked { remaining } = die.state {
                let left = remaining.saturating_sub(1);
                if left == 0 {
                    die.state = DieState::Normal;
                    released.push(die.id);
                } else {
                    die.state = DieState::Locked { remaining: left };
                }
            }
        }
        if !released.is_empty() {
            debug!(released = released.len(), "dice unlocked");
        }
        released
    }

    /// Mark a die to survive the next removal; locked dice cannot be preserved
    pub fn preserve(&mut self, id: DieId) -> bool {
        match self.get_mut(id) {
            Some(die) if !die.state.is_locked() => {
                die.state = DieState::Preserved;
                true
            }
            _ => false,
        }
    }

    pub fn unpreserve(&mut self, id: DieId) -> bool {
        match self.get_mut(id) {
            Some(die) if die.state.is_preserved() => {
                die.state = DieState::Normal;
                true
            }
            _ => false,
        }
    }

    /// Remove dice consumed by an attack
    ///
    /// Preserved dice stay in the pool with their value unchanged and return to
    /// Normal state, so a preserve protects exactly one attack.
    pub fn remove_by_ids(&mut self, ids: &[DieId]) -> RemovalReport {
        let mut report = RemovalReport::default();

        for &id in ids {
            match self.dice.iter_mut().find(|d| d.id == id) {
                Some(die) if die.state.is_preserved() => {
                    die.state = DieState::Normal;
                    report.kept.push(id);
                }
                Some(_) => report.removed.push(id),
                None => report.missing.push(id),
            }
        }

        self.dice.retain(|d| !report.removed.contains(&d.id));
        debug!(
            removed = report.removed.len(),
            kept = report.kept.len(),
            remaining = self.dice.len(),
            "dice consumed"
        );
        report
    }

    /// Force a die to a value (scripted rolls, relic effects)
    pub fn set_value(&mut self, id: DieId, value: u32) -> bool {
        match self.get_mut(id) {
            Some(die) => {
                die.value = value.clamp(1, die.kind.max_face());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: DieId) -> Option<&Die> {
        self.dice.iter().find(|d| d.id == id)
    }

    fn get_mut(&mut self, id: DieId) -> Option<&mut Die> {
        self.dice.iter_mut().find(|d| d.id == id)
    }

    pub fn dice(&self) -> &[Die] {
        &self.dice
    }

    pub fn ids(&self) -> Vec<DieId> {
        self.dice.iter().map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.dice.iter().filter(|d| d.is_available()).count()
    }

    pub fn locked_count(&self) -> usize {
        self.dice.iter().filter(|d| d.state.is_locked()).count()
    }

    pub fn composition(&self) -> &[DieKind] {
        &self.kinds
    }
}
