//! Achievability predicates over a dice-value multiset
//!
//! Predicates only look at the values; positions returned by
//! [`HandPredicate::pattern_positions`] index into the same slice so the caller
//! can map them back to die identities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of the check a hand template runs against the dice values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandPredicate {
    /// Any non-empty set of values
    Always,
    /// At least `size` dice showing the same value
    Group { size: u32 },
    /// Disjoint groups of equal values, one per entry (e.g. `[3, 2]` is a full house)
    Groups { sizes: Vec<u32> },
    /// A run of `length` consecutive distinct values
    Straight { length: u32 },
    /// Every die even, with at least `min_dice` dice
    AllEven { min_dice: u32 },
    /// Every die odd, with at least `min_dice` dice
    AllOdd { min_dice: u32 },
    /// Sum of all values at least `threshold`
    SumAtLeast { threshold: u32 },
    /// Sum of all values at most `threshold`
    SumAtMost { threshold: u32 },
}

impl HandPredicate {
    /// Check the predicate against a value multiset
    pub fn matches(&self, values: &[u32]) -> bool {
        if values.is_empty() {
            return false;
        }

        match self {
            HandPredicate::Always => true,
            HandPredicate::Group { size } => {
                counts_desc(values).first().is_some_and(|(_, c)| c >= size)
            }
            HandPredicate::Groups { sizes } => {
                let mut required = sizes.clone();
                required.sort_unstable_by(|a, b| b.cmp(a));
                let counts = counts_desc(values);
                required.len() <= counts.len()
                    && required
                        .iter()
                        .zip(counts.iter())
                        .all(|(need, (_, have))| have >= need)
            }
            HandPredicate::Straight { length } => longest_run(values).len() as u32 >= *length,
            HandPredicate::AllEven { min_dice } => {
                values.len() as u32 >= *min_dice && values.iter().all(|v| v % 2 == 0)
            }
            HandPredicate::AllOdd { min_dice } => {
                values.len() as u32 >= *min_dice && values.iter().all(|v| v % 2 == 1)
            }
            HandPredicate::SumAtLeast { threshold } => values.iter().sum::<u32>() >= *threshold,
            HandPredicate::SumAtMost { threshold } => values.iter().sum::<u32>() <= *threshold,
        }
    }

    /// Positions of the dice that form the matched pattern
    ///
    /// Grouping predicates pick the highest qualifying values, straights pick the
    /// top `length` values of the highest longest run. Predicates without a
    /// sub-pattern use every die. Assumes [`HandPredicate::matches`] held.
    pub fn pattern_positions(&self, values: &[u32]) -> Vec<usize> {
        match self {
            HandPredicate::Group { size } => {
                let counts = counts_desc(values);
                match counts.iter().find(|(_, c)| c >= size) {
                    Some(&(value, _)) => take_positions(values, value, *size as usize),
                    None => Vec::new(),
                }
            }
            HandPredicate::Groups { sizes } => {
                let mut required = sizes.clone();
                required.sort_unstable_by(|a, b| b.cmp(a));
                let counts = counts_desc(values);
                let mut positions = Vec::new();
                for (need, (value, _)) in required.iter().zip(counts.iter()) {
                    positions.extend(take_positions(values, *value, *need as usize));
                }
                positions.sort_unstable();
                positions
            }
            HandPredicate::Straight { length } => {
                let run = longest_run(values);
                let skip = run.len().saturating_sub(*length as usize);
                let mut positions: Vec<usize> = run[skip..]
                    .iter()
                    .filter_map(|v| values.iter().position(|x| x == v))
                    .collect();
                positions.sort_unstable();
                positions
            }
            _ => (0..values.len()).collect(),
        }
    }
}

/// Distinct values with their counts, largest count first, ties by higher value
fn counts_desc(values: &[u32]) -> Vec<(u32, u32)> {
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut pairs: Vec<(u32, u32)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
    pairs
}

/// Longest run of consecutive distinct values; the highest such run on ties
fn longest_run(values: &[u32]) -> Vec<u32> {
    let mut distinct: Vec<u32> = values.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    let mut best: Vec<u32> = Vec::new();
    let mut current: Vec<u32> = Vec::new();
    for v in distinct {
        if current.last().is_some_and(|&last| last + 1 == v) {
            current.push(v);
        } else {
            current = vec![v];
        }
        if current.len() >= best.len() {
            best = current.clone();
        }
    }
    best
}

fn take_positions(values: &[u32], value: u32, count: usize) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == value)
        .map(|(i, _)| i)
        .take(count)
        .collect()
}
