//! HandCatalog - ordered template registry and evaluation

use super::{
    AchievedHand, HandPredicate, HandTemplate, SubAttackTemplate, UsedDice, ValueRule,
};
use crate::config::{load_hands, parse_hands};
use crate::dice::DieValue;
use crate::types::TargetShape;
use crate::{ConfigError, HandError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::trace;

/// Flag that hides the 4-long straight and boosts the 5-long straight
pub const STRAIGHT_MASTERY: &str = "straight_mastery";

/// External toggles that hide or boost templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFlags {
    flags: BTreeSet<String>,
}

impl CatalogFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: impl Into<String>) {
        self.flags.insert(flag.into());
    }

    pub fn clear(&mut self, flag: &str) -> bool {
        self.flags.remove(flag)
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|s| s.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for CatalogFlags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        CatalogFlags {
            flags: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Registry of hand templates in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandCatalog {
    templates: Vec<HandTemplate>,
}

impl HandCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from templates, validating each one
    pub fn from_templates(templates: Vec<HandTemplate>) -> Result<Self, HandError> {
        let mut catalog = Self::new();
        for template in templates {
            catalog.register(template)?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a TOML file of `[[hands]]` tables
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_hands(path)
    }

    /// Parse a catalog from a TOML string
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        parse_hands(toml)
    }

    /// Add a template at the end of the evaluation order
    pub fn register(&mut self, template: HandTemplate) -> Result<(), HandError> {
        template.validate()?;
        if self.contains(&template.name) {
            return Err(HandError::Duplicate(template.name));
        }
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HandTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn templates(&self) -> &[HandTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Every hand achievable from `dice`, highest damage first
    ///
    /// Equal damage keeps registration order. Templates hidden by an active
    /// flag are skipped before their predicate runs. Returns an empty list when
    /// nothing matches.
    pub fn evaluate(&self, dice: &[DieValue], flags: &CatalogFlags) -> Vec<AchievedHand> {
        let values: Vec<u32> = dice.iter().map(|d| d.value).collect();

        let mut hands: Vec<AchievedHand> = self
            .templates
            .iter()
            .filter(|t| !t.hidden_by.as_deref().is_some_and(|f| flags.contains(f)))
            .filter(|t| t.predicate.matches(&values))
            .map(|t| {
                let boosted = t.boost.as_ref().is_some_and(|b| flags.contains(&b.flag));
                AchievedHand::from_template(t, dice, boosted)
            })
            .collect();

        // sort_by is stable
        hands.sort_by(|a, b| b.damage().cmp(&a.damage()));
        trace!(?values, matched = hands.len(), "hands evaluated");
        hands
    }

    /// Evaluate bare values with positional die ids
    pub fn evaluate_values(&self, values: &[u32], flags: &CatalogFlags) -> Vec<AchievedHand> {
        self.evaluate(&DieValue::from_values(values), flags)
    }

    /// The built-in catalog for a five-die pool
    pub fn standard() -> Self {
        let templates = vec![
            HandTemplate::new(
                super::SUM_HAND,
                TargetShape::Random,
                HandPredicate::Always,
                ValueRule::Sum { factor: 1 },
                ValueRule::Sum { factor: 1 },
            )
            .with_description("Throw everything at a random enemy")
            .with_random_targets(1),
            HandTemplate::new(
                "One Pair",
                TargetShape::Single,
                HandPredicate::Group { size: 2 },
                ValueRule::Fixed(10),
                ValueRule::Fixed(2),
            )
            .with_used_dice(UsedDice::Pattern),
            HandTemplate::new(
                "Two Pair",
                TargetShape::Single,
                HandPredicate::Groups { sizes: vec![2, 2] },
                ValueRule::Fixed(18),
                ValueRule::Fixed(4),
            )
            .with_used_dice(UsedDice::Pattern)
            .with_required_targets(2),
            HandTemplate::new(
                "Triple",
                TargetShape::Single,
                HandPredicate::Group { size: 3 },
                ValueRule::Fixed(25),
                ValueRule::Fixed(5),
            )
            .with_used_dice(UsedDice::Pattern),
            HandTemplate::new(
                "Full House",
                TargetShape::Hybrid,
                HandPredicate::Groups { sizes: vec![3, 2] },
                ValueRule::Fixed(40),
                ValueRule::Fixed(8),
            )
            .with_used_dice(UsedDice::Pattern)
            .with_sub_attack(SubAttackTemplate {
                shape: TargetShape::Aoe,
                target_count: 0,
                damage: ValueRule::Fixed(10),
            }),
            HandTemplate::new(
                "Small Straight",
                TargetShape::Random,
                HandPredicate::Straight { length: 4 },
                ValueRule::Fixed(30),
                ValueRule::Fixed(6),
            )
            .with_used_dice(UsedDice::Pattern)
            .hidden_by(STRAIGHT_MASTERY),
            HandTemplate::new(
                "Large Straight",
                TargetShape::Aoe,
                HandPredicate::Straight { length: 5 },
                ValueRule::Fixed(45),
                ValueRule::Fixed(10),
            )
            .with_used_dice(UsedDice::Pattern)
            .with_boost(STRAIGHT_MASTERY, 25, 5),
            HandTemplate::new(
                "Four of a Kind",
                TargetShape::Single,
                HandPredicate::Group { size: 4 },
                ValueRule::Fixed(50),
                ValueRule::Fixed(10),
            )
            .with_used_dice(UsedDice::Pattern),
            HandTemplate::new(
                "Yacht",
                TargetShape::Aoe,
                HandPredicate::Group { size: 5 },
                ValueRule::Fixed(80),
                ValueRule::Fixed(20),
            )
            .with_used_dice(UsedDice::Pattern),
            HandTemplate::new(
                "All Even",
                TargetShape::SelfBuff,
                HandPredicate::AllEven { min_dice: 4 },
                ValueRule::UsedSum { factor: 1 },
                ValueRule::Sum { factor: 1 },
            )
            .with_description("Recover health equal to the dice"),
            HandTemplate::new(
                "All Odd",
                TargetShape::Random,
                HandPredicate::AllOdd { min_dice: 4 },
                ValueRule::UsedSum { factor: 2 },
                ValueRule::Fixed(3),
            )
            .with_random_targets(2),
            HandTemplate::new(
                "High Roll",
                TargetShape::Aoe,
                HandPredicate::SumAtLeast { threshold: 25 },
                ValueRule::Sum { factor: 1 },
                ValueRule::Fixed(5),
            ),
        ];

        HandCatalog { templates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(hands: &[AchievedHand]) -> Vec<&str> {
        hands.iter().map(|h| h.name()).collect()
    }

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = HandCatalog::standard();
        for template in catalog.templates() {
            assert!(template.validate().is_ok(), "{} invalid", template.name);
        }
        assert!(HandCatalog::from_templates(catalog.templates().to_vec()).is_ok());
    }

    #[test]
    fn test_full_house_sorts_before_triple() {
        let catalog = HandCatalog::standard();
        let hands = catalog.evaluate_values(&[6, 6, 6, 2, 2], &CatalogFlags::new());

        let found = names(&hands);
        assert_eq!(found[0], "Full House");
        assert!(found.contains(&"Triple"));
        let fh = found.iter().position(|n| *n == "Full House").unwrap();
        let triple = found.iter().position(|n| *n == "Triple").unwrap();
        assert!(fh < triple);
    }

    #[test]
    fn test_equal_damage_keeps_registration_order() {
        let catalog = HandCatalog::standard();
        // Sum and All Even both resolve to 22 here
        let hands = catalog.evaluate_values(&[6, 6, 6, 2, 2], &CatalogFlags::new());
        let found = names(&hands);
        let sum = found.iter().position(|n| *n == "Sum").unwrap();
        let even = found.iter().position(|n| *n == "All Even").unwrap();
        assert_eq!(hands[sum].damage(), hands[even].damage());
        assert!(sum < even);
    }

    #[test]
    fn test_sum_hand_pays_sum() {
        let catalog = HandCatalog::standard();
        let hands = catalog.evaluate_values(&[1, 3, 5, 2, 6], &CatalogFlags::new());
        let sum = hands.iter().find(|h| h.name() == "Sum").unwrap();
        assert_eq!(sum.damage(), 17);
        assert_eq!(sum.gold(), 17);
    }

    #[test]
    fn test_straight_mastery_flag() {
        let catalog = HandCatalog::standard();
        let values = [1, 2, 3, 4, 5];

        let plain = catalog.evaluate_values(&values, &CatalogFlags::new());
        assert!(names(&plain).contains(&"Small Straight"));
        let large = plain.iter().find(|h| h.name() == "Large Straight").unwrap();
        assert_eq!(large.damage(), 45);

        let flags: CatalogFlags = [STRAIGHT_MASTERY].into_iter().collect();
        let mastered = catalog.evaluate_values(&values, &flags);
        assert!(!names(&mastered).contains(&"Small Straight"));
        let large = mastered.iter().find(|h| h.name() == "Large Straight").unwrap();
        assert_eq!(large.damage(), 70);
        assert_eq!(mastered[0].name(), "Large Straight");
    }

    #[test]
    fn test_no_match_returns_empty() {
        let mut catalog = HandCatalog::new();
        catalog
            .register(HandTemplate::new(
                "Yacht",
                TargetShape::Aoe,
                HandPredicate::Group { size: 5 },
                ValueRule::Fixed(80),
                ValueRule::Fixed(20),
            ))
            .unwrap();
        assert!(catalog
            .evaluate_values(&[1, 2, 3, 4, 6], &CatalogFlags::new())
            .is_empty());
        assert!(catalog.evaluate(&[], &CatalogFlags::new()).is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut catalog = HandCatalog::standard();
        let dup = catalog.templates()[0].clone();
        assert_eq!(
            catalog.register(dup),
            Err(HandError::Duplicate(crate::SUM_HAND.to_string()))
        );
    }

    #[test]
    fn test_used_dice_refer_to_original_ids() {
        use crate::dice::DieId;
        let catalog = HandCatalog::standard();
        let dice = vec![
            DieValue::new(DieId(7), 4),
            DieValue::new(DieId(3), 1),
            DieValue::new(DieId(9), 4),
        ];
        let hands = catalog.evaluate(&dice, &CatalogFlags::new());
        let pair = hands.iter().find(|h| h.name() == "One Pair").unwrap();
        assert_eq!(pair.used_dice(), &[DieId(7), DieId(9)]);
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_pure(values in proptest::collection::vec(1u32..=6, 0..7)) {
            let catalog = HandCatalog::standard();
            let before = catalog.clone();
            let flags = CatalogFlags::new();

            let first = catalog.evaluate_values(&values, &flags);
            let second = catalog.evaluate_values(&values, &flags);

            prop_assert_eq!(first, second);
            prop_assert_eq!(&catalog, &before);
        }

        #[test]
        fn prop_sorted_by_damage(values in proptest::collection::vec(1u32..=6, 1..7)) {
            let hands = HandCatalog::standard().evaluate_values(&values, &CatalogFlags::new());
            prop_assert!(!hands.is_empty());
            for pair in hands.windows(2) {
                prop_assert!(pair[0].damage() >= pair[1].damage());
            }
        }
    }
}
