//! Relic definitions and their runtime instances

use crate::effect::{ChargeScope, RelicEffect};
use crate::RelicError;
use serde::{Deserialize, Serialize};

fn default_max_stacks() -> u32 {
    1
}

/// An acquirable relic (immutable definition)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effect: RelicEffect,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
}

impl Relic {
    pub fn new(id: impl Into<String>, name: impl Into<String>, effect: RelicEffect) -> Self {
        Relic {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            effect,
            max_stacks: 1,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    /// Reject definitions the pipeline could not apply sensibly
    pub fn validate(&self) -> Result<(), RelicError> {
        if self.id.trim().is_empty() {
            return Err(RelicError::Validation {
                relic: self.name.clone(),
                message: "relic id must not be empty".to_string(),
            });
        }
        if self.max_stacks == 0 {
            return Err(RelicError::Validation {
                relic: self.id.clone(),
                message: "max_stacks must be at least 1".to_string(),
            });
        }
        self.effect
            .validate()
            .map_err(|message| RelicError::Validation {
                relic: self.id.clone(),
                message,
            })
    }
}

/// An owned relic: definition plus stack count and spent charges
#[derive(Debug, Clone, PartialEq)]
pub struct RelicInstance {
    relic: Relic,
    stacks: u32,
    charges_used: u32,
}

impl RelicInstance {
    pub(crate) fn new(relic: Relic) -> Self {
        RelicInstance {
            relic,
            stacks: 1,
            charges_used: 0,
        }
    }

    pub fn relic(&self) -> &Relic {
        &self.relic
    }

    pub fn id(&self) -> &str {
        &self.relic.id
    }

    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    pub(crate) fn add_stack(&mut self) -> bool {
        if self.stacks >= self.relic.max_stacks {
            return false;
        }
        self.stacks += 1;
        true
    }

    /// Charges left before the next reset, `None` for unlimited effects
    pub fn remaining_charges(&self) -> Option<u32> {
        self.relic
            .effect
            .charges()
            .map(|(_, per_stack)| (per_stack * self.stacks).saturating_sub(self.charges_used))
    }

    pub fn charge_scope(&self) -> Option<ChargeScope> {
        self.relic.effect.charges().map(|(scope, _)| scope)
    }

    pub(crate) fn spend_charge(&mut self) {
        self.charges_used += 1;
    }

    pub(crate) fn reset_charges(&mut self) {
        self.charges_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_definitions() {
        let relic = Relic::new("", "Nameless", RelicEffect::FlatDamage { amount: 1 });
        assert!(matches!(relic.validate(), Err(RelicError::Validation { .. })));

        let relic =
            Relic::new("whetstone", "Whetstone", RelicEffect::FlatDamage { amount: 1 }).with_max_stacks(0);
        assert!(relic.validate().is_err());

        let relic = Relic::new(
            "glass",
            "Glass Lens",
            RelicEffect::DamageMultiplier { multiplier: -1.0 },
        );
        let err = relic.validate().unwrap_err();
        assert!(err.to_string().contains("glass"));
    }

    #[test]
    fn test_stacks_capped() {
        let relic = Relic::new("whetstone", "Whetstone", RelicEffect::FlatDamage { amount: 2 })
            .with_max_stacks(2);
        let mut instance = RelicInstance::new(relic);
        assert!(instance.add_stack());
        assert!(!instance.add_stack());
        assert_eq!(instance.stacks(), 2);
    }

    #[test]
    fn test_charges_scale_with_stacks() {
        let relic = Relic::new(
            "aegis",
            "Aegis",
            RelicEffect::CancelHitBelowHp { threshold: 0.2 },
        )
        .with_max_stacks(3);
        let mut instance = RelicInstance::new(relic);
        instance.add_stack();
        assert_eq!(instance.remaining_charges(), Some(2));
        instance.spend_charge();
        assert_eq!(instance.remaining_charges(), Some(1));
        instance.reset_charges();
        assert_eq!(instance.remaining_charges(), Some(2));
        assert_eq!(instance.charge_scope(), Some(ChargeScope::Zone));
    }

    #[test]
    fn test_unlimited_effect_has_no_charges() {
        let instance = RelicInstance::new(Relic::new(
            "whetstone",
            "Whetstone",
            RelicEffect::FlatDamage { amount: 2 },
        ));
        assert_eq!(instance.remaining_charges(), None);
    }
}
