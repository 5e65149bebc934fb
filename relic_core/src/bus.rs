//! The ordered event bus that applies owned relics to event payloads
//!
//! Relics run in acquisition order. A limited-use relic only runs while it has
//! charges; a charge is spent each time its effect actually changes a payload,
//! and charges come back when the event named by its scope is published.

use crate::effect::RelicEffect;
use crate::event::{EventPayload, GameEvent};
use crate::relic::{Relic, RelicInstance};
use crate::RelicError;
use dice_core::CatalogFlags;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// Owned relics plus the RNG used by chance effects
#[derive(Debug, Clone)]
pub struct EventBus {
    relics: Vec<RelicInstance>,
    rng: ChaCha8Rng,
}

impl EventBus {
    pub fn new(rng: ChaCha8Rng) -> Self {
        EventBus {
            relics: Vec::new(),
            rng,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Acquire a relic, or add a stack to one already owned
    ///
    /// Returns the relic's stack count after acquisition.
    pub fn acquire(&mut self, relic: Relic) -> Result<u32, RelicError> {
        relic.validate()?;

        if let Some(existing) = self.relics.iter_mut().find(|r| r.id() == relic.id) {
            if !existing.add_stack() {
                return Err(RelicError::StackLimit {
                    relic: relic.id,
                    max: existing.relic().max_stacks,
                });
            }
            debug!(relic = %relic.id, stacks = existing.stacks(), "relic stacked");
            return Ok(existing.stacks());
        }

        debug!(relic = %relic.id, position = self.relics.len(), "relic acquired");
        self.relics.push(RelicInstance::new(relic));
        Ok(1)
    }

    /// Drop a relic entirely; later relics keep their relative order
    pub fn remove(&mut self, id: &str) -> Result<RelicInstance, RelicError> {
        let index = self
            .relics
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| RelicError::UnknownRelic(id.to_string()))?;
        debug!(relic = %id, "relic removed");
        Ok(self.relics.remove(index))
    }

    /// Owned relics in application order
    pub fn relics(&self) -> &[RelicInstance] {
        &self.relics
    }

    pub fn get(&self, id: &str) -> Option<&RelicInstance> {
        self.relics.iter().find(|r| r.id() == id)
    }

    pub fn stacks(&self, id: &str) -> u32 {
        self.get(id).map_or(0, |r| r.stacks())
    }

    pub fn len(&self) -> usize {
        self.relics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relics.is_empty()
    }

    /// Hand catalog flags contributed by owned relics
    pub fn active_flags(&self) -> CatalogFlags {
        self.relics
            .iter()
            .filter_map(|r| r.relic().effect.catalog_flag())
            .collect()
    }

    /// Run every listening relic over the payload, in acquisition order
    ///
    /// Returns the ids of relics that changed the payload.
    pub fn publish(&mut self, payload: &mut EventPayload<'_>) -> Vec<String> {
        let kind = payload.kind();
        self.reset_charges(kind);

        let rng = &mut self.rng;
        let mut triggered = Vec::new();
        for instance in self.relics.iter_mut() {
            let effect: &RelicEffect = &instance.relic().effect;
            if !effect.listens_to().contains(&kind) {
                continue;
            }
            if instance.remaining_charges() == Some(0) {
                trace!(relic = %instance.id(), event = %kind, "relic out of charges");
                continue;
            }

            let fired = instance
                .relic()
                .effect
                .apply(instance.id(), instance.stacks(), payload, rng);
            if fired {
                if instance.charge_scope().is_some() {
                    instance.spend_charge();
                }
                trace!(relic = %instance.id(), event = %kind, "relic triggered");
                triggered.push(instance.id().to_string());
            }
        }

        if !triggered.is_empty() {
            debug!(event = %kind, count = triggered.len(), "event handled");
        }
        triggered
    }

    fn reset_charges(&mut self, kind: GameEvent) {
        for instance in self.relics.iter_mut() {
            if instance.charge_scope().and_then(|s| s.reset_event()) == Some(kind) {
                instance.reset_charges();
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_seed(0)
    }
}
