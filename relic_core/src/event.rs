//! Named pipeline events and their payloads

use crate::context::{
    AcquireContext, AttackContext, DamageContext, DeathContext, GoldContext, HandContext,
    HealContext, ProgressContext, RollContext, ShopContext,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every event the orchestrator publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    DiceRolled,
    DiceRerolled,
    BeforeAttack,
    AfterAttack,
    HandComplete,
    BeforePlayerDamaged,
    PlayerDeath,
    WaveStart,
    WaveEnd,
    ZoneStart,
    ZoneEnd,
    TurnStart,
    GoldGain,
    ShopRefresh,
    RelicAcquire,
    PlayerHeal,
}

impl GameEvent {
    pub fn all() -> &'static [GameEvent] {
        &[
            GameEvent::DiceRolled,
            GameEvent::DiceRerolled,
            GameEvent::BeforeAttack,
            GameEvent::AfterAttack,
            GameEvent::HandComplete,
            GameEvent::BeforePlayerDamaged,
            GameEvent::PlayerDeath,
            GameEvent::WaveStart,
            GameEvent::WaveEnd,
            GameEvent::ZoneStart,
            GameEvent::ZoneEnd,
            GameEvent::TurnStart,
            GameEvent::GoldGain,
            GameEvent::ShopRefresh,
            GameEvent::RelicAcquire,
            GameEvent::PlayerHeal,
        ]
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An event together with the context record handlers may update
#[derive(Debug)]
pub enum EventPayload<'a> {
    DiceRolled(&'a mut RollContext),
    DiceRerolled(&'a mut RollContext),
    BeforeAttack(&'a mut AttackContext),
    AfterAttack(&'a mut AttackContext),
    HandComplete(&'a mut HandContext),
    BeforePlayerDamaged(&'a mut DamageContext),
    PlayerDeath(&'a mut DeathContext),
    WaveStart(&'a mut ProgressContext),
    WaveEnd(&'a mut ProgressContext),
    ZoneStart(&'a mut ProgressContext),
    ZoneEnd(&'a mut ProgressContext),
    TurnStart(&'a mut ProgressContext),
    GoldGain(&'a mut GoldContext),
    ShopRefresh(&'a mut ShopContext),
    RelicAcquire(&'a mut AcquireContext),
    PlayerHeal(&'a mut HealContext),
}

impl EventPayload<'_> {
    pub fn kind(&self) -> GameEvent {
        match self {
            EventPayload::DiceRolled(_) => GameEvent::DiceRolled,
            EventPayload::DiceRerolled(_) => GameEvent::DiceRerolled,
            EventPayload::BeforeAttack(_) => GameEvent::BeforeAttack,
            EventPayload::AfterAttack(_) => GameEvent::AfterAttack,
            EventPayload::HandComplete(_) => GameEvent::HandComplete,
            EventPayload::BeforePlayerDamaged(_) => GameEvent::BeforePlayerDamaged,
            EventPayload::PlayerDeath(_) => GameEvent::PlayerDeath,
            EventPayload::WaveStart(_) => GameEvent::WaveStart,
            EventPayload::WaveEnd(_) => GameEvent::WaveEnd,
            EventPayload::ZoneStart(_) => GameEvent::ZoneStart,
            EventPayload::ZoneEnd(_) => GameEvent::ZoneEnd,
            EventPayload::TurnStart(_) => GameEvent::TurnStart,
            EventPayload::GoldGain(_) => GameEvent::GoldGain,
            EventPayload::ShopRefresh(_) => GameEvent::ShopRefresh,
            EventPayload::RelicAcquire(_) => GameEvent::RelicAcquire,
            EventPayload::PlayerHeal(_) => GameEvent::PlayerHeal,
        }
    }
}
