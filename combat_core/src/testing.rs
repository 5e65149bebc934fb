//! Test doubles for the combat collaborators

use crate::enemy::{AttackPresentation, Economy, Enemy, EnemyId, Presenter};
use dice_core::AchievedHand;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared record of enemy hook calls, in call order
pub type HookLog = Rc<RefCell<Vec<String>>>;

/// Enemy with flat armour that records its hooks
#[derive(Debug, Clone)]
pub struct Dummy {
    id: EnemyId,
    hp: i32,
    max_hp: i32,
    armour: i32,
    log: Option<HookLog>,
}

impl Dummy {
    pub fn new(id: u32, hp: i32) -> Self {
        Dummy {
            id: EnemyId(id),
            hp,
            max_hp: hp,
            armour: 0,
            log: None,
        }
    }

    pub fn with_armour(mut self, armour: i32) -> Self {
        self.armour = armour;
        self
    }

    pub fn with_log(mut self, log: HookLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn boxed(self) -> Box<dyn Enemy> {
        Box::new(self)
    }

    fn record(&self, entry: String) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(entry);
        }
    }
}

impl Enemy for Dummy {
    fn id(&self) -> EnemyId {
        self.id
    }

    fn hp(&self) -> i32 {
        self.hp
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn calculate_damage_taken(&self, hand: &AchievedHand) -> i32 {
        (hand.damage() - self.armour).max(0)
    }

    fn take_damage(&mut self, amount: i32, _hand: &AchievedHand) -> bool {
        self.hp = (self.hp - amount).max(0);
        self.record(format!("{}:hit:{}", self.id.0, amount));
        self.hp == 0
    }

    fn on_player_roll(&mut self, values: &[u32]) {
        self.record(format!("{}:roll:{:?}", self.id.0, values));
    }

    fn on_wave_start(&mut self, allies: &[EnemyId]) {
        self.record(format!("{}:wave:{}", self.id.0, allies.len()));
    }

    fn on_damage_taken(&mut self, amount: i32, _hand: &AchievedHand) {
        self.record(format!("{}:taken:{}", self.id.0, amount));
    }
}

/// Economy that keeps plain numbers and remembers what it was told
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub hp: i32,
    pub max_hp: i32,
    pub gold: i32,
    pub damage_log: Vec<(i32, String)>,
    pub wave_results: Vec<(bool, u32)>,
}

impl Ledger {
    pub fn new(hp: i32, max_hp: i32) -> Self {
        Ledger {
            hp,
            max_hp,
            ..Default::default()
        }
    }
}

impl Economy for Ledger {
    fn player_hp(&self) -> i32 {
        self.hp
    }

    fn player_max_hp(&self) -> i32 {
        self.max_hp
    }

    fn gold(&self) -> i32 {
        self.gold
    }

    fn add_gold(&mut self, amount: i32) {
        self.gold += amount;
    }

    fn heal_player(&mut self, amount: i32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    fn damage_player(&mut self, amount: i32, source: &str) {
        self.hp = (self.hp - amount).max(0);
        self.damage_log.push((amount, source.to_string()));
    }

    fn set_player_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.max_hp);
    }

    fn add_max_hp(&mut self, amount: i32) {
        self.max_hp += amount;
        self.hp += amount.max(0);
    }

    fn process_wave_clear(&mut self, success: bool, rolls_remaining: u32) {
        self.wave_results.push((success, rolls_remaining));
    }
}

/// Presenter that stores every attack it is asked to play
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub attacks: Vec<AttackPresentation>,
}

impl Presenter for RecordingPresenter {
    fn play_attack(&mut self, attack: &AttackPresentation) {
        self.attacks.push(attack.clone());
    }
}
