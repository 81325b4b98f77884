//! Melee and missile attack resolution for a tabletop combat ruleset.
//!
//! This crate provides:
//! - Weapon and armor resolution from item records
//! - A staged attack pipeline: to-hit roll, hit location, layered armor
//!   penetration, criticals, impales, knockdowns, bleeding and injuries
//! - An explicit attack-queue orchestrator that applies state changes only
//!   when an attacker's sequence is finalized
//! - Narration fragments and sound cues for a presentation layer
//!
//! Every random draw goes through an injected [`DiceRoller`], so replaying
//! the same draws against the same state reproduces the same outcome.
//!
//! # Quick Start
//!
//! ```ignore
//! use combat_core::{
//!     items, AttackerEntry, Combatant, Encounter, Exchange, LogSink, NoPrompt, Orchestrator,
//!     RngRoller, WeaponSelection,
//! };
//!
//! let sword = items::weapon("Long Sword").unwrap().held(items::Hand::Main);
//! let selection = WeaponSelection::new(sword.id);
//!
//! let mut encounter = Encounter::new();
//! let fighter = encounter.add(Combatant::new("Aldric", 30).with_item(sword));
//! let goblin = encounter.add(Combatant::new("Goblin", 7));
//!
//! let exchange = Exchange::new(goblin)
//!     .with_attacker(AttackerEntry::new(fighter).with_weapon(selection));
//!
//! let report = Orchestrator::default().run(
//!     &mut encounter,
//!     exchange,
//!     &mut RngRoller::thread(),
//!     &mut LogSink,
//!     &mut NoPrompt,
//! )?;
//! println!("{} damage", report.total_damage());
//! ```

pub mod attack;
pub mod config;
pub mod dice;
pub mod engine;
pub mod hit;
pub mod items;
pub mod narration;
pub mod orchestrator;
pub mod outcome;
pub mod resolver;
pub mod tables;
pub mod testing;
pub mod world;

// Primary public API
pub use attack::{AttackOptions, AttackRoll, MissReason, Situation};
pub use config::{CombatConfig, ConfigError};
pub use dice::{DiceError, DiceExpression, DiceRoller, RngRoller, RollMode};
pub use engine::AttackEngine;
pub use hit::HitDetail;
pub use items::{Item, ItemId};
pub use narration::{LogSink, Narration, NarrationSink, NoticeLevel, SoundCue};
pub use orchestrator::{
    AttackerEntry, AttackerReport, Exchange, ExchangeError, ExchangeReport, ModifierPrompt,
    NoPrompt, Orchestrator,
};
pub use outcome::{AttackOutcome, CancelReason, Effect, OutcomeKind, QueueSignal};
pub use resolver::{ErrorKind, ResolveError, WeaponEnd, WeaponSelection};
pub use tables::{AimArea, AttackForm, DamageType, HitLocation, Severity};
pub use world::{Combatant, CombatantId, Condition, Encounter, Immunities};
