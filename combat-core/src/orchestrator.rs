//! Attack queue orchestration.
//!
//! An [`Exchange`] is every queued attack against one target. The
//! [`Orchestrator`] drains it with an explicit two-level loop: attackers in
//! order, and for each attacker its weapon queue. Outcomes are applied to
//! working copies of the attacker and target as they happen so later
//! attacks see earlier damage; the encounter itself is only written when an
//! attacker's queue is finalized.

use crate::attack::{validate_modifier, AttackOptions, Situation};
use crate::config::{CombatConfig, ConfigError};
use crate::dice::{percent_check, DiceRoller};
use crate::engine::AttackEngine;
use crate::narration::{combine, Narration, NarrationSink, NoticeLevel};
use crate::outcome::{AttackOutcome, Effect, OutcomeKind};
use crate::resolver::{ErrorKind, ResolveError, WeaponSelection};
use crate::world::{apply_to_combatant, Combatant, CombatantId, Encounter};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("target {0:?} is not in the encounter")]
    UnknownTarget(CombatantId),
}

// ============================================================================
// Queues
// ============================================================================

/// One attacker's queued weapons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackerEntry {
    pub attacker: CombatantId,
    pub weapons: VecDeque<WeaponSelection>,
    pub situation: Situation,
}

impl AttackerEntry {
    pub fn new(attacker: CombatantId) -> Self {
        Self {
            attacker,
            weapons: VecDeque::new(),
            situation: Situation::default(),
        }
    }

    pub fn with_weapon(mut self, selection: WeaponSelection) -> Self {
        self.weapons.push_back(selection);
        self
    }

    pub fn with_situation(mut self, situation: Situation) -> Self {
        self.situation = situation;
        self
    }
}

/// All attacks queued against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub target: CombatantId,
    pub attackers: VecDeque<AttackerEntry>,
}

impl Exchange {
    pub fn new(target: CombatantId) -> Self {
        Self {
            target,
            attackers: VecDeque::new(),
        }
    }

    pub fn with_attacker(mut self, entry: AttackerEntry) -> Self {
        self.attackers.push_back(entry);
        self
    }
}

/// A weapon use waiting in the working queue.
#[derive(Debug, Clone)]
struct Pending {
    selection: WeaponSelection,
    follow_up: bool,
}

// ============================================================================
// Reports
// ============================================================================

/// Everything one attacker did, finalized as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackerReport {
    pub attacker: CombatantId,
    pub outcomes: Vec<AttackOutcome>,
    /// Counter attacks the target made against this attacker.
    pub counters: Vec<AttackOutcome>,
    pub narration: Narration,
    pub damage_dealt: i32,
    /// The target died during this attacker's sequence.
    pub killed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub target: CombatantId,
    pub reports: Vec<AttackerReport>,
}

impl ExchangeReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &AttackOutcome> {
        self.reports.iter().flat_map(|r| r.outcomes.iter())
    }

    pub fn report_for(&self, attacker: CombatantId) -> Option<&AttackerReport> {
        self.reports.iter().find(|r| r.attacker == attacker)
    }

    pub fn target_killed(&self) -> bool {
        self.reports.iter().any(|r| r.killed)
    }

    pub fn total_damage(&self) -> i32 {
        self.reports.iter().map(|r| r.damage_dealt).sum()
    }
}

// ============================================================================
// Modifier prompts
// ============================================================================

/// Asks the attacker's controller for an ad-hoc to-hit modifier.
pub trait ModifierPrompt {
    /// Return a formula, or `None` to attack without one. `previous_error`
    /// is set when the last answer was rejected.
    fn request(
        &mut self,
        attacker: &Combatant,
        weapon_name: &str,
        previous_error: Option<&str>,
    ) -> Option<String>;
}

/// Declines every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl ModifierPrompt for NoPrompt {
    fn request(&mut self, _: &Combatant, _: &str, _: Option<&str>) -> Option<String> {
        None
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives exchanges through an [`AttackEngine`].
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    engine: AttackEngine,
}

impl Orchestrator {
    pub fn new(config: CombatConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: AttackEngine::new(config)?,
        })
    }

    pub fn engine(&self) -> &AttackEngine {
        &self.engine
    }

    fn config(&self) -> &CombatConfig {
        self.engine.config()
    }

    /// Run every queued attack against the exchange's target.
    pub fn run<R, S, P>(
        &self,
        encounter: &mut Encounter,
        exchange: Exchange,
        roller: &mut R,
        sink: &mut S,
        prompt: &mut P,
    ) -> Result<ExchangeReport, ExchangeError>
    where
        R: DiceRoller + ?Sized,
        S: NarrationSink + ?Sized,
        P: ModifierPrompt + ?Sized,
    {
        let target_id = exchange.target;
        if encounter.get(target_id).is_none() {
            return Err(ExchangeError::UnknownTarget(target_id));
        }
        let threshold = self.config().death_threshold;

        let mut reports = Vec::new();
        let mut attackers = exchange.attackers;
        while let Some(entry) = attackers.pop_front() {
            if entry.weapons.is_empty() {
                continue;
            }
            let Some(attacker) = encounter.get(entry.attacker).cloned() else {
                sink.notify(
                    NoticeLevel::Warning,
                    &format!("attacker {:?} is not in the encounter", entry.attacker),
                );
                continue;
            };
            if attacker.id == target_id {
                sink.notify(
                    NoticeLevel::Warning,
                    &format!("{} cannot attack themself", attacker.name),
                );
                continue;
            }
            let Some(target) = encounter.get(target_id).cloned() else {
                return Err(ExchangeError::UnknownTarget(target_id));
            };
            if !attacker.can_act(threshold) {
                sink.notify(NoticeLevel::Info, &format!("{} cannot act", attacker.name));
                continue;
            }
            if target.is_dead(threshold) {
                sink.notify(NoticeLevel::Info, &format!("{} is already dead", target.name));
                continue;
            }

            let (report, effects) =
                self.run_attacker(attacker, target, entry, roller, sink, prompt);

            // Finalize.
            encounter.apply_effects(&effects);
            if !report.narration.is_empty() {
                sink.publish(&report.narration);
            }
            info!(
                attacker = ?report.attacker,
                outcomes = report.outcomes.len(),
                counters = report.counters.len(),
                damage = report.damage_dealt,
                killed = report.killed,
                "attacker finalized"
            );
            reports.push(report);
        }

        Ok(ExchangeReport {
            target: target_id,
            reports,
        })
    }

    /// Drain one attacker's queue against working copies. Returns the report
    /// and every effect to apply on finalize, in order.
    fn run_attacker<R, S, P>(
        &self,
        mut attacker: Combatant,
        mut target: Combatant,
        entry: AttackerEntry,
        roller: &mut R,
        sink: &mut S,
        prompt: &mut P,
    ) -> (AttackerReport, Vec<Effect>)
    where
        R: DiceRoller + ?Sized,
        S: NarrationSink + ?Sized,
        P: ModifierPrompt + ?Sized,
    {
        let config = self.config();
        let threshold = config.death_threshold;

        let mut queue: VecDeque<Pending> = entry
            .weapons
            .into_iter()
            .map(|selection| Pending {
                selection,
                follow_up: false,
            })
            .collect();
        let mut outcomes = Vec::new();
        let mut counters = Vec::new();
        let mut told = Vec::new();
        let mut effects = Vec::new();
        let mut followed_up = false;

        while let Some(Pending {
            mut selection,
            follow_up,
        }) = queue.pop_front()
        {
            let weapon_name = attacker
                .item(selection.item)
                .map(|i| i.name.clone())
                .unwrap_or_default();

            let settled = self.settle_modifier(
                &attacker,
                &weapon_name,
                &mut selection.options,
                sink,
                prompt,
            );
            if let Err(err) = settled {
                let outcome =
                    AttackOutcome::skipped(attacker.id, target.id, err.kind(), err.to_string())
                        .with_weapon(selection.item, weapon_name);
                outcomes.push(outcome);
                continue;
            }

            let mut outcome = self
                .engine
                .resolve_attack(roller, &attacker, &target, &selection, &entry.situation);
            outcome.follow_up = follow_up;

            if let OutcomeKind::Skipped { kind, reason } = &outcome.kind {
                let level = match kind {
                    ErrorKind::Configuration => NoticeLevel::Warning,
                    _ => NoticeLevel::Info,
                };
                let message =
                    format!("{} cannot use {}: {reason}", attacker.name, outcome.weapon_name);
                sink.notify(level, &message);
                outcomes.push(outcome);
                continue;
            }

            apply_all(&mut attacker, &mut target, &outcome.effects);
            effects.extend(outcome.effects.iter().cloned());

            if outcome.lodged {
                let item = selection.item;
                queue.retain(|p| p.selection.item != item);
            }

            let counter = outcome
                .counter
                .filter(|defender| config.resolve_counters && *defender == target.id)
                .and_then(|_| self.counter_attack(roller, &target, &attacker));
            if let Some(counter) = &counter {
                apply_all(&mut attacker, &mut target, &counter.effects);
                effects.extend(counter.effects.iter().cloned());
            }

            let cancels = outcome.cancels_queue();
            let spent = outcome.lodged || matches!(outcome.kind, OutcomeKind::Reload);
            let strikes_again = outcome.strikes_again;
            let speed = outcome.weapon_speed;
            told.push(outcome.clone());
            outcomes.push(outcome);
            if let Some(counter) = counter {
                told.push(counter.clone());
                counters.push(counter);
            }

            if cancels {
                debug!(attacker = %attacker.name, dropped = queue.len(), "queue cancelled");
                queue.clear();
                break;
            }
            if !attacker.can_act(threshold) || target.is_dead(threshold) {
                debug!(attacker = %attacker.name, "sequence ended early");
                queue.clear();
                break;
            }
            if spent {
                continue;
            }

            if let Some(speed) = speed.filter(|_| !followed_up) {
                let gap = target.weapon_speed(config.unarmed_speed) - speed;
                let chance = gap * config.follow_up_per_speed_point;
                if chance > 0 && percent_check(roller, chance).success {
                    followed_up = true;
                    debug!(attacker = %attacker.name, chance, "follow-up attack");
                    queue.push_front(Pending {
                        selection: selection.clone(),
                        follow_up: true,
                    });
                }
            }
            if strikes_again {
                queue.push_front(Pending {
                    selection: selection.secondary(),
                    follow_up,
                });
            }
        }

        let damage_dealt = outcomes.iter().map(|o| o.damage_dealt()).sum();
        let killed = outcomes.iter().any(|o| o.killed) || target.is_dead(threshold);
        let report = AttackerReport {
            attacker: attacker.id,
            narration: combine(&told),
            outcomes,
            counters,
            damage_dealt,
            killed,
        };
        (report, effects)
    }

    /// The defender's immediate reply with its first held weapon. Counters
    /// never earn further counters.
    fn counter_attack<R: DiceRoller + ?Sized>(
        &self,
        roller: &mut R,
        defender: &Combatant,
        attacker: &Combatant,
    ) -> Option<AttackOutcome> {
        let threshold = self.config().death_threshold;
        if !defender.can_act(threshold) || defender.is_helpless() {
            return None;
        }
        let weapon = defender.first_weapon()?;
        let selection = WeaponSelection::new(weapon.id);
        let mut outcome =
            self.engine
                .resolve_attack(roller, defender, attacker, &selection, &Situation::default());
        if outcome.is_skipped() {
            return None;
        }
        outcome.counter = None;
        outcome.strikes_again = false;
        Some(outcome)
    }

    /// Make sure the selection carries a usable ad-hoc modifier, prompting
    /// when asked to or when the preset formula does not parse.
    fn settle_modifier<S, P>(
        &self,
        attacker: &Combatant,
        weapon_name: &str,
        options: &mut AttackOptions,
        sink: &mut S,
        prompt: &mut P,
    ) -> Result<(), ResolveError>
    where
        S: NarrationSink + ?Sized,
        P: ModifierPrompt + ?Sized,
    {
        let mut error = match options.ad_hoc_modifier.as_deref().map(validate_modifier) {
            Some(Err(err)) => Some(err),
            Some(Ok(_)) | None if !options.prompt_for_modifier => return Ok(()),
            _ => None,
        };
        if let Some(err) = &error {
            sink.notify(NoticeLevel::Warning, &format!("{}: {err}", attacker.name));
        }
        options.ad_hoc_modifier = None;

        for _ in 0..self.config().max_modifier_prompts {
            let previous = error.as_ref().map(|e| e.to_string());
            let Some(text) = prompt.request(attacker, weapon_name, previous.as_deref()) else {
                return Ok(());
            };
            match validate_modifier(&text) {
                Ok(_) => {
                    options.ad_hoc_modifier = Some(text);
                    return Ok(());
                }
                Err(err) => {
                    sink.notify(NoticeLevel::Warning, &format!("{}: {err}", attacker.name));
                    error = Some(err);
                }
            }
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn apply_all(attacker: &mut Combatant, target: &mut Combatant, effects: &[Effect]) {
    for effect in effects {
        apply_to_combatant(attacker, effect);
        apply_to_combatant(target, effect);
    }
}
