//! Single-attack pipeline.
//!
//! [`AttackEngine::resolve_attack`] runs one (attacker, weapon, target)
//! resolution from weapon lookup to narration. It only reads combatant
//! state; every change it wants is returned as an [`Effect`] for the
//! orchestrator to apply.
//!
//! Draw order for one resolution:
//!
//! 1. d20, then the dice of the modifier formula;
//! 2. hit location die (location-tracked targets only, hit or miss);
//! 3. fumble d100 and consequence dice, when the margin calls for one;
//! 4. the hit stage or the miss stage.

use crate::attack::{
    check_fumble, classify_miss, compare, join_formula, modifier_terms, roll_attack, MissReason,
    Situation,
};
use crate::config::{CombatConfig, ConfigError};
use crate::dice::DiceRoller;
use crate::hit::resolve_hit;
use crate::items::{EquipState, WeaponTags};
use crate::narration::{
    describe_fumble, describe_hit, describe_miss, describe_reload, Names, SoundCue,
};
use crate::outcome::{AttackOutcome, CancelReason, Effect, OutcomeKind, QueueSignal};
use crate::resolver::{armor_stack, defense, resolve_weapon, ResolveError, WeaponSelection};
use crate::tables::{select_location, AttackForm};
use crate::world::Combatant;
use tracing::{debug, info};

/// Resolves attacks under one set of combat rules.
#[derive(Debug, Clone, Default)]
pub struct AttackEngine {
    config: CombatConfig,
}

impl AttackEngine {
    /// Build an engine, rejecting configurations that fail
    /// [`CombatConfig::validate`].
    pub fn new(config: CombatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Resolve one attack. Always produces exactly one outcome; unusable
    /// weapons come back as skipped (or reload) outcomes instead of errors.
    pub fn resolve_attack<R: DiceRoller + ?Sized>(
        &self,
        roller: &mut R,
        attacker: &Combatant,
        target: &Combatant,
        selection: &WeaponSelection,
        situation: &Situation,
    ) -> AttackOutcome {
        let config = &self.config;
        let item_name = attacker
            .item(selection.item)
            .map(|i| i.name.clone())
            .unwrap_or_default();

        let weapon = match resolve_weapon(attacker, selection) {
            Ok(weapon) => weapon,
            Err(ResolveError::ReloadRequired) => {
                return self.reload(attacker, target, selection, item_name);
            }
            Err(err) => {
                debug!(
                    attacker = %attacker.name,
                    weapon = %item_name,
                    error = %err,
                    "weapon skipped"
                );
                return AttackOutcome::skipped(attacker.id, target.id, err.kind(), err.to_string())
                    .with_weapon(selection.item, item_name);
            }
        };

        let names = Names {
            attacker: &attacker.name,
            target: &target.name,
            weapon: &weapon.name,
        };

        let terms =
            modifier_terms(attacker, target, &weapon, &selection.options, situation, config);
        let formula = join_formula(&terms);
        let raw = match roll_attack(roller, &formula) {
            Ok(raw) => raw,
            Err(err) => {
                return AttackOutcome::skipped(attacker.id, target.id, err.kind(), err.to_string())
                    .with_weapon(weapon.item, weapon.name.clone());
            }
        };

        let location = target.location_tracked.then(|| {
            select_location(
                roller,
                weapon.form(),
                attacker.stance.height,
                selection.options.aim,
                &target.severed,
            )
        });
        let stack = armor_stack(target, location, weapon.damage_type(), config);
        let mut defense = defense(target, &stack, weapon.form());
        if weapon.has(WeaponTags::FLEXIBLE) {
            defense = defense.against_flexible();
        }
        let roll = compare(&raw, defense.ac);

        let mut effects = Vec::new();
        let fumble =
            check_fumble(roller, attacker, &weapon, &roll, situation, config, &mut effects);

        let (kind, mut fragments, mut sound, mut bubble) = if roll.hit {
            let detail = resolve_hit(
                roller,
                attacker,
                target,
                &weapon,
                &roll,
                location,
                &stack,
                config,
                &mut effects,
            );
            let projected = target.hit_points.current - detail.damage.total;
            let narration = describe_hit(
                names,
                weapon.form(),
                weapon.damage_type(),
                &detail,
                projected,
                config.death_threshold,
            );
            (
                OutcomeKind::Hit(Box::new(detail)),
                narration.fragments,
                narration.sound,
                narration.bubble,
            )
        } else {
            let detail = classify_miss(
                roller,
                attacker,
                target,
                &weapon,
                &roll,
                &defense,
                &stack,
                &mut effects,
            );
            let metal = match detail.reason {
                MissReason::Deflected { layer: Some(item) } => {
                    stack.iter().any(|l| l.item == item && l.is_metal())
                }
                _ => false,
            };
            let narration = describe_miss(names, &detail, metal);
            (
                OutcomeKind::Miss(detail),
                narration.fragments,
                narration.sound,
                narration.bubble,
            )
        };

        if let Some(fumble) = &fumble {
            fragments.extend(describe_fumble(names, fumble));
            sound = Some(SoundCue::Fumble);
            bubble = Some("Fumble!".to_string());
        }

        // Spent with every attack, hit or miss.
        if let Some(ammunition) = weapon.ammunition {
            effects.push(Effect::ItemQuantityChanged {
                owner: attacker.id,
                item: ammunition,
                delta: -1,
            });
        }
        if weapon.uses_charge {
            effects.push(Effect::ChargeUsed {
                owner: attacker.id,
                item: weapon.item,
            });
        }
        if weapon.has(WeaponTags::RELOAD) {
            effects.push(Effect::WeaponLoaded {
                owner: attacker.id,
                item: weapon.item,
                loaded: false,
            });
        }
        let dropped = effects.iter().any(|e| {
            matches!(e, Effect::EquipChanged { owner, item, state: EquipState::Dropped }
                if *owner == attacker.id && *item == weapon.item)
        });
        if weapon.form() == AttackForm::Throw && !dropped {
            effects.push(Effect::EquipChanged {
                owner: attacker.id,
                item: weapon.item,
                state: EquipState::Dropped,
            });
        }

        let (killed, lodged, heavy_knockdown) = match &kind {
            OutcomeKind::Hit(detail) => (
                detail.killed,
                detail.lodged(),
                detail.knockdown.as_ref().is_some_and(|k| k.is_heavy()),
            ),
            _ => (false, false, false),
        };
        let weapon_destroyed = match &kind {
            OutcomeKind::Miss(detail) => detail
                .breakage
                .as_ref()
                .is_some_and(|b| b.destroyed && b.owner == attacker.id && b.item == weapon.item),
            _ => false,
        };
        let signal = if killed {
            QueueSignal::CancelAttacker(CancelReason::Kill)
        } else if fumble.is_some() {
            QueueSignal::CancelAttacker(CancelReason::Fumble)
        } else if heavy_knockdown {
            QueueSignal::CancelAttacker(CancelReason::KnockedDown)
        } else if weapon_destroyed {
            QueueSignal::CancelAttacker(CancelReason::WeaponDestroyed)
        } else {
            QueueSignal::Continue
        };
        let counter = match &kind {
            OutcomeKind::Miss(detail) if detail.counter => Some(target.id),
            _ => None,
        };

        info!(
            attacker = %attacker.name,
            target = %target.name,
            weapon = %weapon.name,
            natural = roll.natural,
            total = roll.total,
            ac = roll.ac,
            hit = roll.hit,
            ?location,
            ?signal,
            "attack resolved"
        );

        let mut outcome = AttackOutcome::new(attacker.id, target.id, kind)
            .with_weapon(weapon.item, weapon.name.clone())
            .with_effects(effects);
        outcome.roll = Some(roll);
        outcome.fumble = fumble;
        outcome.fragments = fragments;
        outcome.signal = signal;
        outcome.lodged = lodged;
        outcome.killed = killed;
        outcome.counter = counter;
        outcome.weapon_speed = Some(weapon.speed);
        outcome.strikes_again = weapon.has_second_end() && !outcome.cancels_queue();
        outcome.sound = sound;
        outcome.bubble = bubble;
        outcome
    }

    /// The forced reload that replaces an attack with an unloaded weapon.
    fn reload(
        &self,
        attacker: &Combatant,
        target: &Combatant,
        selection: &WeaponSelection,
        name: String,
    ) -> AttackOutcome {
        let narration = describe_reload(Names {
            attacker: &attacker.name,
            target: &target.name,
            weapon: &name,
        });
        debug!(attacker = %attacker.name, weapon = %name, "reloading");
        let mut outcome = AttackOutcome::new(attacker.id, target.id, OutcomeKind::Reload)
            .with_weapon(selection.item, name)
            .with_effects([Effect::WeaponLoaded {
                owner: attacker.id,
                item: selection.item,
                loaded: true,
            }]);
        outcome.fragments = narration.fragments;
        outcome.sound = narration.sound;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{self, Hand, Item, WeaponItem};
    use crate::resolver::ErrorKind;
    use crate::testing::{sample_goblin, ScriptedDice};
    use crate::world::{AbilityScores, Immunities};

    fn swordsman() -> (Combatant, WeaponSelection) {
        let sword = items::weapon("Long Sword").unwrap().held(Hand::Main);
        let selection = WeaponSelection::new(sword.id);
        let attacker = Combatant::new("Aldric", 20)
            .with_abilities(AbilityScores::new(14, 10, 10, 10, 10, 10))
            .with_base_attack(3)
            .with_proficiency("sword")
            .with_item(sword);
        (attacker, selection)
    }

    #[test]
    fn test_total_meeting_ac_hits() {
        let engine = AttackEngine::default();
        let (attacker, selection) = swordsman();
        // AC 15 untracked target; modifiers +3 base +2 str = 5, so a natural 10 totals 15.
        let target = Combatant::new("Target", 30)
            .with_base_ac(15)
            .with_location_tracking(false)
            .with_immunities(Immunities::all());
        let mut dice = ScriptedDice::new([10, 4]);
        let outcome = engine.resolve_attack(
            &mut dice,
            &attacker,
            &target,
            &selection,
            &Situation::default(),
        );
        let roll = outcome.roll.clone().unwrap();
        assert_eq!(roll.total, 15);
        assert_eq!(roll.ac, 15);
        assert!(outcome.is_hit());
        assert!(outcome.location().is_none());
        assert!(outcome.damage_dealt() >= 1);
    }

    #[test]
    fn test_missing_damage_is_skipped() {
        let engine = AttackEngine::default();
        let broken = Item::new("Stick")
            .with_weapon(
                WeaponItem::new("", "club", 4)
                    .with_reach(1)
                    .with_mode("swing:bludgeoning"),
            )
            .held(Hand::Main);
        let selection = WeaponSelection::new(broken.id);
        let attacker = Combatant::new("Aldric", 20).with_item(broken);
        let mut dice = ScriptedDice::default();
        let outcome = engine.resolve_attack(
            &mut dice,
            &attacker,
            &sample_goblin(),
            &selection,
            &Situation::default(),
        );
        assert!(matches!(
            outcome.kind,
            OutcomeKind::Skipped {
                kind: ErrorKind::Configuration,
                ..
            }
        ));
        assert!(outcome.effects.is_empty());
        assert!(dice.draws().is_empty());
    }

    #[test]
    fn test_unloaded_crossbow_reloads() {
        let engine = AttackEngine::default();
        let mut crossbow = items::weapon("Light Crossbow").unwrap().held_two_handed();
        if let Some(weapon) = crossbow.weapon.as_mut() {
            weapon.loaded = false;
        }
        let selection = WeaponSelection::new(crossbow.id);
        let attacker = Combatant::new("Archer", 12)
            .with_item(crossbow)
            .with_item(items::ammunition("Bolts", 10));
        let mut dice = ScriptedDice::default();
        let outcome = engine.resolve_attack(
            &mut dice,
            &attacker,
            &sample_goblin(),
            &selection,
            &Situation::default(),
        );
        assert_eq!(outcome.kind, OutcomeKind::Reload);
        assert_eq!(outcome.sound, Some(SoundCue::Reload));
        assert!(matches!(
            outcome.effects.as_slice(),
            [Effect::WeaponLoaded { loaded: true, .. }]
        ));
    }

    #[test]
    fn test_firing_spends_ammunition_and_unloads() {
        let engine = AttackEngine::default();
        let crossbow = items::weapon("Light Crossbow").unwrap().held_two_handed();
        let bolts = items::ammunition("Bolts", 10);
        let bolts_id = bolts.id;
        let selection = WeaponSelection::new(crossbow.id);
        let attacker = Combatant::new("Archer", 12).with_item(crossbow).with_item(bolts);
        let target = Combatant::new("Target", 20).with_location_tracking(false);
        // Natural 1 misses and the fumble d100 of 100 fails.
        let mut dice = ScriptedDice::new([1, 100]);
        let outcome = engine.resolve_attack(
            &mut dice,
            &attacker,
            &target,
            &selection,
            &Situation::default(),
        );
        assert!(!outcome.is_hit());
        assert!(outcome.effects.iter().any(|e| matches!(
            e,
            Effect::ItemQuantityChanged { item, delta: -1, .. } if *item == bolts_id
        )));
        assert!(outcome
            .effects
            .iter()
            .any(|e| matches!(e, Effect::WeaponLoaded { loaded: false, .. })));
    }

    #[test]
    fn test_natural_20_hits_any_ac() {
        let engine = AttackEngine::default();
        let (attacker, selection) = swordsman();
        let target = Combatant::new("Target", 30)
            .with_base_ac(40)
            .with_location_tracking(false)
            .with_immunities(Immunities::all());
        let mut dice = ScriptedDice::new([20, 4]);
        let outcome = engine.resolve_attack(
            &mut dice,
            &attacker,
            &target,
            &selection,
            &Situation::default(),
        );
        assert!(outcome.is_hit());
        assert_eq!(outcome.roll.unwrap().total, 40);
    }
}
