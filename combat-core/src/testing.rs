//! Testing utilities for the combat engine.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedDice` for replaying an exact sequence of die results
//! - `RecordingSink` and `ScriptedPrompt` in place of a presentation layer
//! - Sample combatants with standard gear

use crate::dice::DiceRoller;
use crate::items::{self, Hand};
use crate::narration::{Narration, NarrationSink, NoticeLevel};
use crate::orchestrator::ModifierPrompt;
use crate::tables::{location_weight, AimArea, AttackForm, HitLocation, StanceHeight};
use crate::world::{AbilityScores, Combatant, Immunities, SizeCategory};
use std::collections::VecDeque;
use strum::IntoEnumIterator;

/// One die drawn from a [`ScriptedDice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub sides: u32,
    pub value: u32,
}

/// A die roller that returns scripted values in order.
///
/// Values are clamped into `1..=sides`. Once the script runs out every
/// draw returns 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    script: VecDeque<u32>,
    draws: Vec<Draw>,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: values.into_iter().collect(),
            draws: Vec::new(),
        }
    }

    /// Queue another value.
    pub fn push(&mut self, value: u32) {
        self.script.push_back(value);
    }

    /// Scripted values not yet drawn.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Every draw made so far.
    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }
}

impl DiceRoller for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let value = self.script.pop_front().unwrap_or(1).clamp(1, sides.max(1));
        self.draws.push(Draw { sides, value });
        value
    }
}

/// Sink that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub published: Vec<Narration>,
    pub notices: Vec<(NoticeLevel, String)>,
}

impl RecordingSink {
    /// All published fragments joined into one text.
    pub fn transcript(&self) -> String {
        self.published
            .iter()
            .map(|n| n.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl NarrationSink for RecordingSink {
    fn publish(&mut self, narration: &Narration) {
        self.published.push(narration.clone());
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}

/// Answers modifier prompts from a script, then declines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    /// The `previous_error` passed with each request.
    pub errors_seen: Vec<Option<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            errors_seen: Vec::new(),
        }
    }
}

impl ModifierPrompt for ScriptedPrompt {
    fn request(
        &mut self,
        _attacker: &Combatant,
        _weapon_name: &str,
        previous_error: Option<&str>,
    ) -> Option<String> {
        self.errors_seen.push(previous_error.map(str::to_string));
        self.answers.pop_front()
    }
}

/// The die face that makes [`crate::tables::select_location`] pick
/// `location`, or `None` if the location cannot be drawn.
pub fn location_roll(
    location: HitLocation,
    form: AttackForm,
    height: StanceHeight,
    aim: AimArea,
    severed: &[HitLocation],
) -> Option<u32> {
    let mut before = 0;
    for candidate in HitLocation::iter() {
        let weight = if severed.contains(&candidate) {
            0
        } else {
            location_weight(candidate, form, height, aim)
        };
        if candidate == location {
            return (weight > 0).then_some(before + 1);
        }
        before += weight;
    }
    None
}

// ============================================================================
// Sample combatants
// ============================================================================

/// A human fighter: long sword, chain shirt and helm.
pub fn sample_fighter() -> Combatant {
    Combatant::new("Aldric", 30)
        .with_abilities(AbilityScores::new(16, 12, 14, 10, 10, 10))
        .with_base_attack(3)
        .with_proficiency("sword")
        .with_proficiency("axe")
        .with_proficiency("spear")
        .with_item(items::weapon("Long Sword").expect("catalogue weapon").held(Hand::Main))
        .with_item(items::armor("Chain Shirt").expect("catalogue armor").worn())
        .with_item(items::armor("Steel Helm").expect("catalogue armor").worn())
}

/// A small goblin with a dagger and a leather jerkin.
pub fn sample_goblin() -> Combatant {
    Combatant::new("Goblin", 7)
        .with_abilities(AbilityScores::new(8, 14, 10, 10, 8, 8))
        .with_base_attack(1)
        .with_size(SizeCategory::Small)
        .with_proficiency("dagger")
        .with_group("goblinoid")
        .with_item(items::weapon("Dagger").expect("catalogue weapon").held(Hand::Main))
        .with_item(items::armor("Leather Jerkin").expect("catalogue armor").worn())
}

/// An archer with a short bow and a quiver of arrows.
pub fn sample_archer() -> Combatant {
    Combatant::new("Wren", 16)
        .with_abilities(AbilityScores::new(10, 16, 12, 10, 12, 10))
        .with_base_attack(2)
        .with_proficiency("bow")
        .with_proficiency("dagger")
        .with_item(items::weapon("Short Bow").expect("catalogue weapon").held_two_handed())
        .with_item(items::ammunition("Arrows", 20))
        .with_item(items::weapon("Dagger").expect("catalogue weapon"))
        .with_item(items::armor("Leather Jerkin").expect("catalogue armor").worn())
}

/// A shapeless creature with no hit locations.
pub fn sample_ooze() -> Combatant {
    Combatant::new("Grey Ooze", 20)
        .with_base_ac(8)
        .with_location_tracking(false)
        .with_immunities(Immunities::CRITICAL | Immunities::BLEED | Immunities::KNOCKDOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_dice_clamps_and_falls_back() {
        let mut dice = ScriptedDice::new([30, 0]);
        assert_eq!(dice.roll_die(20), 20);
        assert_eq!(dice.roll_die(6), 1);
        assert_eq!(dice.roll_die(6), 1);
        assert_eq!(dice.draws().len(), 3);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_location_roll_selects_location() {
        let mut dice = ScriptedDice::default();
        for location in [HitLocation::Head, HitLocation::Chest, HitLocation::RightFoot] {
            let face =
                location_roll(location, AttackForm::Swing, StanceHeight::Mid, AimArea::Unaimed, &[])
                    .unwrap();
            dice.push(face);
            let drawn = crate::tables::select_location(
                &mut dice,
                AttackForm::Swing,
                StanceHeight::Mid,
                AimArea::Unaimed,
                &[],
            );
            assert_eq!(drawn, location);
        }
    }

    #[test]
    fn test_sample_fighter_is_armed() {
        let fighter = sample_fighter();
        assert!(fighter.first_weapon().is_some());
        assert_eq!(fighter.worn_armor().count(), 2);
    }
}
