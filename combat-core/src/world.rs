//! Combatant and encounter state.
//!
//! Contains the snapshot types the engine reads (combatants, their items,
//! conditions and hit points) and the [`Encounter`] store that the
//! orchestrator's finalize step writes effects into.

use bitflags::bitflags;
use crate::items::{EquipState, Hand, Item, ItemId};
use crate::outcome::Effect;
use crate::tables::{HitLocation, Stance};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for combatants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Abilities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Ability {
    #[strum(serialize = "str", serialize = "strength")]
    Strength,
    #[strum(serialize = "dex", serialize = "dexterity")]
    Dexterity,
    #[strum(serialize = "con", serialize = "constitution")]
    Constitution,
    #[strum(serialize = "int", serialize = "intelligence")]
    Intelligence,
    #[strum(serialize = "wis", serialize = "wisdom")]
    Wisdom,
    #[strum(serialize = "cha", serialize = "charisma")]
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        // Floor division: 8-9 = -1, 10-11 = 0, 12-13 = +1.
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

// ============================================================================
// Size
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum SizeCategory {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
    Gargantuan,
}

impl SizeCategory {
    pub fn rank(&self) -> i32 {
        *self as i32
    }

    /// Signed steps from `self` to `other`; positive when `other` is larger.
    pub fn steps_to(&self, other: SizeCategory) -> i32 {
        other.rank() - self.rank()
    }
}

// ============================================================================
// Conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Prone,
    Incapacitated,
    Unconscious,
    Dead,
    Resting,
    Winded,
    Staggered,
    Bleeding,
    BleedingHeavily,
    Stunned,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Prone => "Prone",
            Condition::Incapacitated => "Incapacitated",
            Condition::Unconscious => "Unconscious",
            Condition::Dead => "Dead",
            Condition::Resting => "Resting",
            Condition::Winded => "Winded",
            Condition::Staggered => "Staggered",
            Condition::Bleeding => "Bleeding",
            Condition::BleedingHeavily => "Bleeding heavily",
            Condition::Stunned => "Stunned",
        }
    }

    /// Conditions that prevent taking an attack action.
    pub fn prevents_action(&self) -> bool {
        matches!(
            self,
            Condition::Dead
                | Condition::Unconscious
                | Condition::Incapacitated
                | Condition::Stunned
                | Condition::Resting
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A condition applied to a combatant with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition: Condition,
    pub source: String,
}

impl ActiveCondition {
    pub fn new(condition: Condition, source: impl Into<String>) -> Self {
        Self {
            condition,
            source: source.into(),
        }
    }
}

bitflags! {
    /// Effects a combatant cannot suffer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Immunities: u8 {
        const FUMBLE = 1 << 0;
        const CRITICAL = 1 << 1;
        const BLEED = 1 << 2;
        const KNOCKDOWN = 1 << 3;
        const IMPALE = 1 << 4;
    }
}

// ============================================================================
// Hit Points
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Apply a signed change and return the change actually made. Damage
    /// may take current HP below zero; healing stops at the maximum.
    pub fn adjust(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount).min(self.maximum.max(old));
        self.current - old
    }
}

// ============================================================================
// Combatant
// ============================================================================

/// An attacker or defender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub abilities: AbilityScores,
    pub base_attack: i32,
    pub size: SizeCategory,
    /// Weapon categories the combatant is trained in.
    pub proficiencies: Vec<String>,
    pub items: Vec<Item>,
    pub hit_points: HitPoints,
    pub conditions: Vec<ActiveCondition>,
    pub immunities: Immunities,
    /// Whether blows land on individual body locations.
    pub location_tracked: bool,
    pub severed: Vec<HitLocation>,
    pub stance: Stance,
    /// AC before dexterity, stance and armor.
    pub base_ac: i32,
    /// Creature groups, matched by weapons with bonuses against them.
    pub groups: Vec<String>,
}

impl Combatant {
    pub fn new(name: impl Into<String>, max_hp: i32) -> Self {
        Self {
            id: CombatantId::new(),
            name: name.into(),
            abilities: AbilityScores::default(),
            base_attack: 0,
            size: SizeCategory::Medium,
            proficiencies: Vec::new(),
            items: Vec::new(),
            hit_points: HitPoints::new(max_hp),
            conditions: Vec::new(),
            immunities: Immunities::empty(),
            location_tracked: true,
            severed: Vec::new(),
            stance: Stance::default(),
            base_ac: 10,
            groups: Vec::new(),
        }
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_base_attack(mut self, base_attack: i32) -> Self {
        self.base_attack = base_attack;
        self
    }

    pub fn with_size(mut self, size: SizeCategory) -> Self {
        self.size = size;
        self
    }

    pub fn with_proficiency(mut self, category: impl Into<String>) -> Self {
        self.proficiencies.push(category.into());
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_immunities(mut self, immunities: Immunities) -> Self {
        self.immunities = immunities;
        self
    }

    pub fn with_location_tracking(mut self, tracked: bool) -> Self {
        self.location_tracked = tracked;
        self
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    pub fn with_base_ac(mut self, base_ac: i32) -> Self {
        self.base_ac = base_ac;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.add_condition(condition, "initial");
        self
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.iter().any(|c| c.condition == condition)
    }

    /// Adds a condition unless already present. Returns whether it was added.
    pub fn add_condition(&mut self, condition: Condition, source: impl Into<String>) -> bool {
        if self.has_condition(condition) {
            return false;
        }
        self.conditions.push(ActiveCondition::new(condition, source));
        true
    }

    pub fn remove_condition(&mut self, condition: Condition) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.condition != condition);
        self.conditions.len() != before
    }

    pub fn is_dead(&self, death_threshold: i32) -> bool {
        self.has_condition(Condition::Dead) || self.hit_points.current <= death_threshold
    }

    /// Whether the combatant may take an attack action.
    pub fn can_act(&self, death_threshold: i32) -> bool {
        !self.is_dead(death_threshold)
            && !self.conditions.iter().any(|c| c.condition.prevents_action())
    }

    /// Prone or otherwise unable to defend actively.
    pub fn is_helpless(&self) -> bool {
        self.has_condition(Condition::Prone)
            || self.conditions.iter().any(|c| c.condition.prevents_action())
    }

    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    pub fn is_proficient(&self, category: &str) -> bool {
        self.proficiencies
            .iter()
            .any(|p| p.eq_ignore_ascii_case(category))
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g.eq_ignore_ascii_case(group))
    }

    pub fn is_severed(&self, location: HitLocation) -> bool {
        self.severed.contains(&location)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn item_named(&self, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name) && i.equip != EquipState::Dropped)
    }

    pub fn held_items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| i.is_held())
    }

    /// Item held in a hand, including a two-handed grip that spans it.
    pub fn held_in(&self, hand: Hand) -> Option<&Item> {
        self.items.iter().find(|i| match i.equip {
            EquipState::Held { hand: h, two_handed } => h == hand || two_handed,
            _ => false,
        })
    }

    pub fn held_shield(&self) -> Option<&Item> {
        self.held_items().find(|i| i.is_shield())
    }

    pub fn worn_armor(&self) -> impl Iterator<Item = &Item> {
        self.items
            .iter()
            .filter(|i| i.equip == EquipState::Worn && i.armor.is_some())
    }

    /// Worn item covering the head, if any.
    pub fn helmet(&self) -> Option<&Item> {
        self.worn_armor().find(|i| {
            i.armor
                .as_ref()
                .is_some_and(|a| a.coverage.contains(&HitLocation::Head) && a.coverage.len() <= 2)
        })
    }

    /// Tightest dexterity cap among worn armor.
    pub fn dex_cap(&self) -> Option<i32> {
        self.worn_armor()
            .filter_map(|i| i.armor.as_ref().and_then(|a| a.dex_cap))
            .min()
    }

    /// Speed of the fastest held weapon, or `unarmed` when holding none.
    pub fn weapon_speed(&self, unarmed: i32) -> i32 {
        self.held_items()
            .filter_map(|i| i.weapon.as_ref().map(|w| w.speed))
            .min()
            .unwrap_or(unarmed)
    }

    /// First held item with weapon data.
    pub fn first_weapon(&self) -> Option<&Item> {
        self.held_items().find(|i| i.weapon.is_some() && !i.is_shield())
    }
}

// ============================================================================
// Encounter
// ============================================================================

/// The in-memory combatant store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub combatants: Vec<Combatant>,
}

impl Encounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, combatant: Combatant) -> CombatantId {
        let id = combatant.id;
        self.combatants.push(combatant);
        id
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn ids(&self) -> Vec<CombatantId> {
        self.combatants.iter().map(|c| c.id).collect()
    }

    /// Apply one effect. Returns false if its combatant or item is unknown.
    pub fn apply_effect(&mut self, effect: &Effect) -> bool {
        match self.get_mut(effect.combatant()) {
            Some(combatant) => apply_to_combatant(combatant, effect),
            None => false,
        }
    }

    pub fn apply_effects(&mut self, effects: &[Effect]) {
        for effect in effects {
            if !self.apply_effect(effect) {
                debug!(?effect, "effect target not found");
            }
        }
    }
}

/// Apply an effect to a single combatant. Effects addressed to another
/// combatant are ignored.
pub fn apply_to_combatant(combatant: &mut Combatant, effect: &Effect) -> bool {
    if effect.combatant() != combatant.id {
        return false;
    }

    match effect {
        Effect::HpChanged { amount, .. } => {
            combatant.hit_points.adjust(*amount);
            true
        }
        Effect::ConditionApplied {
            condition, source, ..
        } => {
            combatant.add_condition(*condition, source.clone());
            true
        }
        Effect::ConditionRemoved { condition, .. } => {
            combatant.remove_condition(*condition);
            true
        }
        Effect::LocationSevered { location, .. } => {
            if !combatant.severed.contains(location) {
                combatant.severed.push(*location);
            }
            true
        }
        Effect::ItemQuantityChanged { item, delta, .. } => match combatant.item_mut(*item) {
            Some(item) => {
                item.quantity = (item.quantity as i64 + *delta as i64).max(0) as u32;
                true
            }
            None => false,
        },
        Effect::IntegrityChanged { item, delta, .. } => match combatant.item_mut(*item) {
            Some(item) => {
                if let Some(integrity) = item.integrity.as_mut() {
                    *integrity = (*integrity + delta).max(0);
                }
                true
            }
            None => false,
        },
        Effect::EquipChanged { item, state, .. } => match combatant.item_mut(*item) {
            Some(item) => {
                item.equip = *state;
                true
            }
            None => false,
        },
        Effect::WeaponLoaded { item, loaded, .. } => {
            match combatant.item_mut(*item).and_then(|i| i.weapon.as_mut()) {
                Some(weapon) => {
                    weapon.loaded = *loaded;
                    true
                }
                None => false,
            }
        }
        Effect::ChargeUsed { item, .. } => {
            match combatant.item_mut(*item).and_then(|i| i.weapon.as_mut()) {
                Some(weapon) => {
                    if let Some(charges) = weapon.charges.as_mut() {
                        *charges = charges.saturating_sub(1);
                    }
                    true
                }
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items;

    #[test]
    fn test_ability_modifier() {
        let scores = AbilityScores::new(8, 9, 10, 11, 12, 18);
        assert_eq!(scores.modifier(Ability::Strength), -1);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), 1);
        assert_eq!(scores.modifier(Ability::Charisma), 4);
    }

    #[test]
    fn test_ability_parse() {
        assert_eq!("dex".parse::<Ability>().unwrap(), Ability::Dexterity);
        assert_eq!("Strength".parse::<Ability>().unwrap(), Ability::Strength);
    }

    #[test]
    fn test_size_steps() {
        assert_eq!(SizeCategory::Medium.steps_to(SizeCategory::Huge), 2);
        assert_eq!(SizeCategory::Medium.steps_to(SizeCategory::Tiny), -2);
    }

    #[test]
    fn test_hp_can_go_negative() {
        let mut hp = HitPoints::new(5);
        assert_eq!(hp.adjust(-8), -8);
        assert_eq!(hp.current, -3);
        assert_eq!(hp.adjust(20), 8);
        assert_eq!(hp.current, 5);
    }

    #[test]
    fn test_conditions_do_not_duplicate() {
        let mut c = Combatant::new("Test", 10);
        assert!(c.add_condition(Condition::Prone, "test"));
        assert!(!c.add_condition(Condition::Prone, "test"));
        assert_eq!(c.conditions.len(), 1);
        assert!(c.can_act(0));
        c.add_condition(Condition::Unconscious, "test");
        assert!(!c.can_act(0));
    }

    #[test]
    fn test_held_in_two_handed_spans_both_hands() {
        let spear = items::weapon("spear").unwrap().held_two_handed();
        let id = spear.id;
        let c = Combatant::new("Test", 10).with_item(spear);
        assert_eq!(c.held_in(Hand::Main).map(|i| i.id), Some(id));
        assert_eq!(c.held_in(Hand::Off).map(|i| i.id), Some(id));
    }

    #[test]
    fn test_effects_ignore_other_combatants() {
        let mut c = Combatant::new("Test", 10);
        let effect = Effect::HpChanged {
            target: CombatantId::new(),
            amount: -5,
        };
        assert!(!apply_to_combatant(&mut c, &effect));
        assert_eq!(c.hit_points.current, 10);
    }

    #[test]
    fn test_encounter_applies_effects() {
        let mut encounter = Encounter::new();
        let id = encounter.add(Combatant::new("Test", 10));
        encounter.apply_effects(&[
            Effect::HpChanged {
                target: id,
                amount: -4,
            },
            Effect::ConditionApplied {
                target: id,
                condition: Condition::Prone,
                source: "knockdown".to_string(),
            },
            Effect::LocationSevered {
                target: id,
                location: HitLocation::LeftHand,
            },
        ]);
        let c = encounter.get(id).unwrap();
        assert_eq!(c.hit_points.current, 6);
        assert!(c.has_condition(Condition::Prone));
        assert!(c.is_severed(HitLocation::LeftHand));
    }
}
