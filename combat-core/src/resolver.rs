//! Weapon and armor resolution.
//!
//! Turns raw item records into the effective numbers the attack stages use:
//! an [`EffectiveWeapon`] for the attacker's selection and an ordered
//! [`ArmorStack`] plus [`Defense`] snapshot for the target.

use arrayvec::ArrayVec;
use crate::attack::AttackOptions;
use crate::config::CombatConfig;
use crate::dice::{DiceError, DiceExpression};
use crate::items::{ArmorTags, AttackMode, GroupBonus, Hand, ItemId, WeaponTags};
use crate::tables::{
    material_modifier, stance_modifiers, ArmorMaterial, AttackForm, DamageType, HitLocation,
};
use crate::world::{Ability, Combatant, SizeCategory};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;
use tracing::debug;

/// Why a weapon could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("weapon has no damage dice")]
    MissingDamage,
    #[error("weapon has no size")]
    MissingSize,
    #[error("weapon has no reach or range for this attack")]
    MissingReach,
    #[error("unrecognized attack mode: {0}")]
    UnknownAttackMode(String),
    #[error("weapon is not among the attacker's items")]
    MissingWeapon,
    #[error("attack mode {index} requested but the weapon has {available}")]
    ModeOutOfRange { index: usize, available: usize },

    #[error("weapon is not in hand")]
    NotWielded,
    #[error("weapon needs both hands to fire")]
    GripRequired,
    #[error("weapon cannot be gripped with both hands")]
    GripUnsupported,
    #[error("weapon is not made for throwing")]
    NotThrowable,
    #[error("cannot attack with the off hand while holding a shield")]
    OffhandWhileShielded,
    #[error("weapon must be reloaded")]
    ReloadRequired,
    #[error("out of ammunition")]
    OutOfAmmunition,

    #[error("invalid modifier: {0}")]
    InvalidModifier(#[from] DiceError),
}

/// Broad classes of [`ResolveError`], used to decide how the orchestrator
/// recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    InvalidModifier,
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::MissingDamage
            | ResolveError::MissingSize
            | ResolveError::MissingReach
            | ResolveError::UnknownAttackMode(_)
            | ResolveError::MissingWeapon
            | ResolveError::ModeOutOfRange { .. } => ErrorKind::Configuration,
            ResolveError::NotWielded
            | ResolveError::GripRequired
            | ResolveError::GripUnsupported
            | ResolveError::NotThrowable
            | ResolveError::OffhandWhileShielded
            | ResolveError::ReloadRequired
            | ResolveError::OutOfAmmunition => ErrorKind::Precondition,
            ResolveError::InvalidModifier(_) => ErrorKind::InvalidModifier,
        }
    }
}

// ============================================================================
// Weapon selection
// ============================================================================

/// Which end of a double weapon strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponEnd {
    #[default]
    Primary,
    Secondary,
}

/// One queued use of a weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSelection {
    pub item: ItemId,
    /// Index into the weapon's attack modes.
    pub mode: usize,
    pub end: WeaponEnd,
    pub options: AttackOptions,
}

impl WeaponSelection {
    pub fn new(item: ItemId) -> Self {
        Self {
            item,
            mode: 0,
            end: WeaponEnd::Primary,
            options: AttackOptions::default(),
        }
    }

    pub fn with_mode(mut self, mode: usize) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_options(mut self, options: AttackOptions) -> Self {
        self.options = options;
        self
    }

    /// The same selection striking with the other end.
    pub fn secondary(&self) -> Self {
        Self {
            end: WeaponEnd::Secondary,
            ..self.clone()
        }
    }
}

/// A weapon's numbers as wielded by a particular attacker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveWeapon {
    pub item: ItemId,
    pub name: String,
    pub category: String,
    pub mode: AttackMode,
    pub end: WeaponEnd,
    pub damage: DiceExpression,
    pub max_damage: i32,
    pub size: SizeCategory,
    /// Base speed plus stance adjustment. Lower is faster.
    pub speed: i32,
    pub reach: Option<u32>,
    pub range: Option<u32>,
    pub proficient: bool,
    pub hand: Hand,
    pub two_handed: bool,
    pub penetration: i32,
    pub impact: i32,
    pub bleed: i32,
    pub tags: WeaponTags,
    pub bonus_vs: Vec<GroupBonus>,
    /// Ammunition stack consumed by this attack.
    pub ammunition: Option<ItemId>,
    pub uses_charge: bool,
}

impl EffectiveWeapon {
    pub fn form(&self) -> AttackForm {
        self.mode.form
    }

    pub fn damage_type(&self) -> DamageType {
        self.mode.damage_type
    }

    pub fn has(&self, tag: WeaponTags) -> bool {
        self.tags.contains(tag)
    }

    /// Whether another end should strike after this one.
    pub fn has_second_end(&self) -> bool {
        self.has(WeaponTags::DOUBLE) && self.two_handed && self.end == WeaponEnd::Primary
    }

    /// Largest bonus this weapon has against any of the target's groups.
    pub fn group_bonus(&self, target: &Combatant) -> i32 {
        self.bonus_vs
            .iter()
            .filter(|b| target.in_group(&b.group))
            .map(|b| b.bonus)
            .max()
            .unwrap_or(0)
    }

    pub fn damage_ability(&self) -> Option<Ability> {
        self.mode.damage_ability
    }
}

/// Derive the effective weapon for a selection.
///
/// Configuration problems are reported before preconditions, so a weapon
/// with bad data is always rejected as such even when it is also unloaded.
pub fn resolve_weapon(
    attacker: &Combatant,
    selection: &WeaponSelection,
) -> Result<EffectiveWeapon, ResolveError> {
    let item = attacker
        .item(selection.item)
        .filter(|i| !i.is_destroyed())
        .ok_or(ResolveError::MissingWeapon)?;
    let weapon = item.weapon.as_ref().ok_or(ResolveError::MissingWeapon)?;

    let mode_text = weapon
        .modes
        .get(selection.mode)
        .ok_or(ResolveError::ModeOutOfRange {
            index: selection.mode,
            available: weapon.modes.len(),
        })?;
    let mode = AttackMode::parse(mode_text)
        .ok_or_else(|| ResolveError::UnknownAttackMode(mode_text.clone()))?;

    let damage_text = weapon
        .damage_for_end(selection.end == WeaponEnd::Secondary)
        .ok_or(ResolveError::MissingDamage)?;
    let damage = DiceExpression::parse(damage_text).map_err(|_| ResolveError::MissingDamage)?;
    if !damage.has_dice() || damage.maximum() <= 0 {
        return Err(ResolveError::MissingDamage);
    }

    let size = weapon.size.ok_or(ResolveError::MissingSize)?;

    let two_handed = item.is_two_handed();
    let reach = weapon.reach.map(|r| {
        if weapon.has(WeaponTags::MULTI_REACH) && !two_handed {
            r.saturating_sub(1).max(1)
        } else {
            r
        }
    });
    let missing_reach = if mode.form.is_missile() {
        weapon.range.is_none()
    } else {
        reach.is_none()
    };
    if missing_reach {
        return Err(ResolveError::MissingReach);
    }

    let hand = item.hand().ok_or(ResolveError::NotWielded)?;
    if two_handed && !weapon.allows_two_handed_grip() {
        return Err(ResolveError::GripUnsupported);
    }
    if mode.form == AttackForm::Throw && !weapon.has(WeaponTags::THROWABLE) {
        return Err(ResolveError::NotThrowable);
    }
    if mode.form == AttackForm::Shoot && weapon.has(WeaponTags::REQUIRES_TWO_HANDS) && !two_handed {
        return Err(ResolveError::GripRequired);
    }
    if hand == Hand::Off && !two_handed && attacker.held_shield().is_some() {
        return Err(ResolveError::OffhandWhileShielded);
    }
    if weapon.has(WeaponTags::RELOAD) && !weapon.loaded {
        return Err(ResolveError::ReloadRequired);
    }

    let ammunition = match weapon.ammunition.as_deref() {
        Some(name) => match attacker.item_named(name) {
            Some(stack) if stack.quantity > 0 => Some(stack.id),
            _ => return Err(ResolveError::OutOfAmmunition),
        },
        None => None,
    };
    if weapon.charges == Some(0) {
        return Err(ResolveError::OutOfAmmunition);
    }

    let effective = EffectiveWeapon {
        item: item.id,
        name: item.name.clone(),
        category: weapon.category.clone(),
        mode,
        end: selection.end,
        max_damage: damage.maximum(),
        damage,
        size,
        speed: weapon.speed + stance_modifiers(attacker.stance).speed,
        reach,
        range: weapon.range,
        proficient: attacker.is_proficient(&weapon.category),
        hand,
        two_handed,
        penetration: weapon.penetration,
        impact: weapon.impact,
        bleed: weapon.bleed,
        tags: weapon.tags,
        bonus_vs: weapon.bonus_vs.clone(),
        ammunition,
        uses_charge: weapon.charges.is_some(),
    };
    debug!(
        weapon = %effective.name,
        form = ?effective.mode.form,
        damage = %effective.damage,
        speed = effective.speed,
        proficient = effective.proficient,
        "resolved weapon"
    );
    Ok(effective)
}

// ============================================================================
// Armor
// ============================================================================

/// Upper bound on layers held in one stack, shield included.
pub const MAX_STACK: usize = 8;

/// One armor layer at a location, with values for the active damage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorLayer {
    pub item: ItemId,
    pub name: String,
    pub material: ArmorMaterial,
    pub tags: ArmorTags,
    pub ac: i32,
    pub dr: i32,
    /// DR if the blow is converted to bludgeoning.
    pub blunt_dr: i32,
    /// AC against piercing, used for ordering.
    pub pierce_ac: i32,
    pub integrity: Option<i32>,
}

impl ArmorLayer {
    pub fn is_shield(&self) -> bool {
        self.tags.contains(ArmorTags::SHIELD)
    }

    pub fn is_bulky(&self) -> bool {
        self.tags.contains(ArmorTags::BULKY)
    }

    pub fn is_metal(&self) -> bool {
        self.tags.contains(ArmorTags::METAL)
    }
}

/// Ordered layers, outermost first.
pub type ArmorStack = ArrayVec<ArmorLayer, MAX_STACK>;

/// Build the ordered armor stack protecting `location`.
///
/// `None` means the target does not track locations and every worn piece
/// counts. Any shield comes first, then bulky layers, then the rest, each
/// group by descending AC against piercing. At most one shield and
/// `max_armor_layers` other layers are kept.
pub fn armor_stack(
    target: &Combatant,
    location: Option<HitLocation>,
    damage_type: DamageType,
    config: &CombatConfig,
) -> ArmorStack {
    let mut layers: Vec<ArmorLayer> = target
        .worn_armor()
        .chain(target.held_items().filter(|i| i.is_shield()))
        .filter(|item| !item.is_destroyed())
        .filter_map(|item| {
            let armor = item.armor.as_ref()?;
            if let Some(location) = location {
                if !armor.covers(location) {
                    return None;
                }
            }
            let (ac_delta, dr_delta) = material_modifier(armor.material, damage_type);
            let (_, blunt_delta) = material_modifier(armor.material, DamageType::Bludgeoning);
            let (pierce_delta, _) = material_modifier(armor.material, DamageType::Piercing);
            Some(ArmorLayer {
                item: item.id,
                name: item.name.clone(),
                material: armor.material,
                tags: armor.tags,
                ac: (armor.ac + ac_delta).max(0),
                dr: (armor.dr + dr_delta).max(0),
                blunt_dr: (armor.dr + blunt_delta).max(0),
                pierce_ac: (armor.ac + pierce_delta).max(0),
                integrity: item.integrity,
            })
        })
        .collect();

    layers.sort_by_key(|l| (!l.is_shield(), !l.is_bulky(), Reverse(l.pierce_ac)));

    let cap = config.max_armor_layers.min(MAX_STACK - 1);
    let mut stack = ArmorStack::new();
    let mut shield_taken = false;
    let mut others = 0;
    for layer in layers {
        if layer.is_shield() {
            if shield_taken {
                continue;
            }
            shield_taken = true;
        } else {
            if others >= cap {
                continue;
            }
            others += 1;
        }
        if stack.try_push(layer).is_err() {
            break;
        }
    }
    stack
}

/// The target's defensive numbers at one location, taken once per attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defense {
    pub dex_bonus: i32,
    /// Base AC plus dexterity and stance.
    pub unarmored_ac: i32,
    pub parry: i32,
    pub parry_item: Option<ItemId>,
    /// The parry comes from a shield rather than a weapon.
    pub shield_parry: bool,
    pub armor_ac: i32,
    /// Full AC at the location.
    pub ac: i32,
}

impl Defense {
    /// Drop a shield's parry. Flexible weapons wrap around shields.
    pub fn against_flexible(mut self) -> Self {
        if self.shield_parry {
            self.ac -= self.parry;
            self.parry = 0;
            self.parry_item = None;
            self.shield_parry = false;
        }
        self
    }

    /// Below this an attack missed outright.
    pub fn clean_miss_threshold(&self) -> i32 {
        self.unarmored_ac - self.dex_bonus
    }

    pub fn parry_threshold(&self) -> i32 {
        self.unarmored_ac + self.parry
    }
}

/// Snapshot the target's defense against an attack form and armor stack.
pub fn defense(target: &Combatant, stack: &ArmorStack, form: AttackForm) -> Defense {
    let helpless = target.is_helpless();

    let dex_bonus = if helpless {
        0
    } else {
        let modifier = target.ability_modifier(Ability::Dexterity).max(0);
        match target.dex_cap() {
            Some(cap) => modifier.min(cap.max(0)),
            None => modifier,
        }
    };
    let unarmored_ac = target.base_ac + dex_bonus + stance_modifiers(target.stance).ac;

    let (parry, parry_item, shield_parry) = if helpless {
        (0, None, false)
    } else {
        target
            .held_items()
            .filter_map(|item| {
                let shield = item.armor.as_ref().filter(|a| a.tags.contains(ArmorTags::SHIELD));
                let value = if let Some(armor) = shield {
                    armor.parry
                } else if matches!(form, AttackForm::Swing | AttackForm::Thrust) {
                    item.weapon.as_ref()?.parry
                } else {
                    return None;
                };
                (value > 0).then_some((value, Some(item.id), shield.is_some()))
            })
            .max_by_key(|(value, ..)| *value)
            .unwrap_or((0, None, false))
    };

    let armor_ac: i32 = stack.iter().map(|l| l.ac).sum();
    Defense {
        dex_bonus,
        unarmored_ac,
        parry,
        parry_item,
        shield_parry,
        armor_ac,
        ac: unarmored_ac + parry + armor_ac,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{self, Item, WeaponItem};
    use crate::world::AbilityScores;

    fn wielder(item: Item) -> (Combatant, WeaponSelection) {
        let selection = WeaponSelection::new(item.id);
        (Combatant::new("Wielder", 10).with_item(item), selection)
    }

    #[test]
    fn test_resolves_catalogue_sword() {
        let (attacker, selection) = wielder(items::weapon("Long Sword").unwrap().held(Hand::Main));
        let attacker = attacker.with_proficiency("sword");
        let weapon = resolve_weapon(&attacker, &selection).unwrap();
        assert_eq!(weapon.max_damage, 8);
        assert_eq!(weapon.reach, Some(1));
        assert!(weapon.proficient);
        assert_eq!(weapon.form(), AttackForm::Swing);
    }

    #[test]
    fn test_configuration_errors() {
        let bare = Item::new("Stick")
            .with_weapon(WeaponItem::new("1d4", "club", 5).with_mode("swing:bludgeoning"))
            .held(Hand::Main);
        let (attacker, selection) = wielder(bare);
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::MissingReach));

        let mut no_dice = Item::new("Feather")
            .with_weapon(
                WeaponItem::new("0", "club", 5)
                    .with_reach(1)
                    .with_mode("swing:bludgeoning"),
            )
            .held(Hand::Main);
        let (attacker, selection) = wielder(no_dice.clone());
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::MissingDamage));

        if let Some(w) = no_dice.weapon.as_mut() {
            w.damage = Some("1d4".to_string());
            w.size = None;
        }
        let (attacker, selection) = wielder(no_dice);
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::MissingSize));

        let odd = Item::new("Odd")
            .with_weapon(WeaponItem::new("1d4", "club", 5).with_reach(1).with_mode("bite:piercing"))
            .held(Hand::Main);
        let (attacker, selection) = wielder(odd);
        let err = resolve_weapon(&attacker, &selection).unwrap_err();
        assert_eq!(err, ResolveError::UnknownAttackMode("bite:piercing".to_string()));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let attacker = Combatant::new("Empty", 10);
        let err = resolve_weapon(&attacker, &WeaponSelection::new(ItemId::new())).unwrap_err();
        assert_eq!(err, ResolveError::MissingWeapon);
    }

    #[test]
    fn test_multi_reach_one_handed_loses_a_step() {
        let (attacker, selection) = wielder(items::weapon("Spear").unwrap().held(Hand::Main));
        assert_eq!(resolve_weapon(&attacker, &selection).unwrap().reach, Some(1));

        let (attacker, selection) = wielder(items::weapon("Spear").unwrap().held_two_handed());
        assert_eq!(resolve_weapon(&attacker, &selection).unwrap().reach, Some(2));
    }

    #[test]
    fn test_bow_preconditions() {
        let bow = items::weapon("Short Bow").unwrap();
        let (attacker, selection) = wielder(bow.clone().held(Hand::Main));
        let err = resolve_weapon(&attacker, &selection).unwrap_err();
        assert_eq!(err, ResolveError::GripRequired);
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let (attacker, selection) = wielder(bow.held_two_handed());
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::OutOfAmmunition));

        let attacker = attacker.with_item(items::ammunition("Arrows", 3));
        let weapon = resolve_weapon(&attacker, &selection).unwrap();
        assert!(weapon.ammunition.is_some());
    }

    #[test]
    fn test_offhand_blocked_by_shield() {
        let dagger = items::weapon("Dagger").unwrap().held(Hand::Off);
        let shield = items::armor("Wooden Shield").unwrap().held(Hand::Off);
        let (attacker, selection) = wielder(dagger);
        let attacker = attacker.with_item(shield);
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::OffhandWhileShielded));
    }

    #[test]
    fn test_two_handed_grip_needs_a_capable_weapon() {
        let short_sword = items::weapon("Short Sword").unwrap().held_two_handed();
        let (attacker, selection) = wielder(short_sword);
        let err = resolve_weapon(&attacker, &selection).unwrap_err();
        assert_eq!(err, ResolveError::GripUnsupported);
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let (attacker, selection) = wielder(items::weapon("Long Sword").unwrap().held_two_handed());
        assert!(resolve_weapon(&attacker, &selection).unwrap().two_handed);
    }

    #[test]
    fn test_only_throwable_weapons_are_thrown() {
        let (attacker, selection) = wielder(items::weapon("Dagger").unwrap().held(Hand::Main));
        let thrown = resolve_weapon(&attacker, &selection.with_mode(2)).unwrap();
        assert_eq!(thrown.form(), AttackForm::Throw);

        let mut sword = items::weapon("Long Sword").unwrap().held(Hand::Main);
        if let Some(w) = sword.weapon.as_mut() {
            w.range = Some(10);
            w.modes.push("throw:slashing".to_string());
        }
        let (attacker, selection) = wielder(sword);
        let err = resolve_weapon(&attacker, &selection.with_mode(2)).unwrap_err();
        assert_eq!(err, ResolveError::NotThrowable);
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_flexible_weapons_ignore_shield_parry() {
        let config = CombatConfig::default();
        let shielded = Combatant::new("Shielded", 10)
            .with_item(items::armor("Wooden Shield").unwrap().held(Hand::Off));
        let stack =
            armor_stack(&shielded, Some(HitLocation::Chest), DamageType::Bludgeoning, &config);
        let def = defense(&shielded, &stack, AttackForm::Swing);
        assert!(def.shield_parry);
        assert_eq!(def.parry, 2);

        let flex = def.clone().against_flexible();
        assert_eq!(flex.parry, 0);
        assert!(flex.parry_item.is_none());
        assert_eq!(flex.ac, def.ac - 2);

        let fencer = Combatant::new("Fencer", 10)
            .with_item(items::weapon("Long Sword").unwrap().held(Hand::Main));
        let def = defense(&fencer, &ArmorStack::new(), AttackForm::Swing);
        assert!(!def.shield_parry);
        assert_eq!(def.clone().against_flexible(), def);
    }

    #[test]
    fn test_unloaded_crossbow() {
        let mut crossbow = items::weapon("Light Crossbow").unwrap().held_two_handed();
        if let Some(w) = crossbow.weapon.as_mut() {
            w.loaded = false;
        }
        let (attacker, selection) = wielder(crossbow);
        assert_eq!(resolve_weapon(&attacker, &selection), Err(ResolveError::ReloadRequired));
    }

    #[test]
    fn test_armor_stack_order_and_cap() {
        let target = Combatant::new("Target", 20)
            .with_item(items::armor("Gambeson").unwrap().worn())
            .with_item(items::armor("Chain Shirt").unwrap().worn())
            .with_item(items::armor("Plate Cuirass").unwrap().worn())
            .with_item(items::armor("Hide Coat").unwrap().worn())
            .with_item(items::armor("Kite Shield").unwrap().held(Hand::Off));
        let config = CombatConfig::default();

        let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Slashing, &config);
        let names: Vec<&str> = stack.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Kite Shield", "Plate Cuirass", "Hide Coat", "Chain Shirt"]);

        let arm = armor_stack(&target, Some(HitLocation::LeftArm), DamageType::Slashing, &config);
        assert_eq!(arm.len(), 4);
        assert!(arm.iter().all(|l| l.name != "Plate Cuirass"));
    }

    #[test]
    fn test_material_adjusts_layer_values() {
        let target =
            Combatant::new("Target", 20).with_item(items::armor("Chain Shirt").unwrap().worn());
        let config = CombatConfig::default();
        let slash = armor_stack(&target, Some(HitLocation::Chest), DamageType::Slashing, &config);
        let pierce = armor_stack(&target, Some(HitLocation::Chest), DamageType::Piercing, &config);
        assert_eq!((slash[0].ac, slash[0].dr), (5, 2));
        assert_eq!((pierce[0].ac, pierce[0].dr), (2, 1));
    }

    #[test]
    fn test_destroyed_layers_excluded() {
        let target = Combatant::new("Target", 20)
            .with_item(items::armor("Leather Jerkin").unwrap().with_integrity(0).worn());
        let config = CombatConfig::default();
        let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Slashing, &config);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_defense_caps_dex_and_counts_parry() {
        let target = Combatant::new("Target", 20)
            .with_abilities(AbilityScores::new(10, 18, 10, 10, 10, 10))
            .with_item(items::armor("Chain Shirt").unwrap().worn())
            .with_item(items::weapon("Long Sword").unwrap().held(Hand::Main));
        let config = CombatConfig::default();
        let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Slashing, &config);

        let melee = defense(&target, &stack, AttackForm::Swing);
        assert_eq!(melee.dex_bonus, 3);
        assert_eq!(melee.unarmored_ac, 13);
        assert_eq!(melee.parry, 2);
        assert_eq!(melee.ac, 13 + 2 + 5);

        let missile = defense(&target, &stack, AttackForm::Shoot);
        assert_eq!(missile.parry, 0);
    }

    #[test]
    fn test_prone_target_loses_dex_and_parry() {
        let target = Combatant::new("Target", 20)
            .with_abilities(AbilityScores::new(10, 16, 10, 10, 10, 10))
            .with_item(items::weapon("Long Sword").unwrap().held(Hand::Main))
            .with_condition(crate::world::Condition::Prone);
        let d = defense(&target, &ArmorStack::new(), AttackForm::Swing);
        assert_eq!(d.dex_bonus, 0);
        assert_eq!(d.parry, 0);
        assert_eq!(d.ac, 10);
    }
}
