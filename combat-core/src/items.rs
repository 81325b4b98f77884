//! Item records and the standard weapon and armor catalogue.
//!
//! Weapons and armor are normalized value objects: every capability the
//! engine checks is a flag in [`WeaponTags`] or [`ArmorTags`] rather than an
//! optional field that may or may not be present.

use bitflags::bitflags;
use crate::tables::{ArmorMaterial, AttackForm, DamageType, HitLocation};
use crate::world::{Ability, SizeCategory};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Equip state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Main,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EquipState {
    #[default]
    Carried,
    Worn,
    Held {
        hand: Hand,
        two_handed: bool,
    },
    Dropped,
}

// ============================================================================
// Item
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quantity: u32,
    /// Remaining durability. `Some(0)` means destroyed; `None` is unbreakable.
    pub integrity: Option<i32>,
    pub equip: EquipState,
    pub weapon: Option<WeaponItem>,
    pub armor: Option<ArmorItem>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            quantity: 1,
            integrity: None,
            equip: EquipState::Carried,
            weapon: None,
            armor: None,
        }
    }

    pub fn with_weapon(mut self, weapon: WeaponItem) -> Self {
        self.weapon = Some(weapon);
        self
    }

    pub fn with_armor(mut self, armor: ArmorItem) -> Self {
        self.armor = Some(armor);
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_integrity(mut self, integrity: i32) -> Self {
        self.integrity = Some(integrity);
        self
    }

    pub fn held(mut self, hand: Hand) -> Self {
        self.equip = EquipState::Held {
            hand,
            two_handed: false,
        };
        self
    }

    pub fn held_two_handed(mut self) -> Self {
        self.equip = EquipState::Held {
            hand: Hand::Main,
            two_handed: true,
        };
        self
    }

    pub fn worn(mut self) -> Self {
        self.equip = EquipState::Worn;
        self
    }

    /// Copy of the item with a new identity, for handing out catalogue entries.
    pub fn fresh(&self) -> Self {
        Self {
            id: ItemId::new(),
            ..self.clone()
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self.equip, EquipState::Held { .. })
    }

    pub fn hand(&self) -> Option<Hand> {
        match self.equip {
            EquipState::Held { hand, .. } => Some(hand),
            _ => None,
        }
    }

    pub fn is_two_handed(&self) -> bool {
        matches!(
            self.equip,
            EquipState::Held {
                two_handed: true,
                ..
            }
        )
    }

    pub fn is_shield(&self) -> bool {
        self.armor
            .as_ref()
            .is_some_and(|a| a.tags.contains(ArmorTags::SHIELD))
    }

    pub fn is_destroyed(&self) -> bool {
        self.integrity == Some(0)
    }
}

// ============================================================================
// Weapons
// ============================================================================

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WeaponTags: u16 {
        const FRAGILE = 1 << 0;
        const UNWIELDY = 1 << 1;
        /// Must be reloaded after every shot.
        const RELOAD = 1 << 2;
        const FLEXIBLE = 1 << 3;
        const TWO_HANDED_CAPABLE = 1 << 4;
        const THROWABLE = 1 << 5;
        /// Reaches further than one step; loses a step when held one-handed.
        const MULTI_REACH = 1 << 6;
        /// Cannot shoot without both hands on the weapon.
        const REQUIRES_TWO_HANDS = 1 << 7;
        /// Two striking ends, damage formulas split on `/`.
        const DOUBLE = 1 << 8;
    }
}

/// Extra to-hit and damage against a creature group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBonus {
    pub group: String,
    pub bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponItem {
    /// Damage formula; double-ended weapons give one formula per end split on `/`.
    pub damage: Option<String>,
    pub category: String,
    pub size: Option<SizeCategory>,
    /// Lower is faster.
    pub speed: i32,
    pub reach: Option<u32>,
    pub range: Option<u32>,
    /// Attack modes, `"form:damage_type[:attack_ability[:damage_ability]]"`.
    pub modes: Vec<String>,
    pub penetration: i32,
    pub impact: i32,
    pub bleed: i32,
    pub parry: i32,
    pub tags: WeaponTags,
    pub bonus_vs: Vec<GroupBonus>,
    /// Name of the carried item consumed per shot.
    pub ammunition: Option<String>,
    pub loaded: bool,
    pub charges: Option<u32>,
}

impl WeaponItem {
    pub fn new(damage: &str, category: &str, speed: i32) -> Self {
        Self {
            damage: Some(damage.to_string()),
            category: category.to_string(),
            size: Some(SizeCategory::Medium),
            speed,
            reach: None,
            range: None,
            modes: Vec::new(),
            penetration: 0,
            impact: 0,
            bleed: 0,
            parry: 0,
            tags: WeaponTags::empty(),
            bonus_vs: Vec::new(),
            ammunition: None,
            loaded: false,
            charges: None,
        }
    }

    pub fn with_size(mut self, size: SizeCategory) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_reach(mut self, reach: u32) -> Self {
        self.reach = Some(reach);
        self
    }

    pub fn with_range(mut self, range: u32) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.modes.push(mode.to_string());
        self
    }

    /// Penetration, impact and bleed ratings.
    pub fn with_ratings(mut self, penetration: i32, impact: i32, bleed: i32) -> Self {
        self.penetration = penetration;
        self.impact = impact;
        self.bleed = bleed;
        self
    }

    pub fn with_parry(mut self, parry: i32) -> Self {
        self.parry = parry;
        self
    }

    pub fn with_tags(mut self, tags: WeaponTags) -> Self {
        self.tags |= tags;
        self
    }

    pub fn with_bonus_vs(mut self, group: &str, bonus: i32) -> Self {
        self.bonus_vs.push(GroupBonus {
            group: group.to_string(),
            bonus,
        });
        self
    }

    pub fn with_ammunition(mut self, name: &str) -> Self {
        self.ammunition = Some(name.to_string());
        self
    }

    pub fn with_charges(mut self, charges: u32) -> Self {
        self.charges = Some(charges);
        self
    }

    pub fn loaded(mut self) -> Self {
        self.loaded = true;
        self
    }

    pub fn has(&self, tag: WeaponTags) -> bool {
        self.tags.contains(tag)
    }

    /// Whether the weapon can be held in both hands at once.
    pub fn allows_two_handed_grip(&self) -> bool {
        self.tags.intersects(
            WeaponTags::TWO_HANDED_CAPABLE | WeaponTags::REQUIRES_TWO_HANDS | WeaponTags::DOUBLE,
        )
    }

    /// Damage formula for one end of the weapon. Single-ended weapons
    /// return the same formula for either end.
    pub fn damage_for_end(&self, secondary: bool) -> Option<&str> {
        let damage = self.damage.as_deref()?;
        let mut ends = damage.split('/').map(str::trim);
        let primary = ends.next()?;
        if secondary {
            Some(ends.next().unwrap_or(primary))
        } else {
            Some(primary)
        }
    }
}

/// A parsed attack mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackMode {
    pub form: AttackForm,
    pub damage_type: DamageType,
    pub attack_ability: Ability,
    pub damage_ability: Option<Ability>,
}

impl AttackMode {
    /// Parse `"form:damage_type[:attack_ability[:damage_ability]]"`.
    ///
    /// Shooting defaults to dexterity to hit and no damage ability; every
    /// other form defaults to strength for both. A damage ability of `-`
    /// means none.
    pub fn parse(mode: &str) -> Option<Self> {
        let mut parts = mode.split(':').map(str::trim);
        let form: AttackForm = parts.next()?.parse().ok()?;
        let damage_type: DamageType = parts.next()?.parse().ok()?;

        let attack_ability = match parts.next() {
            Some(s) => s.parse().ok()?,
            None if form == AttackForm::Shoot => Ability::Dexterity,
            None => Ability::Strength,
        };
        let damage_ability = match parts.next() {
            Some("-") => None,
            Some(s) => Some(s.parse().ok()?),
            None if form == AttackForm::Shoot => None,
            None => Some(Ability::Strength),
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            form,
            damage_type,
            attack_ability,
            damage_ability,
        })
    }
}

// ============================================================================
// Armor
// ============================================================================

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ArmorTags: u8 {
        const SHIELD = 1 << 0;
        const BULKY = 1 << 1;
        const METAL = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorItem {
    pub material: ArmorMaterial,
    /// Locations protected. Shields protect every location.
    pub coverage: Vec<HitLocation>,
    pub ac: i32,
    pub dr: i32,
    pub dex_cap: Option<i32>,
    pub parry: i32,
    pub tags: ArmorTags,
}

impl ArmorItem {
    pub fn new(material: ArmorMaterial, ac: i32, dr: i32) -> Self {
        Self {
            material,
            coverage: Vec::new(),
            ac,
            dr,
            dex_cap: None,
            parry: 0,
            tags: ArmorTags::empty(),
        }
    }

    pub fn covering(mut self, locations: &[HitLocation]) -> Self {
        self.coverage.extend_from_slice(locations);
        self
    }

    pub fn with_dex_cap(mut self, cap: i32) -> Self {
        self.dex_cap = Some(cap);
        self
    }

    pub fn with_parry(mut self, parry: i32) -> Self {
        self.parry = parry;
        self
    }

    pub fn with_tags(mut self, tags: ArmorTags) -> Self {
        self.tags |= tags;
        self
    }

    pub fn covers(&self, location: HitLocation) -> bool {
        self.tags.contains(ArmorTags::SHIELD) || self.coverage.contains(&location)
    }
}

// ============================================================================
// Catalogue
// ============================================================================

use HitLocation::*;

const TORSO: &[HitLocation] = &[Chest, Abdomen, Groin];
const TORSO_ARMS: &[HitLocation] = &[Chest, Abdomen, Groin, LeftArm, RightArm];
const HAUBERK: &[HitLocation] = &[
    Chest, Abdomen, Groin, LeftArm, RightArm, LeftLeg, RightLeg,
];
const HANDS: &[HitLocation] = &[LeftHand, RightHand];
const LEGS: &[HitLocation] = &[LeftLeg, RightLeg];

/// Get a standard weapon by name, as a fresh carried item.
pub fn weapon(name: &str) -> Option<Item> {
    WEAPONS
        .iter()
        .find(|w| w.name.eq_ignore_ascii_case(name))
        .map(Item::fresh)
}

/// Get a standard armor piece or shield by name, as a fresh carried item.
pub fn armor(name: &str) -> Option<Item> {
    ARMORS
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .map(Item::fresh)
}

/// A stack of ammunition.
pub fn ammunition(name: &str, quantity: u32) -> Item {
    Item::new(name).with_quantity(quantity)
}

lazy_static::lazy_static! {
    /// Standard weapons.
    pub static ref WEAPONS: Vec<Item> = vec![
        Item::new("Dagger").with_integrity(8).with_weapon(
            WeaponItem::new("1d4", "dagger", 2)
                .with_size(SizeCategory::Tiny)
                .with_reach(1)
                .with_range(10)
                .with_mode("thrust:piercing:dex")
                .with_mode("swing:slashing:dex")
                .with_mode("throw:piercing:dex")
                .with_ratings(1, 1, 2)
                .with_tags(WeaponTags::THROWABLE),
        ),
        Item::new("Short Sword").with_integrity(10).with_weapon(
            WeaponItem::new("1d6", "sword", 3)
                .with_size(SizeCategory::Small)
                .with_reach(1)
                .with_mode("thrust:piercing")
                .with_mode("swing:slashing")
                .with_ratings(1, 1, 2)
                .with_parry(1),
        ),
        Item::new("Long Sword").with_integrity(12).with_weapon(
            WeaponItem::new("1d8", "sword", 5)
                .with_reach(1)
                .with_mode("swing:slashing")
                .with_mode("thrust:piercing")
                .with_ratings(1, 2, 2)
                .with_parry(2)
                .with_tags(WeaponTags::TWO_HANDED_CAPABLE),
        ),
        Item::new("Obsidian Blade").with_integrity(4).with_weapon(
            WeaponItem::new("1d8+1", "sword", 4)
                .with_reach(1)
                .with_mode("swing:slashing")
                .with_ratings(0, 1, 4)
                .with_parry(1)
                .with_tags(WeaponTags::FRAGILE),
        ),
        Item::new("Battle Axe").with_integrity(12).with_weapon(
            WeaponItem::new("1d8", "axe", 6)
                .with_reach(1)
                .with_mode("swing:slashing")
                .with_ratings(0, 3, 2)
                .with_tags(WeaponTags::UNWIELDY | WeaponTags::TWO_HANDED_CAPABLE),
        ),
        Item::new("Mace").with_integrity(15).with_weapon(
            WeaponItem::new("1d6+1", "mace", 5)
                .with_reach(1)
                .with_mode("swing:bludgeoning")
                .with_ratings(0, 4, 0),
        ),
        Item::new("War Hammer").with_integrity(15).with_weapon(
            WeaponItem::new("1d6", "hammer", 5)
                .with_reach(1)
                .with_mode("swing:bludgeoning")
                .with_mode("thrust:piercing")
                .with_ratings(2, 3, 0),
        ),
        Item::new("Flail").with_integrity(12).with_weapon(
            WeaponItem::new("1d6+1", "flail", 6)
                .with_reach(1)
                .with_mode("swing:bludgeoning")
                .with_ratings(0, 4, 0)
                .with_tags(WeaponTags::FLEXIBLE | WeaponTags::UNWIELDY),
        ),
        Item::new("Spear").with_integrity(8).with_weapon(
            WeaponItem::new("1d6", "spear", 4)
                .with_reach(2)
                .with_range(20)
                .with_mode("thrust:piercing")
                .with_mode("throw:piercing")
                .with_ratings(2, 1, 1)
                .with_parry(1)
                .with_tags(
                    WeaponTags::TWO_HANDED_CAPABLE
                        | WeaponTags::THROWABLE
                        | WeaponTags::MULTI_REACH,
                ),
        ),
        Item::new("Halberd").with_integrity(12).with_weapon(
            WeaponItem::new("1d10", "polearm", 7)
                .with_size(SizeCategory::Large)
                .with_reach(2)
                .with_mode("swing:slashing")
                .with_mode("thrust:piercing")
                .with_ratings(2, 3, 2)
                .with_tags(
                    WeaponTags::MULTI_REACH
                        | WeaponTags::TWO_HANDED_CAPABLE
                        | WeaponTags::UNWIELDY,
                ),
        ),
        Item::new("Quarterstaff").with_integrity(10).with_weapon(
            WeaponItem::new("1d6/1d6", "staff", 4)
                .with_reach(1)
                .with_mode("swing:bludgeoning")
                .with_ratings(0, 2, 0)
                .with_parry(2)
                .with_tags(WeaponTags::DOUBLE | WeaponTags::TWO_HANDED_CAPABLE),
        ),
        Item::new("Short Bow").with_integrity(6).with_weapon(
            WeaponItem::new("1d6", "bow", 4)
                .with_size(SizeCategory::Small)
                .with_range(60)
                .with_mode("shoot:piercing")
                .with_ratings(1, 1, 1)
                .with_ammunition("Arrows")
                .with_tags(WeaponTags::REQUIRES_TWO_HANDS),
        ),
        Item::new("Long Bow").with_integrity(6).with_weapon(
            WeaponItem::new("1d8", "bow", 5)
                .with_range(100)
                .with_mode("shoot:piercing")
                .with_ratings(2, 1, 1)
                .with_ammunition("Arrows")
                .with_tags(WeaponTags::REQUIRES_TWO_HANDS),
        ),
        Item::new("Light Crossbow").with_integrity(8).with_weapon(
            WeaponItem::new("1d8", "crossbow", 6)
                .with_size(SizeCategory::Small)
                .with_range(80)
                .with_mode("shoot:piercing")
                .with_ratings(3, 2, 1)
                .with_ammunition("Bolts")
                .with_tags(WeaponTags::RELOAD | WeaponTags::REQUIRES_TWO_HANDS)
                .loaded(),
        ),
        Item::new("Dart Wand").with_weapon(
            WeaponItem::new("1d4", "wand", 3)
                .with_size(SizeCategory::Tiny)
                .with_range(30)
                .with_mode("shoot:piercing")
                .with_ratings(1, 0, 1)
                .with_charges(5),
        ),
    ];

    /// Standard armor and shields.
    pub static ref ARMORS: Vec<Item> = vec![
        Item::new("Gambeson").with_integrity(6).with_armor(
            ArmorItem::new(ArmorMaterial::Padded, 1, 0).covering(TORSO_ARMS),
        ),
        Item::new("Leather Jerkin").with_integrity(6).with_armor(
            ArmorItem::new(ArmorMaterial::Leather, 2, 0).covering(TORSO),
        ),
        Item::new("Hide Coat").with_integrity(8).with_armor(
            ArmorItem::new(ArmorMaterial::Hide, 2, 1)
                .covering(TORSO_ARMS)
                .with_dex_cap(4)
                .with_tags(ArmorTags::BULKY),
        ),
        Item::new("Chain Shirt").with_integrity(10).with_armor(
            ArmorItem::new(ArmorMaterial::Chain, 3, 1)
                .covering(TORSO_ARMS)
                .with_dex_cap(3)
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Chain Hauberk").with_integrity(12).with_armor(
            ArmorItem::new(ArmorMaterial::Chain, 4, 1)
                .covering(HAUBERK)
                .with_dex_cap(2)
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Scale Mail").with_integrity(12).with_armor(
            ArmorItem::new(ArmorMaterial::Scale, 4, 1)
                .covering(TORSO_ARMS)
                .with_dex_cap(2)
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Plate Cuirass").with_integrity(15).with_armor(
            ArmorItem::new(ArmorMaterial::Plate, 5, 2)
                .covering(&[Chest, Abdomen])
                .with_dex_cap(1)
                .with_tags(ArmorTags::METAL | ArmorTags::BULKY),
        ),
        Item::new("Steel Helm").with_integrity(10).with_armor(
            ArmorItem::new(ArmorMaterial::Plate, 4, 1)
                .covering(&[Head])
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Leather Cap").with_integrity(4).with_armor(
            ArmorItem::new(ArmorMaterial::Leather, 1, 0).covering(&[Head]),
        ),
        Item::new("Plate Gauntlets").with_integrity(8).with_armor(
            ArmorItem::new(ArmorMaterial::Plate, 3, 1)
                .covering(HANDS)
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Plate Greaves").with_integrity(10).with_armor(
            ArmorItem::new(ArmorMaterial::Plate, 3, 1)
                .covering(LEGS)
                .with_tags(ArmorTags::METAL),
        ),
        Item::new("Wooden Shield").with_integrity(10).with_armor(
            ArmorItem::new(ArmorMaterial::Wood, 1, 0)
                .with_parry(2)
                .with_tags(ArmorTags::SHIELD),
        ),
        Item::new("Kite Shield").with_integrity(12).with_armor(
            ArmorItem::new(ArmorMaterial::Wood, 2, 0)
                .with_parry(2)
                .with_tags(ArmorTags::SHIELD | ArmorTags::BULKY),
        ),
        Item::new("Iron Buckler").with_integrity(12).with_armor(
            ArmorItem::new(ArmorMaterial::Plate, 1, 0)
                .with_parry(3)
                .with_tags(ArmorTags::SHIELD | ArmorTags::METAL),
        ),
    ];
}
