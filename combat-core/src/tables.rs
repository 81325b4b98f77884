//! Static combat lookup data.
//!
//! Hit-location weights by attack form, stance height and aim, per-location
//! profiles, injury tables, the armor material matrix, aim penalties and
//! stance modifiers.

use crate::dice::DiceRoller;
use crate::world::Condition;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

// ============================================================================
// Attack vocabulary
// ============================================================================

/// Physical damage types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DamageType {
    #[strum(serialize = "slashing", serialize = "slash", serialize = "s")]
    Slashing,
    #[strum(serialize = "piercing", serialize = "pierce", serialize = "p")]
    Piercing,
    #[strum(
        serialize = "bludgeoning",
        serialize = "blunt",
        serialize = "crushing",
        serialize = "b"
    )]
    Bludgeoning,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a weapon is delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AttackForm {
    Swing,
    Thrust,
    Shoot,
    Throw,
}

impl AttackForm {
    pub fn is_missile(&self) -> bool {
        matches!(self, AttackForm::Shoot | AttackForm::Throw)
    }
}

/// Height of the wielder's guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter)]
pub enum StanceHeight {
    High,
    #[default]
    Mid,
    Low,
}

/// Where the attacker is deliberately aiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter)]
pub enum AimArea {
    #[default]
    Unaimed,
    Head,
    Torso,
    Arms,
    Legs,
}

/// To-hit penalty for aiming at an area.
pub fn aim_penalty(aim: AimArea) -> i32 {
    match aim {
        AimArea::Unaimed => 0,
        AimArea::Torso => -1,
        AimArea::Legs => -2,
        AimArea::Arms => -3,
        AimArea::Head => -4,
    }
}

// ============================================================================
// Stance and preparation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StanceStyle {
    #[default]
    Normal,
    Aggressive,
    Defensive,
    /// Waits for an opening to answer a failed attack.
    Riposte,
    /// Rolls with incoming blows, occasionally turning them back.
    FluidGuard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timing {
    #[default]
    Normal,
    Quick,
    Deliberate,
}

/// A wielder's guard, set before the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Stance {
    pub style: StanceStyle,
    pub height: StanceHeight,
    pub timing: Timing,
}

impl Stance {
    pub fn new(style: StanceStyle, height: StanceHeight, timing: Timing) -> Self {
        Self {
            style,
            height,
            timing,
        }
    }

    pub fn counters(&self) -> bool {
        matches!(self.style, StanceStyle::Riposte | StanceStyle::FluidGuard)
    }
}

/// Additive modifiers contributed by a stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StanceModifiers {
    pub to_hit: i32,
    pub damage: i32,
    pub speed: i32,
    pub ac: i32,
}

pub fn stance_modifiers(stance: Stance) -> StanceModifiers {
    let (to_hit, damage, speed, ac) = match stance.style {
        StanceStyle::Normal => (0, 0, 0, 0),
        StanceStyle::Aggressive => (2, 1, 0, -2),
        StanceStyle::Defensive => (-2, -1, 0, 2),
        StanceStyle::Riposte => (-1, 0, 0, 1),
        StanceStyle::FluidGuard => (-1, 0, -1, 1),
    };
    let (timing_hit, timing_damage, timing_speed) = match stance.timing {
        Timing::Normal => (0, 0, 0),
        Timing::Quick => (-1, 0, -2),
        Timing::Deliberate => (1, 1, 2),
    };
    StanceModifiers {
        to_hit: to_hit + timing_hit,
        damage: damage + timing_damage,
        speed: speed + timing_speed,
        ac,
    }
}

// ============================================================================
// Hit locations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum HitLocation {
    Head,
    Neck,
    Chest,
    Abdomen,
    Groin,
    LeftArm,
    RightArm,
    LeftHand,
    RightHand,
    LeftLeg,
    RightLeg,
    LeftFoot,
    RightFoot,
}

impl HitLocation {
    pub fn name(&self) -> &'static str {
        match self {
            HitLocation::Head => "head",
            HitLocation::Neck => "neck",
            HitLocation::Chest => "chest",
            HitLocation::Abdomen => "abdomen",
            HitLocation::Groin => "groin",
            HitLocation::LeftArm => "left arm",
            HitLocation::RightArm => "right arm",
            HitLocation::LeftHand => "left hand",
            HitLocation::RightHand => "right hand",
            HitLocation::LeftLeg => "left leg",
            HitLocation::RightLeg => "right leg",
            HitLocation::LeftFoot => "left foot",
            HitLocation::RightFoot => "right foot",
        }
    }

    pub fn region(&self) -> BodyRegion {
        match self {
            HitLocation::Head => BodyRegion::Head,
            HitLocation::Neck => BodyRegion::Neck,
            HitLocation::Chest | HitLocation::Abdomen | HitLocation::Groin => BodyRegion::Torso,
            HitLocation::LeftArm
            | HitLocation::RightArm
            | HitLocation::LeftLeg
            | HitLocation::RightLeg => BodyRegion::Limb,
            HitLocation::LeftHand
            | HitLocation::RightHand
            | HitLocation::LeftFoot
            | HitLocation::RightFoot => BodyRegion::Extremity,
        }
    }

    /// The hand served by an arm or hand location. The right side is the main hand.
    pub fn hand(&self) -> Option<crate::items::Hand> {
        use crate::items::Hand;
        match self {
            HitLocation::LeftArm | HitLocation::LeftHand => Some(Hand::Off),
            HitLocation::RightArm | HitLocation::RightHand => Some(Hand::Main),
            _ => None,
        }
    }

    pub fn in_aim_area(&self, aim: AimArea) -> bool {
        match aim {
            AimArea::Unaimed => false,
            AimArea::Head => matches!(self, HitLocation::Head | HitLocation::Neck),
            AimArea::Torso => self.region() == BodyRegion::Torso,
            AimArea::Arms => matches!(
                self,
                HitLocation::LeftArm
                    | HitLocation::RightArm
                    | HitLocation::LeftHand
                    | HitLocation::RightHand
            ),
            AimArea::Legs => matches!(
                self,
                HitLocation::LeftLeg
                    | HitLocation::RightLeg
                    | HitLocation::LeftFoot
                    | HitLocation::RightFoot
            ),
        }
    }

    pub fn profile(&self) -> LocationProfile {
        location_profile(*self)
    }
}

impl fmt::Display for HitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse grouping used by the injury tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyRegion {
    Head,
    Neck,
    Torso,
    Limb,
    Extremity,
}

/// Fixed per-location properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationProfile {
    pub max_impale_depth: u32,
    pub easy_bleed: bool,
    pub knockdown_doubled: bool,
    pub bilateral: bool,
    pub shield_side: bool,
    pub critical_multiplier: i32,
    pub critical_bonus: i32,
}

const fn profile(
    max_impale_depth: u32,
    easy_bleed: bool,
    knockdown_doubled: bool,
    bilateral: bool,
    shield_side: bool,
    critical_multiplier: i32,
    critical_bonus: i32,
) -> LocationProfile {
    LocationProfile {
        max_impale_depth,
        easy_bleed,
        knockdown_doubled,
        bilateral,
        shield_side,
        critical_multiplier,
        critical_bonus,
    }
}

pub fn location_profile(location: HitLocation) -> LocationProfile {
    match location {
        HitLocation::Head => profile(2, true, true, false, false, 3, 4),
        HitLocation::Neck => profile(2, true, false, false, false, 3, 4),
        HitLocation::Chest => profile(4, false, false, false, false, 2, 2),
        HitLocation::Abdomen => profile(4, true, false, false, false, 2, 2),
        HitLocation::Groin => profile(2, true, false, false, false, 2, 2),
        HitLocation::LeftArm => profile(2, false, false, true, true, 1, 1),
        HitLocation::RightArm => profile(2, false, false, true, false, 1, 1),
        HitLocation::LeftHand => profile(1, false, false, true, true, 1, 0),
        HitLocation::RightHand => profile(1, false, false, true, false, 1, 0),
        HitLocation::LeftLeg | HitLocation::RightLeg => profile(3, false, true, true, false, 1, 1),
        HitLocation::LeftFoot | HitLocation::RightFoot => {
            profile(1, false, true, true, false, 1, 0)
        }
    }
}

/// Profile used when the target does not track hit locations.
pub const UNLOCATED_PROFILE: LocationProfile = profile(2, false, false, false, false, 2, 2);

// Base weights per stance height, in `HitLocation` declaration order.
const HIGH_WEIGHTS: [u32; 13] = [20, 8, 22, 8, 2, 12, 12, 4, 4, 3, 3, 1, 1];
const MID_WEIGHTS: [u32; 13] = [5, 3, 22, 18, 6, 10, 10, 5, 5, 7, 7, 1, 1];
const LOW_WEIGHTS: [u32; 13] = [1, 1, 8, 14, 10, 5, 5, 4, 4, 22, 22, 2, 2];

/// Form adjustment in quarters (4 leaves the base weight unchanged).
fn form_quarters(form: AttackForm, region: BodyRegion) -> u32 {
    match (form, region) {
        (AttackForm::Swing, BodyRegion::Head | BodyRegion::Limb) => 5,
        (AttackForm::Swing, _) => 4,
        (AttackForm::Thrust, BodyRegion::Torso) => 6,
        (AttackForm::Thrust, BodyRegion::Head | BodyRegion::Limb) => 3,
        (AttackForm::Thrust, BodyRegion::Extremity) => 2,
        (AttackForm::Thrust, BodyRegion::Neck) => 4,
        (AttackForm::Shoot, BodyRegion::Torso) => 6,
        (AttackForm::Shoot, BodyRegion::Head | BodyRegion::Neck) => 3,
        (AttackForm::Shoot, BodyRegion::Extremity) => 2,
        (AttackForm::Shoot, BodyRegion::Limb) => 4,
        (AttackForm::Throw, _) => 4,
    }
}

/// Selection weight of one location for an attack form, height and aim.
pub fn location_weight(
    location: HitLocation,
    form: AttackForm,
    height: StanceHeight,
    aim: AimArea,
) -> u32 {
    let base = match height {
        StanceHeight::High => HIGH_WEIGHTS,
        StanceHeight::Mid => MID_WEIGHTS,
        StanceHeight::Low => LOW_WEIGHTS,
    }[location as usize];
    let aim_factor = match aim {
        AimArea::Unaimed => 4,
        _ if location.in_aim_area(aim) => 16,
        _ => 2,
    };
    base * form_quarters(form, location.region()) * aim_factor
}

/// Weighted location draw, skipping severed locations.
///
/// Draws one die sized to the total weight. Falls back to the chest without
/// drawing if every location is excluded.
pub fn select_location<R: DiceRoller + ?Sized>(
    roller: &mut R,
    form: AttackForm,
    height: StanceHeight,
    aim: AimArea,
    severed: &[HitLocation],
) -> HitLocation {
    let weights: Vec<(HitLocation, u32)> = HitLocation::iter()
        .map(|loc| {
            let weight = if severed.contains(&loc) {
                0
            } else {
                location_weight(loc, form, height, aim)
            };
            (loc, weight)
        })
        .collect();
    let total: u32 = weights.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return HitLocation::Chest;
    }

    let mut roll = roller.roll_die(total).clamp(1, total);
    for (location, weight) in &weights {
        if roll <= *weight {
            return *location;
        }
        roll -= weight;
    }
    HitLocation::Chest
}

// ============================================================================
// Armor materials
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum ArmorMaterial {
    Cloth,
    Padded,
    Leather,
    Hide,
    Chain,
    Scale,
    Plate,
    Wood,
}

/// AC and DR adjustments of a material against a damage type.
pub fn material_modifier(material: ArmorMaterial, damage_type: DamageType) -> (i32, i32) {
    use DamageType::*;
    match (material, damage_type) {
        (ArmorMaterial::Padded, Bludgeoning) => (1, 1),
        (ArmorMaterial::Hide, Slashing) => (1, 0),
        (ArmorMaterial::Hide, Bludgeoning) => (0, 1),
        (ArmorMaterial::Chain, Slashing) => (2, 1),
        (ArmorMaterial::Chain, Piercing) => (-1, 0),
        (ArmorMaterial::Chain, Bludgeoning) => (-1, 0),
        (ArmorMaterial::Scale, Slashing) => (1, 1),
        (ArmorMaterial::Plate, Slashing) => (2, 1),
        (ArmorMaterial::Plate, Piercing) => (1, 1),
        (ArmorMaterial::Plate, Bludgeoning) => (-1, 0),
        (ArmorMaterial::Wood, Piercing) => (1, 0),
        _ => (0, 0),
    }
}

// ============================================================================
// Injuries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Light,
    Serious,
    Critical,
    Gruesome,
}

impl Severity {
    /// The next lower tier, if any.
    pub fn lower(&self) -> Option<Severity> {
        match self {
            Severity::Light => None,
            Severity::Serious => Some(Severity::Light),
            Severity::Critical => Some(Severity::Serious),
            Severity::Gruesome => Some(Severity::Critical),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Light => "light",
            Severity::Serious => "serious",
            Severity::Critical => "critical",
            Severity::Gruesome => "gruesome",
        }
    }
}

/// One cell of an injury table. `{loc}` in the text is replaced with the
/// location name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjuryEntry {
    pub text: &'static str,
    pub condition: Option<Condition>,
    pub removal: bool,
    pub fatal: bool,
}

const fn wound(text: &'static str) -> InjuryEntry {
    InjuryEntry {
        text,
        condition: None,
        removal: false,
        fatal: false,
    }
}

const fn wound_with(text: &'static str, condition: Condition) -> InjuryEntry {
    InjuryEntry {
        text,
        condition: Some(condition),
        removal: false,
        fatal: false,
    }
}

const fn severing(text: &'static str) -> InjuryEntry {
    InjuryEntry {
        text,
        condition: None,
        removal: true,
        fatal: false,
    }
}

const fn fatal(text: &'static str, removal: bool) -> InjuryEntry {
    InjuryEntry {
        text,
        condition: None,
        removal,
        fatal: true,
    }
}

/// Exact table cell; `None` where the table has no entry.
pub fn injury(
    region: BodyRegion,
    damage_type: DamageType,
    severity: Severity,
) -> Option<InjuryEntry> {
    use BodyRegion::*;
    use Condition::*;
    use DamageType::*;
    use Severity::*;

    let entry = match (region, damage_type, severity) {
        (Head, Slashing, Light) => wound("a shallow cut opens across the {loc}"),
        (Head, Slashing, Serious) => wound_with("a deep gash splits the scalp", Staggered),
        (Head, Slashing, Critical) => wound_with("the blade bites into the skull", Unconscious),
        (Head, Slashing, Gruesome) => fatal("the {loc} is cleaved open", false),
        (Head, Piercing, Light) => wound("a glancing puncture to the {loc}"),
        (Head, Piercing, Serious) => wound_with("the point tears through the cheek", Staggered),
        (Head, Piercing, Critical) => {
            wound_with("the point drives into the eye socket", Incapacitated)
        }
        (Head, Piercing, Gruesome) => fatal("the point punches through the skull", false),
        (Head, Bludgeoning, Light) => wound("a ringing blow to the {loc}"),
        (Head, Bludgeoning, Serious) => wound_with("the blow leaves its target dazed", Staggered),
        (Head, Bludgeoning, Critical) => wound_with("the skull cracks under the blow", Unconscious),
        (Head, Bludgeoning, Gruesome) => fatal("the skull is crushed like an egg", false),

        (Neck, Slashing, Light) => wound("a nick along the {loc}"),
        (Neck, Slashing, Serious) => wound("a cut opens the side of the {loc}"),
        (Neck, Slashing, Critical) => wound_with("the throat is laid open", Incapacitated),
        (Neck, Slashing, Gruesome) => fatal("the head is severed from the body", true),
        (Neck, Piercing, Light) => wound("a graze to the {loc}"),
        (Neck, Piercing, Serious) => wound("the point sinks into the {loc}"),
        (Neck, Piercing, Critical) => wound_with("the windpipe is pierced", Incapacitated),
        (Neck, Piercing, Gruesome) => fatal("the point passes clean through the {loc}", false),
        (Neck, Bludgeoning, Light) => wound("a jarring blow to the {loc}"),
        (Neck, Bludgeoning, Serious) => wound_with("the blow bruises the windpipe", Winded),
        (Neck, Bludgeoning, Critical) => wound_with("the neck wrenches sickeningly", Incapacitated),
        (Neck, Bludgeoning, Gruesome) => return None,

        (Torso, Slashing, Light) => wound("a shallow slash across the {loc}"),
        (Torso, Slashing, Serious) => wound("a long wound opens across the {loc}"),
        (Torso, Slashing, Critical) => {
            wound_with("the blade carves deep into the {loc}", Incapacitated)
        }
        (Torso, Slashing, Gruesome) => fatal("the {loc} is torn open", false),
        (Torso, Piercing, Light) => wound("a shallow stab to the {loc}"),
        (Torso, Piercing, Serious) => wound("the point sinks deep into the {loc}"),
        (Torso, Piercing, Critical) => {
            wound_with("the point punctures something vital in the {loc}", Incapacitated)
        }
        (Torso, Piercing, Gruesome) => fatal("the {loc} is run through", false),
        (Torso, Bludgeoning, Light) => wound("a thudding blow to the {loc}"),
        (Torso, Bludgeoning, Serious) => wound_with("ribs crack under the blow", Winded),
        (Torso, Bludgeoning, Critical) => wound_with("the blow caves in the {loc}", Incapacitated),
        (Torso, Bludgeoning, Gruesome) => return None,

        (Limb, Slashing, Light) => wound("a cut across the {loc}"),
        (Limb, Slashing, Serious) => wound("a deep gash opens the {loc}"),
        (Limb, Slashing, Critical) => wound("the {loc} is hacked to the bone"),
        (Limb, Slashing, Gruesome) => severing("the {loc} is lopped off"),
        (Limb, Piercing, Light) => wound("a puncture to the {loc}"),
        (Limb, Piercing, Serious) => wound("the point skewers the {loc}"),
        (Limb, Piercing, Critical) => wound("the point grinds against bone in the {loc}"),
        (Limb, Piercing, Gruesome) => {
            wound_with("the {loc} is pinned through and shattered", Incapacitated)
        }
        (Limb, Bludgeoning, Light) => wound("a bruising blow to the {loc}"),
        (Limb, Bludgeoning, Serious) => wound("the {loc} goes numb"),
        (Limb, Bludgeoning, Critical) => wound("the bone in the {loc} snaps"),
        (Limb, Bludgeoning, Gruesome) => return None,

        (Extremity, Slashing, Light) => wound("a nick to the {loc}"),
        (Extremity, Slashing, Serious) => wound("a deep cut across the {loc}"),
        (Extremity, Slashing, Critical) => wound("the {loc} is nearly severed"),
        (Extremity, Slashing, Gruesome) => severing("the {loc} is cut clean off"),
        (Extremity, Piercing, Light) => wound("a jab to the {loc}"),
        (Extremity, Piercing, Serious) => wound("the point pierces the {loc}"),
        (Extremity, Piercing, Critical) => wound("the {loc} is nailed through"),
        (Extremity, Piercing, Gruesome) => return None,
        (Extremity, Bludgeoning, Light) => wound("a rap across the {loc}"),
        (Extremity, Bludgeoning, Serious) => wound("small bones in the {loc} crack"),
        (Extremity, Bludgeoning, Critical) => wound("the {loc} is mangled"),
        (Extremity, Bludgeoning, Gruesome) => return None,
    };
    Some(entry)
}

/// Table lookup that falls back one tier at a time until an entry exists.
pub fn injury_with_fallback(
    region: BodyRegion,
    damage_type: DamageType,
    severity: Severity,
) -> Option<(Severity, InjuryEntry)> {
    let mut tier = Some(severity);
    while let Some(current) = tier {
        if let Some(entry) = injury(region, damage_type, current) {
            return Some((current, entry));
        }
        tier = current.lower();
    }
    None
}
