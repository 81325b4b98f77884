//! Hit resolution stage.
//!
//! Runs once the attack roll has landed. Steps, in order, with the draws
//! each makes:
//!
//! 1. armor walk: one d100 per layer until one blocks;
//! 2. skillful hit d100, then critical hit d100 (skipped for targets immune
//!    to criticals); a skillful piercing blow resumes the walk past bulky
//!    layers;
//! 3. impale d100, then per depth step either a free layer or a flesh step
//!    (weapon dice) followed by a d100 to go deeper;
//! 4. dent d100 if a layer still blocks;
//! 5. knockdown d100, plus a d100 for the severity when nothing is disarmed;
//! 6. bleed d100;
//! 7. weapon damage dice.
//!
//! Checks gated off by immunity or eligibility draw nothing.

use crate::attack::AttackRoll;
use crate::config::CombatConfig;
use crate::dice::{percent_check, DiceRoller, RollMode};
use crate::items::{EquipState, ItemId};
use crate::outcome::Effect;
use crate::resolver::{ArmorStack, EffectiveWeapon};
use crate::tables::{
    injury_with_fallback, stance_modifiers, BodyRegion, DamageType, HitLocation, LocationProfile,
    Severity, UNLOCATED_PROFILE,
};
use crate::world::{Combatant, Condition, Immunities, SizeCategory};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerOutcome {
    Penetrated,
    Blocked,
    /// Skipped by a skillful piercing blow.
    Bypassed,
    /// Pushed through by an impaling blow.
    Consumed,
}

/// What happened at one armor layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerResult {
    pub item: ItemId,
    pub name: String,
    pub outcome: LayerOutcome,
    /// Penetration chance, if a roll was made.
    pub chance: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dent {
    pub item: ItemId,
    pub name: String,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impale {
    /// Flesh steps reached.
    pub depth: u32,
    pub extra_damage: i32,
    pub lodged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Knockdown {
    Disarmed { item: ItemId, name: String },
    Flying,
    Down,
    Winded,
    Staggered,
}

impl Knockdown {
    /// Whether the attacker's remaining attacks are cancelled.
    pub fn is_heavy(&self) -> bool {
        matches!(self, Knockdown::Flying | Knockdown::Down)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bleed {
    Minor,
    Major,
}

/// Every term of the damage total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageBreakdown {
    pub weapon: i32,
    pub ability: i32,
    pub stance: i32,
    pub group: i32,
    pub critical: i32,
    pub impale: i32,
    pub dr: i32,
    /// Sum of the above less DR, at least 1.
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injury {
    pub severity: Severity,
    pub text: String,
    pub condition: Option<Condition>,
    pub removal: bool,
    pub fatal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDetail {
    pub location: Option<HitLocation>,
    pub layers: Vec<LayerResult>,
    pub blocked_by: Option<String>,
    pub dent: Option<Dent>,
    pub skillful: bool,
    pub critical: bool,
    pub impale: Option<Impale>,
    /// Damage counted as bludgeoning for DR against a blunting layer.
    pub converted: bool,
    /// The weapon's damage type. Conversion never changes it.
    pub damage_type: DamageType,
    pub knockdown: Option<Knockdown>,
    pub bleed: Option<Bleed>,
    pub damage: DamageBreakdown,
    pub severity: Severity,
    pub injury: Option<Injury>,
    pub killed: bool,
}

impl HitDetail {
    pub fn lodged(&self) -> bool {
        self.impale.as_ref().is_some_and(|i| i.lodged)
    }
}

/// Walk state over a snapshotted stack.
struct Walk<'a> {
    stack: &'a ArmorStack,
    results: Vec<LayerResult>,
    /// Index of the layer currently stopping the blow.
    blocked: Option<usize>,
    prior_dr: i32,
}

impl<'a> Walk<'a> {
    fn new(stack: &'a ArmorStack) -> Self {
        Self {
            stack,
            results: Vec::with_capacity(stack.len()),
            blocked: None,
            prior_dr: 0,
        }
    }

    fn record(&mut self, index: usize, outcome: LayerOutcome, chance: Option<i32>) {
        let stack = self.stack;
        let layer = &stack[index];
        self.results.push(LayerResult {
            item: layer.item,
            name: layer.name.clone(),
            outcome,
            chance,
        });
    }

    /// Roll through layers starting at `from`, optionally skipping bulky ones.
    fn roll_from<R: DiceRoller + ?Sized>(
        &mut self,
        roller: &mut R,
        from: usize,
        weapon: &EffectiveWeapon,
        config: &CombatConfig,
        skip_bulky: bool,
    ) {
        self.blocked = None;
        let stack = self.stack;
        for index in from..stack.len() {
            let layer = &stack[index];
            if skip_bulky && layer.is_bulky() {
                self.record(index, LayerOutcome::Bypassed, None);
                continue;
            }
            let chance = config.base_impale_chance
                + weapon.penetration * config.penetration_per_point
                - (layer.ac + self.prior_dr) * config.armor_ac_weight;
            let check = percent_check(roller, chance);
            trace!(layer = %layer.name, chance, roll = check.roll, "penetration");
            if check.success {
                self.prior_dr += layer.dr;
                self.record(index, LayerOutcome::Penetrated, Some(chance));
            } else {
                self.record(index, LayerOutcome::Blocked, Some(chance));
                self.blocked = Some(index);
                return;
            }
        }
    }

    /// Push through the blocking layer without a roll.
    fn consume_blocking(&mut self) -> bool {
        let Some(index) = self.blocked else {
            return false;
        };
        let item = self.stack[index].item;
        if let Some(result) = self.results.iter_mut().rev().find(|r| r.item == item) {
            result.outcome = LayerOutcome::Consumed;
        }
        self.prior_dr += self.stack[index].dr;
        let next = index + 1;
        self.blocked = if next < self.stack.len() {
            self.record(next, LayerOutcome::Blocked, None);
            Some(next)
        } else {
            None
        };
        true
    }

    /// DR of every layer that took part and was not bypassed.
    fn total_dr(&self, converted: bool) -> i32 {
        self.results
            .iter()
            .filter(|r| r.outcome != LayerOutcome::Bypassed)
            .filter_map(|r| self.stack.iter().find(|l| l.item == r.item))
            .map(|l| if converted { l.blunt_dr } else { l.dr })
            .sum()
    }
}

/// Resolve a landed blow. `stack` and `location` are the snapshot taken for
/// the attack roll.
#[allow(clippy::too_many_arguments)]
pub fn resolve_hit<R: DiceRoller + ?Sized>(
    roller: &mut R,
    attacker: &Combatant,
    target: &Combatant,
    weapon: &EffectiveWeapon,
    roll: &AttackRoll,
    location: Option<HitLocation>,
    stack: &ArmorStack,
    config: &CombatConfig,
    effects: &mut Vec<Effect>,
) -> HitDetail {
    let profile: LocationProfile = location.map(|l| l.profile()).unwrap_or(UNLOCATED_PROFILE);
    let damage_type = weapon.damage_type();
    let margin = roll.margin();

    let mut walk = Walk::new(stack);
    walk.roll_from(roller, 0, weapon, config, false);

    let (skillful, critical) = if target.immunities.contains(Immunities::CRITICAL) {
        (false, false)
    } else {
        let skillful = percent_check(roller, 3 * margin + (10 - weapon.speed)).success;
        let bonus = if roll.is_natural_20() { 20 } else { 0 };
        let critical = percent_check(roller, margin * profile.critical_multiplier + bonus).success;
        (skillful, critical)
    };

    if skillful && damage_type == DamageType::Piercing {
        if let Some(index) = walk.blocked.filter(|&i| stack[i].is_bulky()) {
            walk.results.pop();
            walk.record(index, LayerOutcome::Bypassed, None);
            walk.roll_from(roller, index + 1, weapon, config, true);
        }
    }

    let impale = if damage_type == DamageType::Piercing
        && weapon.size >= SizeCategory::Small
        && !target.immunities.contains(Immunities::IMPALE)
    {
        let chance = 20 + 5 * weapon.penetration;
        if percent_check(roller, chance).success {
            Some(drive_impale(roller, &mut walk, weapon, chance, profile))
        } else {
            None
        }
    } else {
        None
    };

    let mut dent = None;
    if let Some(index) = walk.blocked {
        let layer = &stack[index];
        if let Some(integrity) = layer.integrity.filter(|i| *i > 0) {
            if percent_check(roller, weapon.impact * 10).success {
                effects.push(Effect::IntegrityChanged {
                    owner: target.id,
                    item: layer.item,
                    delta: -1,
                });
                dent = Some(Dent {
                    item: layer.item,
                    name: layer.name.clone(),
                    destroyed: integrity <= 1,
                });
            }
        }
    }

    let converted = walk.blocked.is_some_and(|index| {
        let layer = &stack[index];
        let intact = !dent.as_ref().is_some_and(|d| d.destroyed);
        intact
            && ((layer.is_metal() && damage_type != DamageType::Bludgeoning)
                || (layer.is_bulky() && damage_type == DamageType::Piercing))
    });
    let dr = walk.total_dr(converted);

    let knockdown =
        check_knockdown(roller, attacker, target, weapon, location, profile, config, effects);

    let lodged = impale.as_ref().is_some_and(|i| i.lodged);
    let bleed = if !target.immunities.contains(Immunities::BLEED)
        && !converted
        && (damage_type == DamageType::Slashing || impale.is_some())
    {
        let multiplier = if profile.easy_bleed { 2 } else { 1 };
        let chance = (weapon.bleed * config.bleed_per_point - 10 * dr) * multiplier;
        percent_check(roller, chance).success.then(|| {
            let (bleed, condition) = if profile.easy_bleed || lodged {
                (Bleed::Major, Condition::BleedingHeavily)
            } else {
                (Bleed::Minor, Condition::Bleeding)
            };
            effects.push(Effect::ConditionApplied {
                target: target.id,
                condition,
                source: weapon.name.clone(),
            });
            bleed
        })
    } else {
        None
    };

    let weapon_roll = weapon.damage.roll_mode(roller, RollMode::Normal).total;
    let mut damage = DamageBreakdown {
        weapon: weapon_roll,
        ability: weapon
            .damage_ability()
            .map(|a| attacker.ability_modifier(a))
            .unwrap_or(0),
        stance: stance_modifiers(attacker.stance).damage,
        group: weapon.group_bonus(target),
        critical: if critical {
            weapon.max_damage + profile.critical_bonus
        } else {
            0
        },
        impale: impale.as_ref().map(|i| i.extra_damage).unwrap_or(0),
        dr,
        total: 0,
    };
    damage.total = (damage.weapon + damage.ability + damage.stance + damage.group + damage.critical
        + damage.impale
        - dr)
        .max(1);

    let remaining = target.hit_points.current;
    let severity = severity(weapon_roll - dr, damage.total, remaining, target.hit_points.maximum);
    effects.push(Effect::HpChanged {
        target: target.id,
        amount: -damage.total,
    });

    let region = location.map(|l| l.region()).unwrap_or(BodyRegion::Torso);
    let injury = injury_with_fallback(region, damage_type, severity).map(|(tier, entry)| {
        let place = location.map(|l| l.name()).unwrap_or("body");
        if let Some(condition) = entry.condition {
            effects.push(Effect::ConditionApplied {
                target: target.id,
                condition,
                source: weapon.name.clone(),
            });
        }
        if entry.removal {
            if let Some(location) = location {
                effects.push(Effect::LocationSevered {
                    target: target.id,
                    location,
                });
                if let Some(item) = location.hand().and_then(|hand| target.held_in(hand)) {
                    effects.push(Effect::EquipChanged {
                        owner: target.id,
                        item: item.id,
                        state: EquipState::Dropped,
                    });
                }
            }
        }
        Injury {
            severity: tier,
            text: entry.text.replace("{loc}", place),
            condition: entry.condition,
            removal: entry.removal && location.is_some(),
            fatal: entry.fatal,
        }
    });

    let fatal = injury.as_ref().is_some_and(|i| i.fatal);
    let killed = fatal || target.hit_points.current - damage.total <= config.death_threshold;
    if killed {
        effects.push(Effect::ConditionApplied {
            target: target.id,
            condition: Condition::Dead,
            source: weapon.name.clone(),
        });
    }

    debug!(
        target = %target.name,
        ?location,
        damage = damage.total,
        dr,
        ?severity,
        skillful,
        critical,
        converted,
        killed,
        "hit resolved"
    );

    HitDetail {
        location,
        blocked_by: walk.blocked.map(|i| stack[i].name.clone()),
        layers: walk.results,
        dent,
        skillful,
        critical,
        impale,
        converted,
        damage_type,
        knockdown,
        bleed,
        damage,
        severity,
        injury,
        killed,
    }
}

fn drive_impale<R: DiceRoller + ?Sized>(
    roller: &mut R,
    walk: &mut Walk<'_>,
    weapon: &EffectiveWeapon,
    chance: i32,
    profile: LocationProfile,
) -> Impale {
    let mut impale = Impale {
        depth: 0,
        extra_damage: 0,
        lodged: false,
    };
    loop {
        if !walk.consume_blocking() {
            impale.depth += 1;
            impale.extra_damage += weapon.damage.roll_with(roller).total.max(0);
            if impale.depth >= profile.max_impale_depth {
                impale.lodged = true;
                break;
            }
        }
        if !percent_check(roller, chance).success {
            break;
        }
    }
    trace!(depth = impale.depth, lodged = impale.lodged, "impale");
    impale
}

#[allow(clippy::too_many_arguments)]
fn check_knockdown<R: DiceRoller + ?Sized>(
    roller: &mut R,
    attacker: &Combatant,
    target: &Combatant,
    weapon: &EffectiveWeapon,
    location: Option<HitLocation>,
    profile: LocationProfile,
    config: &CombatConfig,
    effects: &mut Vec<Effect>,
) -> Option<Knockdown> {
    if target.immunities.contains(Immunities::KNOCKDOWN) || target.has_condition(Condition::Prone) {
        return None;
    }
    let doubled = if profile.knockdown_doubled { 2 } else { 1 };
    let chance = weapon.impact * config.knockdown_per_impact * doubled
        - 10 * SizeCategory::Medium.steps_to(target.size);
    if !percent_check(roller, chance).success {
        return None;
    }

    let disarm = location.and_then(|location| {
        if location == HitLocation::Head {
            if let Some(helmet) = target.helmet() {
                return Some(helmet);
            }
        }
        if profile.shield_side {
            if let Some(shield) = target.held_shield() {
                return Some(shield);
            }
        }
        if profile.bilateral {
            return location.hand().and_then(|hand| target.held_in(hand));
        }
        None
    });
    if let Some(item) = disarm {
        effects.push(Effect::EquipChanged {
            owner: target.id,
            item: item.id,
            state: EquipState::Dropped,
        });
        return Some(Knockdown::Disarmed {
            item: item.id,
            name: item.name.clone(),
        });
    }

    let diff = target.size.steps_to(attacker.size);
    let severity = percent_check(roller, 100);
    let result = if severity.roll as i32 <= 10 + 20 * diff {
        Knockdown::Flying
    } else if severity.roll as i32 <= 40 + 20 * diff {
        Knockdown::Down
    } else if location.map(|l| l.region()).unwrap_or(BodyRegion::Torso) == BodyRegion::Torso {
        Knockdown::Winded
    } else {
        Knockdown::Staggered
    };
    let condition = match result {
        Knockdown::Flying | Knockdown::Down => Condition::Prone,
        Knockdown::Winded => Condition::Winded,
        _ => Condition::Staggered,
    };
    effects.push(Effect::ConditionApplied {
        target: target.id,
        condition,
        source: "knockdown".to_string(),
    });
    Some(result)
}

/// Pick an injury severity from the net weapon damage and the overflow past
/// the target's remaining HP.
pub fn severity(net_weapon: i32, damage: i32, remaining_hp: i32, max_hp: i32) -> Severity {
    let percent = if max_hp > 0 {
        net_weapon.max(0) * 100 / max_hp
    } else {
        100
    };
    let by_weapon = match percent {
        p if p >= 75 => Severity::Gruesome,
        p if p >= 50 => Severity::Critical,
        p if p >= 25 => Severity::Serious,
        _ => Severity::Light,
    };
    let by_overflow = match damage - remaining_hp {
        o if o < 0 => Severity::Light,
        0 => Severity::Serious,
        1 | 2 => Severity::Critical,
        _ => Severity::Gruesome,
    };

    if by_weapon == Severity::Gruesome
        && by_overflow == Severity::Gruesome
        && damage >= remaining_hp
    {
        Severity::Gruesome
    } else {
        by_weapon.max(by_overflow).min(Severity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::{compare, RawAttack};
    use crate::dice::DiceExpression;
    use crate::items::{self, Hand, Item, WeaponItem};
    use crate::resolver::{armor_stack, resolve_weapon, WeaponSelection};
    use crate::testing::ScriptedDice;
    use crate::world::{apply_to_combatant, Combatant};

    fn hit_roll(natural: u32, ac: i32) -> AttackRoll {
        let mut none = ScriptedDice::default();
        let raw = RawAttack {
            natural,
            modifiers: DiceExpression::constant(0).roll_with(&mut none),
        };
        compare(&raw, ac)
    }

    fn armed(item: Item) -> (Combatant, EffectiveWeapon) {
        let selection = WeaponSelection::new(item.id);
        let attacker = Combatant::new("Attacker", 20).with_item(item);
        let weapon = resolve_weapon(&attacker, &selection).unwrap();
        (attacker, weapon)
    }

    #[test]
    fn test_zero_penetration_against_ac_5() {
        let config = CombatConfig::default();
        let (penetration, layer_ac, prior_dr) = (0, 5, 0);
        let chance = config.base_impale_chance + penetration * config.penetration_per_point
            - (layer_ac + prior_dr) * config.armor_ac_weight;
        assert_eq!(chance, config.base_impale_chance - 50);

        let blunt = Item::new("Club")
            .with_weapon(
                WeaponItem::new("1d6", "club", 5)
                    .with_reach(1)
                    .with_mode("swing:bludgeoning"),
            )
            .held(Hand::Main);
        let (attacker, weapon) = armed(blunt);
        let target = Combatant::new("Target", 20)
            .with_item(items::armor("Plate Cuirass").unwrap().worn())
            .with_immunities(Immunities::all());
        let stack =
            armor_stack(&target, Some(HitLocation::Chest), DamageType::Bludgeoning, &config);
        // Plate vs bludgeoning: AC 4. Chance 75 - 40 = 35; a 36 blocks.
        let mut dice = ScriptedDice::new([36, 100, 3]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 15),
            Some(HitLocation::Chest),
            &stack,
            &config,
            &mut effects,
        );
        assert_eq!(detail.layers[0].chance, Some(35));
        assert_eq!(detail.blocked_by.as_deref(), Some("Plate Cuirass"));
        assert_eq!(detail.damage.dr, 2);
        assert_eq!(detail.damage.total, 1);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_non_positive_chance_always_blocks() {
        let config = CombatConfig::default().with_base_impale_chance(40);
        let (attacker, weapon) = armed(items::weapon("Mace").unwrap().held(Hand::Main));
        let target = Combatant::new("Target", 20)
            .with_item(items::armor("Plate Cuirass").unwrap().worn())
            .with_immunities(Immunities::all());
        let stack =
            armor_stack(&target, Some(HitLocation::Chest), DamageType::Bludgeoning, &config);
        // Chance 40 - 40 = 0: even a roll of 1 is blocked.
        let mut dice = ScriptedDice::new([1, 100, 1]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 15),
            Some(HitLocation::Chest),
            &stack,
            &config,
            &mut effects,
        );
        assert_eq!(detail.layers[0].outcome, LayerOutcome::Blocked);
    }

    #[test]
    fn test_severity_tiers() {
        // 2 HP left, 5 damage, max 6: both tiers gruesome.
        assert_eq!(severity(5, 5, 2, 6), Severity::Gruesome);
        // Overflow alone cannot reach gruesome.
        assert_eq!(severity(1, 12, 2, 40), Severity::Critical);
        assert_eq!(severity(2, 2, 20, 20), Severity::Light);
        assert_eq!(severity(5, 5, 20, 20), Severity::Serious);
        assert_eq!(severity(4, 4, 4, 40), Severity::Serious);
    }

    #[test]
    fn test_gruesome_without_entry_falls_back() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Mace").unwrap().held(Hand::Main));
        let mut target = Combatant::new("Target", 6).with_immunities(Immunities::all());
        target.hit_points.current = 2;
        let stack = ArmorStack::new();
        // Mace 1d6+1: a 4 rolls 5 damage.
        let mut dice = ScriptedDice::new([4]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 15),
            Some(HitLocation::LeftArm),
            &stack,
            &config,
            &mut effects,
        );
        assert_eq!(detail.damage.total, 5);
        assert_eq!(detail.severity, Severity::Gruesome);
        let injury = detail.injury.unwrap();
        assert_eq!(injury.severity, Severity::Critical);
        assert_eq!(injury.text, "the bone in the left arm snaps");
        assert!(detail.killed);
    }

    #[test]
    fn test_critical_adds_maximum_and_location_bonus() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Long Sword").unwrap().held(Hand::Main));
        let target = Combatant::new("Target", 50)
            .with_immunities(Immunities::KNOCKDOWN | Immunities::BLEED);
        // skillful fails, critical succeeds (margin 5 x head multiplier 3 = 15), weapon rolls 3.
        let mut dice = ScriptedDice::new([100, 15, 3]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::Head),
            &ArmorStack::new(),
            &config,
            &mut effects,
        );
        assert!(detail.critical);
        assert_eq!(detail.damage.critical, 8 + 4);
        assert_eq!(detail.damage.total, 3 + 12);
    }

    #[test]
    fn test_skillful_thrust_bypasses_bulky_layer() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Short Sword").unwrap().held(Hand::Main));
        let target = Combatant::new("Target", 50)
            .with_item(items::armor("Plate Cuirass").unwrap().worn())
            .with_immunities(Immunities::KNOCKDOWN | Immunities::BLEED | Immunities::IMPALE);
        let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Piercing, &config);
        // Blocked (100), skillful (1), no critical (100), weapon 4.
        let mut dice = ScriptedDice::new([100, 1, 100, 4]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::Chest),
            &stack,
            &config,
            &mut effects,
        );
        assert!(detail.skillful);
        assert_eq!(detail.layers[0].outcome, LayerOutcome::Bypassed);
        assert!(detail.blocked_by.is_none());
        assert_eq!(detail.damage.dr, 0);
        assert_eq!(detail.damage.total, 4);
    }

    #[test]
    fn test_metal_layer_converts_slash_to_blunt() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Long Sword").unwrap().held(Hand::Main));
        let target = Combatant::new("Target", 50)
            .with_item(items::armor("Chain Shirt").unwrap().worn())
            .with_immunities(Immunities::CRITICAL | Immunities::KNOCKDOWN);
        let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Slashing, &config);
        // Blocked (100), no dent (100), weapon 6. Bleed is skipped after conversion.
        let mut dice = ScriptedDice::new([100, 100, 6]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::Chest),
            &stack,
            &config,
            &mut effects,
        );
        assert!(detail.converted);
        assert_eq!(detail.damage_type, DamageType::Slashing);
        // Chain blunt DR is 1 + 0.
        assert_eq!(detail.damage.dr, 1);
        assert!(detail.bleed.is_none());
        // The wound is still a cut.
        let injury = detail.injury.unwrap();
        assert_eq!(injury.severity, Severity::Light);
        assert_eq!(injury.text, "a shallow slash across the chest");
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_killed_follows_hit_points_after_the_blow() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Mace").unwrap().held(Hand::Main));
        let mut target = Combatant::new("Target", 10).with_immunities(Immunities::all());
        target.hit_points.current = 5;
        // Mace 1d6+1: a 3 leaves 1 HP, a 4 leaves 0.
        for (face, killed) in [(3, false), (4, true)] {
            let mut dice = ScriptedDice::new([face]);
            let mut effects = Vec::new();
            let detail = resolve_hit(
                &mut dice,
                &attacker,
                &target,
                &weapon,
                &hit_roll(15, 15),
                None,
                &ArmorStack::new(),
                &config,
                &mut effects,
            );
            assert_eq!(detail.killed, killed, "face {face}");
            let mut after = target.clone();
            for effect in &effects {
                apply_to_combatant(&mut after, effect);
            }
            assert_eq!(after.is_dead(config.death_threshold), killed, "face {face}");
        }
    }

    #[test]
    fn test_impale_lodges_at_location_depth() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Spear").unwrap().held_two_handed());
        let target = Combatant::new("Target", 80)
            .with_immunities(Immunities::CRITICAL | Immunities::KNOCKDOWN | Immunities::BLEED);
        // Impale (1), step one (2), deeper (1), step two (3) lodges at the arm's depth 2, weapon 4.
        let mut dice = ScriptedDice::new([1, 2, 1, 3, 4]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::RightArm),
            &ArmorStack::new(),
            &config,
            &mut effects,
        );
        let impale = detail.impale.clone().unwrap();
        assert!(impale.lodged);
        assert_eq!(impale.depth, 2);
        assert_eq!(impale.extra_damage, 5);
        assert_eq!(detail.damage.total, 4 + 5);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_knockdown_disarms_helmet() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Mace").unwrap().held(Hand::Main));
        let helm = items::armor("Steel Helm").unwrap().worn();
        let helm_id = helm.id;
        let target = Combatant::new("Target", 50)
            .with_item(helm)
            .with_immunities(Immunities::CRITICAL);
        let stack = armor_stack(&target, Some(HitLocation::Head), DamageType::Bludgeoning, &config);
        // Penetrate helm (1), knockdown (1), weapon 2.
        let mut dice = ScriptedDice::new([1, 1, 2]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::Head),
            &stack,
            &config,
            &mut effects,
        );
        assert_eq!(
            detail.knockdown,
            Some(Knockdown::Disarmed {
                item: helm_id,
                name: "Steel Helm".to_string()
            })
        );
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::EquipChanged { item, state: EquipState::Dropped, .. } if *item == helm_id
        )));
    }

    #[test]
    fn test_heavy_knockdown_applies_prone() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Mace").unwrap().held(Hand::Main));
        let target = Combatant::new("Target", 50).with_immunities(Immunities::CRITICAL);
        // Knockdown (1), severity 30 -> down, weapon 2.
        let mut dice = ScriptedDice::new([1, 30, 2]);
        let mut effects = Vec::new();
        let detail = resolve_hit(
            &mut dice,
            &attacker,
            &target,
            &weapon,
            &hit_roll(15, 10),
            Some(HitLocation::Chest),
            &ArmorStack::new(),
            &config,
            &mut effects,
        );
        assert_eq!(detail.knockdown, Some(Knockdown::Down));
        assert!(detail.knockdown.as_ref().unwrap().is_heavy());
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ConditionApplied { condition: Condition::Prone, .. }
        )));
    }

    #[test]
    fn test_damage_never_below_one() {
        let config = CombatConfig::default();
        let (attacker, weapon) = armed(items::weapon("Dagger").unwrap().held(Hand::Main));
        let attacker =
            attacker.with_abilities(crate::world::AbilityScores::new(3, 3, 10, 10, 10, 10));
        let target = Combatant::new("Target", 50).with_immunities(Immunities::all());
        for face in 1..=4 {
            let mut dice = ScriptedDice::new([face]);
            let mut effects = Vec::new();
            let detail = resolve_hit(
                &mut dice,
                &attacker,
                &target,
                &weapon,
                &hit_roll(15, 10),
                Some(HitLocation::Chest),
                &ArmorStack::new(),
                &config,
                &mut effects,
            );
            assert!(detail.damage.total >= 1);
        }
    }
}
