//! Attack roll stage.
//!
//! Builds the to-hit formula, rolls it against the target's AC and, on a
//! miss, works out why the blow failed: a clean miss, a dodge, a parry or a
//! deflection off armor. Riposting defenders are checked before any of
//! those. Fumbles are checked independently of the miss reason.

use crate::config::CombatConfig;
use crate::dice::{percent_check, roll_d20, DiceExpression, DiceRoller, PercentRoll, RollResult};
use crate::items::{EquipState, Hand, Item, ItemId, WeaponTags};
use crate::outcome::Effect;
use crate::resolver::{ArmorStack, Defense, EffectiveWeapon, ResolveError};
use crate::tables::{aim_penalty, stance_modifiers, AimArea, StanceStyle};
use crate::world::{Ability, Combatant, CombatantId, Condition, Immunities};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Per-attack choices made by the attacker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOptions {
    pub aim: AimArea,
    /// Distance to the target for missile attacks.
    pub distance: Option<u32>,
    /// Extra to-hit formula, e.g. `"+2"` or `"1d4"`.
    pub ad_hoc_modifier: Option<String>,
    /// Ask for an ad-hoc modifier before attacking.
    pub prompt_for_modifier: bool,
}

impl AttackOptions {
    pub fn aimed(aim: AimArea) -> Self {
        Self {
            aim,
            ..Self::default()
        }
    }

    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.ad_hoc_modifier = Some(modifier.into());
        self
    }

    pub fn with_prompt(mut self) -> Self {
        self.prompt_for_modifier = true;
        self
    }
}

/// Circumstances around one attack that are not part of either combatant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    /// Attacker is fighting with a weapon in each hand.
    pub two_weapon_fighting: bool,
    /// Combatants close enough to be struck by a fumbled blow.
    pub bystanders: Vec<CombatantId>,
}

/// Check an ad-hoc modifier before it reaches the engine.
pub fn validate_modifier(formula: &str) -> Result<DiceExpression, ResolveError> {
    Ok(DiceExpression::parse(formula)?)
}

// ============================================================================
// Modifiers
// ============================================================================

/// One labelled contribution to the to-hit formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierTerm {
    pub label: String,
    pub formula: String,
}

impl ModifierTerm {
    fn flat(label: &str, value: i32) -> Option<Self> {
        (value != 0).then(|| Self {
            label: label.to_string(),
            formula: value.to_string(),
        })
    }
}

/// Every situational to-hit modifier, in formula order. Zero terms are omitted.
pub fn modifier_terms(
    attacker: &Combatant,
    target: &Combatant,
    weapon: &EffectiveWeapon,
    options: &AttackOptions,
    situation: &Situation,
    config: &CombatConfig,
) -> Vec<ModifierTerm> {
    let two_weapon = if situation.two_weapon_fighting && !weapon.two_handed {
        match weapon.hand {
            Hand::Main => config.two_weapon_primary_penalty,
            Hand::Off => config.two_weapon_offhand_penalty,
        }
    } else {
        0
    };

    let range = match (weapon.form().is_missile(), options.distance, weapon.range) {
        (true, Some(distance), Some(range)) if range > 0 => {
            (distance.saturating_sub(1) / range) as i32 * config.range_increment_penalty
        }
        _ => 0,
    };

    let mut terms: Vec<ModifierTerm> = [
        ModifierTerm::flat("base attack", attacker.base_attack),
        ModifierTerm::flat(
            weapon.mode.attack_ability.abbreviation(),
            attacker.ability_modifier(weapon.mode.attack_ability),
        ),
        ModifierTerm::flat("two weapons", two_weapon),
        ModifierTerm::flat("size", attacker.size.steps_to(target.size)),
        ModifierTerm::flat(
            "unfamiliar",
            if weapon.proficient {
                0
            } else {
                config.unfamiliar_penalty
            },
        ),
        ModifierTerm::flat("range", range),
        ModifierTerm::flat("aim", aim_penalty(options.aim)),
        ModifierTerm::flat("stance", stance_modifiers(attacker.stance).to_hit),
        ModifierTerm::flat("bonus vs", weapon.group_bonus(target)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if let Some(extra) = options.ad_hoc_modifier.as_deref() {
        let extra = extra.trim();
        if !extra.is_empty() {
            terms.push(ModifierTerm {
                label: "situational".to_string(),
                formula: extra.to_string(),
            });
        }
    }
    terms
}

/// Join terms into one formula. An empty list is `"0"`.
pub fn join_formula(terms: &[ModifierTerm]) -> String {
    let mut formula = String::new();
    for term in terms {
        let text = term.formula.trim();
        match text.strip_prefix('+') {
            Some(rest) if formula.is_empty() => formula.push_str(rest),
            Some(_) => formula.push_str(text),
            None if formula.is_empty() || text.starts_with('-') => formula.push_str(text),
            None => {
                formula.push('+');
                formula.push_str(text);
            }
        }
    }
    if formula.is_empty() {
        formula.push('0');
    }
    formula
}

// ============================================================================
// The roll
// ============================================================================

/// Raw dice of an attack, before the target's AC is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttack {
    pub natural: u32,
    pub modifiers: RollResult,
}

/// Draw the d20 and then the modifier formula's dice.
pub fn roll_attack<R: DiceRoller + ?Sized>(
    roller: &mut R,
    formula: &str,
) -> Result<RawAttack, ResolveError> {
    let expression = DiceExpression::parse(formula)?;
    let natural = roll_d20(roller);
    let modifiers = expression.roll_with(roller);
    trace!(natural, formula, modifier = modifiers.total, "attack dice");
    Ok(RawAttack { natural, modifiers })
}

/// An attack roll compared against AC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub natural: u32,
    pub formula: String,
    pub modifier: i32,
    /// Natural plus modifier, raised to the AC on a natural 20.
    pub total: i32,
    pub ac: i32,
    pub hit: bool,
}

impl AttackRoll {
    /// How far the total cleared the AC (on a hit) or fell short (on a miss).
    pub fn margin(&self) -> i32 {
        if self.hit {
            self.total - self.ac
        } else {
            self.ac - self.total
        }
    }

    pub fn is_natural_20(&self) -> bool {
        self.natural == 20
    }

    pub fn is_natural_1(&self) -> bool {
        self.natural == 1
    }
}

pub fn compare(raw: &RawAttack, ac: i32) -> AttackRoll {
    let mut total = raw.natural as i32 + raw.modifiers.total;
    if raw.natural == 20 {
        total = total.max(ac);
    }
    let hit = raw.natural != 1 && total >= ac;
    AttackRoll {
        natural: raw.natural,
        formula: raw.modifiers.formula.clone(),
        modifier: raw.modifiers.total,
        total,
        ac,
        hit,
    }
}

// ============================================================================
// Fumbles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FumbleConsequence {
    Fall,
    Drop { item: ItemId },
    SelfHit { damage: i32 },
    StrikeBystander { bystander: CombatantId, damage: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fumble {
    pub check: PercentRoll,
    pub consequence: FumbleConsequence,
}

/// Fumble chance for a roll, or `None` if no check is made.
pub fn fumble_chance(
    attacker: &Combatant,
    weapon: &EffectiveWeapon,
    roll: &AttackRoll,
    config: &CombatConfig,
) -> Option<i32> {
    if attacker.immunities.contains(Immunities::FUMBLE) {
        return None;
    }
    let miss_margin = if roll.hit { 0 } else { roll.margin() };
    if !roll.is_natural_1() && miss_margin < config.fumble_margin {
        return None;
    }
    let factor = if weapon.has(WeaponTags::UNWIELDY) {
        config.unwieldy_impact_factor
    } else {
        1
    };
    Some(miss_margin.max(0) + weapon.impact * factor)
}

/// Check for a fumble and pick its consequence.
///
/// Draws one d100; on a fumble, one die sized to the summed consequence
/// weights, then the weapon's damage dice for a self-hit or bystander strike.
pub fn check_fumble<R: DiceRoller + ?Sized>(
    roller: &mut R,
    attacker: &Combatant,
    weapon: &EffectiveWeapon,
    roll: &AttackRoll,
    situation: &Situation,
    config: &CombatConfig,
    effects: &mut Vec<Effect>,
) -> Option<Fumble> {
    let chance = fumble_chance(attacker, weapon, roll, config)?;
    let check = percent_check(roller, chance);
    if !check.success {
        return None;
    }

    #[derive(Clone, Copy)]
    enum Pick {
        Fall,
        Drop,
        SelfHit,
        Bystander,
    }
    let mut options: Vec<(Pick, u32)> = Vec::with_capacity(4);
    if !attacker.has_condition(Condition::Prone) {
        options.push((Pick::Fall, 2));
    }
    if attacker.held_items().next().is_some() {
        options.push((Pick::Drop, 3));
    }
    options.push((Pick::SelfHit, 1));
    let bystander = situation.bystanders.first().copied();
    if bystander.is_some() {
        options.push((Pick::Bystander, 2));
    }

    let total: u32 = options.iter().map(|(_, w)| w).sum();
    let mut pick_roll = roller.roll_die(total).clamp(1, total);
    let mut pick = Pick::SelfHit;
    for (option, weight) in &options {
        if pick_roll <= *weight {
            pick = *option;
            break;
        }
        pick_roll -= weight;
    }

    let consequence = match (pick, bystander) {
        (Pick::Fall, _) => {
            effects.push(Effect::ConditionApplied {
                target: attacker.id,
                condition: Condition::Prone,
                source: "fumble".to_string(),
            });
            FumbleConsequence::Fall
        }
        (Pick::Drop, _) => {
            effects.push(Effect::EquipChanged {
                owner: attacker.id,
                item: weapon.item,
                state: EquipState::Dropped,
            });
            FumbleConsequence::Drop { item: weapon.item }
        }
        (Pick::Bystander, Some(bystander)) => {
            let damage = weapon.damage.roll_with(roller).total.max(1);
            effects.push(Effect::HpChanged {
                target: bystander,
                amount: -damage,
            });
            FumbleConsequence::StrikeBystander { bystander, damage }
        }
        (Pick::SelfHit | Pick::Bystander, _) => {
            let damage = weapon.damage.roll_with(roller).total.max(1);
            effects.push(Effect::HpChanged {
                target: attacker.id,
                amount: -damage,
            });
            FumbleConsequence::SelfHit { damage }
        }
    };
    debug!(attacker = %attacker.name, chance, ?consequence, "fumble");
    Some(Fumble { check, consequence })
}

// ============================================================================
// Misses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissReason {
    CleanMiss,
    Dodged,
    Parried { item: Option<ItemId> },
    Deflected { layer: Option<ItemId> },
    /// A riposting or fluid-guard defender turned the blow.
    Countered,
}

/// Wear caused by a parried or deflected blow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakage {
    pub owner: CombatantId,
    pub item: ItemId,
    pub name: String,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissDetail {
    pub reason: MissReason,
    /// The defender earned a counter attack.
    pub counter: bool,
    pub breakage: Option<Breakage>,
}

fn can_counter(defender: &Combatant) -> bool {
    !defender.is_helpless() && defender.first_weapon().is_some()
}

/// Explain a miss.
///
/// Draw order: at most one counter d100 (stance counters take precedence
/// over a dodge counter), then at most one breakage d100 for a parry or
/// deflection.
#[allow(clippy::too_many_arguments)]
pub fn classify_miss<R: DiceRoller + ?Sized>(
    roller: &mut R,
    attacker: &Combatant,
    target: &Combatant,
    weapon: &EffectiveWeapon,
    roll: &AttackRoll,
    defense: &Defense,
    stack: &ArmorStack,
    effects: &mut Vec<Effect>,
) -> MissDetail {
    let margin = roll.margin();
    let total = roll.total;

    let stance_chance = match target.stance.style {
        StanceStyle::Riposte => Some(5 * margin),
        StanceStyle::FluidGuard => Some(3 * margin),
        _ => None,
    };
    let mut counter_rolled = false;
    if let Some(chance) = stance_chance {
        if total < defense.parry_threshold() && can_counter(target) {
            counter_rolled = true;
            if percent_check(roller, chance).success {
                debug!(defender = %target.name, chance, "stance counter");
                return MissDetail {
                    reason: MissReason::Countered,
                    counter: true,
                    breakage: None,
                };
            }
        }
    }

    if total < defense.clean_miss_threshold() {
        return MissDetail {
            reason: MissReason::CleanMiss,
            counter: false,
            breakage: None,
        };
    }

    if total < defense.unarmored_ac {
        let mut counter = false;
        if !counter_rolled && can_counter(target) {
            let dex = target.ability_modifier(Ability::Dexterity);
            counter = percent_check(roller, 10 + 5 * dex).success;
        }
        return MissDetail {
            reason: MissReason::Dodged,
            counter,
            breakage: None,
        };
    }

    let weapon_fragile = weapon.has(WeaponTags::FRAGILE);
    let attacker_weapon = attacker.item(weapon.item);

    if total < defense.parry_threshold() {
        let parry_item = defense.parry_item.and_then(|id| target.item(id));
        let parry_fragile = parry_item
            .and_then(|i| i.weapon.as_ref())
            .is_some_and(|w| w.tags.contains(WeaponTags::FRAGILE));
        let victim = if weapon_fragile {
            attacker_weapon.map(|i| (attacker.id, i))
        } else {
            parry_item.map(|i| (target.id, i))
        };
        let chance = weapon.impact * 5 * if weapon_fragile || parry_fragile { 2 } else { 1 };
        let breakage = check_breakage(roller, victim, chance, effects);
        return MissDetail {
            reason: MissReason::Parried {
                item: defense.parry_item,
            },
            counter: false,
            breakage,
        };
    }

    let outer = stack.iter().find(|l| l.ac > 0);
    let victim = if weapon_fragile {
        attacker_weapon.map(|i| (attacker.id, i))
    } else {
        outer
            .and_then(|l| target.item(l.item))
            .map(|i| (target.id, i))
    };
    let chance = weapon.impact * 5 * if weapon_fragile { 2 } else { 1 };
    let breakage = check_breakage(roller, victim, chance, effects);
    MissDetail {
        reason: MissReason::Deflected {
            layer: outer.map(|l| l.item),
        },
        counter: false,
        breakage,
    }
}

/// Fragile items shatter; anything else loses one point of integrity.
/// No draw is made when there is nothing breakable.
fn check_breakage<R: DiceRoller + ?Sized>(
    roller: &mut R,
    victim: Option<(CombatantId, &Item)>,
    chance: i32,
    effects: &mut Vec<Effect>,
) -> Option<Breakage> {
    let (owner, item) = victim?;
    let integrity = item.integrity?;
    if integrity <= 0 || !percent_check(roller, chance).success {
        return None;
    }

    let fragile = item
        .weapon
        .as_ref()
        .is_some_and(|w| w.tags.contains(WeaponTags::FRAGILE));
    let loss = if fragile { integrity } else { 1 };
    effects.push(Effect::IntegrityChanged {
        owner,
        item: item.id,
        delta: -loss,
    });
    let destroyed = integrity - loss <= 0;
    debug!(item = %item.name, destroyed, "breakage");
    Some(Breakage {
        owner,
        item: item.id,
        name: item.name.clone(),
        destroyed,
    })
}
