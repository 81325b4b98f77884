//! Properties that must hold for any sequence of random draws.
//!
//! Exchanges are driven by seeded ChaCha generators so failures can be
//! replayed from the seed.

use combat_core::items::{self, Hand};
use combat_core::resolver::armor_stack;
use combat_core::testing::{sample_archer, sample_fighter, sample_goblin, RecordingSink};
use combat_core::{
    AttackOptions, AttackerEntry, CombatConfig, Combatant, DamageType, Encounter, Exchange,
    HitLocation, NoPrompt, Orchestrator, RngRoller, WeaponSelection,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A heavily layered target holding a shield.
fn turtle() -> Combatant {
    Combatant::new("Turtle", 200)
        .with_item(items::armor("Gambeson").unwrap().worn())
        .with_item(items::armor("Leather Jerkin").unwrap().worn())
        .with_item(items::armor("Chain Shirt").unwrap().worn())
        .with_item(items::armor("Plate Cuirass").unwrap().worn())
        .with_item(items::armor("Hide Coat").unwrap().worn())
        .with_item(items::armor("Wooden Shield").unwrap().held(Hand::Off))
}

fn skirmish() -> (Encounter, Exchange) {
    let mut encounter = Encounter::new();
    let fighter = sample_fighter();
    let sword = fighter.first_weapon().unwrap().id;
    let archer = sample_archer();
    let bow = archer.first_weapon().unwrap().id;
    let goblin = sample_goblin();
    let dagger = goblin.first_weapon().unwrap().id;

    let fighter = encounter.add(fighter);
    let archer = encounter.add(archer);
    let goblin = encounter.add(goblin);
    let target = encounter.add(turtle());

    let exchange = Exchange::new(target)
        .with_attacker(
            AttackerEntry::new(fighter)
                .with_weapon(WeaponSelection::new(sword))
                .with_weapon(WeaponSelection::new(sword).with_mode(1)),
        )
        .with_attacker(AttackerEntry::new(archer).with_weapon(
            WeaponSelection::new(bow).with_options(AttackOptions::default().with_distance(70)),
        ))
        .with_attacker(AttackerEntry::new(goblin).with_weapon(WeaponSelection::new(dagger)));
    (encounter, exchange)
}

#[test]
fn test_layer_cap_keeps_one_shield_and_three_layers() {
    let target = turtle();
    let config = CombatConfig::default();
    let stack = armor_stack(&target, Some(HitLocation::Chest), DamageType::Piercing, &config);
    assert_eq!(stack.len(), config.max_armor_layers + 1);
    assert!(stack[0].is_shield());
    assert_eq!(stack.iter().filter(|l| l.is_shield()).count(), 1);
}

#[test]
fn test_outcome_invariants_hold_for_any_draws() {
    let limit = CombatConfig::default().max_armor_layers + 1;
    for seed in 0..200 {
        let (mut encounter, exchange) = skirmish();
        let mut roller = RngRoller::new(ChaCha8Rng::seed_from_u64(seed));
        let report = Orchestrator::default()
            .run(
                &mut encounter,
                exchange,
                &mut roller,
                &mut RecordingSink::default(),
                &mut NoPrompt,
            )
            .unwrap();

        for outcome in report.outcomes() {
            if let Some(roll) = &outcome.roll {
                if roll.is_natural_20() {
                    assert!(roll.hit, "seed {seed}: natural 20 missed");
                }
                if roll.is_natural_1() {
                    assert!(!roll.hit, "seed {seed}: natural 1 hit");
                }
            }
            if let Some(hit) = outcome.hit() {
                assert!(hit.damage.total >= 1, "seed {seed}: damage below 1");
                assert!(hit.layers.len() <= limit, "seed {seed}: too many layers");
                assert!(outcome.damage_dealt() >= 1);
            }
            assert!(outcome.damage_dealt() >= 0);
        }
    }
}

#[test]
fn test_same_draws_give_identical_outcomes() {
    let (encounter, exchange) = skirmish();
    let mut first = encounter.clone();
    let mut second = encounter;

    let run = |encounter: &mut Encounter| {
        let mut roller = RngRoller::new(ChaCha8Rng::seed_from_u64(7));
        let mut sink = RecordingSink::default();
        let report = Orchestrator::default()
            .run(encounter, exchange.clone(), &mut roller, &mut sink, &mut NoPrompt)
            .unwrap();
        (report, sink.transcript())
    };

    let (report_a, text_a) = run(&mut first);
    let (report_b, text_b) = run(&mut second);
    assert_eq!(report_a, report_b);
    assert_eq!(text_a, text_b);
    assert_eq!(first, second);
}
