//! Narration assembly.
//!
//! Turns stage results into ordered text fragments with a sound cue and an
//! optional short speech-bubble text. Presentation is left to a
//! [`NarrationSink`].

use crate::attack::{Fumble, FumbleConsequence, MissDetail, MissReason};
use crate::hit::{Bleed, HitDetail, Knockdown, LayerOutcome};
use crate::outcome::{AttackOutcome, OutcomeKind};
use crate::tables::{AttackForm, DamageType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCue {
    Miss,
    Dodge,
    Parry,
    DeflectMetal,
    DeflectSoft,
    HitSlash,
    HitPierce,
    HitBlunt,
    Critical,
    Kill,
    Fumble,
    Reload,
}

impl SoundCue {
    /// Higher cues win when several attacks are combined.
    fn priority(&self) -> u8 {
        match self {
            SoundCue::Kill => 5,
            SoundCue::Critical => 4,
            SoundCue::Fumble => 3,
            SoundCue::HitSlash | SoundCue::HitPierce | SoundCue::HitBlunt => 2,
            SoundCue::Reload => 0,
            _ => 1,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            SoundCue::Miss => "miss",
            SoundCue::Dodge => "dodge",
            SoundCue::Parry => "parry",
            SoundCue::DeflectMetal => "deflect_metal",
            SoundCue::DeflectSoft => "deflect_soft",
            SoundCue::HitSlash => "hit_slash",
            SoundCue::HitPierce => "hit_pierce",
            SoundCue::HitBlunt => "hit_blunt",
            SoundCue::Critical => "critical",
            SoundCue::Kill => "kill",
            SoundCue::Fumble => "fumble",
            SoundCue::Reload => "reload",
        }
    }
}

/// Text handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    pub fragments: Vec<String>,
    pub sound: Option<SoundCue>,
    pub bubble: Option<String>,
}

impl Narration {
    pub fn text(&self) -> String {
        self.fragments.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Receives narration and operator notices.
pub trait NarrationSink {
    fn publish(&mut self, narration: &Narration);
    fn notify(&mut self, level: NoticeLevel, message: &str);
}

/// Sink that writes everything to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NarrationSink for LogSink {
    fn publish(&mut self, narration: &Narration) {
        info!(
            sound = narration.sound.map(|s| s.key()),
            bubble = narration.bubble.as_deref(),
            "{}",
            narration.text()
        );
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!("{message}"),
            NoticeLevel::Warning => warn!("{message}"),
        }
    }
}

/// Names used in fragments.
#[derive(Debug, Clone, Copy)]
pub struct Names<'a> {
    pub attacker: &'a str,
    pub target: &'a str,
    pub weapon: &'a str,
}

/// Fragment groups in the order they are told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Verb,
    Armor,
    Critical,
    Knockdown,
    Bleed,
    Injury,
}

pub fn hit_verb(form: AttackForm, damage_type: DamageType) -> &'static str {
    match (form, damage_type) {
        (AttackForm::Swing, DamageType::Slashing) => "slashes",
        (AttackForm::Swing, DamageType::Piercing) => "hacks",
        (AttackForm::Swing, DamageType::Bludgeoning) => "smashes",
        (AttackForm::Thrust, DamageType::Piercing) => "stabs",
        (AttackForm::Thrust, DamageType::Slashing) => "cuts",
        (AttackForm::Thrust, DamageType::Bludgeoning) => "jabs",
        (AttackForm::Shoot, _) => "shoots",
        (AttackForm::Throw, _) => "strikes",
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Narrate a landed blow. Bleed fragments are dropped when the target's
/// projected HP is at or below `death_threshold`.
pub fn describe_hit(
    names: Names<'_>,
    form: AttackForm,
    weapon_type: DamageType,
    detail: &HitDetail,
    projected_hp: i32,
    death_threshold: i32,
) -> Narration {
    let mut parts: Vec<(Section, String)> = Vec::new();

    let place = detail
        .location
        .map(|l| format!(" in the {}", l.name()))
        .unwrap_or_default();
    parts.push((
        Section::Verb,
        format!(
            "{} {} {}{} with {}.",
            names.attacker,
            hit_verb(form, weapon_type),
            names.target,
            place,
            names.weapon
        ),
    ));

    for layer in &detail.layers {
        let text = match layer.outcome {
            LayerOutcome::Penetrated => format!("The blow cuts through the {}.", layer.name),
            LayerOutcome::Bypassed => format!("The point slips past the {}.", layer.name),
            LayerOutcome::Consumed => format!("The point drives through the {}.", layer.name),
            LayerOutcome::Blocked => format!("The {} stops the blow.", layer.name),
        };
        parts.push((Section::Armor, text));
    }
    if let Some(dent) = &detail.dent {
        let text = if dent.destroyed {
            format!("The {} is ruined.", dent.name)
        } else {
            format!("The {} is dented.", dent.name)
        };
        parts.push((Section::Armor, text));
    }
    if detail.converted {
        parts.push((Section::Armor, "The force carries through as a crushing impact.".to_string()));
    }

    if detail.skillful {
        parts.push((Section::Critical, "A skillful strike!".to_string()));
    }
    if detail.critical {
        parts.push((Section::Critical, "A critical hit!".to_string()));
    }
    if let Some(impale) = &detail.impale {
        let text = if impale.lodged {
            format!("{} is impaled and the {} lodges fast.", names.target, names.weapon)
        } else {
            format!("{} is impaled.", names.target)
        };
        parts.push((Section::Critical, text));
    }

    if let Some(knockdown) = &detail.knockdown {
        let text = match knockdown {
            Knockdown::Disarmed { name, .. } => format!("The {name} is knocked away."),
            Knockdown::Flying => format!("{} is sent flying!", names.target),
            Knockdown::Down => format!("{} is knocked down.", names.target),
            Knockdown::Winded => format!("{} is winded.", names.target),
            Knockdown::Staggered => format!("{} staggers.", names.target),
        };
        parts.push((Section::Knockdown, text));
    }
    if let Some(bleed) = detail.bleed {
        let text = match bleed {
            Bleed::Minor => format!("{} starts to bleed.", names.target),
            Bleed::Major => format!("{} bleeds heavily.", names.target),
        };
        parts.push((Section::Bleed, text));
    }

    if let Some(injury) = &detail.injury {
        parts.push((Section::Injury, format!("{}.", capitalize(&injury.text))));
    }
    if detail.killed {
        parts.push((Section::Injury, format!("{} falls dead.", names.target)));
    }

    if projected_hp <= death_threshold {
        parts.retain(|(section, _)| *section != Section::Bleed);
    }
    parts.sort_by_key(|(section, _)| *section);

    let sound = if detail.killed {
        SoundCue::Kill
    } else if detail.critical {
        SoundCue::Critical
    } else if detail.converted {
        SoundCue::HitBlunt
    } else {
        match detail.damage_type {
            DamageType::Slashing => SoundCue::HitSlash,
            DamageType::Piercing => SoundCue::HitPierce,
            DamageType::Bludgeoning => SoundCue::HitBlunt,
        }
    };
    let bubble = if detail.killed {
        Some("Slain!".to_string())
    } else if detail.critical {
        Some("Critical!".to_string())
    } else if detail.knockdown.as_ref().is_some_and(|k| k.is_heavy()) {
        Some("Down!".to_string())
    } else {
        None
    };

    Narration {
        fragments: parts.into_iter().map(|(_, text)| text).collect(),
        sound: Some(sound),
        bubble,
    }
}

/// Narrate a miss. `metal` selects the deflection sound.
pub fn describe_miss(names: Names<'_>, detail: &MissDetail, metal: bool) -> Narration {
    let mut fragments = Vec::new();
    let (text, sound, bubble) = match &detail.reason {
        MissReason::CleanMiss => (
            format!("{} swings wide of {}.", names.attacker, names.target),
            SoundCue::Miss,
            None,
        ),
        MissReason::Dodged => (
            format!("{} dodges {}'s {}.", names.target, names.attacker, names.weapon),
            SoundCue::Dodge,
            Some("Dodged"),
        ),
        MissReason::Parried { .. } => (
            format!("{} parries {}'s {}.", names.target, names.attacker, names.weapon),
            SoundCue::Parry,
            Some("Parried"),
        ),
        MissReason::Deflected { .. } => (
            format!("{}'s {} glances off {}'s armor.", names.attacker, names.weapon, names.target),
            if metal {
                SoundCue::DeflectMetal
            } else {
                SoundCue::DeflectSoft
            },
            None,
        ),
        MissReason::Countered => (
            format!("{} turns aside {}'s {}.", names.target, names.attacker, names.weapon),
            SoundCue::Parry,
            Some("Ha!"),
        ),
    };
    fragments.push(text);

    if let Some(breakage) = &detail.breakage {
        fragments.push(if breakage.destroyed {
            format!("The {} breaks!", breakage.name)
        } else {
            format!("The {} is damaged.", breakage.name)
        });
    }
    if detail.counter {
        fragments.push(format!("{} sees an opening.", names.target));
    }

    Narration {
        fragments,
        sound: Some(sound),
        bubble: bubble.map(str::to_string),
    }
}

/// Fragments describing a fumble.
pub fn describe_fumble(names: Names<'_>, fumble: &Fumble) -> Vec<String> {
    let text = match &fumble.consequence {
        FumbleConsequence::Fall => format!("{} loses footing and falls.", names.attacker),
        FumbleConsequence::Drop { .. } => format!("{} drops the {}.", names.attacker, names.weapon),
        FumbleConsequence::SelfHit { damage } => {
            format!("{} strikes themself for {damage} damage.", names.attacker)
        }
        FumbleConsequence::StrikeBystander { damage, .. } => {
            format!("{} strikes a bystander for {damage} damage.", names.attacker)
        }
    };
    vec![format!("{} fumbles!", names.attacker), text]
}

pub fn describe_reload(names: Names<'_>) -> Narration {
    Narration {
        fragments: vec![format!("{} reloads the {}.", names.attacker, names.weapon)],
        sound: Some(SoundCue::Reload),
        bubble: None,
    }
}

/// Merge one attacker's outcomes into a single narration. Skipped weapons
/// contribute nothing.
pub fn combine(outcomes: &[AttackOutcome]) -> Narration {
    let mut narration = Narration::default();
    for outcome in outcomes {
        if matches!(outcome.kind, OutcomeKind::Skipped { .. }) {
            continue;
        }
        narration.fragments.extend(outcome.fragments.iter().cloned());
        if let Some(sound) = outcome.sound {
            let louder = narration
                .sound
                .map_or(true, |current| sound.priority() >= current.priority());
            if louder {
                narration.sound = Some(sound);
            }
        }
        if outcome.bubble.is_some() {
            narration.bubble = outcome.bubble.clone();
        }
    }
    narration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::{DamageBreakdown, Injury, LayerResult};
    use crate::items::ItemId;
    use crate::tables::{HitLocation, Severity};
    use crate::world::CombatantId;

    const NAMES: Names<'static> = Names {
        attacker: "Aldric",
        target: "the goblin",
        weapon: "long sword",
    };

    fn bleeding_hit() -> HitDetail {
        HitDetail {
            location: Some(HitLocation::LeftArm),
            layers: vec![LayerResult {
                item: ItemId::new(),
                name: "leather jerkin".to_string(),
                outcome: LayerOutcome::Penetrated,
                chance: Some(55),
            }],
            blocked_by: None,
            dent: None,
            skillful: false,
            critical: false,
            impale: None,
            converted: false,
            damage_type: DamageType::Slashing,
            knockdown: Some(Knockdown::Staggered),
            bleed: Some(Bleed::Minor),
            damage: DamageBreakdown {
                weapon: 5,
                total: 5,
                ..DamageBreakdown::default()
            },
            severity: Severity::Serious,
            injury: Some(Injury {
                severity: Severity::Serious,
                text: "a deep gash opens the left arm".to_string(),
                condition: None,
                removal: false,
                fatal: false,
            }),
            killed: false,
        }
    }

    #[test]
    fn test_fragment_order() {
        let narration =
            describe_hit(NAMES, AttackForm::Swing, DamageType::Slashing, &bleeding_hit(), 5, 0);
        assert_eq!(
            narration.fragments,
            [
                "Aldric slashes the goblin in the left arm with long sword.",
                "The blow cuts through the leather jerkin.",
                "the goblin staggers.",
                "the goblin starts to bleed.",
                "A deep gash opens the left arm.",
            ]
        );
        assert_eq!(narration.sound, Some(SoundCue::HitSlash));
    }

    #[test]
    fn test_bleed_stripped_for_dead_target() {
        let narration =
            describe_hit(NAMES, AttackForm::Swing, DamageType::Slashing, &bleeding_hit(), 0, 0);
        assert!(narration.fragments.iter().all(|f| !f.contains("bleed")));
    }

    #[test]
    fn test_combine_prefers_loudest_sound() {
        let attacker = CombatantId::new();
        let target = CombatantId::new();
        let mut first = AttackOutcome::new(attacker, target, OutcomeKind::Reload);
        first.fragments = vec!["one".to_string()];
        first.sound = Some(SoundCue::Critical);
        let mut second = AttackOutcome::new(attacker, target, OutcomeKind::Reload);
        second.fragments = vec!["two".to_string()];
        second.sound = Some(SoundCue::Miss);
        second.bubble = Some("Dodged".to_string());

        let combined = combine(&[first, second]);
        assert_eq!(combined.fragments, ["one", "two"]);
        assert_eq!(combined.sound, Some(SoundCue::Critical));
        assert_eq!(combined.bubble.as_deref(), Some("Dodged"));
    }

    #[test]
    fn test_hit_verbs() {
        assert_eq!(hit_verb(AttackForm::Thrust, DamageType::Piercing), "stabs");
        assert_eq!(hit_verb(AttackForm::Shoot, DamageType::Piercing), "shoots");
    }
}
