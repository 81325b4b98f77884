//! Attack outcomes and the state changes they carry.

use crate::attack::{AttackRoll, Fumble, MissDetail};
use crate::hit::HitDetail;
use crate::items::{EquipState, ItemId};
use crate::narration::SoundCue;
use crate::resolver::ErrorKind;
use crate::tables::HitLocation;
use crate::world::{CombatantId, Condition};
use serde::{Deserialize, Serialize};

/// A concrete state change, applied only when an attacker's sequence is
/// finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Negative for damage, positive for healing.
    HpChanged { target: CombatantId, amount: i32 },

    ConditionApplied {
        target: CombatantId,
        condition: Condition,
        source: String,
    },

    ConditionRemoved {
        target: CombatantId,
        condition: Condition,
    },

    LocationSevered {
        target: CombatantId,
        location: HitLocation,
    },

    ItemQuantityChanged {
        owner: CombatantId,
        item: ItemId,
        delta: i32,
    },

    IntegrityChanged {
        owner: CombatantId,
        item: ItemId,
        delta: i32,
    },

    EquipChanged {
        owner: CombatantId,
        item: ItemId,
        state: EquipState,
    },

    WeaponLoaded {
        owner: CombatantId,
        item: ItemId,
        loaded: bool,
    },

    ChargeUsed { owner: CombatantId, item: ItemId },
}

impl Effect {
    /// The combatant whose state this effect changes.
    pub fn combatant(&self) -> CombatantId {
        match self {
            Effect::HpChanged { target, .. }
            | Effect::ConditionApplied { target, .. }
            | Effect::ConditionRemoved { target, .. }
            | Effect::LocationSevered { target, .. } => *target,
            Effect::ItemQuantityChanged { owner, .. }
            | Effect::IntegrityChanged { owner, .. }
            | Effect::EquipChanged { owner, .. }
            | Effect::WeaponLoaded { owner, .. }
            | Effect::ChargeUsed { owner, .. } => *owner,
        }
    }
}

/// Why an attacker's remaining queue was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    Fumble,
    Kill,
    KnockedDown,
    WeaponDestroyed,
}

/// What the orchestrator should do with the attacker's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueSignal {
    #[default]
    Continue,
    CancelAttacker(CancelReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Hit(Box<HitDetail>),
    Miss(MissDetail),
    /// The turn went to reloading instead of attacking.
    Reload,
    /// The weapon could not be used.
    Skipped { kind: ErrorKind, reason: String },
}

/// The result of one dequeued (attacker, weapon) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attacker: CombatantId,
    pub target: CombatantId,
    pub weapon: Option<ItemId>,
    pub weapon_name: String,
    pub kind: OutcomeKind,
    pub roll: Option<AttackRoll>,
    pub fumble: Option<Fumble>,
    /// Ordered narrative fragments.
    pub fragments: Vec<String>,
    /// Net HP change to the target.
    pub hp_delta: i32,
    pub effects: Vec<Effect>,
    pub signal: QueueSignal,
    pub lodged: bool,
    pub killed: bool,
    /// Defender granted an immediate counter attack.
    pub counter: Option<CombatantId>,
    /// This attack was an extra one earned by weapon speed.
    pub follow_up: bool,
    /// Effective speed of the weapon used, if it resolved.
    pub weapon_speed: Option<i32>,
    /// The other end of a double weapon is due next.
    pub strikes_again: bool,
    pub sound: Option<SoundCue>,
    pub bubble: Option<String>,
}

impl AttackOutcome {
    pub fn new(attacker: CombatantId, target: CombatantId, kind: OutcomeKind) -> Self {
        Self {
            attacker,
            target,
            weapon: None,
            weapon_name: String::new(),
            kind,
            roll: None,
            fumble: None,
            fragments: Vec::new(),
            hp_delta: 0,
            effects: Vec::new(),
            signal: QueueSignal::Continue,
            lodged: false,
            killed: false,
            counter: None,
            follow_up: false,
            weapon_speed: None,
            strikes_again: false,
            sound: None,
            bubble: None,
        }
    }

    pub fn skipped(
        attacker: CombatantId,
        target: CombatantId,
        kind: ErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            attacker,
            target,
            OutcomeKind::Skipped {
                kind,
                reason: reason.into(),
            },
        )
    }

    pub fn with_weapon(mut self, item: ItemId, name: impl Into<String>) -> Self {
        self.weapon = Some(item);
        self.weapon_name = name.into();
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self.hp_delta = self
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::HpChanged { target, amount } if *target == self.target => Some(*amount),
                _ => None,
            })
            .sum();
        self
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.kind, OutcomeKind::Hit(_))
    }

    pub fn hit(&self) -> Option<&HitDetail> {
        match &self.kind {
            OutcomeKind::Hit(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn miss(&self) -> Option<&MissDetail> {
        match &self.kind {
            OutcomeKind::Miss(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, OutcomeKind::Skipped { .. })
    }

    pub fn cancels_queue(&self) -> bool {
        matches!(self.signal, QueueSignal::CancelAttacker(_))
    }

    /// Damage dealt to the target.
    pub fn damage_dealt(&self) -> i32 {
        (-self.hp_delta).max(0)
    }

    /// Hit location, if the blow landed on a tracked creature.
    pub fn location(&self) -> Option<HitLocation> {
        self.hit().and_then(|h| h.location)
    }
}
