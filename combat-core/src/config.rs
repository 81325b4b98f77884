//! Tunable constants for attack resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a [`CombatConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Balance parameters consulted by every stage of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Base chance (percent) for a blow to penetrate an armor layer.
    pub base_impale_chance: i32,
    /// Penetration chance gained per point of weapon penetration.
    pub penetration_per_point: i32,
    /// Penetration chance lost per point of layer AC plus prior DR.
    pub armor_ac_weight: i32,
    /// Non-shield layers consulted at one location.
    pub max_armor_layers: usize,
    pub two_weapon_primary_penalty: i32,
    pub two_weapon_offhand_penalty: i32,
    /// To-hit modifier for a weapon category the wielder is not proficient in.
    pub unfamiliar_penalty: i32,
    /// Applied per full range increment beyond the first.
    pub range_increment_penalty: i32,
    /// Miss margin at which a fumble check is made.
    pub fumble_margin: i32,
    pub unwieldy_impact_factor: i32,
    pub follow_up_per_speed_point: i32,
    pub knockdown_per_impact: i32,
    pub bleed_per_point: i32,
    /// HP at or below which a combatant is dead.
    pub death_threshold: i32,
    /// Speed used for a combatant holding no weapon.
    pub unarmed_speed: i32,
    /// Resolve counter-attack opportunities immediately.
    pub resolve_counters: bool,
    /// Times an invalid ad-hoc modifier is re-requested before giving up.
    pub max_modifier_prompts: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_impale_chance: 75,
            penetration_per_point: 10,
            armor_ac_weight: 10,
            max_armor_layers: 3,
            two_weapon_primary_penalty: -2,
            two_weapon_offhand_penalty: -4,
            unfamiliar_penalty: -4,
            range_increment_penalty: -2,
            fumble_margin: 10,
            unwieldy_impact_factor: 2,
            follow_up_per_speed_point: 5,
            knockdown_per_impact: 5,
            bleed_per_point: 10,
            death_threshold: 0,
            unarmed_speed: 10,
            resolve_counters: true,
            max_modifier_prompts: 3,
        }
    }
}

impl CombatConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CombatConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values make sense together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_armor_layers == 0 {
            return Err(ConfigError::Invalid {
                field: "max_armor_layers",
                reason: "at least one layer must be consulted".to_string(),
            });
        }
        let non_negative = [
            ("penetration_per_point", self.penetration_per_point),
            ("armor_ac_weight", self.armor_ac_weight),
            ("unwieldy_impact_factor", self.unwieldy_impact_factor),
            ("follow_up_per_speed_point", self.follow_up_per_speed_point),
            ("knockdown_per_impact", self.knockdown_per_impact),
            ("bleed_per_point", self.bleed_per_point),
        ];
        for (field, value) in non_negative {
            if value < 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is negative"),
                });
            }
        }
        Ok(())
    }

    pub fn with_base_impale_chance(mut self, chance: i32) -> Self {
        self.base_impale_chance = chance;
        self
    }

    pub fn with_max_armor_layers(mut self, layers: usize) -> Self {
        self.max_armor_layers = layers;
        self
    }

    pub fn with_death_threshold(mut self, threshold: i32) -> Self {
        self.death_threshold = threshold;
        self
    }

    pub fn with_counters(mut self, resolve_counters: bool) -> Self {
        self.resolve_counters = resolve_counters;
        self
    }

    pub fn with_follow_up_per_speed_point(mut self, chance: i32) -> Self {
        self.follow_up_per_speed_point = chance;
        self
    }

    pub fn with_max_modifier_prompts(mut self, prompts: usize) -> Self {
        self.max_modifier_prompts = prompts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CombatConfig::from_json(r#"{ "base_impale_chance": 60 }"#).unwrap();
        assert_eq!(config.base_impale_chance, 60);
        assert_eq!(config.max_armor_layers, 3);
        assert!(config.resolve_counters);
    }

    #[test]
    fn test_rejects_zero_layers() {
        let err = CombatConfig::from_json(r#"{ "max_armor_layers": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_armor_layers",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let config = CombatConfig {
            bleed_per_point: -1,
            ..CombatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            CombatConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = CombatConfig::default().with_counters(false);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CombatConfig::from_json(&json).unwrap(), config);
    }
}
