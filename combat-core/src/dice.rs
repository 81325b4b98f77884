//! Dice notation and the injectable random source.
//!
//! Supports standard dice notation: XdY+Z, multiple dice terms, negative
//! terms, keep highest/lowest, and a "maximize" mode used for critical hits.
//!
//! Every random number the combat engine consumes is drawn through a
//! [`DiceRoller`]. Replaying the same sequence of die results against the
//! same inputs reproduces the same outcome.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Source of die results.
///
/// Implementations must return a value in `1..=sides`.
pub trait DiceRoller {
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<T: DiceRoller + ?Sized> DiceRoller for &mut T {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

/// Adapts any `rand` generator into a [`DiceRoller`].
#[derive(Debug, Clone)]
pub struct RngRoller<R> {
    rng: R,
}

impl<R: Rng> RngRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl RngRoller<rand::rngs::ThreadRng> {
    /// Roller backed by the thread-local generator.
    pub fn thread() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> DiceRoller for RngRoller<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// How dice in an expression are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RollMode {
    #[default]
    Normal,
    /// Every die shows its highest face. Draws nothing from the roller.
    Maximize,
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
    /// +1 or -1.
    pub sign: i32,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

impl DiceComponent {
    fn kept_count(&self) -> u32 {
        self.keep_highest.or(self.keep_lowest).unwrap_or(self.count)
    }
}

/// A complete dice expression (e.g., 2d6+1d4-1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;
        let mut pending_operator = false;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                        sign = 1;
                    } else if pending_operator {
                        return Err(DiceError::InvalidNotation(notation.clone()));
                    }
                    if ch == '-' {
                        sign = -sign;
                    }
                    pending_operator = true;
                }
                ' ' => continue,
                _ => {
                    current.push(ch);
                    pending_operator = false;
                }
            }
        }

        if current.is_empty() {
            return Err(DiceError::InvalidNotation(notation));
        }
        Self::parse_component(&current, sign, &mut components, &mut modifier)?;

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    /// A constant expression with no dice.
    pub fn constant(value: i32) -> Self {
        Self {
            components: Vec::new(),
            modifier: value,
            original: value.to_string(),
        }
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            let count_str = &s[..d_pos];
            let rest = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };

            let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
                let keep: u32 = rest[kh_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (&rest[..kh_pos], Some(keep), None)
            } else if let Some(kl_pos) = rest.find("kl") {
                let keep: u32 = rest[kl_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (&rest[..kl_pos], None, Some(keep))
            } else {
                (rest, None, None)
            };

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            if sides < 2 {
                return Err(DiceError::InvalidDieSize(sides));
            }

            if let Some(keep) = keep_highest.or(keep_lowest) {
                if keep > count {
                    return Err(DiceError::InvalidKeepCount {
                        keep,
                        count,
                        notation: s.to_string(),
                    });
                }
            }

            components.push(DiceComponent {
                count,
                sides,
                sign,
                keep_highest,
                keep_lowest,
            });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// Whether the expression contains any dice.
    pub fn has_dice(&self) -> bool {
        self.components.iter().any(|c| c.count > 0)
    }

    /// The highest total this expression can produce.
    pub fn maximum(&self) -> i32 {
        let dice: i32 = self
            .components
            .iter()
            .map(|c| {
                let kept = c.kept_count() as i32;
                if c.sign > 0 {
                    kept * c.sides as i32
                } else {
                    -kept
                }
            })
            .sum();
        dice + self.modifier
    }

    /// Roll the expression, drawing every die from `roller` in order.
    pub fn roll_with<R: DiceRoller + ?Sized>(&self, roller: &mut R) -> RollResult {
        self.roll_mode(roller, RollMode::Normal)
    }

    /// Roll the expression in the given mode.
    pub fn roll_mode<R: DiceRoller + ?Sized>(&self, roller: &mut R, mode: RollMode) -> RollResult {
        let mut component_results = Vec::with_capacity(self.components.len());

        for component in &self.components {
            let mut rolls: Vec<u32> = (0..component.count)
                .map(|_| match mode {
                    RollMode::Normal => roller.roll_die(component.sides).clamp(1, component.sides),
                    RollMode::Maximize => component.sides,
                })
                .collect();
            let rolled = rolls.clone();

            if component.keep_highest.is_some() {
                rolls.sort_by(|a, b| b.cmp(a));
            } else if component.keep_lowest.is_some() {
                rolls.sort();
            }
            rolls.truncate(component.kept_count() as usize);

            let subtotal = component.sign * rolls.iter().sum::<u32>() as i32;
            component_results.push(ComponentResult {
                sides: component.sides,
                rolls: rolled,
                kept: rolls,
                subtotal,
            });
        }

        let total = component_results.iter().map(|c| c.subtotal).sum::<i32>() + self.modifier;
        trace!(formula = %self.original, total, ?mode, "rolled dice expression");

        RollResult {
            formula: self.original.clone(),
            component_results,
            modifier: self.modifier,
            total,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub sides: u32,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: i32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub formula: String,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
}

impl RollResult {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice_str = self
            .component_results
            .iter()
            .map(|c| {
                let shown: Vec<String> = c.kept.iter().map(|r| r.to_string()).collect();
                format!("[{}]", shown.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" + ");

        match self.modifier {
            0 => dice_str,
            m if dice_str.is_empty() => m.to_string(),
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Evaluate a formula string against a roller.
pub fn roll_formula<R: DiceRoller + ?Sized>(
    roller: &mut R,
    formula: &str,
    mode: RollMode,
) -> Result<i32, DiceError> {
    let expr = DiceExpression::parse(formula)?;
    Ok(expr.roll_mode(roller, mode).total)
}

/// Roll a single d20.
pub fn roll_d20<R: DiceRoller + ?Sized>(roller: &mut R) -> u32 {
    roller.roll_die(20).clamp(1, 20)
}

/// A d100 check against a percentage chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentRoll {
    pub chance: i32,
    pub roll: u32,
    pub success: bool,
}

/// Roll d100; succeeds when the roll is at or under `chance`.
///
/// Always draws exactly one die, even when the chance is zero or negative.
pub fn percent_check<R: DiceRoller + ?Sized>(roller: &mut R, chance: i32) -> PercentRoll {
    let roll = roller.roll_die(100).clamp(1, 100);
    let success = chance > 0 && roll as i32 <= chance;
    trace!(chance, roll, success, "percent check");
    PercentRoll {
        chance,
        roll,
        success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components.len(), 1);
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].sides, 20);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        assert_eq!(expr.modifier, 5);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_negative_dice_term() {
        let expr = DiceExpression::parse("3-1d4").unwrap();
        assert_eq!(expr.modifier, 3);
        assert_eq!(expr.components[0].sign, -1);

        let mut dice = ScriptedDice::new([4]);
        assert_eq!(expr.roll_with(&mut dice).total, -1);
    }

    #[test]
    fn test_parse_leading_sign_and_odd_dice() {
        let expr = DiceExpression::parse("-2+d3").unwrap();
        assert_eq!(expr.modifier, -2);
        assert_eq!(expr.components[0].sides, 3);
        assert!(DiceExpression::parse("0").is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DiceExpression::parse("").is_err());
        assert!(DiceExpression::parse("2d").is_err());
        assert!(DiceExpression::parse("1d6+").is_err());
        assert!(DiceExpression::parse("abc").is_err());
        assert!(DiceExpression::parse("1d0").is_err());
        assert!(DiceExpression::parse("1d6++2").is_err());
    }

    #[test]
    fn test_single_sided_die_is_rejected() {
        assert_eq!(DiceExpression::parse("1d1"), Err(DiceError::InvalidDieSize(1)));
        assert_eq!(DiceExpression::parse("2d1+3"), Err(DiceError::InvalidDieSize(1)));
        assert!(DiceExpression::parse("1d2").is_ok());
    }

    #[test]
    fn test_invalid_keep_count() {
        let result = DiceExpression::parse("4d6kh5");
        assert!(matches!(
            result.unwrap_err(),
            DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            }
        ));
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_keep_highest_uses_scripted_rolls() {
        let expr = DiceExpression::parse("4d6kh3").unwrap();
        let mut dice = ScriptedDice::new([1, 6, 3, 5]);
        let result = expr.roll_with(&mut dice);
        assert_eq!(result.total, 14);
        assert_eq!(result.component_results[0].rolls, vec![1, 6, 3, 5]);
    }

    #[test]
    fn test_maximum() {
        assert_eq!(DiceExpression::parse("2d6+3").unwrap().maximum(), 15);
        assert_eq!(DiceExpression::parse("1d8-1d4").unwrap().maximum(), 7);
        assert_eq!(DiceExpression::parse("4d6kh3").unwrap().maximum(), 18);
    }

    #[test]
    fn test_maximize_mode_draws_nothing() {
        let mut dice = ScriptedDice::new([1]);
        let total = roll_formula(&mut dice, "2d8+1", RollMode::Maximize).unwrap();
        assert_eq!(total, 17);
        assert_eq!(dice.remaining(), 1);
    }

    #[test]
    fn test_percent_check_boundaries() {
        let mut dice = ScriptedDice::new([12, 13, 1]);
        assert!(percent_check(&mut dice, 12).success);
        assert!(!percent_check(&mut dice, 12).success);
        assert!(!percent_check(&mut dice, 0).success);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_seeded_roller_is_repeatable() {
        let expr = DiceExpression::parse("3d6+2").unwrap();
        let mut a = RngRoller::new(ChaCha8Rng::seed_from_u64(7));
        let mut b = RngRoller::new(ChaCha8Rng::seed_from_u64(7));
        for _ in 0..50 {
            let left = expr.roll_with(&mut a);
            let right = expr.roll_with(&mut b);
            assert_eq!(left, right);
            assert!((5..=20).contains(&left.total));
        }
    }
}
