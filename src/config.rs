//! Scheduling policy constants and environment loading.

use thiserror::Error;

use crate::types::Seconds;

/// Default interval assigned on enrollment.
pub const DEFAULT_BASELINE_INTERVAL: Seconds = 30;
/// Default multiplier applied on a correct recall.
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.5;
/// Default delay imposed after a miss.
pub const DEFAULT_PENALTY_INTERVAL: Seconds = 60;
/// Default experience awarded per correct recall.
pub const DEFAULT_CORRECT_EXPERIENCE: u64 = 10;

/// Invalid or unparsable policy values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("{var}={value:?} is not a valid value")]
    Parse {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// Baseline interval must be positive.
    #[error("baseline interval must be positive")]
    ZeroBaseline,
    /// Penalty interval must be positive.
    #[error("penalty interval must be positive")]
    ZeroPenalty,
    /// Growth must be finite and above one.
    #[error("growth factor {0} must be finite and greater than 1")]
    Growth(f64),
}

/// Interval arithmetic applied by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePolicy {
    /// Interval a fresh enrollment starts from.
    pub baseline_interval: Seconds,
    /// Multiplier applied to the previous interval on a correct recall.
    pub growth_factor: f64,
    /// Interval imposed after a miss.
    pub penalty_interval: Seconds,
    /// Experience granted per correct recall.
    pub correct_experience: u64,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            baseline_interval: DEFAULT_BASELINE_INTERVAL,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            penalty_interval: DEFAULT_PENALTY_INTERVAL,
            correct_experience: DEFAULT_CORRECT_EXPERIENCE,
        }
    }
}

impl SchedulePolicy {
    /// Reads `ALEFBET_*` overrides on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`SchedulePolicy::from_env`] with variables read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let policy = Self {
            baseline_interval: parse_or(&lookup, "ALEFBET_BASELINE_SECS", defaults.baseline_interval)?,
            growth_factor: parse_or(&lookup, "ALEFBET_GROWTH_FACTOR", defaults.growth_factor)?,
            penalty_interval: parse_or(&lookup, "ALEFBET_PENALTY_SECS", defaults.penalty_interval)?,
            correct_experience: parse_or(&lookup, "ALEFBET_CORRECT_EXP", defaults.correct_experience)?,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Rejects zero intervals and growth factors that would not grow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_interval == 0 {
            return Err(ConfigError::ZeroBaseline);
        }
        if self.penalty_interval == 0 {
            return Err(ConfigError::ZeroPenalty);
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(ConfigError::Growth(self.growth_factor));
        }
        Ok(())
    }

    /// `round(previous * growth_factor)`, never below `previous + 1`.
    pub fn grow(&self, previous: Seconds) -> Seconds {
        let grown = (previous as f64 * self.growth_factor).round() as Seconds;
        grown.max(previous.saturating_add(1))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Parse { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn grow_rounds_half_away_from_zero() {
        let policy = SchedulePolicy::default();
        assert_eq!(policy.grow(30), 75);
        assert_eq!(policy.grow(75), 188);
        assert_eq!(policy.grow(60), 150);
        assert_eq!(policy.grow(1), 3);
    }

    #[test]
    fn grow_is_strict_for_small_factors() {
        let policy = SchedulePolicy {
            growth_factor: 1.01,
            ..SchedulePolicy::default()
        };
        assert_eq!(policy.grow(10), 11);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn unset_vars_fall_back_to_defaults() {
        assert_eq!(
            SchedulePolicy::from_lookup(vars(&[])),
            Ok(SchedulePolicy::default())
        );
    }

    #[test]
    fn overrides_are_trimmed_and_applied() {
        let policy = SchedulePolicy::from_lookup(vars(&[
            ("ALEFBET_BASELINE_SECS", " 45 "),
            ("ALEFBET_GROWTH_FACTOR", "3"),
            ("ALEFBET_CORRECT_EXP", "25"),
        ]))
        .expect("policy");
        assert_eq!(policy.baseline_interval, 45);
        assert_eq!(policy.growth_factor, 3.0);
        assert_eq!(policy.penalty_interval, DEFAULT_PENALTY_INTERVAL);
        assert_eq!(policy.correct_experience, 25);
    }

    #[test]
    fn unparsable_growth_factor_names_the_variable() {
        let err = SchedulePolicy::from_lookup(vars(&[("ALEFBET_GROWTH_FACTOR", "fast")]))
            .expect_err("not a number");
        assert_eq!(
            err,
            ConfigError::Parse {
                var: "ALEFBET_GROWTH_FACTOR",
                value: "fast".to_string(),
            }
        );
    }

    #[test]
    fn parsed_overrides_still_go_through_validation() {
        assert_eq!(
            SchedulePolicy::from_lookup(vars(&[("ALEFBET_GROWTH_FACTOR", "0.5")])),
            Err(ConfigError::Growth(0.5))
        );
        assert_eq!(
            SchedulePolicy::from_lookup(vars(&[("ALEFBET_PENALTY_SECS", "0")])),
            Err(ConfigError::ZeroPenalty)
        );
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut policy = SchedulePolicy::default();
        assert!(policy.validate().is_ok());

        policy.growth_factor = 1.0;
        assert_eq!(policy.validate(), Err(ConfigError::Growth(1.0)));

        policy.growth_factor = 2.5;
        policy.baseline_interval = 0;
        assert_eq!(policy.validate(), Err(ConfigError::ZeroBaseline));
    }
}
