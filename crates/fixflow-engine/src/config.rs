//! Engine configuration.
//!
//! Every setting has a default that matches the shop's standard behaviour.
//! Override via environment variables or explicit construction in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;

use fixflow_core::DeviceStatus;
use fixflow_effects::retry::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use fixflow_effects::{PointsRuleTable, RetryPolicy, DEFAULT_REPAIR_BONUS};
use fixflow_state::sla::{DEFAULT_GRACE_HOURS, DEFAULT_LEAD_HOURS};
use fixflow_state::SlaClock;

/// Largest UTC offset in use anywhere, in minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Upper bound for the SLA windows: ten years.
const MAX_WINDOW_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Shop-local offset used for calendar-day SLA comparisons.
    pub utc_offset_minutes: i32,
    /// Hours after intake before a job due today is overdue, and the floor for
    /// every other deadline.
    pub sla_grace_hours: i64,
    /// Hours before the nominal due time at which a job counts as overdue.
    pub sla_lead_hours: i64,
    /// Points a technician earns for completing an assigned repair.
    pub repair_bonus: i64,
    /// Status whose entry emails customer care.
    pub handover_status: DeviceStatus,
    /// Retry policy for retryable side-effect failures.
    pub effect_retry: RetryPolicy,
    /// Intake points rules.
    pub points_rules: PointsRuleTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            sla_grace_hours: DEFAULT_GRACE_HOURS,
            sla_lead_hours: DEFAULT_LEAD_HOURS,
            repair_bonus: DEFAULT_REPAIR_BONUS,
            handover_status: DeviceStatus::RepairComplete,
            effect_retry: RetryPolicy::default(),
            points_rules: PointsRuleTable::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FIXFLOW_UTC_OFFSET_MINUTES` (default: 0)
    /// - `FIXFLOW_SLA_GRACE_HOURS` (default: 24)
    /// - `FIXFLOW_SLA_LEAD_HOURS` (default: 4)
    /// - `FIXFLOW_REPAIR_BONUS` (default: 20)
    /// - `FIXFLOW_HANDOVER_STATUS` (default: `repair-complete`)
    /// - `FIXFLOW_EFFECT_MAX_ATTEMPTS` (default: 3)
    /// - `FIXFLOW_EFFECT_BACKOFF_MS` (default: 200)
    /// - `FIXFLOW_POINTS_RULES`: path to a YAML rule table (default: built-in
    ///   rules)
    ///
    /// Unlike unset variables, set-but-malformed values are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary variable source.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let utc_offset_minutes = parse_var(&lookup, "FIXFLOW_UTC_OFFSET_MINUTES")?
            .unwrap_or(defaults.utc_offset_minutes);
        if utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::Invalid {
                var: "FIXFLOW_UTC_OFFSET_MINUTES",
                value: utc_offset_minutes.to_string(),
                reason: format!("must be within ±{MAX_OFFSET_MINUTES} minutes"),
            });
        }

        let sla_grace_hours = parse_var(&lookup, "FIXFLOW_SLA_GRACE_HOURS")?
            .unwrap_or(defaults.sla_grace_hours);
        let sla_lead_hours = parse_var(&lookup, "FIXFLOW_SLA_LEAD_HOURS")?
            .unwrap_or(defaults.sla_lead_hours);
        for (var, hours) in [
            ("FIXFLOW_SLA_GRACE_HOURS", sla_grace_hours),
            ("FIXFLOW_SLA_LEAD_HOURS", sla_lead_hours),
        ] {
            if !(0..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(ConfigError::Invalid {
                    var,
                    value: hours.to_string(),
                    reason: format!("must be between 0 and {MAX_WINDOW_HOURS} hours"),
                });
            }
        }

        let repair_bonus =
            parse_var(&lookup, "FIXFLOW_REPAIR_BONUS")?.unwrap_or(defaults.repair_bonus);
        let handover_status =
            parse_var(&lookup, "FIXFLOW_HANDOVER_STATUS")?.unwrap_or(defaults.handover_status);

        let effect_retry = RetryPolicy {
            max_attempts: parse_var(&lookup, "FIXFLOW_EFFECT_MAX_ATTEMPTS")?
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff: Duration::from_millis(
                parse_var(&lookup, "FIXFLOW_EFFECT_BACKOFF_MS")?.unwrap_or(DEFAULT_BACKOFF_MS),
            ),
        };

        let points_rules = match lookup("FIXFLOW_POINTS_RULES") {
            Some(path) if !path.trim().is_empty() => load_points_rules(Path::new(path.trim()))?,
            _ => defaults.points_rules,
        };

        Ok(Self {
            utc_offset_minutes,
            sla_grace_hours,
            sla_lead_hours,
            repair_bonus,
            handover_status,
            effect_retry,
            points_rules,
        })
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| ConfigError::Invalid {
            var: "FIXFLOW_UTC_OFFSET_MINUTES",
            value: self.utc_offset_minutes.to_string(),
            reason: "not a representable offset".to_string(),
        })
    }

    /// The SLA calculator these settings describe.
    pub fn sla_clock(&self) -> Result<SlaClock, ConfigError> {
        Ok(SlaClock::new(self.utc_offset()?)
            .with_windows(self.sla_grace_hours, self.sla_lead_hours))
    }
}

/// Read a YAML points rule table from disk.
pub fn load_points_rules(path: &Path) -> Result<PointsRuleTable, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RulesUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    PointsRuleTable::from_yaml_str(&raw).map_err(|source| ConfigError::RulesInvalid {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("cannot read points rules {}: {source}", path.display())]
    RulesUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid points rules {}: {source}", path.display())]
    RulesInvalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = EngineConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.repair_bonus, 20);
        assert_eq!(config.effect_retry.max_attempts, 3);
        assert_eq!(config.handover_status, DeviceStatus::RepairComplete);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = EngineConfig::from_vars(vars(&[
            ("FIXFLOW_UTC_OFFSET_MINUTES", "180"),
            ("FIXFLOW_REPAIR_BONUS", "35"),
            ("FIXFLOW_HANDOVER_STATUS", "returned-to-customer-care"),
            ("FIXFLOW_EFFECT_MAX_ATTEMPTS", "5"),
            ("FIXFLOW_EFFECT_BACKOFF_MS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.utc_offset_minutes, 180);
        assert_eq!(config.repair_bonus, 35);
        assert_eq!(config.handover_status, DeviceStatus::ReturnedToCustomerCare);
        assert_eq!(config.effect_retry.max_attempts, 5);
        assert_eq!(config.effect_retry.backoff, Duration::from_millis(10));
        assert_eq!(
            config.sla_clock().unwrap().utc_offset(),
            FixedOffset::east_opt(3 * 3600).unwrap()
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = EngineConfig::from_vars(vars(&[("FIXFLOW_REPAIR_BONUS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "FIXFLOW_REPAIR_BONUS", .. }));

        let err =
            EngineConfig::from_vars(vars(&[("FIXFLOW_HANDOVER_STATUS", "shipped")])).unwrap_err();
        assert!(err.to_string().contains("FIXFLOW_HANDOVER_STATUS"));

        let err =
            EngineConfig::from_vars(vars(&[("FIXFLOW_UTC_OFFSET_MINUTES", "900")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = EngineConfig::from_vars(vars(&[("FIXFLOW_SLA_LEAD_HOURS", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "FIXFLOW_SLA_LEAD_HOURS", .. }));
    }

    #[test]
    fn oversized_sla_windows_are_rejected() {
        let err = EngineConfig::from_vars(vars(&[("FIXFLOW_SLA_GRACE_HOURS", "10000000000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "FIXFLOW_SLA_GRACE_HOURS", .. }));

        let config =
            EngineConfig::from_vars(vars(&[("FIXFLOW_SLA_LEAD_HOURS", "87600")])).unwrap();
        assert_eq!(config.sla_lead_hours, MAX_WINDOW_HOURS);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = EngineConfig::from_vars(vars(&[
            ("FIXFLOW_REPAIR_BONUS", "  "),
            ("FIXFLOW_POINTS_RULES", ""),
        ]))
        .unwrap();
        assert_eq!(config.repair_bonus, DEFAULT_REPAIR_BONUS);
    }

    #[test]
    fn points_rules_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "enabled: true\nbase_points: 15\nbonus_devices:\n  - brand: Apple\nlevel_percent:\n  bronze: 100\n  gold: 200"
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let config =
            EngineConfig::from_vars(vars(&[("FIXFLOW_POINTS_RULES", path.as_str())])).unwrap();
        assert_eq!(config.points_rules.base_points, 15);
        assert_eq!(config.points_rules.bonus_devices.len(), 1);
        assert_eq!(config.points_rules.level_percent["gold"], 200);
    }

    #[test]
    fn unreadable_or_invalid_rules_are_errors() {
        let err = load_points_rules(Path::new("/nonexistent/fixflow-rules.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::RulesUnreadable { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enabled: [not, a, bool]").unwrap();
        let err = load_points_rules(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::RulesInvalid { .. }));
    }
}
