//! Hours-of-service regulation constants.
//!
//! The thresholds the compliance checker enforces. Defaults follow the
//! EU driving-time regime (9 h daily driving, 11 h daily rest, 45 h weekly
//! rest, 45 min break after 4.5 h of driving). A deployment overrides them
//! from `hos_rules.toml`; the loaded value is passed into service
//! constructors and treated as immutable for the duration of any validation
//! pipeline run.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Regulation parameter set. Pure data, no behavior beyond unit conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosRules {
    /// Maximum driving time per UTC calendar day, in hours.
    #[serde(default = "default_max_daily_driving_hours")]
    pub max_daily_driving_hours: f64,
    /// Minimum duration of a daily or weekly rest, in hours.
    #[serde(default = "default_minimum_rest_hours")]
    pub minimum_rest_hours: f64,
    /// Minimum total weekly rest over a trailing 7-day window, in hours.
    #[serde(default = "default_minimum_weekly_rest_hours")]
    pub minimum_weekly_rest_hours: f64,
    /// Minimum duration of a short break, in minutes.
    #[serde(default = "default_minimum_break_minutes")]
    pub minimum_break_minutes: i64,
    /// Driving time after which a break is mandatory, in hours.
    #[serde(default = "default_required_break_after_hours")]
    pub required_break_after_hours: f64,
    /// Longest permitted continuous driving span, in hours.
    #[serde(default = "default_maximum_driving_period_hours")]
    pub maximum_driving_period_hours: f64,
    /// Maximum days between long (daily/weekly) rests.
    #[serde(default = "default_days_between_required_rests")]
    pub days_between_required_rests: u32,
}

fn default_max_daily_driving_hours() -> f64 {
    9.0
}

fn default_minimum_rest_hours() -> f64 {
    11.0
}

fn default_minimum_weekly_rest_hours() -> f64 {
    45.0
}

fn default_minimum_break_minutes() -> i64 {
    45
}

fn default_required_break_after_hours() -> f64 {
    4.5
}

fn default_maximum_driving_period_hours() -> f64 {
    4.5
}

fn default_days_between_required_rests() -> u32 {
    6
}

impl Default for HosRules {
    fn default() -> Self {
        Self {
            max_daily_driving_hours: default_max_daily_driving_hours(),
            minimum_rest_hours: default_minimum_rest_hours(),
            minimum_weekly_rest_hours: default_minimum_weekly_rest_hours(),
            minimum_break_minutes: default_minimum_break_minutes(),
            required_break_after_hours: default_required_break_after_hours(),
            maximum_driving_period_hours: default_maximum_driving_period_hours(),
            days_between_required_rests: default_days_between_required_rests(),
        }
    }
}

fn hours(h: f64) -> Duration {
    Duration::minutes((h * 60.0).round() as i64)
}

impl HosRules {
    /// Load rules from a TOML file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read HOS rules file {}", path.as_ref().display())
        })?;
        let rules: HosRules =
            toml::from_str(&content).context("Failed to parse HOS rules TOML")?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load rules from the default location.
    ///
    /// Searches for `hos_rules.toml` in the current directory, `config/`,
    /// and the parent directory; falls back to [`HosRules::default`] when no
    /// file is present.
    pub fn from_default_location() -> Result<Self> {
        let search_paths = [
            PathBuf::from("hos_rules.toml"),
            PathBuf::from("config/hos_rules.toml"),
            PathBuf::from("../hos_rules.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Reject zero or negative thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.max_daily_driving_hours <= 0.0 {
            anyhow::bail!("max_daily_driving_hours must be positive");
        }
        if self.minimum_rest_hours <= 0.0 {
            anyhow::bail!("minimum_rest_hours must be positive");
        }
        if self.minimum_weekly_rest_hours <= 0.0 {
            anyhow::bail!("minimum_weekly_rest_hours must be positive");
        }
        if self.minimum_break_minutes <= 0 {
            anyhow::bail!("minimum_break_minutes must be positive");
        }
        if self.required_break_after_hours <= 0.0 {
            anyhow::bail!("required_break_after_hours must be positive");
        }
        if self.maximum_driving_period_hours <= 0.0 {
            anyhow::bail!("maximum_driving_period_hours must be positive");
        }
        if self.days_between_required_rests == 0 {
            anyhow::bail!("days_between_required_rests must be positive");
        }
        Ok(())
    }

    pub fn max_daily_driving(&self) -> Duration {
        hours(self.max_daily_driving_hours)
    }

    pub fn minimum_rest(&self) -> Duration {
        hours(self.minimum_rest_hours)
    }

    pub fn minimum_weekly_rest(&self) -> Duration {
        hours(self.minimum_weekly_rest_hours)
    }

    pub fn minimum_break(&self) -> Duration {
        Duration::minutes(self.minimum_break_minutes)
    }

    pub fn required_break_after(&self) -> Duration {
        hours(self.required_break_after_hours)
    }

    pub fn maximum_driving_period(&self) -> Duration {
        hours(self.maximum_driving_period_hours)
    }

    pub fn long_rest_cadence(&self) -> Duration {
        Duration::days(i64::from(self.days_between_required_rests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_eu_regime() {
        let rules = HosRules::default();
        assert_eq!(rules.max_daily_driving(), Duration::hours(9));
        assert_eq!(rules.minimum_rest(), Duration::hours(11));
        assert_eq!(rules.minimum_weekly_rest(), Duration::hours(45));
        assert_eq!(rules.minimum_break(), Duration::minutes(45));
        assert_eq!(rules.required_break_after(), Duration::minutes(270));
        assert_eq!(rules.maximum_driving_period(), Duration::minutes(270));
        assert_eq!(rules.long_rest_cadence(), Duration::days(6));
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let rules: HosRules = toml::from_str(
            r#"
max_daily_driving_hours = 10.0
minimum_break_minutes = 30
"#,
        )
        .unwrap();
        assert_eq!(rules.max_daily_driving(), Duration::hours(10));
        assert_eq!(rules.minimum_break(), Duration::minutes(30));
        // untouched keys keep their defaults
        assert_eq!(rules.minimum_rest(), Duration::hours(11));
    }

    #[test]
    fn test_validate_rejects_nonpositive() {
        let mut rules = HosRules::default();
        rules.max_daily_driving_hours = 0.0;
        assert!(rules.validate().is_err());

        let mut rules = HosRules::default();
        rules.minimum_break_minutes = -5;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_fractional_hours_round_to_minutes() {
        let mut rules = HosRules::default();
        rules.required_break_after_hours = 4.5;
        assert_eq!(rules.required_break_after(), Duration::minutes(270));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "minimum_rest_hours = 9.0").unwrap();

        let rules = HosRules::from_file(file.path()).unwrap();
        assert_eq!(rules.minimum_rest(), Duration::hours(9));
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_daily_driving_hours = -1.0").unwrap();

        assert!(HosRules::from_file(file.path()).is_err());
    }
}
