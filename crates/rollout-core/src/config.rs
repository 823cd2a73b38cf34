//! Engine configuration: reconciler tunables plus the environment table.
//!
//! Loaded once at process start from TOML:
//!
//! ```toml
//! history_limit = 50
//! scan_cap = 10
//! no_match = "estimate"
//!
//! [schedule]
//! weekday = "Thu"
//! time = "22:00:00"
//! utc_offset_minutes = -480
//!
//! [[environments]]
//! id = "canary"
//! display_name = "Canary"
//! external_environment_id = "12"
//! product = "widgets"
//! cadence = { kind = "train_based", offset_days = 1 }
//! ```
//!
//! `ROLLOUT_HISTORY_LIMIT` and `ROLLOUT_SCAN_CAP` override the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Environment, EnvironmentRegistry, Result, RolloutError};
use crate::reconciler::ReconcilerOptions;
use crate::schedule::MAX_UTC_OFFSET_MINUTES;

pub const HISTORY_LIMIT_ENV: &str = "ROLLOUT_HISTORY_LIMIT";
pub const SCAN_CAP_ENV: &str = "ROLLOUT_SCAN_CAP";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub options: ReconcilerOptions,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply environment-variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)?.with_env_overrides()
    }

    /// Apply `ROLLOUT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(HISTORY_LIMIT_ENV) {
            self.options.history_limit = parse_count(HISTORY_LIMIT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SCAN_CAP_ENV) {
            self.options.scan_cap = parse_count(SCAN_CAP_ENV, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.options.history_limit == 0 {
            return Err(RolloutError::InvalidConfig(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.options.scan_cap == 0 {
            return Err(RolloutError::InvalidConfig(
                "scan_cap must be at least 1".to_string(),
            ));
        }
        if self.options.environment_timeout_secs == Some(0) {
            return Err(RolloutError::InvalidConfig(
                "environment_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.options.schedule.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(RolloutError::InvalidConfig(format!(
                "schedule.utc_offset_minutes {} is outside +/-{}",
                self.options.schedule.utc_offset_minutes, MAX_UTC_OFFSET_MINUTES
            )));
        }
        EnvironmentRegistry::new(self.environments.clone()).map(|_| ())
    }

    /// The validated environment table.
    pub fn registry(&self) -> Result<EnvironmentRegistry> {
        EnvironmentRegistry::new(self.environments.clone())
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| RolloutError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeploymentCadence;
    use crate::reconciler::{MatchSelection, NoMatchPolicy, ScanMode};
    use chrono::Weekday;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
history_limit = 25
scan_cap = 5
selection = "earliest_observed"
scan_mode = "concurrent"
no_match = "estimate"
environment_timeout_secs = 30

[schedule]
weekday = "Wed"
time = "18:00:00"
utc_offset_minutes = 60

[[environments]]
id = "canary"
display_name = "Canary"
external_environment_id = "12"
product = "widgets"
cadence = { kind = "train_based", offset_days = 1 }

[[environments]]
id = "dogfood"
display_name = "Dogfood"
external_environment_id = "13"
product = "widgets"
cadence = { kind = "continuous" }
"#;

    #[test]
    fn test_parse_full_config() {
        let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.options.history_limit, 25);
        assert_eq!(config.options.scan_cap, 5);
        assert_eq!(config.options.selection, MatchSelection::EarliestObserved);
        assert_eq!(config.options.scan_mode, ScanMode::Concurrent);
        assert_eq!(config.options.no_match, NoMatchPolicy::Estimate);
        assert_eq!(config.options.environment_timeout_secs, Some(30));
        assert_eq!(config.options.schedule.weekday, Weekday::Wed);
        assert_eq!(config.options.schedule.utc_offset_minutes, 60);

        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("canary").unwrap().cadence,
            DeploymentCadence::TrainBased { offset_days: 1 }
        );
        assert_eq!(
            registry.get("dogfood").unwrap().cadence,
            DeploymentCadence::Continuous
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.options, ReconcilerOptions::default());
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_rejects_zero_scan_cap() {
        let err = EngineConfig::from_toml_str("scan_cap = 0").unwrap_err();
        assert!(matches!(err, RolloutError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let err = EngineConfig::from_toml_str("[schedule]\nutc_offset_minutes = 1000\n").unwrap_err();
        assert!(err.to_string().contains("utc_offset_minutes"));
    }

    #[test]
    fn test_rejects_duplicate_environments() {
        let doc = r#"
[[environments]]
id = "a"
display_name = "A"
external_environment_id = "1"
product = "p"
cadence = { kind = "continuous" }

[[environments]]
id = "a"
display_name = "A again"
external_environment_id = "2"
product = "p"
cadence = { kind = "continuous" }
"#;
        let err = EngineConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, RolloutError::DuplicateEnvironment(_)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("scan_cap = [").unwrap_err();
        assert!(matches!(err, RolloutError::ConfigParse(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [(HISTORY_LIMIT_ENV, "80"), (SCAN_CAP_ENV, " 4 ")]
            .into_iter()
            .collect();
        let config = EngineConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.options.history_limit, 80);
        assert_eq!(config.options.scan_cap, 4);

        let err = EngineConfig::default()
            .with_overrides(|k| (k == SCAN_CAP_ENV).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(SCAN_CAP_ENV));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.environments.len(), 2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, RolloutError::Io(_)));
    }
}
