// src/config.rs

use crate::error::ConfigError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

/// Environment variable that overrides the default config path.
pub const CONFIG_PATH_ENV: &str = "FOOTFALL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config = Self::from_yaml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents).context("Failed to parse config")?;
        Ok(config)
    }

    /// Path from `FOOTFALL_CONFIG`, falling back to `config.yaml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Reject settings that would make the numeric core meaningless. Bad zone
    /// polygons are not checked here; the zone index drops them one by one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame.width > 0.0 && self.frame.height > 0.0) {
            return Err(ConfigError::invalid(
                "frame",
                format!("{}x{} is not a valid frame size", self.frame.width, self.frame.height),
            ));
        }
        let line = self.tracker.line_position;
        if !(line > 0.0 && line < 1.0) {
            return Err(ConfigError::invalid(
                "tracker.line_position",
                format!("{} must be inside (0, 1)", line),
            ));
        }
        // Line crossing compares the last two samples
        if self.tracker.history_len < 2 {
            return Err(ConfigError::invalid("tracker.history_len", "must be >= 2"));
        }
        if self.tracker.max_distance <= 0.0 {
            return Err(ConfigError::invalid("tracker.max_distance", "must be > 0"));
        }
        let alpha = self.behavior.heatmap.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::invalid(
                "behavior.heatmap.alpha",
                format!("{} must be inside (0, 1]", alpha),
            ));
        }
        let offset = self.behavior.utc_offset_hours;
        if !(-14..=14).contains(&offset) {
            return Err(ConfigError::invalid(
                "behavior.utc_offset_hours",
                format!("{} must be inside [-14, 14]", offset),
            ));
        }
        if self.behavior.heatmap.cell_size <= 0.0 {
            return Err(ConfigError::invalid("behavior.heatmap.cell_size", "must be > 0"));
        }
        if self.groups.min_group_size < 2 {
            return Err(ConfigError::invalid("groups.min_group_size", "must be >= 2"));
        }
        if self.groups.proximity_threshold <= 0.0 {
            return Err(ConfigError::invalid("groups.proximity_threshold", "must be > 0"));
        }
        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::invalid("ingest.queue_capacity", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ZoneType;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
frame:
  width: 640
  height: 480
zones:
  till:
    name: Till 1
    zone_type: checkout
    polygon: [[0, 0], [100, 0], [100, 100], [0, 100]]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.frame.width, 640.0);
        assert_eq!(config.tracker.history_len, 30);
        assert_eq!(config.zones["till"].zone_type, ZoneType::Checkout);
        assert_eq!(config.zones["till"].polygon.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_line_position() {
        let mut config = Config::default();
        config.tracker.line_position = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "tracker.line_position",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_alpha_and_group_size() {
        let mut config = Config::default();
        config.behavior.heatmap.alpha = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.groups.min_group_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_single_sample_history() {
        let mut config = Config::default();
        config.tracker.history_len = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "tracker.history_len",
                ..
            })
        ));
        config.tracker.history_len = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds_utc_offset() {
        let mut config = Config::default();
        config.behavior.utc_offset_hours = -14;
        assert!(config.validate().is_ok());
        config.behavior.utc_offset_hours = 1_000_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "behavior.utc_offset_hours",
                ..
            })
        ));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = Config::from_yaml(include_str!("../config.yaml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.zones.len(), 5);
        assert_eq!(config.zones["checkout"].zone_type, ZoneType::Checkout);
        assert_eq!(config.orchestrator.snapshot_ttl_ms, 2000);
    }
}
