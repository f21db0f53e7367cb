//! Configuration for the balance board analytics pipeline.

use crate::core::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Classifier tunables applied to every device
    pub analytics: ClassifierConfig,

    /// Partition interval for sink records (in seconds)
    pub bucket_secs: u64,

    /// Directory for event exports
    pub export_path: PathBuf,

    /// Directory for session statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("balance-board");

        Self {
            analytics: ClassifierConfig::default(),
            bucket_secs: 60,
            export_path: data_dir.join("events"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("balance-board")
            .join("config.json")
    }

    /// Path of the persisted session statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject settings the classifier cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analytics;
        // with no threshold every frame is loaded, including an empty board
        if a.mass_threshold == 0 {
            return Err(ConfigError::Invalid("mass_threshold must be at least 1".into()));
        }
        if a.window_capacity == 0 {
            return Err(ConfigError::Invalid("window_capacity must be at least 1".into()));
        }
        if a.calibration_capacity == 0 {
            return Err(ConfigError::Invalid(
                "calibration_capacity must be at least 1".into(),
            ));
        }
        // the latch needs threshold_count + 1 decisions inside one window
        if a.threshold_count as usize >= a.window_capacity {
            return Err(ConfigError::Invalid(format!(
                "threshold_count ({}) must be below window_capacity ({})",
                a.threshold_count, a.window_capacity
            )));
        }
        if self.bucket_secs == 0 {
            return Err(ConfigError::Invalid("bucket_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Bucket interval as a chrono duration.
    pub fn bucket(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.bucket_secs.min(i64::MAX as u64) as i64)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analytics.mass_threshold, 300);
        assert_eq!(config.analytics.threshold_count, 10);
        assert_eq!(config.analytics.window_capacity, 20);
        assert_eq!(config.analytics.calibration_capacity, 100);
        assert_eq!(config.bucket(), chrono::Duration::minutes(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unreachable_threshold_is_rejected() {
        let mut config = Config::default();
        config.analytics.threshold_count = 20;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.analytics.threshold_count = 19;
        assert!(config.validate().is_ok());

        config.bucket_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_mass_threshold_is_rejected() {
        let mut config = Config::default();
        config.analytics.mass_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.analytics.mass_threshold = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("bboard-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let mut config = Config::default();
        config.analytics.mass_threshold = 450;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.analytics.mass_threshold, 450);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let loaded = Config::load_from(Path::new("/nonexistent/bboard/config.json")).unwrap();
        assert_eq!(loaded.analytics, ClassifierConfig::default());
    }
}
