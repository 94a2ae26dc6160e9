//! Configuration file support for vitals.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/vitals/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings read from `config.toml`
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Where the journal and registry files live
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Ignored-metric registry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Quiet period after the last mutation before the set is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl RegistryConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Subscore calculation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// History window (days before "today") fed to the subscore calculators
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    #[serde(default = "default_min_bp_sessions")]
    pub min_bp_sessions: usize,

    #[serde(default = "default_min_sleep_entries")]
    pub min_sleep_entries: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            min_bp_sessions: default_min_bp_sessions(),
            min_sleep_entries: default_min_sleep_entries(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("vitals")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_window_days() -> i64 {
    30
}

fn default_min_bp_sessions() -> usize {
    2
}

fn default_min_sleep_entries() -> usize {
    2
}

impl Config {
    /// Load `config.toml` from the default location; defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate the file at `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values no calculation can work with
    pub fn validate(&self) -> Result<()> {
        if self.scoring.window_days <= 0 {
            return Err(Error::Config(format!(
                "scoring.window_days must be positive, got {}",
                self.scoring.window_days
            )));
        }
        if self.scoring.min_bp_sessions == 0 || self.scoring.min_sleep_entries == 0 {
            return Err(Error::Config(
                "scoring minimums must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/vitals/config.toml`, or `~/.config/...` without XDG
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("vitals").join("config.toml")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Write the configuration as pretty TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.debounce_ms, 500);
        assert_eq!(config.scoring.window_days, 30);
        assert_eq!(config.scoring.min_bp_sessions, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.registry.debounce_ms, parsed.registry.debounce_ms);
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[registry]
debounce_ms = 50
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.registry.debounce_window(), Duration::from_millis(50));
        assert_eq!(config.scoring.window_days, 30); // default
    }

    #[test]
    fn test_invalid_window_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[scoring]\nwindow_days = 0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load_from() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scoring.window_days = 14;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.scoring.window_days, 14);
    }
}
