// Configuration management for the nearscan CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/nearscan/config.json
// - Linux: ~/.config/nearscan/config.json
// - Windows: %APPDATA%\nearscan\config.json

use anyhow::{Context, Result};
use nearscan_core::ScanSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan core settings
    pub scan: ScanSettings,

    /// Defaults for `nearscan simulate`
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulateConfig {
    /// How long to collect sightings once scanning, in milliseconds
    pub scan_duration_ms: u64,

    /// Upper bound on prompt/retry rounds before giving up
    pub max_rounds: u32,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            scan_duration_ms: 500,
            max_rounds: 8,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("nearscan");

        std::fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load config from `path`, or write defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = serde_json::from_str(&contents)
                .context("Failed to parse config file")?;
            config.scan.validate().context("Invalid scan settings")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.scan.validate().context("Invalid scan settings")?;
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value (not persisted; call `save`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_level" => {
                self.scan.api_level = value.parse().context("Invalid API level")?;
            }
            "location_for_discovery" => {
                self.scan.location_for_discovery =
                    value.parse().context("Invalid boolean value")?;
            }
            "radio_enable_grace_ms" => {
                self.scan.radio_enable_grace_ms = value.parse().context("Invalid number")?;
            }
            "radio_poll_interval_ms" => {
                self.scan.radio_poll_interval_ms = value.parse().context("Invalid number")?;
            }
            "settings_redirect_after" => {
                self.scan.settings_redirect_after = value.parse().context("Invalid number")?;
            }
            "scan_duration_ms" => {
                self.simulate.scan_duration_ms = value.parse().context("Invalid number")?;
            }
            "max_rounds" => {
                self.simulate.max_rounds = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.scan.validate().context("Invalid scan settings")?;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("api_level".to_string(), self.scan.api_level.to_string()),
            (
                "location_for_discovery".to_string(),
                self.scan.location_for_discovery.to_string(),
            ),
            (
                "radio_enable_grace_ms".to_string(),
                self.scan.radio_enable_grace_ms.to_string(),
            ),
            (
                "radio_poll_interval_ms".to_string(),
                self.scan.radio_poll_interval_ms.to_string(),
            ),
            (
                "settings_redirect_after".to_string(),
                self.scan.settings_redirect_after.to_string(),
            ),
            (
                "scan_duration_ms".to_string(),
                self.simulate.scan_duration_ms.to_string(),
            ),
            ("max_rounds".to_string(), self.simulate.max_rounds.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.radio_enable_grace_ms, 3000);
        assert_eq!(config.simulate.max_rounds, 8);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("api_level", "30").unwrap();
        config.set("location_for_discovery", "false").unwrap();
        assert_eq!(config.get("api_level").as_deref(), Some("30"));
        assert_eq!(config.get("location_for_discovery").as_deref(), Some("false"));
        assert!(config.get("nope").is_none());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("unknown", "1").is_err());
        assert!(config.set("api_level", "abc").is_err());
        assert!(config.set("settings_redirect_after", "1").is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.scan, ScanSettings::default());

        let mut changed = config.clone();
        changed.set("max_rounds", "3").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().simulate.max_rounds, 3);
    }
}
