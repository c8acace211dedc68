//! Scan settings and configuration management
//!
//! Serialized to/from JSON. Resolves the platform profile once at startup and
//! carries the timing knobs for the radio-enable wait.

use crate::capability::{required_capabilities, Capability, PlatformProfile};
use crate::gate::DEFAULT_SETTINGS_REDIRECT_AFTER;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Complete scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Platform API level the profile is resolved from
    pub api_level: u32,

    /// Require precise location on runtime-permission platforms too
    pub location_for_discovery: bool,

    /// How long to wait for the radio to report enabled after a request
    pub radio_enable_grace_ms: u64,

    /// Interval between radio state checks during the grace period
    pub radio_poll_interval_ms: u64,

    /// Consecutive denials before redirecting to settings (minimum 2)
    pub settings_redirect_after: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            api_level: 34,
            location_for_discovery: true,
            radio_enable_grace_ms: 3000,
            radio_poll_interval_ms: 100,
            settings_redirect_after: DEFAULT_SETTINGS_REDIRECT_AFTER,
        }
    }
}

impl ScanSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_level == 0 {
            return Err(SettingsError::ConfigError(
                "api_level must be > 0".to_string(),
            ));
        }

        if self.radio_enable_grace_ms == 0 {
            return Err(SettingsError::ConfigError(
                "radio_enable_grace_ms must be > 0".to_string(),
            ));
        }

        if self.radio_poll_interval_ms == 0
            || self.radio_poll_interval_ms > self.radio_enable_grace_ms
        {
            return Err(SettingsError::ConfigError(
                "radio_poll_interval_ms must be > 0 and <= radio_enable_grace_ms".to_string(),
            ));
        }

        if self.settings_redirect_after < DEFAULT_SETTINGS_REDIRECT_AFTER {
            return Err(SettingsError::ConfigError(format!(
                "settings_redirect_after must be >= {}",
                DEFAULT_SETTINGS_REDIRECT_AFTER
            )));
        }

        Ok(())
    }

    pub fn profile(&self) -> PlatformProfile {
        PlatformProfile::new(self.api_level)
            .with_location_for_discovery(self.location_for_discovery)
    }

    /// Capabilities required on the configured platform
    pub fn required_capabilities(&self) -> Vec<Capability> {
        required_capabilities(&self.profile())
    }

    pub fn radio_enable_grace(&self) -> Duration {
        Duration::from_millis(self.radio_enable_grace_ms)
    }

    /// Never zero, even for settings that skipped `validate`
    pub fn radio_poll_interval(&self) -> Duration {
        Duration::from_millis(self.radio_poll_interval_ms.max(1))
    }

    /// Load settings from JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: ScanSettings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
