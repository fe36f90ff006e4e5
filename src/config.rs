//! Recorder configuration
//!
//! Timing budgets and prepare defaults, loadable from a JSON file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::transport::PrepareSettings;
use crate::utils::error::ControlResult;

/// Configuration for the recording controller and its sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Per-command budget for a shutter command round trip (milliseconds)
    pub command_timeout_ms: u64,

    /// Budget for establishing a device link (milliseconds)
    pub connect_timeout_ms: u64,

    /// How many times to poll a device for readiness while arming
    pub ready_poll_attempts: u32,

    /// Delay between readiness polls (milliseconds)
    pub ready_poll_interval_ms: u64,

    /// Settings applied to every device during the prepare step
    pub prepare: PrepareSettings,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 3_000,
            // BLE pairing and service discovery can take a while
            connect_timeout_ms: 15_000,
            ready_poll_attempts: 10,
            ready_poll_interval_ms: 1_000,
            prepare: PrepareSettings::default(),
        }
    }
}

impl RecorderConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> ControlResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write this configuration to a JSON file
    pub fn save(&self, path: &Path) -> ControlResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_sane() {
        let config = RecorderConfig::default();
        assert!(config.command_timeout() > Duration::ZERO);
        assert!(config.connect_timeout() >= config.command_timeout());
        assert!(config.ready_poll_attempts > 0);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recorder.json");

        let mut config = RecorderConfig::default();
        config.command_timeout_ms = 500;
        config.prepare.frame_rate = Some(120);
        config.save(&path).unwrap();

        let loaded = RecorderConfig::load(&path).unwrap();
        assert_eq!(loaded.command_timeout_ms, 500);
        assert_eq!(loaded.prepare.frame_rate, Some(120));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recorder.json");
        std::fs::write(&path, r#"{"commandTimeoutMs": 750}"#).unwrap();

        let loaded = RecorderConfig::load(&path).unwrap();
        assert_eq!(loaded.command_timeout_ms, 750);
        assert_eq!(loaded.ready_poll_attempts, 10);
    }
}
