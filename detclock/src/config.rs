use std::{os::unix::fs::PermissionsExt, path::Path};

use detclock_proto::{ClockConfig, ClockConfigError, ConfigRecord};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::tracing::LogLevel;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error while reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("clock configuration record parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid clock configuration: {0}")]
    Clock(#[from] ClockConfigError),
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub clocks: ClockConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn from_file(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = file.as_ref();
        info!(?path, "using config file");

        let meta = std::fs::metadata(path)?;
        let perm = meta.permissions();

        const S_IWOTH: u32 = 2;
        if perm.mode() & S_IWOTH != 0 {
            warn!("Unrestricted config file permissions: Others can write.");
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(toml::de::from_str(&contents)?)
    }

    /// Check that the clock values are usable. Only warns about settings
    /// that are valid but probably not what was intended.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.clocks.validate()?;

        if self.clocks.trig_module_name.is_empty() {
            warn!("No trigger module name configured, the trigger time cannot be looked up.");
        }

        Ok(())
    }
}

/// Read the clock configuration record persisted by a previous job
pub fn load_record(file: impl AsRef<Path>) -> Result<ConfigRecord, ConfigError> {
    let path = file.as_ref();
    info!(?path, "using inherited clock configuration record");

    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCKS: &str = r#"
        [clocks]
        G4RefTime = -4050000.0
        TriggerOffsetTPC = -1600.0
        FramePeriod = 1600.0
        ClockSpeedTPC = 2.0
        ClockSpeedOptical = 64.0
        ClockSpeedTrigger = 16.0
        ClockSpeedExternal = 31.25
        DefaultTrigTime = 4050.0
        DefaultBeamTime = 4050.0
        TrigModuleName = "daq"
        InheritClockConfig = true
        G4RefCorrTrigModuleName = "triggersim"
    "#;

    #[test]
    fn test_config() {
        let config: Config = toml::from_str(CLOCKS).unwrap();
        assert!(config.observability.log_level.is_none());
        assert!(config.clocks.inherit_clock_config);
        assert_eq!(config.clocks.g4_ref_corr_trig_module_name, "triggersim");
        assert!(config.check().is_ok());

        let config: Config =
            toml::from_str(&format!("[observability]\nlog-level = \"debug\"\n{CLOCKS}")).unwrap();
        assert_eq!(config.observability.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn toml_clocks_missing() {
        let config: Result<Config, _> = toml::from_str("[observability]\nlog-level = \"info\"");
        assert!(config.is_err());
    }

    #[test]
    fn toml_unknown_table() {
        let config: Result<Config, _> = toml::from_str(&format!("{CLOCKS}\n[geometry]\nx = 1"));
        assert!(config.is_err());
    }

    #[test]
    fn check_rejects_bad_values() {
        let mut config: Config = toml::from_str(CLOCKS).unwrap();
        config.clocks.clock_speed_tpc = -2.0;
        assert!(matches!(config.check(), Err(ConfigError::Clock(_))));
    }

    #[test]
    fn from_file_and_record() {
        let dir = std::env::temp_dir();

        let config_path = dir.join("detclock-test-config.toml");
        std::fs::write(&config_path, CLOCKS).unwrap();
        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.clocks.frame_period, 1600.0);

        let record_path = dir.join("detclock-test-record.json");
        std::fs::write(
            &record_path,
            serde_json::to_string(&config.clocks.record()).unwrap(),
        )
        .unwrap();
        assert_eq!(load_record(&record_path).unwrap(), config.clocks.record());

        assert!(matches!(
            Config::from_file(dir.join("detclock-test-does-not-exist.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
