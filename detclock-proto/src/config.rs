use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric configuration items, in the order they are recorded for the
/// consistency check between jobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConfigItem {
    G4RefTime,
    TriggerOffsetTpc,
    FramePeriod,
    ClockSpeedTpc,
    ClockSpeedOptical,
    ClockSpeedTrigger,
    ClockSpeedExternal,
    DefaultTrigTime,
    DefaultBeamTime,
}

impl ConfigItem {
    pub const ALL: [ConfigItem; 9] = [
        ConfigItem::G4RefTime,
        ConfigItem::TriggerOffsetTpc,
        ConfigItem::FramePeriod,
        ConfigItem::ClockSpeedTpc,
        ConfigItem::ClockSpeedOptical,
        ConfigItem::ClockSpeedTrigger,
        ConfigItem::ClockSpeedExternal,
        ConfigItem::DefaultTrigTime,
        ConfigItem::DefaultBeamTime,
    ];

    /// Name of the item as it appears in configuration files and records
    pub const fn name(self) -> &'static str {
        match self {
            ConfigItem::G4RefTime => "G4RefTime",
            ConfigItem::TriggerOffsetTpc => "TriggerOffsetTPC",
            ConfigItem::FramePeriod => "FramePeriod",
            ConfigItem::ClockSpeedTpc => "ClockSpeedTPC",
            ConfigItem::ClockSpeedOptical => "ClockSpeedOptical",
            ConfigItem::ClockSpeedTrigger => "ClockSpeedTrigger",
            ConfigItem::ClockSpeedExternal => "ClockSpeedExternal",
            ConfigItem::DefaultTrigTime => "DefaultTrigTime",
            ConfigItem::DefaultBeamTime => "DefaultBeamTime",
        }
    }
}

impl Display for ConfigItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockConfigError {
    #[error("invalid value {value} for {item}: expected {expected}")]
    InvalidValue {
        item: ConfigItem,
        value: f64,
        expected: &'static str,
    },
    #[error("{item} differs from the inherited clock configuration: recorded {recorded}, found {candidate}")]
    Mismatch {
        item: String,
        recorded: f64,
        candidate: f64,
    },
    #[error("{item} is missing from the inherited clock configuration")]
    Missing { item: String },
}

/// Timing configuration of the detector electronics.
///
/// Every field except `G4RefCorrTrigModuleName` is mandatory; deserializing
/// a table without one of them fails with a `missing field` error instead of
/// falling back to a default.
///
/// Units are microseconds and megahertz, except for `G4RefTime` which is
/// given in nanoseconds like the simulation it refers to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// Simulation time zero in the electronics time scale [ns]
    #[serde(rename = "G4RefTime")]
    pub g4_ref_time: f64,
    /// Start of the TPC readout relative to the hardware trigger.
    ///
    /// A negative value is a time [us]; a non-negative value is the
    /// (possibly fractional) TPC tick at which the trigger arrives.
    #[serde(rename = "TriggerOffsetTPC")]
    pub trigger_offset_tpc: f64,
    /// Frame period shared by all clocks [us]
    #[serde(rename = "FramePeriod")]
    pub frame_period: f64,
    #[serde(rename = "ClockSpeedTPC")]
    pub clock_speed_tpc: f64,
    #[serde(rename = "ClockSpeedOptical")]
    pub clock_speed_optical: f64,
    #[serde(rename = "ClockSpeedTrigger")]
    pub clock_speed_trigger: f64,
    #[serde(rename = "ClockSpeedExternal")]
    pub clock_speed_external: f64,
    /// Hardware trigger time used until one is set for the event [us]
    #[serde(rename = "DefaultTrigTime")]
    pub default_trig_time: f64,
    /// Beam gate opening time used until one is set for the event [us]
    #[serde(rename = "DefaultBeamTime")]
    pub default_beam_time: f64,
    /// Input tag of the trigger data product
    #[serde(rename = "TrigModuleName")]
    pub trig_module_name: String,
    /// Whether this configuration has to match the one of previous jobs
    #[serde(rename = "InheritClockConfig")]
    pub inherit_clock_config: bool,
    /// Input tag of the trigger data product used for `G4RefTime` corrections
    #[serde(rename = "G4RefCorrTrigModuleName", default)]
    pub g4_ref_corr_trig_module_name: String,
}

impl ClockConfig {
    pub fn value(&self, item: ConfigItem) -> f64 {
        match item {
            ConfigItem::G4RefTime => self.g4_ref_time,
            ConfigItem::TriggerOffsetTpc => self.trigger_offset_tpc,
            ConfigItem::FramePeriod => self.frame_period,
            ConfigItem::ClockSpeedTpc => self.clock_speed_tpc,
            ConfigItem::ClockSpeedOptical => self.clock_speed_optical,
            ConfigItem::ClockSpeedTrigger => self.clock_speed_trigger,
            ConfigItem::ClockSpeedExternal => self.clock_speed_external,
            ConfigItem::DefaultTrigTime => self.default_trig_time,
            ConfigItem::DefaultBeamTime => self.default_beam_time,
        }
    }

    pub fn set_value(&mut self, item: ConfigItem, value: f64) {
        let field = match item {
            ConfigItem::G4RefTime => &mut self.g4_ref_time,
            ConfigItem::TriggerOffsetTpc => &mut self.trigger_offset_tpc,
            ConfigItem::FramePeriod => &mut self.frame_period,
            ConfigItem::ClockSpeedTpc => &mut self.clock_speed_tpc,
            ConfigItem::ClockSpeedOptical => &mut self.clock_speed_optical,
            ConfigItem::ClockSpeedTrigger => &mut self.clock_speed_trigger,
            ConfigItem::ClockSpeedExternal => &mut self.clock_speed_external,
            ConfigItem::DefaultTrigTime => &mut self.default_trig_time,
            ConfigItem::DefaultBeamTime => &mut self.default_beam_time,
        };
        *field = value;
    }

    /// Check that every numeric item lies within its valid domain
    pub fn validate(&self) -> Result<(), ClockConfigError> {
        for item in ConfigItem::ALL {
            let value = self.value(item);
            let (ok, expected) = match item {
                ConfigItem::FramePeriod
                | ConfigItem::ClockSpeedTpc
                | ConfigItem::ClockSpeedOptical
                | ConfigItem::ClockSpeedTrigger
                | ConfigItem::ClockSpeedExternal => {
                    (value.is_finite() && value > 0.0, "a positive number")
                }
                _ => (value.is_finite(), "a finite number"),
            };

            if !ok {
                return Err(ClockConfigError::InvalidValue {
                    item,
                    value,
                    expected,
                });
            }
        }

        Ok(())
    }

    /// The ordered name/value record of this configuration
    pub fn record(&self) -> ConfigRecord {
        ConfigItem::ALL
            .into_iter()
            .map(|item| (item.name().to_owned(), self.value(item)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub value: f64,
}

/// Ordered name/value mapping of a clock configuration, as persisted by a
/// job so that later jobs can check they use the same timing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigRecord {
    entries: Vec<ConfigEntry>,
}

impl ConfigRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, or overwrite the value of an existing one in place
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(ConfigEntry { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that `candidate` carries every entry of this record with exactly
    /// the same value. Entries only present in `candidate` are ignored.
    pub fn check(&self, candidate: &ConfigRecord) -> Result<(), ClockConfigError> {
        for entry in &self.entries {
            match candidate.get(&entry.name) {
                None => {
                    return Err(ClockConfigError::Missing {
                        item: entry.name.clone(),
                    })
                }
                Some(value) if value != entry.value => {
                    return Err(ClockConfigError::Mismatch {
                        item: entry.name.clone(),
                        recorded: entry.value,
                        candidate: value,
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ConfigRecord {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut record = ConfigRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}
