//! Electronics clocks of a particle detector.
//!
//! [`ElecClock`] models a single periodic clock; [`DetectorClocks`] owns the
//! TPC, optical, trigger and external clocks of a detector and converts
//! between waveform ticks, clock counts, electronics time and simulation
//! time.

#![forbid(unsafe_code)]

mod clocks;
mod config;
mod elec_clock;

pub use clocks::{DebugReport, DetectorClocks};
pub use config::{ClockConfig, ClockConfigError, ConfigEntry, ConfigItem, ConfigRecord};
pub use elec_clock::ElecClock;
