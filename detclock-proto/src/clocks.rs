use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::{
    config::{ClockConfig, ClockConfigError, ConfigItem, ConfigRecord},
    elec_clock::ElecClock,
};

/// Electronics clocks of the detector and the conversions between them.
///
/// The provider owns four clocks (TPC, optical, trigger and external) that
/// share one frame period, plus the timing of the current event. Times are
/// expressed in the electronics time scale in microseconds unless a function
/// says otherwise; simulation (Geant4) times are in nanoseconds.
///
/// A `DetectorClocks` only exists once configured. Once per event the
/// trigger-determination stage calls [`set_trigger_time`]; all conversions
/// requested afterwards refer to that event. Until the first call the
/// configured default trigger and beam gate times are used.
///
/// # Caveats
///
/// The external clock keeps the reference time it was configured with:
/// [`set_trigger_time`] does not move it. [`external_clock_at_time`] builds
/// its clock with the *trigger* clock frequency. Both behaviours are relied
/// upon by existing consumers and are kept as they are.
///
/// [`set_trigger_time`]: DetectorClocks::set_trigger_time
/// [`external_clock_at_time`]: DetectorClocks::external_clock_at_time
#[derive(Debug, Clone)]
pub struct DetectorClocks {
    /// Configuration the clocks were built from
    config: ClockConfig,
    /// Overrides waiting for the next `apply_params`
    pending: Option<ClockConfig>,

    /// Start of the TPC readout relative to the hardware trigger [us]
    trigger_offset_tpc: f64,

    /// Simulation time zero in the electronics time scale [us]
    g4_ref_time: f64,
    /// `g4_ref_time` as configured, before any per-event rebasing [us]
    g4_ref_time_default: f64,

    tpc_clock: ElecClock,
    optical_clock: ElecClock,
    trigger_clock: ElecClock,
    external_clock: ElecClock,

    trigger_time: f64,
    beam_gate_time: f64,

    /// Simulated trigger time of the last rebase within the current event
    rebased_with: Option<f64>,
}

impl DetectorClocks {
    pub fn new(config: ClockConfig) -> Result<Self, ClockConfigError> {
        config.validate()?;

        let g4_ref_time = config.g4_ref_time * 1e-3;
        let trigger_time = config.default_trig_time;
        let clock = |frequency| ElecClock::new(trigger_time, config.frame_period, frequency);

        let trigger_offset_tpc = if config.trigger_offset_tpc < 0.0 {
            config.trigger_offset_tpc
        } else {
            // offset is a tick number
            -config.trigger_offset_tpc / config.clock_speed_tpc
        };

        let clocks = DetectorClocks {
            pending: None,
            trigger_offset_tpc,
            g4_ref_time,
            g4_ref_time_default: g4_ref_time,
            tpc_clock: clock(config.clock_speed_tpc),
            optical_clock: clock(config.clock_speed_optical),
            trigger_clock: clock(config.clock_speed_trigger),
            external_clock: clock(config.clock_speed_external),
            trigger_time,
            beam_gate_time: config.default_beam_time,
            rebased_with: None,
            config,
        };

        info!(
            frame_period = clocks.frame_period(),
            tpc = clocks.tpc_clock.frequency(),
            optical = clocks.optical_clock.frequency(),
            trigger = clocks.trigger_clock.frequency(),
            external = clocks.external_clock.frequency(),
            "configured detector clocks"
        );
        debug!("{}", clocks.debug_report());

        Ok(clocks)
    }

    /// Replace the configuration, resetting all clocks and the event timing
    pub fn configure(&mut self, config: ClockConfig) -> Result<(), ClockConfigError> {
        *self = DetectorClocks::new(config)?;
        Ok(())
    }

    /// Override a single configuration value. Takes effect on the next
    /// [`apply_params`](DetectorClocks::apply_params); until then the clocks,
    /// the conversions and [`config`](DetectorClocks::config) are unchanged.
    pub fn set_config_value(&mut self, item: ConfigItem, value: f64) {
        debug!(%item, value, "overriding clock configuration value");
        self.pending
            .get_or_insert_with(|| self.config.clone())
            .set_value(item, value);
    }

    /// Rebuild the clocks from the configuration with all overrides applied.
    ///
    /// Overrides that fail validation are discarded and the provider keeps
    /// its current configuration and event timing.
    pub fn apply_params(&mut self) -> Result<(), ClockConfigError> {
        match self.pending.take() {
            Some(config) => self.configure(config),
            None => self.configure(self.config.clone()),
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn config_names(&self) -> impl Iterator<Item = &'static str> {
        ConfigItem::ALL.into_iter().map(ConfigItem::name)
    }

    pub fn config_values(&self) -> Vec<f64> {
        ConfigItem::ALL
            .into_iter()
            .map(|item| self.config.value(item))
            .collect()
    }

    pub fn config_record(&self) -> ConfigRecord {
        self.config.record()
    }

    /// Whether `candidate` matches every value recorded by this provider
    pub fn is_right_config(&self, candidate: &ConfigRecord) -> bool {
        self.check_inherited(candidate).is_ok()
    }

    /// Like [`is_right_config`](DetectorClocks::is_right_config), but names
    /// the first item that does not match.
    pub fn check_inherited(&self, candidate: &ConfigRecord) -> Result<(), ClockConfigError> {
        self.config_record().check(candidate).map_err(|e| {
            warn!(error = %e, "clock configuration does not match");
            e
        })
    }

    pub fn inherit_clock_config(&self) -> bool {
        self.config.inherit_clock_config
    }

    pub fn trig_module_name(&self) -> &str {
        &self.config.trig_module_name
    }

    pub fn g4_ref_corr_trig_module_name(&self) -> &str {
        &self.config.g4_ref_corr_trig_module_name
    }

    pub fn frame_period(&self) -> f64 {
        self.tpc_clock.frame_period()
    }

    //
    // Event timing
    //

    /// Hardware trigger time [us]
    pub fn trigger_time(&self) -> f64 {
        self.trigger_time
    }

    /// Beam gate opening time [us]
    pub fn beam_gate_time(&self) -> f64 {
        self.beam_gate_time
    }

    /// Set the hardware trigger and beam gate times of a new event.
    ///
    /// Moves the TPC, optical and trigger clocks to `trigger_time`; the
    /// external clock is left untouched.
    pub fn set_trigger_time(&mut self, trigger_time: f64, beam_gate_time: f64) {
        self.trigger_time = trigger_time;
        self.beam_gate_time = beam_gate_time;
        self.tpc_clock.set_time(trigger_time);
        self.optical_clock.set_time(trigger_time);
        self.trigger_clock.set_time(trigger_time);
        self.rebased_with = None;
    }

    /// Go back to the configured trigger and beam gate times
    pub fn set_default_trigger_time(&mut self) {
        self.set_trigger_time(self.config.default_trig_time, self.config.default_beam_time);
    }

    /// Simulation time zero in the electronics time scale [us]
    pub fn g4_ref_time(&self) -> f64 {
        self.g4_ref_time
    }

    /// Configured simulation time zero [us]
    pub fn g4_ref_time_default(&self) -> f64 {
        self.g4_ref_time_default
    }

    /// Shift the simulation time zero so that a simulated trigger at
    /// `sim_trigger_time` [us] lines up with this event's trigger time.
    ///
    /// Used when overlaying simulation on data. Must be called after
    /// [`set_trigger_time`](DetectorClocks::set_trigger_time) for the event.
    pub fn rebase_g4_ref_time(&mut self, sim_trigger_time: f64) {
        if let Some(previous) = self.rebased_with {
            if previous != sim_trigger_time {
                warn!(
                    previous,
                    sim_trigger_time, "G4 reference time rebased twice within one event"
                );
            }
            debug_assert!(
                previous == sim_trigger_time,
                "G4 reference time rebased twice within one event with different trigger times"
            );
        }

        self.g4_ref_time = self.g4_ref_time_default - self.trigger_time() + sim_trigger_time;
        self.rebased_with = Some(sim_trigger_time);
        debug!(g4_ref_time = self.g4_ref_time, "rebased G4 reference time");
    }

    /// Time elapsed from the hardware trigger to the start of the TPC
    /// readout [us]; negative when the readout starts before the trigger.
    pub fn trigger_offset_tpc(&self) -> f64 {
        self.trigger_offset_tpc
    }

    /// Electronics time of TPC tick 0 for this event [us]
    pub fn tpc_time(&self) -> f64 {
        self.trigger_time() + self.trigger_offset_tpc()
    }

    /// Given a simulation time [ns], the electronics time [us]
    pub fn g4_to_elec_time(&self, g4_time: f64) -> f64 {
        g4_time * 1e-3 - self.g4_ref_time
    }

    /// Given an electronics time [us], the TPC tick (waveform index)
    pub fn time_to_tick(&self, time: f64) -> f64 {
        (time - self.tpc_time()) / self.tpc_clock.tick_period()
    }

    //
    // Clock views
    //

    /// TPC clock, with its reference time at the trigger time
    pub fn tpc_clock(&self) -> &ElecClock {
        &self.tpc_clock
    }

    /// TPC clock with its reference time at `time` [us]
    pub fn tpc_clock_at_time(&self, time: f64) -> ElecClock {
        ElecClock::new(time, self.tpc_clock.frame_period(), self.tpc_clock.frequency())
    }

    /// TPC clock with its reference time at `sample` within `frame`
    pub fn tpc_clock_at(&self, sample: i64, frame: i64) -> ElecClock {
        let mut clock = self.tpc_clock;
        clock.set_time_at(sample, frame);
        clock
    }

    pub fn optical_clock(&self) -> &ElecClock {
        &self.optical_clock
    }

    pub fn optical_clock_at_time(&self, time: f64) -> ElecClock {
        ElecClock::new(
            time,
            self.optical_clock.frame_period(),
            self.optical_clock.frequency(),
        )
    }

    pub fn optical_clock_at(&self, sample: i64, frame: i64) -> ElecClock {
        let mut clock = self.optical_clock;
        clock.set_time_at(sample, frame);
        clock
    }

    pub fn trigger_clock(&self) -> &ElecClock {
        &self.trigger_clock
    }

    pub fn trigger_clock_at_time(&self, time: f64) -> ElecClock {
        ElecClock::new(
            time,
            self.trigger_clock.frame_period(),
            self.trigger_clock.frequency(),
        )
    }

    pub fn trigger_clock_at(&self, sample: i64, frame: i64) -> ElecClock {
        let mut clock = self.trigger_clock;
        clock.set_time_at(sample, frame);
        clock
    }

    /// External clock, still at the configured default trigger time
    pub fn external_clock(&self) -> &ElecClock {
        &self.external_clock
    }

    /// External clock with its reference time at `time` [us].
    ///
    /// Note that the frequency is the one of the trigger clock.
    pub fn external_clock_at_time(&self, time: f64) -> ElecClock {
        ElecClock::new(
            time,
            self.external_clock.frame_period(),
            self.trigger_clock.frequency(),
        )
    }

    pub fn external_clock_at(&self, sample: i64, frame: i64) -> ElecClock {
        let mut clock = self.external_clock;
        clock.set_time_at(sample, frame);
        clock
    }

    //
    // TPC waveform ticks
    //

    /// Given a TPC tick (waveform index), the time w.r.t. the trigger [us]
    pub fn tpc_tick_to_trig_time(&self, tick: f64) -> f64 {
        self.tpc_clock.tick_period() * tick + self.trigger_offset_tpc()
    }

    /// Given a TPC tick (waveform index), the time w.r.t. the beam gate [us]
    pub fn tpc_tick_to_beam_time(&self, tick: f64) -> f64 {
        self.tpc_tick_to_trig_time(tick) + self.trigger_time() - self.beam_gate_time()
    }

    /// Given a TPC tick (waveform index), the TPC clock count [tdc]
    pub fn tpc_tick_to_tdc(&self, tick: f64) -> f64 {
        self.tpc_time() / self.tpc_clock.tick_period() + tick
    }

    /// Given a TPC tick (waveform index), the electronics time [us]
    pub fn tpc_tick_to_time(&self, tick: f64) -> f64 {
        self.tpc_time() + tick * self.tpc_clock.tick_period()
    }

    /// Given a TPC clock count [tdc], the TPC tick (waveform index)
    pub fn tpc_tdc_to_tick(&self, tdc: f64) -> f64 {
        tdc - self.tpc_time() / self.tpc_clock.tick_period()
    }

    /// Given a simulation time [ns], the TPC clock count [tdc]
    pub fn tpc_g4_time_to_tdc(&self, g4_time: f64) -> f64 {
        self.g4_to_elec_time(g4_time) / self.tpc_clock.tick_period()
    }

    /// Given a simulation time [ns], the TPC tick (waveform index)
    pub fn tpc_g4_time_to_tick(&self, g4_time: f64) -> f64 {
        (self.g4_to_elec_time(g4_time) - self.tpc_time()) / self.tpc_clock.tick_period()
    }

    //
    // Optical waveform ticks, for a waveform starting at `sample` of `frame`
    //

    pub fn optical_tick_to_trig_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.optical_clock.tick_period() * tick + self.optical_clock.time_at(sample, frame)
            - self.trigger_time()
    }

    pub fn optical_tick_to_beam_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.optical_clock.tick_period() * tick + self.optical_clock.time_at(sample, frame)
            - self.beam_gate_time()
    }

    pub fn optical_tick_to_tdc(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.optical_clock.ticks_at(sample, frame) as f64 + tick
    }

    pub fn optical_tick_to_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.optical_clock.time_at(sample, frame) + tick * self.optical_clock.tick_period()
    }

    pub fn optical_g4_time_to_tdc(&self, g4_time: f64) -> f64 {
        self.g4_to_elec_time(g4_time) / self.optical_clock.tick_period()
    }

    //
    // External waveform ticks, for a waveform starting at `sample` of `frame`
    //

    pub fn external_tick_to_trig_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.external_clock.tick_period() * tick + self.external_clock.time_at(sample, frame)
            - self.trigger_time()
    }

    pub fn external_tick_to_beam_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.external_clock.tick_period() * tick + self.external_clock.time_at(sample, frame)
            - self.beam_gate_time()
    }

    pub fn external_tick_to_tdc(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.external_clock.ticks_at(sample, frame) as f64 + tick
    }

    pub fn external_tick_to_time(&self, tick: f64, sample: i64, frame: i64) -> f64 {
        self.external_clock.time_at(sample, frame) + tick * self.external_clock.tick_period()
    }

    pub fn external_g4_time_to_tdc(&self, g4_time: f64) -> f64 {
        self.g4_to_elec_time(g4_time) / self.external_clock.tick_period()
    }

    pub fn debug_report(&self) -> DebugReport<'_> {
        DebugReport(self)
    }
}

/// Human readable dump of the clock settings and the current event timing
pub struct DebugReport<'a>(&'a DetectorClocks);

impl Display for DebugReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clocks = self.0;

        writeln!(f, "Detector clocks:")?;
        writeln!(
            f,
            "  trigger offset TPC (configured): {}",
            clocks.config.trigger_offset_tpc
        )?;
        writeln!(
            f,
            "  trigger offset TPC:              {} us",
            clocks.trigger_offset_tpc()
        )?;
        writeln!(f, "  G4 reference time:               {} us", clocks.g4_ref_time())?;
        writeln!(
            f,
            "  G4 reference time (default):     {} us",
            clocks.g4_ref_time_default()
        )?;
        writeln!(f, "  frame period:                    {} us", clocks.frame_period())?;
        writeln!(f, "  trigger time:                    {} us", clocks.trigger_time())?;
        writeln!(f, "  beam gate time:                  {} us", clocks.beam_gate_time())?;
        writeln!(
            f,
            "  TPC clock:                       {} MHz",
            clocks.tpc_clock().frequency()
        )?;
        writeln!(
            f,
            "  optical clock:                   {} MHz",
            clocks.optical_clock().frequency()
        )?;
        writeln!(
            f,
            "  trigger clock:                   {} MHz",
            clocks.trigger_clock().frequency()
        )?;
        writeln!(
            f,
            "  external clock:                  {} MHz",
            clocks.external_clock().frequency()
        )?;
        write!(f, "  TPC start time:                  {} us", clocks.tpc_time())
    }
}
