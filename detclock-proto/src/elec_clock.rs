use std::ops::{Add, AddAssign, Sub, SubAssign};

/// One periodic electronics clock.
///
/// All times are in microseconds and frequencies in megahertz, so a tick
/// lasts `1 / frequency` microseconds. The frequency and the frame period are
/// fixed when the clock is built; only the reference instant (`time`) moves.
///
/// Sample and frame numbers are signed: anything outside the "physical" range
/// simply extrapolates linearly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ElecClock {
    /// Current reference instant [us]
    time: f64,
    /// Duration of one frame [us]
    frame_period: f64,
    /// Ticks per microsecond [MHz]
    frequency: f64,
}

impl ElecClock {
    pub fn new(time: f64, frame_period: f64, frequency: f64) -> Self {
        debug_assert!(frequency > 0.0, "clock frequency must be positive");
        debug_assert!(frame_period > 0.0, "frame period must be positive");

        Self {
            time,
            frame_period,
            frequency,
        }
    }

    /// Clock frequency [MHz]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Frame period [us]
    pub fn frame_period(&self) -> f64 {
        self.frame_period
    }

    /// Duration of a single tick [us]
    pub fn tick_period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Number of ticks in one frame, rounded to the nearest whole tick
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_ticks(&self) -> i64 {
        (self.frame_period * self.frequency).round() as i64
    }

    /// Current reference instant [us]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Absolute time of `sample` within `frame` [us]
    pub fn time_at(&self, sample: i64, frame: i64) -> f64 {
        frame as f64 * self.frame_period + sample as f64 * self.tick_period()
    }

    /// Duration of `ticks` ticks [us]
    pub fn time_of_ticks(&self, ticks: i64) -> f64 {
        ticks as f64 * self.tick_period()
    }

    /// `time` moved down to the start of the tick containing it
    pub fn tick_floor(&self, time: f64) -> f64 {
        self.time_of_ticks(self.ticks_of(time))
    }

    /// Tick count of the current reference instant
    pub fn ticks(&self) -> i64 {
        self.ticks_of(self.time)
    }

    /// Tick count of `time`, rounded towards negative infinity
    #[allow(clippy::cast_possible_truncation)]
    pub fn ticks_of(&self, time: f64) -> i64 {
        (time * self.frequency).floor() as i64
    }

    /// Absolute tick count of `sample` within `frame`, saturating at the
    /// `i64` range
    pub fn ticks_at(&self, sample: i64, frame: i64) -> i64 {
        frame
            .saturating_mul(self.frame_ticks())
            .saturating_add(sample)
    }

    /// Sample number of the current reference instant within its frame
    pub fn sample(&self) -> i64 {
        self.sample_of(self.time)
    }

    /// Sample number of `time` within its frame
    pub fn sample_of(&self, time: f64) -> i64 {
        let ticks = self.ticks_of(time);
        ticks.checked_rem_euclid(self.frame_ticks()).unwrap_or(ticks)
    }

    /// Frame number of the current reference instant
    pub fn frame(&self) -> i64 {
        self.frame_of(self.time)
    }

    /// Frame number of `time`
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_of(&self, time: f64) -> i64 {
        (time / self.frame_period).floor() as i64
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn set_time_at(&mut self, sample: i64, frame: i64) {
        self.time = self.time_at(sample, frame);
    }

    pub fn set_ticks(&mut self, ticks: i64) {
        self.time = self.time_of_ticks(ticks);
    }
}

impl Add<f64> for ElecClock {
    type Output = ElecClock;

    fn add(self, rhs: f64) -> Self::Output {
        ElecClock {
            time: self.time + rhs,
            ..self
        }
    }
}

impl AddAssign<f64> for ElecClock {
    fn add_assign(&mut self, rhs: f64) {
        *self = *self + rhs;
    }
}

impl Sub<f64> for ElecClock {
    type Output = ElecClock;

    fn sub(self, rhs: f64) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign<f64> for ElecClock {
    fn sub_assign(&mut self, rhs: f64) {
        *self = *self - rhs;
    }
}

/// Difference between the reference instants of two clocks [us]
impl Sub for ElecClock {
    type Output = f64;

    fn sub(self, rhs: ElecClock) -> Self::Output {
        self.time - rhs.time
    }
}
