//! Voltage-glitch timing controller.
//!
//! A glitch cycle power-cycles the target, arms on the external trigger,
//! waits a configured number of timebase quanta and then shorts the core
//! supply for a second configured count. Both counts are swept by the host
//! between attempts; the controller itself runs exactly one attempt per
//! call and keeps a running attempt count.

use std::time::Duration;

use crate::probe::{ControlIo, ProbeError};
use crate::timing::Timebase;

/// Wall-clock wait after toggling target power, long enough for the rails
/// and the target's brown-out logic to settle.
pub const POWER_SETTLE: Duration = Duration::from_millis(250);

/// Glitch timing parameters, in timebase quanta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlitchSettings {
    /// Quanta between the trigger edge and the start of the pulse.
    pub delay_quanta: u32,
    /// Quanta the glitch output stays asserted.
    pub pulse_quanta: u32,
}

impl Default for GlitchSettings {
    fn default() -> Self {
        // Starting point for a parameter sweep, carried over from the
        // hardware bring-up.
        Self {
            delay_quanta: 3400,
            pulse_quanta: 18,
        }
    }
}

/// Counters accumulated across glitch cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlitchStatistics {
    attempts: u32,
}

impl GlitchStatistics {
    /// Glitch cycles run since the controller was created.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Where in the cycle the controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlitchState {
    #[default]
    Idle,
    PowerCycling,
    AwaitingTrigger,
    Delaying,
    Asserting,
}

/// Drives the power, glitch and trigger lines through glitch cycles.
#[derive(Debug)]
pub struct GlitchController<IO, T> {
    io: IO,
    timer: T,
    settings: GlitchSettings,
    statistics: GlitchStatistics,
    state: GlitchState,
}

impl<IO: ControlIo, T: Timebase> GlitchController<IO, T> {
    pub fn new(io: IO, timer: T) -> Self {
        Self::with_settings(io, timer, GlitchSettings::default())
    }

    pub fn with_settings(io: IO, timer: T, settings: GlitchSettings) -> Self {
        Self {
            io,
            timer,
            settings,
            statistics: GlitchStatistics::default(),
            state: GlitchState::Idle,
        }
    }

    pub fn settings(&self) -> &GlitchSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut GlitchSettings {
        &mut self.settings
    }

    pub fn statistics(&self) -> &GlitchStatistics {
        &self.statistics
    }

    pub fn state(&self) -> GlitchState {
        self.state
    }

    pub fn set_delay(&mut self, quanta: u32) {
        self.settings.delay_quanta = quanta;
    }

    pub fn set_pulse(&mut self, quanta: u32) {
        self.settings.pulse_quanta = quanta;
    }

    pub fn power_on(&mut self) -> Result<(), ProbeError> {
        self.io.set_power(true)
    }

    pub fn power_off(&mut self) -> Result<(), ProbeError> {
        self.io.set_power(false)
    }

    /// Cut target power, let the rails settle, switch power back on.
    ///
    /// The settle wait runs only between off and on; the target boots while
    /// the controller moves on to arming the trigger.
    pub fn power_cycle(&mut self) -> Result<(), ProbeError> {
        self.state = GlitchState::PowerCycling;
        self.io.set_power(false)?;
        self.timer.wait_settle(POWER_SETTLE);
        self.io.set_power(true)
    }

    /// Poll the trigger input until it reads high.
    ///
    /// There is no timeout: with no trigger edge this blocks forever. A
    /// backend that needs to break the wait returns an error from
    /// [`ControlIo::trigger`], which propagates out of here.
    pub fn wait_for_trigger(&mut self) -> Result<(), ProbeError> {
        self.state = GlitchState::AwaitingTrigger;
        loop {
            if self.io.trigger()? {
                return Ok(());
            }
        }
    }

    /// Burn `quanta` quanta between the trigger and the pulse.
    pub fn delay(&mut self, quanta: u32) {
        self.state = GlitchState::Delaying;
        self.timer.wait_quanta(quanta);
    }

    /// Assert the glitch output for `quanta` quanta.
    pub fn assert_pulse(&mut self, quanta: u32) -> Result<(), ProbeError> {
        self.state = GlitchState::Asserting;
        self.io.set_glitch(true)?;
        self.timer.wait_quanta(quanta);
        self.io.set_glitch(false)
    }

    /// Run one full attempt: power cycle, arm, delay, pulse.
    pub fn run_glitch_cycle(&mut self) -> Result<(), ProbeError> {
        self.statistics.attempts += 1;
        tracing::debug!(
            attempt = self.statistics.attempts,
            delay = self.settings.delay_quanta,
            pulse = self.settings.pulse_quanta,
            "running glitch cycle"
        );

        self.power_cycle()?;
        self.wait_for_trigger()?;
        self.delay(self.settings.delay_quanta);
        self.assert_pulse(self.settings.pulse_quanta)?;

        self.state = GlitchState::Idle;
        Ok(())
    }
}
