//! Timer-interrupt backend: a periodic interrupt toggles the output pin.
//!
//! With asymmetric reload support the high and low phases get their own
//! reload values and the duty is exact. Otherwise the timer fires at twice
//! the frequency and the waveform is a square wave; frequency is exact,
//! duty is approximate.

use platform::{HalError, ToggleTimer};

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::error::{Error, HardwareFault};

fn fault(e: HalError) -> Error {
    Error::Hardware(HardwareFault::Peripheral(e))
}

/// Drives a channel by toggling a pin from a timer interrupt.
pub struct TimerToggle<T> {
    timer: T,
}

impl<T: ToggleTimer> TimerToggle<T> {
    /// Wrap a timer whose interrupt toggles the output pin.
    pub fn new(timer: T) -> Self {
        Self { timer }
    }

    /// The timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }
}

impl<T: ToggleTimer> OutputBackend for TimerToggle<T> {
    fn kind(&self) -> BackendKind {
        BackendKind::TimerToggle
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        match self
            .timer
            .start_asymmetric(waveform.on_time_us, waveform.off_time_us())
        {
            Ok(()) => return Ok(Activation::Driven),
            Err(HalError::Unsupported) => {}
            Err(e) => return Err(fault(e)),
        }
        let rate = waveform.frequency_hz.saturating_mul(2);
        debug!("timer toggle square wave at {} edges/s", rate);
        self.timer.start(rate).map_err(fault)?;
        Ok(Activation::Driven)
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let stopped = self.timer.stop();
        // pin must end low even if the timer refused to stop
        self.timer.force_low().map_err(fault)?;
        stopped.map_err(fault)
    }
}
