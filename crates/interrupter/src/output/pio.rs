//! Programmable-I/O pulse backend.
//!
//! The state machine program repeats one 32-bit word: the low half is the
//! number of state-machine cycles the pin stays high, the high half the
//! number of cycles it stays low. The program does a non-blocking pull at
//! the end of each period, so a new word takes effect on the next period
//! boundary and retuning never glitches.

use embassy_time::Timer;
use platform::{HalError, PioStateMachine};

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::error::{Error, HardwareFault, ParamError};

fn fault(e: HalError) -> Error {
    Error::Hardware(HardwareFault::Peripheral(e))
}

/// Cycles of a `clock_hz` state machine in `micros`.
fn cycles(micros: u32, clock_hz: u32) -> Result<u16, Error> {
    let count = u64::from(micros)
        .saturating_mul(u64::from(clock_hz))
        .checked_div(1_000_000)
        .unwrap_or(0);
    u16::try_from(count).map_err(|_| Error::InvalidParameter(ParamError::OutOfRange))
}

/// Pack a waveform into the program's period word.
pub fn period_word(waveform: Waveform, clock_hz: u32) -> Result<u32, Error> {
    let high = cycles(waveform.on_time_us, clock_hz)?;
    let low = cycles(waveform.off_time_us(), clock_hz)?;
    Ok(u32::from(low).wrapping_shl(16) | u32::from(high))
}

/// Drives a channel from a PIO state machine.
pub struct PioPwm<S> {
    sm: S,
}

impl<S: PioStateMachine> PioPwm<S> {
    /// Wrap a state machine already loaded with the pulse program.
    pub fn new(sm: S) -> Self {
        Self { sm }
    }

    /// The state machine.
    pub fn state_machine(&self) -> &S {
        &self.sm
    }

    /// Mutable access, for simulation in tests.
    pub fn state_machine_mut(&mut self) -> &mut S {
        &mut self.sm
    }
}

impl<S: PioStateMachine> OutputBackend for PioPwm<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::ProgrammableIoPwm
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        let word = period_word(waveform, self.sm.clock_hz())?;

        if !self.sm.is_enabled() {
            self.sm.clear_fifo();
            self.sm.try_push(word).map_err(fault)?;
            self.sm.set_enabled(true).map_err(fault)?;
            return Ok(Activation::Driven);
        }

        match self.sm.try_push(word) {
            Ok(()) => Ok(Activation::Driven),
            Err(HalError::FifoFull) => {
                // the program drains one word per period
                Timer::after_micros(u64::from(waveform.period_us())).await;
                match self.sm.try_push(word) {
                    Ok(()) => Ok(Activation::Driven),
                    Err(HalError::FifoFull) => {
                        warn!("pio fifo still full after one period");
                        Err(Error::Hardware(HardwareFault::FifoStalled))
                    }
                    Err(e) => Err(fault(e)),
                }
            }
            Err(e) => Err(fault(e)),
        }
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let disabled = self.sm.set_enabled(false);
        self.sm.clear_fifo();
        self.sm.force_pin_low().map_err(fault)?;
        disabled.map_err(fault)
    }
}
