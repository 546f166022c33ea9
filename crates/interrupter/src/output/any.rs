//! Closed set of backends, so one [`ChannelBank`](super::ChannelBank) can
//! mix channel kinds without trait objects.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;
use platform::{PioStateMachine, PwmPeripheral, ToggleTimer};

use super::{
    Activation, BackendKind, HardwarePwm, OutputBackend, Pca9685Output, Pcf8574Relay, PioPwm,
    SoftwarePwm, TimerToggle, Waveform,
};
use crate::error::Error;

/// Any of the supported backends.
pub enum AnyBackend<'a, M: RawMutex, P, T, S, I> {
    /// On-chip PWM slice
    HardwarePwm(HardwarePwm<P>),
    /// Bit-banged generator
    SoftwarePwm(SoftwarePwm<'a, M>),
    /// Timer interrupt toggling a pin
    TimerToggle(TimerToggle<T>),
    /// PIO pulse program
    Pio(PioPwm<S>),
    /// PCA9685 output
    Pca9685(Pca9685Output<'a, M, I>),
    /// PCF8574 relay
    Relay(Pcf8574Relay<'a, M, I>),
}

impl<M, P, T, S, I> OutputBackend for AnyBackend<'_, M, P, T, S, I>
where
    M: RawMutex,
    P: PwmPeripheral,
    T: ToggleTimer,
    S: PioStateMachine,
    I: I2c,
{
    fn kind(&self) -> BackendKind {
        match self {
            Self::HardwarePwm(b) => b.kind(),
            Self::SoftwarePwm(b) => b.kind(),
            Self::TimerToggle(b) => b.kind(),
            Self::Pio(b) => b.kind(),
            Self::Pca9685(b) => b.kind(),
            Self::Relay(b) => b.kind(),
        }
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        match self {
            Self::HardwarePwm(b) => b.start(waveform).await,
            Self::SoftwarePwm(b) => b.start(waveform).await,
            Self::TimerToggle(b) => b.start(waveform).await,
            Self::Pio(b) => b.start(waveform).await,
            Self::Pca9685(b) => b.start(waveform).await,
            Self::Relay(b) => b.start(waveform).await,
        }
    }

    async fn stop(&mut self) -> Result<(), Error> {
        match self {
            Self::HardwarePwm(b) => b.stop().await,
            Self::SoftwarePwm(b) => b.stop().await,
            Self::TimerToggle(b) => b.stop().await,
            Self::Pio(b) => b.stop().await,
            Self::Pca9685(b) => b.stop().await,
            Self::Relay(b) => b.stop().await,
        }
    }
}
