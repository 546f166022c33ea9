//! Peripheral abstraction layer
//!
//! Trait-based abstractions for the waveform-producing peripherals an
//! interrupter channel can be wired to. Bus transports (I2C, SPI) use the
//! `embedded-hal` 1.0 traits directly; only their timing configuration
//! lives here.

/// Failure reported by a peripheral implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Bus-level failure (arbitration loss, framing)
    Bus,
    /// Addressed device did not acknowledge
    Nack,
    /// Transport timeout expired
    Timeout,
    /// Transmit FIFO has no free slot
    FifoFull,
    /// Operation not implemented by this peripheral
    Unsupported,
    /// Requested value cannot be represented by the peripheral
    OutOfRange,
}

impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::Bus => "bus error",
            Self::Nack => "no acknowledge",
            Self::Timeout => "transport timeout",
            Self::FifoFull => "FIFO full",
            Self::Unsupported => "operation unsupported",
            Self::OutOfRange => "value out of range",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Hardware PWM slice driving one output pin.
pub trait PwmPeripheral {
    /// Set the PWM period frequency in Hz.
    fn set_frequency(&mut self, hz: u32) -> Result<(), HalError>;

    /// Set the compare value; `0` is constant low, `u16::MAX` constant high.
    fn set_duty_u16(&mut self, duty: u16) -> Result<(), HalError>;
}

/// Periodic hardware timer whose interrupt toggles one output pin.
pub trait ToggleTimer {
    /// Start toggling at `rate_hz` edges per second (twice the output frequency).
    fn start(&mut self, rate_hz: u32) -> Result<(), HalError>;

    /// Start with separate reload values for the high and low phases.
    ///
    /// Timers without asymmetric reload keep the default, which reports
    /// [`HalError::Unsupported`] so callers fall back to [`ToggleTimer::start`].
    fn start_asymmetric(&mut self, high_us: u32, low_us: u32) -> Result<(), HalError> {
        let _ = (high_us, low_us);
        Err(HalError::Unsupported)
    }

    /// Stop the timer. The pin keeps whatever level it had.
    fn stop(&mut self) -> Result<(), HalError>;

    /// Drive the toggled pin low.
    fn force_low(&mut self) -> Result<(), HalError>;
}

/// Programmable-I/O state machine running a pulse program.
///
/// The program reads one packed word per period from the TX FIFO with
/// `pull noblock`, so the previous word repeats until a new one arrives.
pub trait PioStateMachine {
    /// State-machine clock after the fractional divider, in Hz.
    fn clock_hz(&self) -> u32;

    /// Queue a word without blocking.
    fn try_push(&mut self, word: u32) -> Result<(), HalError>;

    /// Start or stop program execution.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), HalError>;

    /// Whether the program is currently executing.
    fn is_enabled(&self) -> bool;

    /// Discard queued words.
    fn clear_fifo(&mut self);

    /// Force the side-set pin low (state machine must be stopped).
    fn force_pin_low(&mut self) -> Result<(), HalError>;
}

impl<T: PwmPeripheral + ?Sized> PwmPeripheral for &mut T {
    fn set_frequency(&mut self, hz: u32) -> Result<(), HalError> {
        T::set_frequency(self, hz)
    }

    fn set_duty_u16(&mut self, duty: u16) -> Result<(), HalError> {
        T::set_duty_u16(self, duty)
    }
}

impl<T: ToggleTimer + ?Sized> ToggleTimer for &mut T {
    fn start(&mut self, rate_hz: u32) -> Result<(), HalError> {
        T::start(self, rate_hz)
    }

    fn start_asymmetric(&mut self, high_us: u32, low_us: u32) -> Result<(), HalError> {
        T::start_asymmetric(self, high_us, low_us)
    }

    fn stop(&mut self) -> Result<(), HalError> {
        T::stop(self)
    }

    fn force_low(&mut self) -> Result<(), HalError> {
        T::force_low(self)
    }
}

impl<T: PioStateMachine + ?Sized> PioStateMachine for &mut T {
    fn clock_hz(&self) -> u32 {
        T::clock_hz(self)
    }

    fn try_push(&mut self, word: u32) -> Result<(), HalError> {
        T::try_push(self, word)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), HalError> {
        T::set_enabled(self, enabled)
    }

    fn is_enabled(&self) -> bool {
        T::is_enabled(self)
    }

    fn clear_fifo(&mut self) {
        T::clear_fifo(self);
    }

    fn force_pin_low(&mut self) -> Result<(), HalError> {
        T::force_pin_low(self)
    }
}

/// I2C transport configuration, applied once at bus initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Per-transfer hardware timeout in microseconds (must be non-zero)
    pub timeout_us: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            frequency: 400_000,
            timeout_us: 50_000,
        }
    }
}

/// SPI transport configuration, applied once at bus initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// SPI mode (CPOL, CPHA)
    pub mode: SpiMode,
    /// Per-transfer timeout in microseconds (must be non-zero)
    pub timeout_us: u32,
}

/// SPI modes (CPOL, CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SpiMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}
