//! Input devices: encoder chips, GPIO expanders and switch ports
//!
//! Every device sits on a shared bus behind a [`BusArbiter`] and
//! reports through a shared interrupt line. A device never owns its bus,
//! it borrows it. The ISR only signals the line; all register reads and
//! all decode state live in the poller (see [`crate::pipeline`]).
//!
//! ```text
//! ISR ──signal──▶ InterruptLine ──take──▶ InterruptPipeline
//!                                              │ scan (priority order)
//!                          ┌───────────────────┼──────────────────┐
//!                 QuadratureEncoderBus   GpioExpanderBus      SwitchBus
//!                          │                   │                  │
//!                          └────── with_lock ──┴── BusArbiter ────┘
//! ```
//!
//! [`BusArbiter`]: crate::bus::BusArbiter

pub mod debounce;
mod encoder;
mod expander;
pub mod quadrature;
pub mod registers;
mod switch;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use encoder::{Arrow, ArrowClicks, EncoderChip, Orientation, QuadratureEncoderBus, MAX_ENCODERS};
pub use expander::{DecodeMode, GpioExpanderBus, MAX_RAW_ENCODERS};
pub use quadrature::{EdgeDecoder, ShiftDecoder};
pub use registers::EncoderFamily;
pub use switch::{Port, SwitchBus, SwitchRemap};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Instant;
use embedded_hal::i2c::I2c;
use platform::InputEvent;

use crate::error::Error;

/// Device class, which also fixes the scan priority on a shared line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DeviceKind {
    /// Register-polled encoder chips
    Encoder,
    /// Expander carrying raw encoder pins and switches
    GpioExpander,
    /// Expander port of plain switches
    Switch,
}

impl DeviceKind {
    /// Scan order; lower first. Encoders go before switches so a bounce
    /// read on a switch cannot swallow a rotation.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Encoder => 0,
            Self::GpioExpander => 1,
            Self::Switch => 2,
        }
    }

    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Encoder => "encoder",
            Self::GpioExpander => "gpio-expander",
            Self::Switch => "switch",
        }
    }
}

/// One physical device, or a group of chips sharing a line.
pub trait InputDevice {
    /// Device class.
    fn kind(&self) -> DeviceKind;

    /// Bring the chip(s) to a known state. Called at startup and may be
    /// called again after faults.
    async fn configure(&mut self) -> Result<(), Error>;

    /// Read status and decode at most one event.
    ///
    /// `now` timestamps the scan for debouncing.
    async fn scan(&mut self, now: Instant) -> Result<Option<InputEvent>, Error>;
}

/// Closed set of input devices on one I2C bus type.
pub enum AnyDevice<'a, M: RawMutex, I> {
    /// Encoder chips
    Encoder(QuadratureEncoderBus<'a, M, I>),
    /// MCP23017 with raw encoders and switches
    Expander(GpioExpanderBus<'a, M, I>),
    /// MCP23017 switch port
    Switch(SwitchBus<'a, M, I>),
}

impl<M: RawMutex, I: I2c> InputDevice for AnyDevice<'_, M, I> {
    fn kind(&self) -> DeviceKind {
        match self {
            Self::Encoder(d) => d.kind(),
            Self::Expander(d) => d.kind(),
            Self::Switch(d) => d.kind(),
        }
    }

    async fn configure(&mut self) -> Result<(), Error> {
        match self {
            Self::Encoder(d) => d.configure().await,
            Self::Expander(d) => d.configure().await,
            Self::Switch(d) => d.configure().await,
        }
    }

    async fn scan(&mut self, now: Instant) -> Result<Option<InputEvent>, Error> {
        match self {
            Self::Encoder(d) => d.scan(now).await,
            Self::Expander(d) => d.scan(now).await,
            Self::Switch(d) => d.scan(now).await,
        }
    }
}

impl<'a, M: RawMutex, I> From<QuadratureEncoderBus<'a, M, I>> for AnyDevice<'a, M, I> {
    fn from(d: QuadratureEncoderBus<'a, M, I>) -> Self {
        Self::Encoder(d)
    }
}

impl<'a, M: RawMutex, I> From<GpioExpanderBus<'a, M, I>> for AnyDevice<'a, M, I> {
    fn from(d: GpioExpanderBus<'a, M, I>) -> Self {
        Self::Expander(d)
    }
}

impl<'a, M: RawMutex, I> From<SwitchBus<'a, M, I>> for AnyDevice<'a, M, I> {
    fn from(d: SwitchBus<'a, M, I>) -> Self {
        Self::Switch(d)
    }
}
