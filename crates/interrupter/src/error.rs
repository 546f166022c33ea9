//! Error taxonomy of the interrupter core.
//!
//! | Variant              | Severity                  | Handling                            |
//! |----------------------|---------------------------|-------------------------------------|
//! | `Configuration`      | fatal, startup only       | abort initialization of that driver |
//! | `InvalidParameter`   | caller error              | returned synchronously              |
//! | `TransientBus`       | recoverable               | log, skip this poll cycle           |
//! | `Hardware`           | degraded, non-fatal       | hold the channel/device disabled    |

use core::fmt;

use platform::HalError;

use crate::bus::BusId;

/// Startup configuration problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Channel count outside the supported 2–8
    ChannelCount {
        /// Declared count
        found: usize,
    },
    /// Profile declares a different number of outputs than were provided
    OutputCountMismatch {
        /// Channels declared by the profile
        declared: usize,
        /// Backends handed to the context
        provided: usize,
    },
    /// A channel has no pin or peripheral assigned
    MissingPin {
        /// Channel index
        channel: u8,
    },
    /// A device references a bus that was not initialized
    MissingBus(BusId),
    /// A bus transport has no hardware timeout configured
    MissingTimeout(BusId),
    /// Two devices claim the same address on one bus
    DuplicateAddress {
        /// Bus
        bus: BusId,
        /// 7-bit address
        address: u8,
    },
    /// More input devices or lines than the context can hold
    TooManyDevices,
    /// A device is wired to an interrupt line that does not exist
    MissingLine {
        /// Line index
        line: u8,
    },
    /// The backend handed in for a channel is not the kind the profile names
    BackendMismatch {
        /// Channel index
        channel: u8,
    },
    /// Channel limits that admit no on-time
    InvalidLimits {
        /// Channel index
        channel: u8,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelCount { found } => {
                write!(f, "{found} output channels configured, expected 2 to 8")
            }
            Self::OutputCountMismatch { declared, provided } => write!(
                f,
                "profile declares {declared} outputs but {provided} were provided"
            ),
            Self::MissingPin { channel } => write!(f, "channel {channel} has no output pin"),
            Self::MissingBus(bus) => write!(f, "bus {} is not initialized", bus.name()),
            Self::MissingTimeout(bus) => write!(f, "bus {} has no timeout", bus.name()),
            Self::DuplicateAddress { bus, address } => write!(
                f,
                "address 0x{address:02X} used twice on bus {}",
                bus.name()
            ),
            Self::TooManyDevices => f.write_str("too many input devices"),
            Self::MissingLine { line } => write!(f, "interrupt line {line} is not wired"),
            Self::BackendMismatch { channel } => {
                write!(f, "channel {channel} backend differs from the profile")
            }
            Self::InvalidLimits { channel } => {
                write!(f, "channel {channel} limits admit no on-time")
            }
        }
    }
}

/// Caller errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamError {
    /// Activation without a frequency
    MissingFrequency,
    /// Activation without an on-time
    MissingOnTime,
    /// Frequency of zero
    ZeroFrequency,
    /// On-time that clamps to zero
    ZeroOnTime,
    /// Frequency on the banned list
    BannedFrequency(u32),
    /// No channel with this index
    UnknownChannel(u8),
    /// Waveform does not fit the backend's counters
    OutOfRange,
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFrequency => f.write_str("frequency required to activate"),
            Self::MissingOnTime => f.write_str("on-time required to activate"),
            Self::ZeroFrequency => f.write_str("frequency must be non-zero"),
            Self::ZeroOnTime => f.write_str("on-time clamps to zero"),
            Self::BannedFrequency(hz) => write!(f, "{hz} Hz is banned"),
            Self::UnknownChannel(i) => write!(f, "no output channel {i}"),
            Self::OutOfRange => f.write_str("waveform out of backend range"),
        }
    }
}

/// Classification of a failed bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Target did not acknowledge
    Nack,
    /// Transport timeout expired
    Timeout,
    /// Lost multi-controller arbitration
    ArbitrationLoss,
    /// Bus error (misplaced start/stop)
    Bus,
    /// Data overrun
    Overrun,
    /// Anything else the transport reported
    Other,
}

impl BusFault {
    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nack => "nack",
            Self::Timeout => "timeout",
            Self::ArbitrationLoss => "arbitration loss",
            Self::Bus => "bus error",
            Self::Overrun => "overrun",
            Self::Other => "other",
        }
    }

    /// Classify an `embedded-hal` I2C error.
    pub fn from_i2c<E: embedded_hal::i2c::Error>(err: &E) -> Self {
        use embedded_hal::i2c::ErrorKind;
        match err.kind() {
            ErrorKind::NoAcknowledge(_) => Self::Nack,
            ErrorKind::ArbitrationLoss => Self::ArbitrationLoss,
            ErrorKind::Bus => Self::Bus,
            ErrorKind::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

impl From<HalError> for BusFault {
    fn from(err: HalError) -> Self {
        match err {
            HalError::Nack => Self::Nack,
            HalError::Timeout => Self::Timeout,
            HalError::Bus => Self::Bus,
            _ => Self::Other,
        }
    }
}

/// Unexpected hardware behaviour; the affected channel is held off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareFault {
    /// A register read back something other than what was written
    UnexpectedReadback {
        /// Register address
        register: u8,
        /// Value read
        value: u8,
    },
    /// PIO FIFO stayed full
    FifoStalled,
    /// Software generator did not acknowledge stop in time
    GeneratorStuck,
    /// An on-chip peripheral rejected an operation
    Peripheral(HalError),
    /// An output pin could not be driven
    Pin,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedReadback { register, value } => write!(
                f,
                "register 0x{register:02X} read back 0x{value:02X}"
            ),
            Self::FifoStalled => f.write_str("state machine FIFO stalled"),
            Self::GeneratorStuck => f.write_str("software generator did not stop"),
            Self::Peripheral(e) => write!(f, "peripheral: {e}"),
            Self::Pin => f.write_str("output pin not drivable"),
        }
    }
}

/// Any error surfaced by the interrupter core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Fatal at startup
    Configuration(ConfigError),
    /// Caller supplied an unusable request
    InvalidParameter(ParamError),
    /// Bus transfer failed; retried naturally by the next cycle
    TransientBus {
        /// Bus the transfer ran on
        bus: BusId,
        /// Failure class
        kind: BusFault,
    },
    /// Hardware misbehaved; state held at last-known-safe
    Hardware(HardwareFault),
}

impl Error {
    /// Wrap an I2C transport error from `bus`.
    pub fn i2c<E: embedded_hal::i2c::Error>(bus: BusId, err: &E) -> Self {
        Self::TransientBus {
            bus,
            kind: BusFault::from_i2c(err),
        }
    }

    /// Whether the next poll cycle may succeed without intervention.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientBus { .. })
    }

    /// Short category name for log lines.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InvalidParameter(_) => "invalid parameter",
            Self::TransientBus { .. } => "transient bus fault",
            Self::Hardware(_) => "hardware fault",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::InvalidParameter(e) => write!(f, "invalid parameter: {e}"),
            Self::TransientBus { bus, kind } => {
                write!(f, "transient fault on {}: {}", bus.name(), kind.name())
            }
            Self::Hardware(e) => write!(f, "hardware fault: {e}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ParamError> for Error {
    fn from(e: ParamError) -> Self {
        Self::InvalidParameter(e)
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Self {
        Self::Hardware(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_descriptive() {
        let e = Error::from(ConfigError::ChannelCount { found: 9 });
        assert_eq!(
            e.to_string(),
            "configuration error: 9 output channels configured, expected 2 to 8"
        );
        let e = Error::TransientBus {
            bus: BusId::I2c1,
            kind: BusFault::Nack,
        };
        assert_eq!(e.to_string(), "transient fault on i2c1: nack");
        assert!(e.is_transient());
    }

    #[test]
    fn i2c_kinds_map() {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data);
        assert_eq!(BusFault::from_i2c(&nack), BusFault::Nack);
        assert_eq!(BusFault::from_i2c(&ErrorKind::Other), BusFault::Other);
        assert_eq!(BusFault::from(HalError::Timeout), BusFault::Timeout);
    }
}
