//! Register maps of the supported input chips.
//!
//! Addresses and bit positions follow the vendor datasheets; multi-byte
//! counter registers are big-endian.

// ---------------------------------------------------------------------------
// DuPPa encoder family
// ---------------------------------------------------------------------------

/// Encoder chip variants that share the status-register protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EncoderFamily {
    /// DuPPa I2CEncoder V2.1
    I2cEncoderV21,
    /// DuPPa I2CEncoder Mini
    I2cEncoderMini,
    /// DuPPa I2C NavKey (encoder ring plus four arrows and a centre key)
    NavKey,
}

/// Register addresses and status bits of one [`EncoderFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderMap {
    /// General configuration
    pub gconf: u8,
    /// Second configuration byte, if the chip has one
    pub gconf2: Option<u8>,
    /// Interrupt enable mask
    pub intconf: u8,
    /// Status register, read-to-clear
    pub status: u8,
    /// Width of `status` and `intconf` in bytes
    pub status_len: usize,
    /// Counter value, 32-bit
    pub cval: u8,
    /// Counter maximum, 32-bit
    pub cmax: u8,
    /// Counter minimum, 32-bit
    pub cmin: u8,
    /// Counter step, 32-bit
    pub istep: u8,
    /// Anti-bounce period, if configurable
    pub antibounce: Option<u8>,
    /// Software reset bit in `gconf`
    pub reset: u8,
    /// Configuration written to `gconf` after reset
    pub config: u8,
    /// Clock-stretch enable bit in `gconf2`
    pub clock_stretch: u8,
    /// Status bit for a clockwise detent
    pub clockwise: u16,
    /// Status bit for a counter-clockwise detent
    pub counter_clockwise: u16,
    /// Status bit for a push
    pub push: u16,
}

impl EncoderFamily {
    /// Register map for this family.
    pub const fn map(self) -> EncoderMap {
        match self {
            Self::I2cEncoderV21 => EncoderMap {
                gconf: 0x00,
                gconf2: Some(0x30),
                intconf: 0x04,
                status: 0x05,
                status_len: 1,
                cval: 0x08,
                cmax: 0x0C,
                cmin: 0x10,
                istep: 0x14,
                antibounce: Some(0x1E),
                reset: 0x80,
                config: 0x02, // WRAP_ENABLE
                clock_stretch: 0x01,
                clockwise: 0x08,
                counter_clockwise: 0x10,
                push: 0x02,
            },
            Self::I2cEncoderMini => EncoderMap {
                gconf: 0x00,
                gconf2: None,
                intconf: 0x01,
                status: 0x02,
                status_len: 1,
                cval: 0x03,
                cmax: 0x07,
                cmin: 0x0B,
                istep: 0x0F,
                antibounce: None,
                reset: 0x80,
                config: 0x01 | 0x02, // WRAP_ENABLE | DIRE_LEFT
                clock_stretch: 0,
                clockwise: 0x10,
                counter_clockwise: 0x20,
                push: 0x02,
            },
            // NavKey reports the ring the other way round: RINC is CCW.
            Self::NavKey => EncoderMap {
                gconf: 0x00,
                gconf2: None,
                intconf: 0x04,
                status: 0x06,
                status_len: 2,
                cval: 0x0A,
                cmax: 0x0E,
                cmin: 0x12,
                istep: 0x16,
                antibounce: None,
                reset: 0x80,
                config: 0x01, // WRAP_ENABLE
                clock_stretch: 0,
                clockwise: 0x0010,
                counter_clockwise: 0x0008,
                push: 0x0002,
            },
        }
    }

    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I2cEncoderV21 => "i2cencoder",
            Self::I2cEncoderMini => "i2cencoder-mini",
            Self::NavKey => "navkey",
        }
    }
}

/// Counter and anti-bounce values written at configure time.
pub mod counter {
    /// Initial counter value
    pub const VALUE: i32 = 0;
    /// Counter maximum
    pub const MAX: i32 = 100;
    /// Counter minimum
    pub const MIN: i32 = 0;
    /// Increment per detent
    pub const STEP: i32 = 1;
    /// Anti-bounce period in chip units
    pub const ANTIBOUNCE: u8 = 10;
}

/// NavKey arrow status bits, at 0° orientation.
pub mod navkey {
    /// Up arrow pressed
    pub const UP: u16 = 0x0800;
    /// Down arrow pressed
    pub const DOWN: u16 = 0x0200;
    /// Left arrow pressed
    pub const LEFT: u16 = 0x2000;
    /// Right arrow pressed
    pub const RIGHT: u16 = 0x8000;
    /// All arrow bits
    pub const ARROWS: u16 = UP | DOWN | LEFT | RIGHT;
}

// ---------------------------------------------------------------------------
// MCP23017 (IOCON.BANK = 0, registers interleaved A/B)
// ---------------------------------------------------------------------------

/// MCP23017 16-bit GPIO expander.
pub mod mcp23017 {
    /// Power-on address with all address pins low
    pub const DEFAULT_ADDRESS: u8 = 0x20;

    /// Direction, 1 = input
    pub const IODIRA: u8 = 0x00;
    /// Direction, port B
    pub const IODIRB: u8 = 0x01;
    /// Input polarity
    pub const IPOLA: u8 = 0x02;
    /// Interrupt-on-change enable
    pub const GPINTENA: u8 = 0x04;
    /// Interrupt-on-change enable, port B
    pub const GPINTENB: u8 = 0x05;
    /// Default compare value
    pub const DEFVALA: u8 = 0x06;
    /// Interrupt control, 0 = compare against previous value
    pub const INTCONA: u8 = 0x08;
    /// Configuration
    pub const IOCON: u8 = 0x0A;
    /// Pull-up enable
    pub const GPPUA: u8 = 0x0C;
    /// Pull-up enable, port B
    pub const GPPUB: u8 = 0x0D;
    /// Interrupt flags
    pub const INTFA: u8 = 0x0E;
    /// Interrupt flags, port B
    pub const INTFB: u8 = 0x0F;
    /// Pin levels captured at interrupt time; reading clears the interrupt
    pub const INTCAPA: u8 = 0x10;
    /// Captured levels, port B
    pub const INTCAPB: u8 = 0x11;
    /// Port levels
    pub const GPIOA: u8 = 0x12;
    /// Port levels, port B
    pub const GPIOB: u8 = 0x13;
    /// Output latch
    pub const OLATA: u8 = 0x14;

    /// IOCON: INTA and INTB mirror each other
    pub const IOCON_MIRROR: u8 = 0x40;
    /// IOCON: interrupt pin open-drain
    pub const IOCON_ODR: u8 = 0x04;
}
