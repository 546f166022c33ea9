//! Interrupter domain newtypes.
//!
//! - `FrequencyHz`: non-zero pulse repetition rate, bounded so the period
//!   stays representable in microseconds
//! - `OnTimeUs`: non-zero pulse high time
//! - `Percent`: clamped 0–100, the unit of status feedback
//! - `Rgb`: one status LED colour

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

impl core::fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} outside {}..={}", self.value, self.min, self.max)
    }
}

// ── FrequencyHz ──────────────────────────────────────────────────────────────

/// Pulse repetition frequency in Hz.
///
/// Zero is rejected: every duty formula divides by the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct FrequencyHz(u32);

impl FrequencyHz {
    /// Lowest accepted frequency.
    pub const MIN_HZ: u32 = 1;

    /// Highest accepted frequency (period of 10 µs).
    pub const MAX_HZ: u32 = 100_000;

    /// Create a `FrequencyHz`, returning an error outside 1–100000 Hz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz == 0` or `hz > 100000`.
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if (Self::MIN_HZ..=Self::MAX_HZ).contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(OutOfRangeError {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        }
    }

    /// Return the frequency in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Period in whole microseconds (truncated).
    #[must_use]
    pub fn period_us(self) -> u32 {
        // self.0 >= 1 by construction
        1_000_000u32.checked_div(self.0).unwrap_or(1_000_000)
    }
}

// ── OnTimeUs ─────────────────────────────────────────────────────────────────

/// Pulse high time in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct OnTimeUs(u32);

impl OnTimeUs {
    /// Shortest pulse.
    pub const MIN_US: u32 = 1;

    /// Longest pulse, one second.
    pub const MAX_US: u32 = 1_000_000;

    /// Create an `OnTimeUs`, returning an error outside 1–1000000 µs.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `us == 0` or `us > 1000000`.
    pub fn new(us: u32) -> Result<Self, OutOfRangeError> {
        if (Self::MIN_US..=Self::MAX_US).contains(&us) {
            Ok(Self(us))
        } else {
            Err(OutOfRangeError {
                value: us,
                min: Self::MIN_US,
                max: Self::MAX_US,
            })
        }
    }

    /// Return the on-time in microseconds.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether this pulse fits in one period of `frequency`.
    #[must_use]
    pub fn fits(self, frequency: FrequencyHz) -> bool {
        self.0 <= frequency.period_us()
    }
}

// ── Percent ──────────────────────────────────────────────────────────────────

/// Percentage clamped to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Percent(u8);

impl Percent {
    /// 0 %
    pub const ZERO: Self = Self(0);

    /// 100 %
    pub const FULL: Self = Self(100);

    /// Create a `Percent`, clamping values above 100 to 100.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Return the inner value (0–100).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

// ── Rgb ──────────────────────────────────────────────────────────────────────

/// 8-bit-per-channel colour for a channel status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// LED off.
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Construct from components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
