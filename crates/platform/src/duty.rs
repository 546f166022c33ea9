//! Duty-cycle arithmetic
//!
//! Pure conversions between (frequency, on-time, limits) and the values the
//! rest of the system consumes: feedback percentages, PWM compare registers,
//! clamped on-times. Results feed the RGB status LEDs and the UI, so every
//! function truncates and rounds exactly as documented; do not "simplify"
//! the float expressions, their operation order is part of the contract.
//!
//! All functions take `frequency_hz == 0` without panicking: the period is
//! treated as unbounded, which makes the duty ceiling unbounded too.

// Float arithmetic cannot overflow; integer paths below use saturating ops.
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

/// Full scale of a 16-bit PWM compare register.
pub const DUTY16_FULL_SCALE: u16 = u16::MAX;

/// Full scale of a 12-bit PWM compare register (PCA9685).
pub const DUTY12_FULL_SCALE: u16 = 4095;

/// Highest MIDI velocity / data byte.
pub const MIDI_MAX: u8 = 127;

/// Period in microseconds as a float; infinite for 0 Hz.
fn period_us(frequency_hz: u32) -> f64 {
    1_000_000.0 / f64::from(frequency_hz)
}

/// Truncate a non-negative float toward zero into `0..=max`.
fn trunc_clamped(value: f64, max: u32) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(max) {
        max
    } else {
        value as u32
    }
}

/// Round half to even into `0..=max`.
fn round_clamped(value: f64, max: u32) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value >= f64::from(max) {
        return max;
    }
    let whole = value as u32;
    let frac = value - f64::from(whole);
    let rounded = if frac > 0.5 || (frac == 0.5 && whole % 2 == 1) {
        whole.saturating_add(1)
    } else {
        whole
    };
    rounded.min(max)
}

/// Map `on / limit` to a 0–100 percentage, truncating.
fn ratio_percent(on_time_us: f64, limit_us: f64) -> u8 {
    // NaN comparisons are false, so a NaN limit takes this branch too.
    if !(limit_us > 0.0) {
        return if on_time_us > 0.0 { 100 } else { 0 };
    }
    let percent = on_time_us / limit_us * 100.0;
    trunc_clamped(percent, 100) as u8
}

/// Maximum on-time allowed by a duty ceiling: `(max_duty/100) * (1e6/freq)`.
pub fn max_on_time_for_duty(frequency_hz: u32, max_duty_pct: f32) -> f64 {
    (f64::from(max_duty_pct) / 100.0) * period_us(frequency_hz)
}

/// Feedback percentage for a channel with configurable limits.
///
/// `clamp(on_time / min(max_on_time, duty_limit) * 100, 0, 100)`, truncated.
///
/// ```
/// use platform::duty::percent;
/// assert_eq!(percent(500, 100, 5.0, 300), 100);
/// assert_eq!(percent(1000, 20, 5.0, 300), 40);
/// ```
pub fn percent(frequency_hz: u32, on_time_us: u32, max_duty_pct: f32, max_on_time_us: u32) -> u8 {
    let limit = f64::from(max_on_time_us).min(max_on_time_for_duty(frequency_hz, max_duty_pct));
    ratio_percent(f64::from(on_time_us), limit)
}

/// Feedback percentage for fixed-protocol (MIDI 0–127) values.
///
/// Linear, no duty ceiling: `trunc(value / 127 * 100)`, saturating at 100.
pub fn midi_percent(value: u8) -> u8 {
    ratio_percent(f64::from(value.min(MIDI_MAX)), f64::from(MIDI_MAX))
}

/// On-time in microseconds for a MIDI velocity: `trunc(velocity / 127 * 100)`.
pub fn velocity_to_on_time(velocity: u8) -> u32 {
    trunc_clamped(f64::from(velocity) / f64::from(MIDI_MAX) * 100.0, u32::MAX)
}

/// 16-bit compare value: `round(on_time / period * 65535)`.
pub fn duty16(frequency_hz: u32, on_time_us: u32) -> u16 {
    let ratio = f64::from(on_time_us) / period_us(frequency_hz);
    round_clamped(ratio * f64::from(DUTY16_FULL_SCALE), u32::from(DUTY16_FULL_SCALE)) as u16
}

/// 12-bit compare value: `round(on_time / period * 4095)`.
pub fn duty12(frequency_hz: u32, on_time_us: u32) -> u16 {
    let ratio = f64::from(on_time_us) / period_us(frequency_hz);
    round_clamped(ratio * f64::from(DUTY12_FULL_SCALE), u32::from(DUTY12_FULL_SCALE)) as u16
}

/// Clamp a requested on-time to both ceilings, truncating to whole µs.
pub fn clamp_on_time(on_time_us: u32, frequency_hz: u32, max_duty_pct: f32, max_on_time_us: u32) -> u32 {
    let allowed = f64::from(max_on_time_us).min(max_on_time_for_duty(frequency_hz, max_duty_pct));
    trunc_clamped(f64::from(on_time_us).min(allowed), u32::MAX)
}

#[rustfmt::skip]
const NOTE_FREQUENCIES: [u16; 128] = [
    8, 8, 9, 9, 10, 10, 11, 12, 12, 13, 14, 15, 16, 17, 18, 19,
    20, 21, 23, 24, 25, 27, 29, 30, 32, 34, 36, 38, 41, 43, 46, 48,
    51, 55, 58, 61, 65, 69, 73, 77, 82, 87, 92, 97, 103, 110, 116, 123,
    130, 138, 146, 155, 164, 174, 184, 195, 207, 220, 233, 246, 261, 277, 293, 311,
    329, 349, 369, 391, 415, 440, 466, 493, 523, 554, 587, 622, 659, 698, 739, 783,
    830, 880, 932, 987, 1046, 1108, 1174, 1244, 1318, 1396, 1479, 1567, 1661, 1760, 1864, 1975,
    2093, 2217, 2349, 2489, 2637, 2793, 2959, 3135, 3322, 3520, 3729, 3951, 4186, 4434, 4698, 4978,
    5274, 5587, 5919, 6271, 6644, 7040, 7458, 7902, 8372, 8869, 9397, 9956, 10548, 11175, 11839, 12543,
];

/// Equal-tempered frequency of a MIDI note, `trunc(440 * 2^((note-69)/12))`.
///
/// Tabulated: `powf` is not available without `std`. Notes above 127 clamp.
pub fn midi_to_frequency(note: u8) -> u32 {
    let index = usize::from(note.min(MIDI_MAX));
    NOTE_FREQUENCIES.get(index).copied().map_or(0, u32::from)
}
