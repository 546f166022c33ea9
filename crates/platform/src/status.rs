//! Channel status feedback
//!
//! The core computes a percentage per channel; whatever drives the LEDs
//! (PWM RGB, addressable strip, nothing at all) implements [`StatusSink`].

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::units::{Percent, Rgb};

/// One status update for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusUpdate {
    /// Channel active at this fraction of its ceiling
    Percent(Percent),
    /// Explicit colour chosen by the caller
    Color(Rgb),
    /// Channel idle
    Off,
}

/// Receiver of per-channel status updates.
pub trait StatusSink {
    /// Publish `update` for `channel`.
    fn update(&mut self, channel: u8, update: StatusUpdate);
}

impl<T: StatusSink + ?Sized> StatusSink for &mut T {
    fn update(&mut self, channel: u8, update: StatusUpdate) {
        T::update(self, channel, update);
    }
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn update(&mut self, _channel: u8, _update: StatusUpdate) {}
}

/// Green → yellow → red ramp used for the channel LEDs.
///
/// Below 50 % green stays full and red rises quadratically; above, red stays
/// full and green falls quadratically.
pub fn status_color(percent: Percent) -> Rgb {
    let v = f64::from(percent.get()) / 100.0;
    let (red, green) = if v < 0.5 {
        let red = (v * 2.0) * (v * 2.0) * 255.0;
        (red as i32, 255)
    } else {
        let x = (v - 0.5) * 2.0;
        let fall = (x * x * 255.0) as i32;
        (255, 256_i32.saturating_sub(fall))
    };
    Rgb::new(
        red.clamp(0, 255) as u8,
        green.clamp(0, 255) as u8,
        0,
    )
}

impl StatusUpdate {
    /// Colour this update should show.
    pub fn color(self) -> Rgb {
        match self {
            Self::Percent(p) => status_color(p),
            Self::Color(rgb) => rgb,
            Self::Off => Rgb::OFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_endpoints() {
        assert_eq!(status_color(Percent::ZERO), Rgb::new(0, 255, 0));
        assert_eq!(status_color(Percent::new(50)), Rgb::new(255, 255, 0));
        assert_eq!(status_color(Percent::FULL), Rgb::new(255, 1, 0));
    }

    #[test]
    fn ramp_midpoints() {
        assert_eq!(status_color(Percent::new(10)), Rgb::new(10, 255, 0));
        assert_eq!(status_color(Percent::new(49)), Rgb::new(244, 255, 0));
        assert_eq!(status_color(Percent::new(75)), Rgb::new(255, 193, 0));
    }

    #[test]
    fn update_colors() {
        assert_eq!(StatusUpdate::Off.color(), Rgb::OFF);
        let c = Rgb::new(1, 2, 3);
        assert_eq!(StatusUpdate::Color(c).color(), c);
    }
}
