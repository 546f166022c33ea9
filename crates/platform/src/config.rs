//! Interrupter configuration and constants
//!
//! Limits are read once at startup through [`ConfigStore`]; persistence of
//! the backing document is someone else's job.

use heapless::Vec;

/// Default maximum duty cycle, percent.
pub const DEFAULT_MAX_DUTY_PCT: f32 = 5.0;

/// Default maximum on-time, microseconds.
pub const DEFAULT_MAX_ON_TIME_US: u32 = 300;

/// Default minimum on-time, microseconds.
pub const DEFAULT_MIN_ON_TIME_US: u32 = 20;

/// Default lowest interrupter frequency, Hz.
pub const DEFAULT_MIN_FREQ_HZ: u32 = 100;

/// Default highest interrupter frequency, Hz.
pub const DEFAULT_MAX_FREQ_HZ: u32 = 1000;

/// Maximum number of banned frequencies a store may hold.
pub const MAX_BANNED_FREQUENCIES: usize = 32;

/// Fewest output channels a profile may declare.
pub const MIN_CHANNELS: usize = 2;

/// Most output channels a profile may declare.
pub const MAX_CHANNELS: usize = 8;

/// Safety limits for one output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelLimits {
    /// Duty-cycle ceiling in percent
    pub max_duty_pct: f32,
    /// On-time ceiling in microseconds
    pub max_on_time_us: u32,
    /// Smallest on-time the UI offers, in microseconds
    pub min_on_time_us: u32,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_duty_pct: DEFAULT_MAX_DUTY_PCT,
            max_on_time_us: DEFAULT_MAX_ON_TIME_US,
            min_on_time_us: DEFAULT_MIN_ON_TIME_US,
        }
    }
}

/// Ranges offered by the standard interrupter controls.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InterrupterLimits {
    /// Lowest on-time, µs
    pub min_on_time_us: u32,
    /// Highest on-time, µs
    pub max_on_time_us: u32,
    /// Lowest frequency, Hz
    pub min_freq_hz: u32,
    /// Highest frequency, Hz
    pub max_freq_hz: u32,
    /// Duty ceiling, percent
    pub max_duty_pct: f32,
}

impl Default for InterrupterLimits {
    fn default() -> Self {
        Self {
            min_on_time_us: DEFAULT_MIN_ON_TIME_US,
            max_on_time_us: DEFAULT_MAX_ON_TIME_US,
            min_freq_hz: DEFAULT_MIN_FREQ_HZ,
            max_freq_hz: DEFAULT_MAX_FREQ_HZ,
            max_duty_pct: DEFAULT_MAX_DUTY_PCT,
        }
    }
}

/// Read-only view of the persisted settings.
pub trait ConfigStore {
    /// Limits for output channel `index`; defaults when not configured.
    fn channel_limits(&self, index: usize) -> ChannelLimits;

    /// Ranges for the interrupter controls.
    fn interrupter_limits(&self) -> InterrupterLimits;

    /// Frequencies the controls must skip.
    fn banned_frequencies(&self) -> &[u32];
}

impl<T: ConfigStore + ?Sized> ConfigStore for &T {
    fn channel_limits(&self, index: usize) -> ChannelLimits {
        T::channel_limits(self, index)
    }

    fn interrupter_limits(&self) -> InterrupterLimits {
        T::interrupter_limits(self)
    }

    fn banned_frequencies(&self) -> &[u32] {
        T::banned_frequencies(self)
    }
}

/// In-memory settings, built in code or deserialized from a document.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StaticConfigStore {
    /// Per-channel limits; channels past the end use the defaults
    pub channels: Vec<ChannelLimits, MAX_CHANNELS>,
    /// Interrupter control ranges
    pub interrupter: InterrupterLimits,
    /// Banned frequencies, Hz
    pub banned_frequencies: Vec<u32, MAX_BANNED_FREQUENCIES>,
}

impl StaticConfigStore {
    /// Store with `limits` for the first `count` channels.
    pub fn uniform(limits: ChannelLimits, count: usize) -> Self {
        let mut channels = Vec::new();
        for _ in 0..count.min(MAX_CHANNELS) {
            // capacity checked by the range bound
            let _ = channels.push(limits);
        }
        Self {
            channels,
            ..Self::default()
        }
    }

    /// Replace the banned list, keeping at most [`MAX_BANNED_FREQUENCIES`].
    #[must_use]
    pub fn with_banned(mut self, banned: &[u32]) -> Self {
        self.banned_frequencies.clear();
        for &hz in banned.iter().take(MAX_BANNED_FREQUENCIES) {
            let _ = self.banned_frequencies.push(hz);
        }
        self
    }
}

impl ConfigStore for StaticConfigStore {
    fn channel_limits(&self, index: usize) -> ChannelLimits {
        self.channels.get(index).copied().unwrap_or_default()
    }

    fn interrupter_limits(&self) -> InterrupterLimits {
        self.interrupter
    }

    fn banned_frequencies(&self) -> &[u32] {
        &self.banned_frequencies
    }
}

/// Step `candidate` away from banned frequencies in the direction of travel.
///
/// `direction` is the sign of the requested change; zero leaves the
/// candidate as is. Stops at the numeric bounds rather than wrapping.
pub fn skip_banned(candidate: u32, direction: i32, step: u32, banned: &[u32]) -> u32 {
    let mut hz = candidate;
    if direction == 0 || step == 0 {
        return hz;
    }
    // bounded by the list length: each step leaves at most one banned value
    for _ in 0..=banned.len() {
        if !banned.contains(&hz) {
            break;
        }
        hz = if direction > 0 {
            hz.saturating_add(step)
        } else {
            hz.saturating_sub(step)
        };
    }
    hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let l = ChannelLimits::default();
        assert_eq!(l.max_on_time_us, 300);
        assert_eq!(l.min_on_time_us, 20);
        let i = InterrupterLimits::default();
        assert_eq!((i.min_freq_hz, i.max_freq_hz), (100, 1000));
    }

    #[test]
    fn store_falls_back_to_defaults() {
        let tight = ChannelLimits {
            max_duty_pct: 2.0,
            max_on_time_us: 100,
            min_on_time_us: 10,
        };
        let store = StaticConfigStore::uniform(tight, 2);
        assert_eq!(store.channel_limits(1), tight);
        assert_eq!(store.channel_limits(5), ChannelLimits::default());
    }

    #[test]
    fn skip_banned_follows_direction() {
        let banned = [389, 390, 391, 439];
        assert_eq!(skip_banned(389, 1, 1, &banned), 392);
        assert_eq!(skip_banned(391, -1, 1, &banned), 388);
        assert_eq!(skip_banned(439, 1, 10, &banned), 449);
        assert_eq!(skip_banned(400, 1, 1, &banned), 400);
        assert_eq!(skip_banned(390, 0, 1, &banned), 390);
    }
}
