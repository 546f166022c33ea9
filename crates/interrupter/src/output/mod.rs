//! Output channels and their waveform backends
//!
//! An [`OutputChannel`] owns one backend plus its safety limits and is the
//! only way a waveform gets switched on. Channels are created at startup
//! and live in a [`ChannelBank`], which also forwards feedback percentages
//! to the status LEDs.
//!
//! ```text
//! caller ──enable/disable──▶ OutputChannel ──start/stop──▶ OutputBackend
//!                               │                             ├─ HardwarePwm
//!                               │ percent                     ├─ SoftwarePwm
//!                               ▼                             ├─ TimerToggle
//!                           StatusSink                        ├─ PioPwm
//!                                                             ├─ Pca9685Output
//!                                                             └─ Pcf8574Relay
//! ```

mod any;
mod hardware_pwm;
mod pca9685;
mod pio;
mod relay;
mod software_pwm;
mod timer_toggle;

pub use any::AnyBackend;
pub use hardware_pwm::HardwarePwm;
pub use pca9685::{prescale_for, Pca9685, Pca9685Output, DEFAULT_ADDRESS as PCA9685_DEFAULT_ADDRESS};
pub use pio::{period_word, PioPwm};
pub use relay::{Pcf8574, Pcf8574Relay, DEFAULT_RELAY_THRESHOLD_US};
pub use software_pwm::{SoftPwmGenerator, SoftPwmShared, SoftwarePwm};
pub use timer_toggle::TimerToggle;

use heapless::Vec;
use platform::config::MAX_BANNED_FREQUENCIES;
use platform::duty;
use platform::{ChannelLimits, Percent, StatusSink, StatusUpdate};

use crate::error::{Error, ParamError};

/// Which mechanism produces a channel's waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BackendKind {
    /// On-chip PWM slice; exact timing, no CPU involvement
    HardwarePwm,
    /// Cooperative bit-banging task; lowest fidelity
    SoftwarePwm,
    /// Timer interrupt toggling a pin; frequency-accurate, duty-approximate
    TimerToggle,
    /// Programmable-I/O pulse program; glitch-free retuning
    ProgrammableIoPwm,
    /// PCA9685 over I2C; frequency shared by the whole chip
    ExternalI2cPwm,
    /// PCF8574 relay; on/off only, above a minimum on-time
    ThresholdRelay,
}

impl BackendKind {
    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::HardwarePwm => "hardware-pwm",
            Self::SoftwarePwm => "software-pwm",
            Self::TimerToggle => "timer-toggle",
            Self::ProgrammableIoPwm => "pio-pwm",
            Self::ExternalI2cPwm => "pca9685",
            Self::ThresholdRelay => "relay",
        }
    }
}

/// A validated, clamped waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Waveform {
    /// Repetition frequency, non-zero
    pub frequency_hz: u32,
    /// High time per period, non-zero and within the channel ceiling
    pub on_time_us: u32,
}

impl Waveform {
    /// Period in whole microseconds.
    pub fn period_us(&self) -> u32 {
        1_000_000u32.checked_div(self.frequency_hz).unwrap_or(0)
    }

    /// Low time per period in whole microseconds.
    pub fn off_time_us(&self) -> u32 {
        self.period_us().saturating_sub(self.on_time_us)
    }
}

/// What a backend did with a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activation {
    /// The waveform is being produced
    Driven,
    /// The request was accepted but has no physical effect
    Ignored,
}

/// Produces the physical waveform for one channel.
///
/// `start` may be called while already running to retune. `stop` must leave
/// the output low (or at duty zero) before it returns.
pub trait OutputBackend {
    /// Mechanism behind this backend.
    fn kind(&self) -> BackendKind;

    /// Produce `waveform`, replacing whatever was running.
    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error>;

    /// Force the output off.
    async fn stop(&mut self) -> Result<(), Error>;
}

/// Optional parts of an enable request.
///
/// `frequency_hz` and `on_time_us` are mandatory when activating; the
/// limits default to the channel's configured ones.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseParams {
    /// Repetition frequency
    pub frequency_hz: Option<u32>,
    /// Requested high time
    pub on_time_us: Option<u32>,
    /// Duty ceiling override, percent
    pub max_duty_pct: Option<f32>,
    /// On-time ceiling override
    pub max_on_time_us: Option<u32>,
    /// MIDI velocity behind the request; selects the fixed-range feedback
    pub velocity: Option<u8>,
}

impl PulseParams {
    /// Request with frequency and on-time, channel limits.
    pub const fn new(frequency_hz: u32, on_time_us: u32) -> Self {
        Self {
            frequency_hz: Some(frequency_hz),
            on_time_us: Some(on_time_us),
            max_duty_pct: None,
            max_on_time_us: None,
            velocity: None,
        }
    }

    /// Override the duty ceiling.
    #[must_use]
    pub const fn with_max_duty(mut self, pct: f32) -> Self {
        self.max_duty_pct = Some(pct);
        self
    }

    /// Override the on-time ceiling.
    #[must_use]
    pub const fn with_max_on_time(mut self, us: u32) -> Self {
        self.max_on_time_us = Some(us);
        self
    }

    /// Tag the request as a MIDI note of this velocity.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

/// Logical state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// Output low
    #[default]
    Idle,
    /// Output producing this waveform
    Active(Waveform),
}

/// Result of a successful enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feedback {
    /// Channel running; fraction of its ceiling
    Active(Percent),
    /// Channel switched off
    Off,
    /// Backend ignored the request; nothing changed
    Unchanged,
}

/// One output channel: a backend plus safety limits.
pub struct OutputChannel<B> {
    index: u8,
    backend: B,
    limits: ChannelLimits,
    state: ChannelState,
}

impl<B: OutputBackend> OutputChannel<B> {
    /// Idle channel. The backend is assumed to be off.
    pub fn new(index: u8, backend: B, limits: ChannelLimits) -> Self {
        Self {
            index,
            backend,
            limits,
            state: ChannelState::Idle,
        }
    }

    /// Channel index.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Current logical state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether the channel is producing a waveform.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ChannelState::Active(_))
    }

    /// Configured limits.
    pub fn limits(&self) -> ChannelLimits {
        self.limits
    }

    /// The backend, for inspection.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Validate and clamp an activation request without touching hardware.
    ///
    /// Returns the waveform to run and its feedback percentage.
    pub fn plan(&self, params: &PulseParams) -> Result<(Waveform, Percent), Error> {
        let frequency_hz = params.frequency_hz.ok_or(ParamError::MissingFrequency)?;
        let requested = params.on_time_us.ok_or(ParamError::MissingOnTime)?;
        if frequency_hz == 0 {
            return Err(ParamError::ZeroFrequency.into());
        }
        let max_duty = params.max_duty_pct.unwrap_or(self.limits.max_duty_pct);
        let max_on = params.max_on_time_us.unwrap_or(self.limits.max_on_time_us);
        if requested == 0 {
            return Err(ParamError::ZeroOnTime.into());
        }
        // the minimum lifts short pulses, the duty ceiling still wins
        let ceiling = duty::clamp_on_time(u32::MAX, frequency_hz, max_duty, max_on);
        let on_time_us = duty::clamp_on_time(requested, frequency_hz, max_duty, max_on)
            .max(self.limits.min_on_time_us)
            .min(ceiling);
        if on_time_us == 0 {
            return Err(ParamError::ZeroOnTime.into());
        }
        let percent = match params.velocity {
            Some(v) => duty::midi_percent(v),
            None => duty::percent(frequency_hz, on_time_us, max_duty, max_on),
        };
        Ok((
            Waveform {
                frequency_hz,
                on_time_us,
            },
            Percent::new(percent),
        ))
    }

    /// Switch the channel on (`active`) or off.
    ///
    /// Activation without a frequency or on-time fails with
    /// `InvalidParameter` and leaves the channel untouched. A backend
    /// failure while starting drops the channel back to off.
    pub async fn enable(&mut self, active: bool, params: PulseParams) -> Result<Feedback, Error> {
        if !active {
            self.disable().await?;
            return Ok(Feedback::Off);
        }
        let (waveform, percent) = self.plan(&params)?;
        match self.backend.start(waveform).await {
            Ok(Activation::Driven) => {
                debug!(
                    "channel {} {} {} Hz {} us",
                    self.index,
                    self.backend.kind().name(),
                    waveform.frequency_hz,
                    waveform.on_time_us
                );
                self.state = ChannelState::Active(waveform);
                Ok(Feedback::Active(percent))
            }
            Ok(Activation::Ignored) => Ok(Feedback::Unchanged),
            Err(e) => {
                warn!("channel {} start failed: {}", self.index, e.category());
                // best effort: the channel is reported off either way
                let _ = self.backend.stop().await;
                self.state = ChannelState::Idle;
                Err(e)
            }
        }
    }

    /// Force the channel off.
    ///
    /// The channel is logically off afterwards even if the backend reports
    /// an error, which is then returned.
    pub async fn disable(&mut self) -> Result<(), Error> {
        let result = self.backend.stop().await;
        if self.is_active() {
            debug!("channel {} off", self.index);
        }
        self.state = ChannelState::Idle;
        if let Err(e) = result {
            error!("channel {} did not stop cleanly: {}", self.index, e.category());
        }
        result
    }
}

/// Every output channel of the board plus the status sink.
pub struct ChannelBank<B, S, const N: usize> {
    channels: Vec<OutputChannel<B>, N>,
    status: S,
    banned: Vec<u32, MAX_BANNED_FREQUENCIES>,
}

impl<B: OutputBackend, S: StatusSink, const N: usize> ChannelBank<B, S, N> {
    /// Empty bank.
    pub fn new(status: S) -> Self {
        Self {
            channels: Vec::new(),
            status,
            banned: Vec::new(),
        }
    }

    /// Reject these frequencies on activation.
    #[must_use]
    pub fn with_banned(mut self, banned: &[u32]) -> Self {
        self.banned.clear();
        for &hz in banned.iter().take(MAX_BANNED_FREQUENCIES) {
            let _ = self.banned.push(hz);
        }
        self
    }

    /// Add the next channel; index is its position. Returns the backend
    /// back if the bank is full.
    pub fn push(&mut self, backend: B, limits: ChannelLimits) -> Result<u8, B> {
        let Ok(index) = u8::try_from(self.channels.len()) else {
            return Err(backend);
        };
        self.channels
            .push(OutputChannel::new(index, backend, limits))
            .map_err(|c| c.backend)?;
        Ok(index)
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the bank has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel by index.
    pub fn channel(&self, index: u8) -> Option<&OutputChannel<B>> {
        self.channels.get(usize::from(index))
    }

    /// Mutable channel by index.
    pub fn channel_mut(&mut self, index: u8) -> Option<&mut OutputChannel<B>> {
        self.channels.get_mut(usize::from(index))
    }

    /// The status sink.
    pub fn status(&self) -> &S {
        &self.status
    }

    /// Enable or disable channel `index`, publishing its status.
    pub async fn enable(&mut self, index: u8, active: bool, params: PulseParams) -> Result<Feedback, Error> {
        if active {
            if let Some(hz) = params.frequency_hz.filter(|hz| self.banned.contains(hz)) {
                return Err(ParamError::BannedFrequency(hz).into());
            }
        }
        let channel = self
            .channels
            .get_mut(usize::from(index))
            .ok_or(ParamError::UnknownChannel(index))?;
        let result = channel.enable(active, params).await;
        match result {
            Ok(Feedback::Active(p)) => self.status.update(index, StatusUpdate::Percent(p)),
            Ok(Feedback::Off) | Err(_) if !channel.is_active() => {
                self.status.update(index, StatusUpdate::Off);
            }
            _ => {}
        }
        result
    }

    /// Switch channel `index` off.
    pub async fn disable(&mut self, index: u8) -> Result<(), Error> {
        self.enable(index, false, PulseParams::default()).await.map(|_| ())
    }

    /// Apply the same request to every channel, continuing past failures.
    ///
    /// Returns the first error encountered.
    pub async fn enable_all(&mut self, active: bool, params: PulseParams) -> Result<(), Error> {
        let count = u8::try_from(self.channels.len()).unwrap_or(u8::MAX);
        let mut first = Ok(());
        for index in 0..count {
            let result = self.enable(index, active, params).await;
            if first.is_ok() {
                first = result.map(|_| ());
            }
        }
        first
    }

    /// Switch every channel off, continuing past failures.
    ///
    /// Returns the first error encountered.
    pub async fn disable_all(&mut self) -> Result<(), Error> {
        let mut first = Ok(());
        for channel in &mut self.channels {
            let index = channel.index();
            let result = channel.disable().await;
            self.status.update(index, StatusUpdate::Off);
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{MockPwm, MockStatus};

    fn limits() -> ChannelLimits {
        ChannelLimits::default()
    }

    #[tokio::test]
    async fn missing_on_time_leaves_channel_idle() {
        let mut ch = OutputChannel::new(0, HardwarePwm::new(MockPwm::new()), limits());
        let params = PulseParams {
            frequency_hz: Some(500),
            ..PulseParams::default()
        };
        let err = ch.enable(true, params).await.unwrap_err();
        assert_eq!(err, Error::InvalidParameter(ParamError::MissingOnTime));
        assert_eq!(ch.state(), ChannelState::Idle);
        assert_eq!(ch.backend().peripheral().writes, 0);
    }

    #[tokio::test]
    async fn missing_frequency_rejected() {
        let mut ch = OutputChannel::new(0, HardwarePwm::new(MockPwm::new()), limits());
        let params = PulseParams {
            on_time_us: Some(50),
            ..PulseParams::default()
        };
        let err = ch.enable(true, params).await.unwrap_err();
        assert_eq!(err, Error::InvalidParameter(ParamError::MissingFrequency));
    }

    #[tokio::test]
    async fn on_time_clamped_to_duty_ceiling() {
        let mut ch = OutputChannel::new(0, HardwarePwm::new(MockPwm::new()), limits());
        let fb = ch.enable(true, PulseParams::new(1000, 200)).await.unwrap();
        assert_eq!(fb, Feedback::Active(Percent::FULL));
        assert_eq!(
            ch.state(),
            ChannelState::Active(Waveform {
                frequency_hz: 1000,
                on_time_us: 50
            })
        );
    }

    #[test]
    fn short_pulses_lifted_to_minimum() {
        let ch = OutputChannel::new(0, HardwarePwm::new(MockPwm::new()), limits());
        let (wave, _) = ch.plan(&PulseParams::new(1000, 5)).unwrap();
        assert_eq!(wave.on_time_us, 20);
        assert_eq!(
            ch.plan(&PulseParams::new(1000, 0)),
            Err(Error::InvalidParameter(ParamError::ZeroOnTime))
        );

        // a minimum above the duty ceiling yields to the ceiling
        let strict = ChannelLimits {
            min_on_time_us: 80,
            ..ChannelLimits::default()
        };
        let ch = OutputChannel::new(1, HardwarePwm::new(MockPwm::new()), strict);
        let (wave, _) = ch.plan(&PulseParams::new(1000, 30)).unwrap();
        assert_eq!(wave.on_time_us, 50);
        let (wave, _) = ch.plan(&PulseParams::new(200, 30)).unwrap();
        assert_eq!(wave.on_time_us, 80);
    }

    #[tokio::test]
    async fn velocity_selects_midi_feedback() {
        let ch = OutputChannel::new(0, HardwarePwm::new(MockPwm::new()), limits());
        let (_, pct) = ch.plan(&PulseParams::new(440, 20).with_velocity(64)).unwrap();
        assert_eq!(pct, Percent::new(50));
    }

    #[tokio::test]
    async fn bank_publishes_status() {
        let mut bank: ChannelBank<_, _, 2> = ChannelBank::new(MockStatus::new());
        bank.push(HardwarePwm::new(MockPwm::new()), limits()).ok().unwrap();
        bank.enable(0, true, PulseParams::new(1000, 20)).await.unwrap();
        assert_eq!(bank.status().last(0), Some(StatusUpdate::Percent(Percent::new(40))));
        bank.disable(0).await.unwrap();
        assert_eq!(bank.status().last(0), Some(StatusUpdate::Off));
    }

    #[tokio::test]
    async fn bank_rejects_banned_and_unknown() {
        let mut bank: ChannelBank<_, _, 2> =
            ChannelBank::new(MockStatus::new()).with_banned(&[139, 339]);
        bank.push(HardwarePwm::new(MockPwm::new()), limits()).ok().unwrap();
        assert_eq!(
            bank.enable(0, true, PulseParams::new(339, 20)).await,
            Err(Error::InvalidParameter(ParamError::BannedFrequency(339)))
        );
        assert_eq!(
            bank.enable(3, true, PulseParams::new(400, 20)).await,
            Err(Error::InvalidParameter(ParamError::UnknownChannel(3)))
        );
        assert!(bank.status().updates.is_empty());
    }

    #[tokio::test]
    async fn enable_all_continues_past_failures() {
        let mut failing = MockPwm::new();
        failing.fail_with = Some(platform::HalError::Bus);
        let mut bank: ChannelBank<_, _, 3> = ChannelBank::new(MockStatus::new());
        bank.push(HardwarePwm::new(MockPwm::new()), limits()).ok().unwrap();
        bank.push(HardwarePwm::new(failing), limits()).ok().unwrap();
        bank.push(HardwarePwm::new(MockPwm::new()), limits()).ok().unwrap();

        let result = bank.enable_all(true, PulseParams::new(1000, 20)).await;
        assert!(matches!(result, Err(Error::Hardware(_))));
        assert!(bank.channel(0).unwrap().is_active());
        assert!(!bank.channel(1).unwrap().is_active());
        assert!(bank.channel(2).unwrap().is_active());
    }

    #[tokio::test]
    async fn bank_full_returns_backend() {
        let mut bank: ChannelBank<_, _, 1> = ChannelBank::new(MockStatus::new());
        assert!(bank.push(HardwarePwm::new(MockPwm::new()), limits()).is_ok());
        assert!(bank.push(HardwarePwm::new(MockPwm::new()), limits()).is_err());
        assert_eq!(bank.len(), 1);
    }
}
