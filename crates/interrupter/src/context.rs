//! Startup wiring
//!
//! A [`HardwareProfile`] describes the board: how many outputs and of which
//! kind, which input chips sit on which bus and interrupt line. Startup
//! validates it, then builds one [`HardwareContext`] holding the channel
//! bank and one [`InterruptPipeline`] per line. Everything else receives
//! references from the context; there is no global registry.
//!
//! The buses outlive the context: devices borrow their [`BusArbiter`] from
//! a [`Buses`] set owned by the caller.
//!
//! [`BusArbiter`]: crate::bus::BusArbiter
//! [`Buses`]: crate::bus::Buses

use embassy_time::Instant;
use heapless::Vec;
use platform::config::{MAX_CHANNELS, MIN_CHANNELS};
use platform::{ChannelLimits, ConfigStore, InputEvent, InterrupterLimits, InterruptLine, StatusSink};

use crate::bus::BusId;
use crate::error::{ConfigError, Error};
use crate::input::{DeviceKind, InputDevice};
use crate::output::{BackendKind, ChannelBank, OutputBackend};
use crate::pipeline::InterruptPipeline;

/// Most interrupt lines a board may wire.
pub const MAX_LINES: usize = 4;

/// Most input chips a profile may list.
pub const MAX_PROFILE_DEVICES: usize = 16;

/// Most devices polled on one line.
pub const MAX_DEVICES_PER_LINE: usize = 4;

/// One input chip in a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceEntry {
    /// Device class
    pub kind: DeviceKind,
    /// Bus the chip sits on
    pub bus: BusId,
    /// 7-bit address
    pub address: u8,
    /// Interrupt line index
    pub line: u8,
}

/// Static description of a board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HardwareProfile {
    /// Backend kind per output channel, in channel order
    pub outputs: Vec<BackendKind, MAX_CHANNELS>,
    /// Input chips
    pub devices: Vec<DeviceEntry, MAX_PROFILE_DEVICES>,
    /// Number of interrupt lines wired
    pub lines: u8,
}

impl HardwareProfile {
    /// Check counts, buses, lines and addresses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let found = self.outputs.len();
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&found) {
            return Err(ConfigError::ChannelCount { found });
        }
        if usize::from(self.lines) > MAX_LINES {
            return Err(ConfigError::TooManyDevices);
        }
        for (i, entry) in self.devices.iter().enumerate() {
            if !entry.bus.is_i2c() {
                return Err(ConfigError::MissingBus(entry.bus));
            }
            if entry.line >= self.lines {
                return Err(ConfigError::MissingLine { line: entry.line });
            }
            let clash = self
                .devices
                .iter()
                .take(i)
                .any(|other| other.bus == entry.bus && other.address == entry.address);
            if clash {
                return Err(ConfigError::DuplicateAddress {
                    bus: entry.bus,
                    address: entry.address,
                });
            }
        }
        Ok(())
    }
}

/// Limits that leave some on-time to run.
fn usable(limits: &ChannelLimits) -> bool {
    limits.max_on_time_us > 0
        && limits.max_duty_pct > 0.0
        && limits.max_on_time_us >= limits.min_on_time_us
}

/// Pipeline type held per line.
pub type LinePipeline<'a, D> = InterruptPipeline<'a, D, MAX_DEVICES_PER_LINE>;

/// Every output channel and input pipeline of the board.
pub struct HardwareContext<'a, B, S, D, const N: usize> {
    bank: ChannelBank<B, S, N>,
    pipelines: Vec<LinePipeline<'a, D>, MAX_LINES>,
    interrupter: InterrupterLimits,
}

impl<'a, B, S, D, const N: usize> HardwareContext<'a, B, S, D, N>
where
    B: OutputBackend,
    S: StatusSink,
    D: InputDevice,
{
    /// Build the context.
    ///
    /// `backends` must match `profile.outputs` one to one, in order.
    /// `devices` pairs each device with its line index into `lines`.
    pub fn new<C, IB, ID>(
        profile: &HardwareProfile,
        store: &C,
        status: S,
        backends: IB,
        lines: &'a [InterruptLine],
        devices: ID,
    ) -> Result<Self, Error>
    where
        C: ConfigStore,
        IB: IntoIterator<Item = B>,
        ID: IntoIterator<Item = (u8, D)>,
    {
        let built = Self::build(profile, store, status, backends, lines, devices);
        if let Err(e) = &built {
            error!("hardware context rejected: {}", e.category());
        }
        built
    }

    fn build<C, IB, ID>(
        profile: &HardwareProfile,
        store: &C,
        status: S,
        backends: IB,
        lines: &'a [InterruptLine],
        devices: ID,
    ) -> Result<Self, Error>
    where
        C: ConfigStore,
        IB: IntoIterator<Item = B>,
        ID: IntoIterator<Item = (u8, D)>,
    {
        profile.validate()?;
        let declared = profile.outputs.len();
        if declared > N {
            return Err(ConfigError::ChannelCount { found: declared }.into());
        }

        let mut bank = ChannelBank::new(status).with_banned(store.banned_frequencies());
        let mut provided = 0usize;
        for backend in backends {
            if let Some(&kind) = profile.outputs.get(provided) {
                let channel = u8::try_from(provided).unwrap_or(u8::MAX);
                if backend.kind() != kind {
                    return Err(ConfigError::BackendMismatch { channel }.into());
                }
                let limits = store.channel_limits(provided);
                if !usable(&limits) {
                    return Err(ConfigError::InvalidLimits { channel }.into());
                }
                bank.push(backend, limits)
                    .map_err(|_| ConfigError::ChannelCount { found: declared })?;
            }
            provided = provided.saturating_add(1);
        }
        if provided != declared {
            return Err(ConfigError::OutputCountMismatch { declared, provided }.into());
        }

        if lines.len() < usize::from(profile.lines) {
            let line = u8::try_from(lines.len()).unwrap_or(u8::MAX);
            return Err(ConfigError::MissingLine { line }.into());
        }
        let mut pipelines = Vec::new();
        for line in lines {
            pipelines
                .push(InterruptPipeline::new(line))
                .map_err(|_| ConfigError::TooManyDevices)?;
        }
        for (line, device) in devices {
            pipelines
                .get_mut(usize::from(line))
                .ok_or(ConfigError::MissingLine { line })?
                .add(device)?;
        }

        Ok(Self {
            bank,
            pipelines,
            interrupter: store.interrupter_limits(),
        })
    }

    /// Force every output off and configure every input device.
    ///
    /// Continues past failures; returns the first error.
    pub async fn bring_up(&mut self) -> Result<(), Error> {
        let mut first = self.bank.disable_all().await;
        for pipeline in &mut self.pipelines {
            let result = pipeline.configure().await;
            if first.is_ok() {
                first = result;
            }
        }
        info!(
            "{} outputs, {} input lines up",
            self.bank.len(),
            self.pipelines.len()
        );
        first
    }

    /// One poll cycle over every line; the first event wins.
    ///
    /// Lines not reached keep their pending flag for the next cycle.
    pub async fn poll_inputs(&mut self, now: Instant) -> Option<InputEvent> {
        for pipeline in &mut self.pipelines {
            if let Some(event) = pipeline.poll_once(now).await {
                return Some(event);
            }
        }
        None
    }

    /// Force every output off.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.bank.disable_all().await
    }

    /// The channel bank.
    pub fn bank(&self) -> &ChannelBank<B, S, N> {
        &self.bank
    }

    /// Mutable channel bank.
    pub fn bank_mut(&mut self) -> &mut ChannelBank<B, S, N> {
        &mut self.bank
    }

    /// Pipelines, one per line.
    pub fn pipelines(&self) -> &[LinePipeline<'a, D>] {
        &self.pipelines
    }

    /// The pipeline of line `line`.
    pub fn pipeline_mut(&mut self, line: u8) -> Option<&mut LinePipeline<'a, D>> {
        self.pipelines.get_mut(usize::from(line))
    }

    /// Bank and pipelines at once, for handing to separate tasks.
    pub fn split(&mut self) -> (&mut ChannelBank<B, S, N>, &mut [LinePipeline<'a, D>]) {
        (&mut self.bank, &mut self.pipelines)
    }

    /// Ranges for the interrupter controls, as read at startup.
    pub fn interrupter_limits(&self) -> InterrupterLimits {
        self.interrupter
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::output::HardwarePwm;
    use platform::mocks::{MockPwm, MockStatus};
    use platform::StaticConfigStore;

    struct Quiet(DeviceKind);

    impl InputDevice for Quiet {
        fn kind(&self) -> DeviceKind {
            self.0
        }

        async fn configure(&mut self) -> Result<(), Error> {
            Ok(())
        }

        async fn scan(&mut self, _now: Instant) -> Result<Option<InputEvent>, Error> {
            Ok(None)
        }
    }

    type Ctx<'a> = HardwareContext<'a, HardwarePwm<MockPwm>, MockStatus, Quiet, 4>;

    fn entry(kind: DeviceKind, address: u8, line: u8) -> DeviceEntry {
        DeviceEntry {
            kind,
            bus: BusId::I2c1,
            address,
            line,
        }
    }

    fn profile(outputs: usize) -> HardwareProfile {
        let mut p = HardwareProfile {
            lines: 2,
            ..HardwareProfile::default()
        };
        for _ in 0..outputs {
            p.outputs.push(BackendKind::HardwarePwm).unwrap();
        }
        p.devices.push(entry(DeviceKind::Encoder, 0x10, 0)).unwrap();
        p.devices.push(entry(DeviceKind::Switch, 0x21, 1)).unwrap();
        p
    }

    fn no_devices() -> [(u8, Quiet); 0] {
        []
    }

    fn pwms(count: usize) -> impl Iterator<Item = HardwarePwm<MockPwm>> {
        (0..count).map(|_| HardwarePwm::new(MockPwm::new()))
    }

    #[test]
    fn profile_channel_count_bounds() {
        assert_eq!(
            profile(1).validate(),
            Err(ConfigError::ChannelCount { found: 1 })
        );
        assert_eq!(profile(2).validate(), Ok(()));
        assert_eq!(profile(8).validate(), Ok(()));
    }

    #[test]
    fn profile_rejects_duplicates_and_unwired_lines() {
        let mut p = profile(2);
        p.devices.push(entry(DeviceKind::GpioExpander, 0x21, 0)).unwrap();
        assert_eq!(
            p.validate(),
            Err(ConfigError::DuplicateAddress {
                bus: BusId::I2c1,
                address: 0x21
            })
        );

        let mut p = profile(2);
        p.devices.push(entry(DeviceKind::GpioExpander, 0x22, 2)).unwrap();
        assert_eq!(p.validate(), Err(ConfigError::MissingLine { line: 2 }));

        let mut p = profile(2);
        p.devices
            .push(DeviceEntry {
                bus: BusId::Spi1,
                ..entry(DeviceKind::Switch, 0x30, 0)
            })
            .unwrap();
        assert_eq!(p.validate(), Err(ConfigError::MissingBus(BusId::Spi1)));
    }

    #[test]
    fn output_count_must_match() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let store = StaticConfigStore::default();
        let result = Ctx::new(&profile(3), &store, MockStatus::new(), pwms(2), &lines, no_devices());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::OutputCountMismatch {
                declared: 3,
                provided: 2
            }))
        ));
    }

    #[test]
    fn backend_kind_must_match() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let mut p = profile(2);
        p.outputs[1] = BackendKind::TimerToggle;
        let store = StaticConfigStore::default();
        let result = Ctx::new(&p, &store, MockStatus::new(), pwms(2), &lines, no_devices());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::BackendMismatch { channel: 1 }))
        ));
    }

    #[test]
    fn unusable_limits_rejected() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let dead = ChannelLimits {
            max_duty_pct: 0.0,
            ..ChannelLimits::default()
        };
        let store = StaticConfigStore::uniform(dead, 2);
        let result = Ctx::new(&profile(2), &store, MockStatus::new(), pwms(2), &lines, no_devices());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::InvalidLimits { channel: 0 }))
        ));
    }

    #[test]
    fn devices_land_on_their_lines() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let store = StaticConfigStore::default().with_banned(&[333]);
        let devices = [
            (1, Quiet(DeviceKind::Switch)),
            (0, Quiet(DeviceKind::Encoder)),
            (1, Quiet(DeviceKind::Encoder)),
        ];
        let ctx =
            Ctx::new(&profile(2), &store, MockStatus::new(), pwms(2), &lines, devices).unwrap();
        assert_eq!(ctx.bank().len(), 2);
        assert_eq!(ctx.pipelines().len(), 2);
        assert_eq!(ctx.pipelines()[0].devices().len(), 1);
        let kinds: std::vec::Vec<_> =
            ctx.pipelines()[1].devices().iter().map(|d| d.0).collect();
        assert_eq!(kinds, [DeviceKind::Encoder, DeviceKind::Switch]);
    }

    #[test]
    fn device_on_missing_line_rejected() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let store = StaticConfigStore::default();
        let result = Ctx::new(
            &profile(2),
            &store,
            MockStatus::new(),
            pwms(2),
            &lines,
            [(3, Quiet(DeviceKind::Switch))],
        );
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::MissingLine { line: 3 }))
        ));
    }

    #[tokio::test]
    async fn bring_up_forces_outputs_off_and_arms_lines() {
        let lines = [InterruptLine::new(), InterruptLine::new()];
        let store = StaticConfigStore::default();
        let mut ctx = Ctx::new(
            &profile(2),
            &store,
            MockStatus::new(),
            pwms(2),
            &lines,
            [(0, Quiet(DeviceKind::Encoder))],
        )
        .unwrap();
        ctx.bring_up().await.unwrap();
        assert!(lines.iter().all(InterruptLine::is_pending));
        assert_eq!(ctx.bank().channel(1).unwrap().backend().peripheral().duty, 0);
        assert_eq!(ctx.poll_inputs(Instant::from_millis(0)).await, None);
        assert_eq!(ctx.poll_inputs(Instant::from_millis(10)).await, None);
        assert!(!lines.iter().any(InterruptLine::is_pending));
    }
}
