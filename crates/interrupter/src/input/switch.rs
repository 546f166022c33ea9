//! Front-panel switches on one MCP23017 port.
//!
//! Switches are active-low with pull-ups. Bit `n` of the port is switch
//! `n + 1`. The chip interrupts on every change; the poller keeps the
//! last level of each switch so that only presses produce events.
//!
//! Some panels have no second encoder and use two switches as "previous"
//! and "next" instead. [`SwitchRemap`] turns selected switch presses into
//! encoder rotations; it is empty unless configured.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;
use heapless::Vec;
use platform::{Direction, InputEvent};

use super::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use super::registers::mcp23017 as reg;
use super::{DeviceKind, InputDevice};
use crate::bus::BusArbiter;
use crate::error::{ConfigError, Error};

const MAX_REMAPS: usize = 4;

/// Expander port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Port {
    /// GPA0..7
    #[default]
    A,
    /// GPB0..7
    B,
}

impl Port {
    /// Register address of the port-A register `base` for this port.
    const fn register(self, base: u8) -> u8 {
        match self {
            Self::A => base,
            Self::B => base | 0x01,
        }
    }
}

/// Switch presses reported as encoder rotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchRemap {
    entries: Vec<(u8, u8, Direction), MAX_REMAPS>,
}

impl SwitchRemap {
    /// No remapping.
    pub const fn none() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Switch 5 steps encoder 0 back, switch 6 steps it forward.
    pub fn encoder_buttons() -> Self {
        let mut remap = Self::none();
        let _ = remap.entries.push((5, 0, Direction::CounterClockwise));
        let _ = remap.entries.push((6, 0, Direction::Clockwise));
        remap
    }

    /// Report presses of `switch` as a detent of `encoder`.
    pub fn with(mut self, switch: u8, encoder: u8, direction: Direction) -> Result<Self, Error> {
        self.entries.retain(|(s, _, _)| *s != switch);
        self.entries
            .push((switch, encoder, direction))
            .map_err(|_| ConfigError::TooManyDevices)?;
        Ok(self)
    }

    /// Event for a press of `switch`.
    pub fn event(&self, switch: u8) -> InputEvent {
        self.entries
            .iter()
            .find(|(s, _, _)| *s == switch)
            .map_or(InputEvent::click(switch), |&(_, encoder, direction)| {
                InputEvent::rotate(encoder, direction)
            })
    }
}

/// Up to eight switches on one expander port.
pub struct SwitchBus<'a, M: RawMutex, I> {
    bus: &'a BusArbiter<M, I>,
    address: u8,
    port: Port,
    mask: u8,
    levels: u8,
    debouncer: Debouncer<8>,
    remap: SwitchRemap,
}

impl<'a, M: RawMutex, I: I2c> SwitchBus<'a, M, I> {
    /// `count` switches on bits `0..count` of `port`.
    pub fn new(bus: &'a BusArbiter<M, I>, address: u8, port: Port, count: u8) -> Result<Self, Error> {
        if count > 8 {
            return Err(ConfigError::TooManyDevices.into());
        }
        let mask = u8::try_from(1u16.wrapping_shl(u32::from(count)).wrapping_sub(1)).unwrap_or(u8::MAX);
        Ok(Self {
            bus,
            address,
            port,
            mask,
            levels: 0xFF,
            debouncer: Debouncer::new(DEFAULT_DEBOUNCE),
            remap: SwitchRemap::none(),
        })
    }

    /// Debounce window.
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    /// Switch-to-rotation mapping.
    #[must_use]
    pub fn with_remap(mut self, remap: SwitchRemap) -> Self {
        self.remap = remap;
        self
    }

    /// Bit mask of the attached switches.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    fn decode(&mut self, captured: u8, now: Instant) -> Option<InputEvent> {
        let changed = (captured ^ self.levels) & self.mask;
        let pressed = changed & !captured;
        self.levels = (self.levels & !changed) | (captured & changed);

        let mut event = None;
        for bit in 0u8..8 {
            if pressed & 1u8.wrapping_shl(u32::from(bit)) == 0 {
                continue;
            }
            if self.debouncer.accept(usize::from(bit), now) && event.is_none() {
                event = Some(self.remap.event(bit.saturating_add(1)));
            }
        }
        event
    }
}

impl<M: RawMutex, I: I2c> InputDevice for SwitchBus<'_, M, I> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Switch
    }

    async fn configure(&mut self) -> Result<(), Error> {
        let address = self.address;
        let port = self.port;
        let mask = self.mask;
        let levels = self
            .bus
            .with_lock("switch configure", |i2c| -> Result<u8, I::Error> {
                let mut dir = [0u8];
                i2c.write_read(address, &[port.register(reg::IODIRA)], &mut dir)?;
                let [dir] = dir;
                i2c.write(address, &[port.register(reg::IODIRA), dir | mask])?;
                i2c.write(address, &[port.register(reg::GPPUA), mask])?;
                i2c.write(address, &[port.register(reg::GPINTENA), mask])?;
                let mut scratch = [0u8];
                i2c.write_read(address, &[port.register(reg::INTCAPA)], &mut scratch)?;
                let mut gpio = [0u8];
                i2c.write_read(address, &[port.register(reg::GPIOA)], &mut gpio)?;
                let [gpio] = gpio;
                Ok(gpio)
            })
            .await
            .map_err(|e| Error::i2c(self.bus.id(), &e))?;
        self.levels = levels | !mask;
        self.debouncer.reset();
        debug!("switches at {} configured", address);
        Ok(())
    }

    async fn scan(&mut self, now: Instant) -> Result<Option<InputEvent>, Error> {
        let address = self.address;
        let port = self.port;
        let captured = self
            .bus
            .with_lock("switch scan", |i2c| -> Result<u8, I::Error> {
                let mut cap = [0u8];
                i2c.write_read(address, &[port.register(reg::INTCAPA)], &mut cap)?;
                // reading GPIO clears a condition INTCAP alone may leave set
                let mut gpio = [0u8];
                i2c.write_read(address, &[port.register(reg::GPIOA)], &mut gpio)?;
                let [cap] = cap;
                Ok(cap)
            })
            .await
            .map_err(|e| Error::i2c(self.bus.id(), &e))?;
        Ok(self.decode(captured, now))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bus::BusId;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{SimI2c, SimKind};

    const ADDR: u8 = 0x21;

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn bus() -> BusArbiter<NoopRawMutex, SimI2c> {
        let mut sim = SimI2c::new().with_target(ADDR, SimKind::Registers);
        sim.set_reg(ADDR, reg::GPIOA, 0xFF);
        BusArbiter::new(BusId::I2c2, sim, 50_000)
    }

    #[test]
    fn only_presses_emit() {
        let bus = bus();
        let mut sw = SwitchBus::new(&bus, ADDR, Port::A, 6).unwrap();
        assert_eq!(sw.decode(0b1111_1101, t(0)), Some(InputEvent::click(2)));
        // release
        assert_eq!(sw.decode(0b1111_1111, t(200)), None);
        assert_eq!(sw.decode(0b1111_0111, t(400)), Some(InputEvent::click(4)));
    }

    #[test]
    fn bounce_collapses_to_one_click() {
        let bus = bus();
        let mut sw = SwitchBus::new(&bus, ADDR, Port::A, 6).unwrap();
        assert_eq!(sw.decode(0b1111_1110, t(0)), Some(InputEvent::click(1)));
        assert_eq!(sw.decode(0b1111_1111, t(10)), None);
        assert_eq!(sw.decode(0b1111_1110, t(20)), None);
        assert_eq!(sw.decode(0b1111_1111, t(30)), None);
        assert_eq!(sw.decode(0b1111_1110, t(90)), Some(InputEvent::click(1)));
    }

    #[test]
    fn unattached_bits_ignored() {
        let bus = bus();
        let mut sw = SwitchBus::new(&bus, ADDR, Port::A, 2).unwrap();
        assert_eq!(sw.decode(0b0000_0011, t(0)), None);
    }

    #[test]
    fn remap_preset_turns_five_and_six_into_rotation() {
        let bus = bus();
        let mut sw = SwitchBus::new(&bus, ADDR, Port::A, 6)
            .unwrap()
            .with_remap(SwitchRemap::encoder_buttons());
        assert_eq!(
            sw.decode(0b1110_1111, t(0)),
            Some(InputEvent::rotate(0, Direction::CounterClockwise))
        );
        assert_eq!(
            sw.decode(0b1100_1111, t(100)),
            Some(InputEvent::rotate(0, Direction::Clockwise))
        );
        assert_eq!(SwitchRemap::none().event(5), InputEvent::click(5));
    }

    #[tokio::test]
    async fn configure_and_scan_port_b() {
        let bus = bus();
        let mut sw = SwitchBus::new(&bus, ADDR, Port::B, 4).unwrap();
        bus.with_lock("test", |sim| sim.set_reg(ADDR, reg::GPIOB, 0xFF)).await;
        sw.configure().await.unwrap();
        bus.with_lock("test", |sim| {
            assert_eq!(sim.reg(ADDR, reg::GPPUB), 0x0F);
            assert_eq!(sim.reg(ADDR, reg::GPINTENB), 0x0F);
            assert_eq!(sim.reg(ADDR, reg::IODIRB), 0x0F);
            sim.set_reg(ADDR, reg::INTCAPB, 0b1111_1011);
        })
        .await;
        assert_eq!(sw.scan(t(0)).await.unwrap(), Some(InputEvent::click(3)));
    }
}
