//! Register-polled encoder chips (DuPPa I2CEncoder V2.1, Mini, NavKey).
//!
//! The chips decode quadrature themselves and latch "incremented",
//! "decremented" and "pushed" into a read-to-clear status register. All
//! chips of one family on a shared interrupt line form one
//! [`QuadratureEncoderBus`]; chip `n` reports `Rotate{n}` and `Click{n+1}`.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::i2c::I2c;
use heapless::Vec;
use platform::{Direction, InputEvent};

use super::registers::{counter, navkey, EncoderFamily, EncoderMap};
use super::{DeviceKind, InputDevice};
use crate::bus::BusArbiter;
use crate::error::{ConfigError, Error};

/// Chips per encoder bus.
pub const MAX_ENCODERS: usize = 8;

/// Time a chip needs after a software reset.
pub const RESET_SETTLE: Duration = Duration::from_millis(100);

/// One encoder chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EncoderChip {
    /// 7-bit I2C address
    pub address: u8,
    /// Report rotation reversed (chip mounted upside down)
    pub invert: bool,
}

impl EncoderChip {
    /// Chip at `address`, normal direction.
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            invert: false,
        }
    }
}

/// Mounting angle of a NavKey, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Orientation {
    /// As printed
    #[default]
    Deg0,
    /// Quarter turn
    Deg90,
    /// Upside down
    Deg180,
    /// Three quarter turns
    Deg270,
}

/// Logical arrow after orientation correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arrow {
    /// Up
    Up,
    /// Down
    Down,
    /// Left
    Left,
    /// Right
    Right,
}

impl Orientation {
    /// Logical arrows for the physical up, down, left and right keys.
    pub const fn arrows(self) -> [Arrow; 4] {
        use Arrow::{Down, Left, Right, Up};
        match self {
            Self::Deg0 => [Up, Down, Left, Right],
            Self::Deg90 => [Right, Left, Up, Down],
            Self::Deg180 => [Down, Up, Right, Left],
            Self::Deg270 => [Left, Right, Down, Up],
        }
    }
}

/// Click indices emitted for NavKey arrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ArrowClicks {
    /// How the key is mounted
    pub orientation: Orientation,
    /// Click index for logical up
    pub up: u8,
    /// Click index for logical down
    pub down: u8,
    /// Click index for logical left
    pub left: u8,
    /// Click index for logical right
    pub right: u8,
}

impl ArrowClicks {
    fn index(&self, arrow: Arrow) -> u8 {
        match arrow {
            Arrow::Up => self.up,
            Arrow::Down => self.down,
            Arrow::Left => self.left,
            Arrow::Right => self.right,
        }
    }

    /// First pressed arrow in `status`, mapped to its click index.
    pub fn decode(&self, status: u16) -> Option<u8> {
        let physical = [navkey::UP, navkey::DOWN, navkey::LEFT, navkey::RIGHT];
        physical
            .iter()
            .zip(self.orientation.arrows())
            .find(|(bit, _)| status & **bit != 0)
            .map(|(_, arrow)| self.index(arrow))
    }
}

/// Interpret one status word. Rotation wins over push, push over arrows.
pub fn decode_status(
    map: &EncoderMap,
    index: u8,
    status: u16,
    invert: bool,
    push_clicks: bool,
    arrows: Option<&ArrowClicks>,
) -> Option<InputEvent> {
    let direction = if status & map.clockwise != 0 {
        Some(Direction::Clockwise)
    } else if status & map.counter_clockwise != 0 {
        Some(Direction::CounterClockwise)
    } else {
        None
    };
    if let Some(d) = direction {
        return Some(InputEvent::rotate(index, if invert { d.reversed() } else { d }));
    }
    if push_clicks && status & map.push != 0 {
        return Some(InputEvent::click(index.saturating_add(1)));
    }
    arrows
        .and_then(|a| a.decode(status))
        .map(InputEvent::click)
}

/// Encoder chips of one family sharing an interrupt line.
pub struct QuadratureEncoderBus<'a, M: RawMutex, I> {
    bus: &'a BusArbiter<M, I>,
    family: EncoderFamily,
    chips: Vec<EncoderChip, MAX_ENCODERS>,
    push_clicks: bool,
    arrows: Option<ArrowClicks>,
}

impl<'a, M: RawMutex, I: I2c> QuadratureEncoderBus<'a, M, I> {
    /// Encoder bus for `chips`, in index order.
    pub fn new(
        bus: &'a BusArbiter<M, I>,
        family: EncoderFamily,
        chips: &[EncoderChip],
    ) -> Result<Self, Error> {
        let chips = Vec::from_slice(chips).map_err(|_| ConfigError::TooManyDevices)?;
        Ok(Self {
            bus,
            family,
            chips,
            push_clicks: true,
            arrows: None,
        })
    }

    /// Whether encoder pushes produce clicks. Off when a dedicated switch
    /// bus provides the front-panel buttons.
    #[must_use]
    pub fn with_push_clicks(mut self, enabled: bool) -> Self {
        self.push_clicks = enabled;
        self
    }

    /// Emit clicks for NavKey arrows.
    #[must_use]
    pub fn with_arrow_clicks(mut self, arrows: ArrowClicks) -> Self {
        self.arrows = Some(arrows);
        self
    }

    /// Chip family.
    pub fn family(&self) -> EncoderFamily {
        self.family
    }

    /// Configured chips.
    pub fn chips(&self) -> &[EncoderChip] {
        &self.chips
    }

    fn interrupt_mask(&self, map: &EncoderMap) -> u16 {
        let mut mask = map.clockwise | map.counter_clockwise;
        if self.push_clicks {
            mask |= map.push;
        }
        if self.arrows.is_some() {
            mask |= navkey::ARROWS;
        }
        mask
    }
}

fn write_i32<I: I2c>(i2c: &mut I, address: u8, register: u8, value: i32) -> Result<(), I::Error> {
    let [a, b, c, d] = value.to_be_bytes();
    i2c.write(address, &[register, a, b, c, d])
}

fn configure_chip<I: I2c>(i2c: &mut I, address: u8, map: &EncoderMap, mask: u16) -> Result<(), I::Error> {
    i2c.write(address, &[map.gconf, map.config])?;
    if let Some(gconf2) = map.gconf2 {
        let mut current = [0u8];
        i2c.write_read(address, &[gconf2], &mut current)?;
        let [current] = current;
        i2c.write(address, &[gconf2, current | map.clock_stretch])?;
    }
    let [hi, lo] = mask.to_be_bytes();
    if map.status_len == 2 {
        i2c.write(address, &[map.intconf, hi, lo])?;
    } else {
        i2c.write(address, &[map.intconf, lo])?;
    }
    write_i32(i2c, address, map.cval, counter::VALUE)?;
    write_i32(i2c, address, map.cmax, counter::MAX)?;
    write_i32(i2c, address, map.cmin, counter::MIN)?;
    write_i32(i2c, address, map.istep, counter::STEP)?;
    if let Some(antibounce) = map.antibounce {
        i2c.write(address, &[antibounce, counter::ANTIBOUNCE])?;
    }
    Ok(())
}

impl<M: RawMutex, I: I2c> InputDevice for QuadratureEncoderBus<'_, M, I> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Encoder
    }

    async fn configure(&mut self) -> Result<(), Error> {
        let map = self.family.map();
        let bus = self.bus.id();

        for chip in &self.chips {
            let address = chip.address;
            self.bus
                .with_lock("encoder reset", |i2c| i2c.write(address, &[map.gconf, map.reset]))
                .await
                .map_err(|e| Error::i2c(bus, &e))?;
        }
        // reset settle happens with the bus released
        Timer::after(RESET_SETTLE).await;

        let mask = self.interrupt_mask(&map);
        for chip in &self.chips {
            let address = chip.address;
            self.bus
                .with_lock("encoder configure", |i2c| configure_chip(i2c, address, &map, mask))
                .await
                .map_err(|e| Error::i2c(bus, &e))?;
            debug!("{} at {} configured", self.family.name(), address);
        }
        Ok(())
    }

    async fn scan(&mut self, _now: Instant) -> Result<Option<InputEvent>, Error> {
        let map = self.family.map();
        let bus = self.bus.id();

        for (index, chip) in (0u8..).zip(self.chips.iter()) {
            let address = chip.address;
            let status = self
                .bus
                .with_lock("encoder scan", |i2c| -> Result<u16, I::Error> {
                    if map.status_len == 2 {
                        let mut buf = [0u8; 2];
                        i2c.write_read(address, &[map.status], &mut buf)?;
                        Ok(u16::from_be_bytes(buf))
                    } else {
                        let mut buf = [0u8];
                        i2c.write_read(address, &[map.status], &mut buf)?;
                        let [value] = buf;
                        Ok(u16::from(value))
                    }
                })
                .await
                .map_err(|e| Error::i2c(bus, &e))?;

            let event = decode_status(
                &map,
                index,
                status,
                chip.invert,
                self.push_clicks,
                self.arrows.as_ref(),
            );
            if event.is_some() {
                return Ok(event);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bus::BusId;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{SimI2c, SimKind};

    const V21: EncoderMap = EncoderFamily::I2cEncoderV21.map();

    #[test]
    fn rotation_beats_push() {
        let e = decode_status(&V21, 1, 0x08 | 0x02, false, true, None);
        assert_eq!(e, Some(InputEvent::rotate(1, Direction::Clockwise)));
        let e = decode_status(&V21, 1, 0x02, false, true, None);
        assert_eq!(e, Some(InputEvent::click(2)));
        let e = decode_status(&V21, 1, 0x02, false, false, None);
        assert_eq!(e, None);
    }

    #[test]
    fn invert_reverses() {
        let e = decode_status(&V21, 0, 0x10, true, true, None);
        assert_eq!(e, Some(InputEvent::rotate(0, Direction::Clockwise)));
    }

    #[test]
    fn navkey_ring_reversed_and_arrows_rotated() {
        let map = EncoderFamily::NavKey.map();
        assert_eq!(
            decode_status(&map, 0, 0x0008, false, true, None),
            Some(InputEvent::rotate(0, Direction::CounterClockwise))
        );
        let arrows = ArrowClicks {
            orientation: Orientation::Deg90,
            up: 5,
            down: 6,
            left: 7,
            right: 8,
        };
        // physical up on a quarter-turned key is logical right
        assert_eq!(
            decode_status(&map, 0, navkey::UP, false, true, Some(&arrows)),
            Some(InputEvent::click(8))
        );
    }

    #[tokio::test]
    async fn configure_then_scan_reads_status() {
        let mut sim = SimI2c::new()
            .with_target(0x10, SimKind::Registers)
            .with_target(0x11, SimKind::Registers);
        sim.clear_on_read(0x11, V21.status);
        let bus = BusArbiter::<NoopRawMutex, _>::new(BusId::I2c1, sim, 50_000);
        let mut dev = QuadratureEncoderBus::new(
            &bus,
            EncoderFamily::I2cEncoderV21,
            &[EncoderChip::new(0x10), EncoderChip::new(0x11)],
        )
        .unwrap();
        dev.configure().await.unwrap();
        assert_eq!(dev.scan(Instant::from_millis(0)).await.unwrap(), None);

        bus.with_lock("test", |sim| {
            assert_eq!(sim.reg(0x10, V21.intconf), 0x1A);
            assert_eq!(sim.reg(0x10, 0x0F), 100); // low byte of CMAX
            assert_eq!(sim.reg(0x10, 0x30), 0x01);
            sim.set_reg(0x11, V21.status, 0x10);
        })
        .await;
        assert_eq!(
            dev.scan(Instant::from_millis(20)).await.unwrap(),
            Some(InputEvent::rotate(1, Direction::CounterClockwise))
        );
        assert_eq!(dev.scan(Instant::from_millis(30)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn too_many_chips_is_configuration_error() {
        let bus = BusArbiter::<NoopRawMutex, _>::new(BusId::I2c1, SimI2c::new(), 50_000);
        let chips = [EncoderChip::new(0x10); 9];
        assert!(matches!(
            QuadratureEncoderBus::new(&bus, EncoderFamily::I2cEncoderMini, &chips),
            Err(Error::Configuration(ConfigError::TooManyDevices))
        ));
    }
}
