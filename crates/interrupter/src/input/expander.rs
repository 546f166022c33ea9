//! MCP23017 carrying raw encoder pins and optional switches.
//!
//! Pins are numbered 0..16: port A is 0..8, port B is 8..16. Both ports
//! interrupt on change and the INT pins are mirrored, so one host line
//! covers the chip. A scan reads INTFA, INTFB, INTCAPA and INTCAPB in one
//! burst; reading the captures re-arms the interrupt.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;
use heapless::Vec;
use platform::InputEvent;

use super::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use super::quadrature::{EdgeDecoder, ShiftDecoder};
use super::registers::mcp23017 as reg;
use super::{DeviceKind, InputDevice};
use crate::bus::BusArbiter;
use crate::error::{ConfigError, Error, ParamError};

/// Raw encoders per expander.
pub const MAX_RAW_ENCODERS: usize = 4;

const PINS: u8 = 16;
const PIN_COUNT: usize = PINS as usize;

/// How a raw encoder's CLK/DT samples are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeMode {
    /// CLK falling edge, DT decides
    #[default]
    Edge,
    /// Four-sample shift register
    Shift,
}

enum Decoder {
    Edge(EdgeDecoder),
    Shift(ShiftDecoder),
}

impl Decoder {
    fn new(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Edge => Self::Edge(EdgeDecoder::new()),
            DecodeMode::Shift => Self::Shift(ShiftDecoder::new()),
        }
    }

    fn seed(&mut self, clk: bool, dt: bool) {
        match self {
            Self::Edge(d) => d.seed(clk),
            Self::Shift(d) => {
                *d = ShiftDecoder::new();
                let _ = d.update(clk, dt);
            }
        }
    }

    fn update(&mut self, clk: bool, dt: bool) -> Option<platform::Direction> {
        match self {
            Self::Edge(d) => d.update(clk, dt),
            Self::Shift(d) => d.update(clk, dt),
        }
    }
}

struct RawEncoder {
    clk: u16,
    dt: u16,
    decoder: Decoder,
}

fn pin_mask(pin: u8) -> Result<u16, Error> {
    if pin >= PINS {
        return Err(ParamError::OutOfRange.into());
    }
    Ok(1u16.wrapping_shl(u32::from(pin)))
}

/// MCP23017 with raw encoders (index = order added) and switches
/// (index = order added, one-based).
pub struct GpioExpanderBus<'a, M: RawMutex, I> {
    bus: &'a BusArbiter<M, I>,
    address: u8,
    encoders: Vec<RawEncoder, MAX_RAW_ENCODERS>,
    switches: Vec<u16, PIN_COUNT>,
    pull_ups: u16,
    debouncer: Debouncer<PIN_COUNT>,
    stale: bool,
}

impl<'a, M: RawMutex, I: I2c> GpioExpanderBus<'a, M, I> {
    /// Expander at `address` with nothing attached yet.
    pub fn new(bus: &'a BusArbiter<M, I>, address: u8) -> Self {
        Self {
            bus,
            address,
            encoders: Vec::new(),
            switches: Vec::new(),
            pull_ups: 0,
            debouncer: Debouncer::new(DEFAULT_DEBOUNCE),
            stale: true,
        }
    }

    /// Attach an encoder on `clk`/`dt`.
    pub fn with_encoder(mut self, clk: u8, dt: u8, mode: DecodeMode) -> Result<Self, Error> {
        let encoder = RawEncoder {
            clk: pin_mask(clk)?,
            dt: pin_mask(dt)?,
            decoder: Decoder::new(mode),
        };
        self.encoders
            .push(encoder)
            .map_err(|_| ConfigError::TooManyDevices)?;
        Ok(self)
    }

    /// Attach an active-low switch on `pin`.
    pub fn with_switch(mut self, pin: u8) -> Result<Self, Error> {
        let mask = pin_mask(pin)?;
        self.switches
            .push(mask)
            .map_err(|_| ConfigError::TooManyDevices)?;
        Ok(self)
    }

    /// Enable the internal pull-ups on every attached pin.
    #[must_use]
    pub fn with_pull_ups(mut self) -> Self {
        self.pull_ups = self.used_pins();
        self
    }

    /// Switch debounce window.
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    /// Whether the next scan reconfigures the chip first.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn used_pins(&self) -> u16 {
        let encoders = self.encoders.iter().fold(0, |m, e| m | e.clk | e.dt);
        self.switches.iter().fold(encoders, |m, s| m | s)
    }

    fn decode(&mut self, flags: u16, captured: u16, now: Instant) -> Option<InputEvent> {
        let mut event = None;
        // every flagged encoder advances; the first decoded detent is reported
        for (index, enc) in (0u8..).zip(self.encoders.iter_mut()) {
            if flags & (enc.clk | enc.dt) == 0 {
                continue;
            }
            let direction = enc
                .decoder
                .update(captured & enc.clk != 0, captured & enc.dt != 0);
            if let (None, Some(d)) = (event, direction) {
                event = Some(InputEvent::rotate(index, d));
            }
        }
        if event.is_some() {
            return event;
        }
        for (index, &mask) in (1u8..).zip(self.switches.iter()) {
            let pressed = flags & mask != 0 && captured & mask == 0;
            if pressed && self.debouncer.accept(usize::from(index).saturating_sub(1), now) {
                return Some(InputEvent::click(index));
            }
        }
        None
    }
}

impl<M: RawMutex, I: I2c> InputDevice for GpioExpanderBus<'_, M, I> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::GpioExpander
    }

    async fn configure(&mut self) -> Result<(), Error> {
        let address = self.address;
        let used = self.used_pins();
        let pull_ups = self.pull_ups;
        let [used_a, used_b] = used.to_le_bytes();

        let levels = self
            .bus
            .with_lock("expander configure", |i2c| -> Result<u16, I::Error> {
                i2c.write(address, &[reg::IOCON, reg::IOCON_MIRROR])?;

                let mut dir = [0u8; 2];
                i2c.write_read(address, &[reg::IODIRA], &mut dir)?;
                let [dir_a, dir_b] = (u16::from_le_bytes(dir) | used).to_le_bytes();
                i2c.write(address, &[reg::IODIRA, dir_a, dir_b])?;

                let mut pu = [0u8; 2];
                i2c.write_read(address, &[reg::GPPUA], &mut pu)?;
                let [pu_a, pu_b] = (u16::from_le_bytes(pu) | pull_ups).to_le_bytes();
                i2c.write(address, &[reg::GPPUA, pu_a, pu_b])?;

                // compare against previous value, so both edges interrupt
                i2c.write(address, &[reg::INTCONA, 0, 0])?;
                i2c.write(address, &[reg::GPINTENA, used_a, used_b])?;

                let mut pending = [0u8; 4];
                i2c.write_read(address, &[reg::INTFA], &mut pending)?;
                let mut gpio = [0u8; 2];
                i2c.write_read(address, &[reg::GPIOA], &mut gpio)?;
                Ok(u16::from_le_bytes(gpio))
            })
            .await;

        match levels {
            Ok(levels) => {
                for enc in &mut self.encoders {
                    enc.decoder.seed(levels & enc.clk != 0, levels & enc.dt != 0);
                }
                self.debouncer.reset();
                self.stale = false;
                debug!("mcp23017 at {} configured", address);
                Ok(())
            }
            Err(e) => {
                self.stale = true;
                warn!("mcp23017 at {} configure failed", address);
                Err(Error::i2c(self.bus.id(), &e))
            }
        }
    }

    async fn scan(&mut self, now: Instant) -> Result<Option<InputEvent>, Error> {
        if self.stale {
            self.configure().await?;
        }
        let address = self.address;
        let raw = self
            .bus
            .with_lock("expander scan", |i2c| {
                let mut buf = [0u8; 4];
                i2c.write_read(address, &[reg::INTFA], &mut buf).map(|()| buf)
            })
            .await
            .map_err(|e| Error::i2c(self.bus.id(), &e))?;
        let [intf_a, intf_b, cap_a, cap_b] = raw;
        let flags = u16::from_le_bytes([intf_a, intf_b]);
        let captured = u16::from_le_bytes([cap_a, cap_b]);
        if flags == 0 {
            return Ok(None);
        }
        Ok(self.decode(flags, captured, now))
    }
}
