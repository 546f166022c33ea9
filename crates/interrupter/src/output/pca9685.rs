//! PCA9685 16-channel I2C PWM controller.
//!
//! The prescaler is chip-wide: changing one output's frequency changes all
//! sixteen. Prescaler writes need the oscillator asleep, so a frequency
//! change is sleep, write, verify, wake, settle, restart, all inside one
//! bus lock together with the channel's LED registers.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal::i2c::I2c;
use platform::duty::{duty12, DUTY12_FULL_SCALE};

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::bus::{settle, BusArbiter};
use crate::error::{Error, HardwareFault, ParamError};

/// Power-on address with all address pins low.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Outputs per chip.
pub const OUTPUTS: u8 = 16;

const OSCILLATOR_HZ: u64 = 25_000_000;
const PRESCALE_MIN: u8 = 3;
const OSC_SETTLE: Duration = Duration::from_micros(500);

mod reg {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const LED0_ON_L: u8 = 0x06;
    pub const ALL_LED_ON_L: u8 = 0xFA;
    pub const PRESCALE: u8 = 0xFE;
}

mod bits {
    pub const MODE1_RESTART: u8 = 0x80;
    pub const MODE1_AI: u8 = 0x20;
    pub const MODE1_SLEEP: u8 = 0x10;
    pub const MODE2_OUTDRV: u8 = 0x04;
    /// Full-on / full-off flag in the `_H` registers
    pub const FULL: u8 = 0x10;
}

/// Prescaler value for `frequency_hz`, rounded to nearest and clamped to
/// what the chip accepts.
pub fn prescale_for(frequency_hz: u32) -> u8 {
    let f = u64::from(frequency_hz.max(1));
    let rounded = OSCILLATOR_HZ
        .saturating_add(f.saturating_mul(2048))
        .checked_div(f.saturating_mul(4096))
        .unwrap_or(0)
        .saturating_sub(1);
    u8::try_from(rounded.max(u64::from(PRESCALE_MIN))).unwrap_or(u8::MAX)
}

/// ON_L, ON_H, OFF_L, OFF_H for a 12-bit duty value.
fn led_bytes(duty: u16) -> [u8; 4] {
    if duty == 0 {
        [0, 0, 0, bits::FULL]
    } else if duty >= DUTY12_FULL_SCALE {
        [0, bits::FULL, 0, 0]
    } else {
        let [lo, hi] = duty.to_le_bytes();
        [0, 0, lo, hi]
    }
}

/// Handle to one PCA9685 on a shared I2C bus.
pub struct Pca9685<'a, M: RawMutex, I> {
    bus: &'a BusArbiter<M, I>,
    address: u8,
}

impl<M: RawMutex, I> Clone for Pca9685<'_, M, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, I> Copy for Pca9685<'_, M, I> {}

impl<'a, M: RawMutex, I: I2c> Pca9685<'a, M, I> {
    /// Chip at `address` on `bus`.
    pub fn new(bus: &'a BusArbiter<M, I>, address: u8) -> Self {
        Self { bus, address }
    }

    /// Chip address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Enable auto-increment and totem-pole outputs, all outputs off.
    pub async fn init(&self) -> Result<(), Error> {
        let address = self.address;
        let bus = self.bus.id();
        self.bus
            .with_lock("pca9685 init", |i2c| {
                i2c.write(address, &[reg::MODE1, bits::MODE1_AI])?;
                i2c.write(address, &[reg::MODE2, bits::MODE2_OUTDRV])?;
                i2c.write(address, &[reg::ALL_LED_ON_L, 0, 0, 0, bits::FULL])
            })
            .await
            .map_err(|e| Error::i2c(bus, &e))
    }

    /// Output `channel` of this chip.
    pub fn output(&self, channel: u8) -> Result<Pca9685Output<'a, M, I>, Error> {
        if channel >= OUTPUTS {
            return Err(Error::InvalidParameter(ParamError::OutOfRange));
        }
        Ok(Pca9685Output { chip: *self, channel })
    }
}

/// Read-verify a single register write.
fn write_checked<I: I2c>(i2c: &mut I, address: u8, register: u8, value: u8) -> Result<(), TxError<I::Error>> {
    i2c.write(address, &[register, value])?;
    let mut back = [0u8];
    i2c.write_read(address, &[register], &mut back)?;
    let [read] = back;
    if read == value {
        Ok(())
    } else {
        Err(TxError::Readback { register, value: read })
    }
}

enum TxError<E> {
    Bus(E),
    Readback { register: u8, value: u8 },
}

impl<E> From<E> for TxError<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

/// Change the chip-wide prescaler if it differs from `prescale`.
fn retune<I: I2c>(i2c: &mut I, address: u8, prescale: u8) -> Result<bool, TxError<I::Error>> {
    let mut current = [0u8];
    i2c.write_read(address, &[reg::PRESCALE], &mut current)?;
    if current == [prescale] {
        return Ok(false);
    }
    let mut mode = [0u8];
    i2c.write_read(address, &[reg::MODE1], &mut mode)?;
    let [mode] = mode;
    let awake = mode & !(bits::MODE1_SLEEP | bits::MODE1_RESTART);

    i2c.write(address, &[reg::MODE1, awake | bits::MODE1_SLEEP])?;
    write_checked(i2c, address, reg::PRESCALE, prescale)?;
    i2c.write(address, &[reg::MODE1, awake])?;
    settle(OSC_SETTLE);
    i2c.write(address, &[reg::MODE1, awake | bits::MODE1_RESTART])?;
    Ok(true)
}

/// One output of a [`Pca9685`].
pub struct Pca9685Output<'a, M: RawMutex, I> {
    chip: Pca9685<'a, M, I>,
    channel: u8,
}

impl<M: RawMutex, I: I2c> Pca9685Output<'_, M, I> {
    /// Output number on the chip.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn led_register(&self) -> u8 {
        reg::LED0_ON_L.wrapping_add(self.channel.wrapping_mul(4))
    }

    fn map(&self, err: TxError<I::Error>) -> Error {
        match err {
            TxError::Bus(e) => Error::i2c(self.chip.bus.id(), &e),
            TxError::Readback { register, value } => {
                Error::Hardware(HardwareFault::UnexpectedReadback { register, value })
            }
        }
    }
}

impl<M: RawMutex, I: I2c> OutputBackend for Pca9685Output<'_, M, I> {
    fn kind(&self) -> BackendKind {
        BackendKind::ExternalI2cPwm
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        let address = self.chip.address;
        let led = self.led_register();
        let prescale = prescale_for(waveform.frequency_hz);
        let [on_l, on_h, off_l, off_h] =
            led_bytes(duty12(waveform.frequency_hz, waveform.on_time_us));

        let retuned = self
            .chip
            .bus
            .with_lock("pca9685 start", |i2c| -> Result<bool, TxError<I::Error>> {
                let retuned = retune(i2c, address, prescale)?;
                i2c.write(address, &[led, on_l, on_h, off_l, off_h])?;
                Ok(retuned)
            })
            .await
            .map_err(|e| self.map(e))?;
        if retuned {
            debug!("pca9685 {} prescale now {}", address, prescale);
        }
        Ok(Activation::Driven)
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let address = self.chip.address;
        let led = self.led_register();
        let [on_l, on_h, off_l, off_h] = led_bytes(0);
        self.chip
            .bus
            .with_lock("pca9685 stop", |i2c| {
                i2c.write(address, &[led, on_l, on_h, off_l, off_h])
            })
            .await
            .map_err(|e| Error::i2c(self.chip.bus.id(), &e))
    }
}
