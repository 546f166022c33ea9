//! PCF8574 relay outputs.
//!
//! A relay cannot follow audio-rate pulses, so it only closes for requests
//! whose on-time exceeds a threshold. Shorter requests are acknowledged
//! and ignored. Relays are wired active-low: a cleared port bit energizes
//! the coil.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::bus::BusArbiter;
use crate::error::{Error, ParamError};

/// On-time a request must exceed before the relay closes.
pub const DEFAULT_RELAY_THRESHOLD_US: u32 = 100;

/// Handle to one PCF8574 port expander on a shared I2C bus.
pub struct Pcf8574<'a, M: RawMutex, I> {
    bus: &'a BusArbiter<M, I>,
    address: u8,
}

impl<M: RawMutex, I> Clone for Pcf8574<'_, M, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, I> Copy for Pcf8574<'_, M, I> {}

impl<'a, M: RawMutex, I: I2c> Pcf8574<'a, M, I> {
    /// Expander at `address` on `bus`.
    pub fn new(bus: &'a BusArbiter<M, I>, address: u8) -> Self {
        Self { bus, address }
    }

    /// Release every relay.
    pub async fn init(&self) -> Result<(), Error> {
        let address = self.address;
        self.bus
            .with_lock("pcf8574 init", |i2c| i2c.write(address, &[0xFF]))
            .await
            .map_err(|e| Error::i2c(self.bus.id(), &e))
    }

    /// Relay on port bit `bit`, closing above `threshold_us`.
    pub fn relay(&self, bit: u8, threshold_us: u32) -> Result<Pcf8574Relay<'a, M, I>, Error> {
        let mask = 1u8
            .checked_shl(u32::from(bit))
            .filter(|_| bit < 8)
            .ok_or(Error::InvalidParameter(ParamError::OutOfRange))?;
        Ok(Pcf8574Relay {
            chip: *self,
            mask,
            threshold_us,
        })
    }

    /// Read the port, apply `f`, write it back, under one lock.
    async fn modify(&self, tag: &'static str, f: impl FnOnce(u8) -> u8) -> Result<(), Error> {
        let address = self.address;
        self.bus
            .with_lock(tag, |i2c| {
                let mut port = [0u8];
                i2c.read(address, &mut port)?;
                let [value] = port;
                i2c.write(address, &[f(value)])
            })
            .await
            .map_err(|e| Error::i2c(self.bus.id(), &e))
    }
}

/// One relay on a [`Pcf8574`].
pub struct Pcf8574Relay<'a, M: RawMutex, I> {
    chip: Pcf8574<'a, M, I>,
    mask: u8,
    threshold_us: u32,
}

impl<M: RawMutex, I: I2c> Pcf8574Relay<'_, M, I> {
    /// Port bit mask driving this relay.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Minimum on-time, exclusive.
    pub fn threshold_us(&self) -> u32 {
        self.threshold_us
    }
}

impl<M: RawMutex, I: I2c> OutputBackend for Pcf8574Relay<'_, M, I> {
    fn kind(&self) -> BackendKind {
        BackendKind::ThresholdRelay
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        if waveform.on_time_us <= self.threshold_us {
            trace!(
                "relay ignores {} us at threshold {}",
                waveform.on_time_us,
                self.threshold_us
            );
            return Ok(Activation::Ignored);
        }
        let mask = self.mask;
        self.chip.modify("relay on", |port| port & !mask).await?;
        Ok(Activation::Driven)
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let mask = self.mask;
        self.chip.modify("relay off", |port| port | mask).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bus::BusId;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{SimI2c, SimKind};

    const ADDR: u8 = 0x20;

    fn wave(on_time_us: u32) -> Waveform {
        Waveform {
            frequency_hz: 10,
            on_time_us,
        }
    }

    #[tokio::test]
    async fn short_requests_ignored() {
        let sim = SimI2c::new().with_target(ADDR, SimKind::Latch);
        let bus = BusArbiter::<NoopRawMutex, _>::new(BusId::I2c1, sim, 50_000);
        let chip = Pcf8574::new(&bus, ADDR);
        chip.init().await.unwrap();
        let mut relay = chip.relay(3, DEFAULT_RELAY_THRESHOLD_US).unwrap();

        assert_eq!(relay.start(wave(100)).await.unwrap(), Activation::Ignored);
        let sim = bus.into_inner();
        assert_eq!(sim.reg(ADDR, 0), 0xFF);
        assert_eq!(sim.writes_to(ADDR).len(), 1);
    }

    #[tokio::test]
    async fn long_request_clears_only_its_bit() {
        let sim = SimI2c::new().with_target(ADDR, SimKind::Latch);
        let bus = BusArbiter::<NoopRawMutex, _>::new(BusId::I2c1, sim, 50_000);
        let chip = Pcf8574::new(&bus, ADDR);
        chip.init().await.unwrap();
        let mut first = chip.relay(0, DEFAULT_RELAY_THRESHOLD_US).unwrap();
        let mut second = chip.relay(5, DEFAULT_RELAY_THRESHOLD_US).unwrap();

        first.start(wave(250)).await.unwrap();
        second.start(wave(101)).await.unwrap();
        first.stop().await.unwrap();
        assert_eq!(bus.into_inner().reg(ADDR, 0), 0xFF & !0x20);
    }

    #[test]
    fn bit_out_of_range() {
        let bus = BusArbiter::<NoopRawMutex, _>::new(BusId::I2c1, SimI2c::new(), 50_000);
        let chip = Pcf8574::new(&bus, ADDR);
        assert!(chip.relay(8, 100).is_err());
    }
}
