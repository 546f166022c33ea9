//! Byte-exact I2C traffic of the bus-attached output backends.
//!
//! Each test lists every transaction the chip must see, in order; `done()`
//! fails on anything missing or extra.

#![allow(clippy::unwrap_used)]

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use interrupter::output::{prescale_for, Pca9685, Pcf8574, PCA9685_DEFAULT_ADDRESS};
use interrupter::{
    BusArbiter, BusFault, BusId, Error, Feedback, HardwareFault, OutputBackend, OutputChannel,
    PulseParams, Waveform,
};
use platform::ChannelLimits;

const PCA: u8 = PCA9685_DEFAULT_ADDRESS;
const PCF: u8 = 0x20;

fn arbiter(expectations: &[I2cTransaction]) -> BusArbiter<NoopRawMutex, I2cMock> {
    BusArbiter::new(BusId::I2c1, I2cMock::new(expectations), 50_000)
}

fn wave(frequency_hz: u32, on_time_us: u32) -> Waveform {
    Waveform {
        frequency_hz,
        on_time_us,
    }
}

/// Sleep, write and verify the prescaler, wake, restart. Starts from the
/// power-on prescaler 0x1E and MODE1 with auto-increment.
fn retune_to_100hz() -> [I2cTransaction; 7] {
    [
        I2cTransaction::write_read(PCA, vec![0xFE], vec![0x1E]),
        I2cTransaction::write_read(PCA, vec![0x00], vec![0x20]),
        I2cTransaction::write(PCA, vec![0x00, 0x30]),
        I2cTransaction::write(PCA, vec![0xFE, 60]),
        I2cTransaction::write_read(PCA, vec![0xFE], vec![60]),
        I2cTransaction::write(PCA, vec![0x00, 0x20]),
        I2cTransaction::write(PCA, vec![0x00, 0xA0]),
    ]
}

#[tokio::test]
async fn pca9685_init_turns_everything_off() {
    let bus = arbiter(&[
        I2cTransaction::write(PCA, vec![0x00, 0x20]),
        I2cTransaction::write(PCA, vec![0x01, 0x04]),
        I2cTransaction::write(PCA, vec![0xFA, 0, 0, 0, 0x10]),
    ]);
    Pca9685::new(&bus, PCA).init().await.unwrap();
    bus.into_inner().done();
}

#[tokio::test]
async fn pca9685_start_retunes_once_then_writes_only_leds() {
    let mut expectations = retune_to_100hz().to_vec();
    // 20 µs of a 10 ms period: 8 / 4096
    expectations.push(I2cTransaction::write(PCA, vec![0x06, 0, 0, 8, 0]));
    // same frequency again: prescaler read, LED write
    expectations.push(I2cTransaction::write_read(PCA, vec![0xFE], vec![60]));
    expectations.push(I2cTransaction::write(PCA, vec![0x06, 0, 0, 8, 0]));
    expectations.push(I2cTransaction::write(PCA, vec![0x06, 0, 0, 0, 0x10]));

    let bus = arbiter(&expectations);
    let mut out = Pca9685::new(&bus, PCA).output(0).unwrap();
    out.start(wave(100, 20)).await.unwrap();
    out.start(wave(100, 20)).await.unwrap();
    out.stop().await.unwrap();
    drop(out);
    bus.into_inner().done();
    assert_eq!(prescale_for(100), 60);
}

#[tokio::test]
async fn pca9685_led_registers_follow_channel() {
    // channel 5 lives at 0x06 + 4 * 5 = 0x1A
    let bus = arbiter(&[
        I2cTransaction::write_read(PCA, vec![0xFE], vec![60]),
        I2cTransaction::write(PCA, vec![0x1A, 0, 0, 0x33, 0x01]),
    ]);
    let mut out = Pca9685::new(&bus, PCA).output(5).unwrap();
    assert_eq!(out.channel(), 5);
    // 750 µs of 10 ms: 307 = 0x133
    out.start(wave(100, 750)).await.unwrap();
    drop(out);
    bus.into_inner().done();
}

#[tokio::test]
async fn pca9685_prescale_readback_mismatch_is_hardware_fault() {
    let mut expectations = retune_to_100hz()[..4].to_vec();
    expectations.push(I2cTransaction::write_read(PCA, vec![0xFE], vec![59]));

    let bus = arbiter(&expectations);
    let mut out = Pca9685::new(&bus, PCA).output(0).unwrap();
    assert_eq!(
        out.start(wave(100, 20)).await,
        Err(Error::Hardware(HardwareFault::UnexpectedReadback {
            register: 0xFE,
            value: 59,
        }))
    );
    drop(out);
    bus.into_inner().done();
}

#[tokio::test]
async fn pca9685_failed_start_through_channel_forces_led_off() {
    let mut expectations = retune_to_100hz()[..4].to_vec();
    expectations.push(I2cTransaction::write_read(PCA, vec![0xFE], vec![59]));
    expectations.push(I2cTransaction::write(PCA, vec![0x06, 0, 0, 0, 0x10]));

    let bus = arbiter(&expectations);
    let out = Pca9685::new(&bus, PCA).output(0).unwrap();
    let mut channel = OutputChannel::new(0, out, ChannelLimits::default());
    let err = channel.enable(true, PulseParams::new(100, 20)).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(!channel.is_active());
    drop(channel);
    bus.into_inner().done();
}

#[tokio::test]
async fn pca9685_missing_chip_maps_to_nack() {
    let bus = arbiter(&[I2cTransaction::write(PCA, vec![0x00, 0x20])
        .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))]);
    assert_eq!(
        Pca9685::new(&bus, PCA).init().await,
        Err(Error::TransientBus {
            bus: BusId::I2c1,
            kind: BusFault::Nack,
        })
    );
    bus.into_inner().done();
}

#[tokio::test]
async fn pcf8574_relay_read_modify_write() {
    let bus = arbiter(&[
        I2cTransaction::write(PCF, vec![0xFF]),
        // close bit 2, leave the others
        I2cTransaction::read(PCF, vec![0xFF]),
        I2cTransaction::write(PCF, vec![0xFB]),
        // open it again
        I2cTransaction::read(PCF, vec![0xFB]),
        I2cTransaction::write(PCF, vec![0xFF]),
    ]);
    let chip = Pcf8574::new(&bus, PCF);
    chip.init().await.unwrap();
    let relay = chip.relay(2, 100).unwrap();
    assert_eq!(relay.mask(), 0b100);

    // at the threshold: no traffic at all
    let mut channel = OutputChannel::new(0, relay, ChannelLimits::default());
    assert_eq!(
        channel.enable(true, PulseParams::new(200, 100)).await,
        Ok(Feedback::Unchanged)
    );
    assert!(!channel.is_active());

    let mut direct = chip.relay(2, 100).unwrap();
    direct.start(wave(200, 150)).await.unwrap();
    direct.stop().await.unwrap();
    drop((channel, direct));
    bus.into_inner().done();
}

#[tokio::test]
async fn pcf8574_preserves_other_relays() {
    let bus = arbiter(&[
        I2cTransaction::read(PCF, vec![0b1111_0110]),
        I2cTransaction::write(PCF, vec![0b0111_0110]),
    ]);
    let mut relay = Pcf8574::new(&bus, PCF).relay(7, 0).unwrap();
    relay.start(wave(50, 10)).await.unwrap();
    drop(relay);
    bus.into_inner().done();
}
