//! Bit-banged PWM for channels without a dedicated peripheral.
//!
//! The waveform comes from a cooperative generator future that busy-waits
//! with `yield_now` between edges. Run it on a dedicated, high-priority
//! executor so other tasks add as little jitter as possible; timing is
//! still the weakest of all backends.
//!
//! The channel side ([`SoftwarePwm`]) and the generator side
//! ([`SoftPwmGenerator`]) share a [`SoftPwmShared`] block. Stopping is
//! cooperative: the channel clears `running` and then polls, for a bounded
//! time, until the generator reports it has driven the pin low.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;

use super::{Activation, BackendKind, OutputBackend, Waveform};
use crate::error::{Error, HardwareFault};

/// Default bound on how long `stop` waits for the generator.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(20);

const STOP_POLL: Duration = Duration::from_millis(1);

/// State shared between a [`SoftwarePwm`] and its generator.
pub struct SoftPwmShared<M: RawMutex> {
    running: AtomicBool,
    idle: AtomicBool,
    period_us: AtomicU32,
    on_time_us: AtomicU32,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> Default for SoftPwmShared<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> SoftPwmShared<M> {
    /// Stopped, generator assumed idle.
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            idle: AtomicBool::new(true),
            period_us: AtomicU32::new(0),
            on_time_us: AtomicU32::new(0),
            wake: Signal::new(),
        }
    }

    /// Whether a waveform is requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the generator has parked with the pin low.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }
}

/// Channel-side handle of a software PWM output.
pub struct SoftwarePwm<'a, M: RawMutex> {
    shared: &'a SoftPwmShared<M>,
    stop_timeout: Duration,
}

impl<'a, M: RawMutex> SoftwarePwm<'a, M> {
    /// Handle with the default stop timeout.
    pub fn new(shared: &'a SoftPwmShared<M>) -> Self {
        Self {
            shared,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override how long `stop` waits for the generator.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

impl<M: RawMutex> OutputBackend for SoftwarePwm<'_, M> {
    fn kind(&self) -> BackendKind {
        BackendKind::SoftwarePwm
    }

    async fn start(&mut self, waveform: Waveform) -> Result<Activation, Error> {
        let shared = self.shared;
        shared.period_us.store(waveform.period_us(), Ordering::Release);
        shared.on_time_us.store(waveform.on_time_us, Ordering::Release);
        // idle must read false before anyone can observe running
        shared.idle.store(false, Ordering::Release);
        shared.running.store(true, Ordering::Release);
        shared.wake.signal(());
        Ok(Activation::Driven)
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let shared = self.shared;
        shared.running.store(false, Ordering::Release);
        shared.wake.signal(());
        let deadline = Instant::now().checked_add(self.stop_timeout);
        loop {
            if shared.is_idle() {
                return Ok(());
            }
            if deadline.map_or(true, |d| Instant::now() >= d) {
                warn!("software pwm generator did not park");
                return Err(Error::Hardware(HardwareFault::GeneratorStuck));
            }
            Timer::after(STOP_POLL).await;
        }
    }
}

fn after(start: Instant, micros: u64) -> Instant {
    start
        .checked_add(Duration::from_micros(micros))
        .unwrap_or(Instant::MAX)
}

/// Generator side: owns the pin and produces the waveform.
pub struct SoftPwmGenerator<'a, M: RawMutex, P> {
    shared: &'a SoftPwmShared<M>,
    pin: P,
}

impl<'a, M: RawMutex, P: OutputPin> SoftPwmGenerator<'a, M, P> {
    /// Generator driving `pin`.
    pub fn new(shared: &'a SoftPwmShared<M>, pin: P) -> Self {
        Self { shared, pin }
    }

    /// Wait until `until` or until `running` drops. Returns whether the
    /// full time elapsed.
    async fn hold(&self, until: Instant) -> bool {
        while Instant::now() < until {
            if !self.shared.is_running() {
                return false;
            }
            yield_now().await;
        }
        true
    }

    fn park(&mut self) -> Result<(), Error> {
        let result = self.pin.set_low().map_err(|_| Error::Hardware(HardwareFault::Pin));
        self.shared.idle.store(true, Ordering::Release);
        result
    }

    /// Produce the waveform forever. Returns only if the pin fails.
    pub async fn run(&mut self) -> Result<Infallible, Error> {
        loop {
            if !self.shared.is_running() {
                self.park()?;
                self.shared.wake.wait().await;
                continue;
            }
            self.shared.idle.store(false, Ordering::Release);

            let on = u64::from(self.shared.on_time_us.load(Ordering::Acquire));
            let period = u64::from(self.shared.period_us.load(Ordering::Acquire));
            let start = Instant::now();
            let fall = after(start, on);
            let next = after(start, period.max(on));

            if on > 0 {
                self.pin
                    .set_high()
                    .map_err(|_| Error::Hardware(HardwareFault::Pin))?;
            }
            let completed = self.hold(fall).await;
            self.pin
                .set_low()
                .map_err(|_| Error::Hardware(HardwareFault::Pin))?;
            if completed {
                self.hold(next).await;
            }
        }
    }
}
