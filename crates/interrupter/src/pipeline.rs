//! Interrupt-to-event pipeline
//!
//! One pipeline per host interrupt line. The ISR side is
//! [`InterruptLine::signal`] and nothing else; this poller does the rest:
//!
//! 1. every [`POLL_PERIOD`], take the line's pending flag
//! 2. scan each device on the line in priority order (encoders first)
//! 3. stop at the first decoded event
//!
//! A transient bus fault skips that device for this cycle. The line is
//! signalled again so the next cycle re-reads it; nothing is retried
//! inside the cycle. A device that keeps faulting is logged once when it
//! starts and once when it recovers. After an event the line is also
//! re-signalled, because chips behind the short-circuit may still hold
//! unread state.

use core::convert::Infallible;

use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;
use platform::{InputEvent, InterruptLine};

use crate::error::{ConfigError, Error};
use crate::input::InputDevice;

/// Poller period.
pub const POLL_PERIOD: Duration = Duration::from_millis(10);

/// Poller for the devices sharing one interrupt line.
pub struct InterruptPipeline<'a, D, const N: usize> {
    line: &'a InterruptLine,
    devices: Vec<D, N>,
    // parallel to `devices`
    faulting: Vec<bool, N>,
}

impl<'a, D: InputDevice, const N: usize> InterruptPipeline<'a, D, N> {
    /// Pipeline with no devices yet.
    pub fn new(line: &'a InterruptLine) -> Self {
        Self {
            line,
            devices: Vec::new(),
            faulting: Vec::new(),
        }
    }

    /// Attach a device, keeping scan order by [`DeviceKind::priority`].
    /// Devices of equal priority keep their insertion order.
    ///
    /// [`DeviceKind::priority`]: crate::input::DeviceKind::priority
    pub fn add(&mut self, device: D) -> Result<(), Error> {
        let priority = device.kind().priority();
        let at = self
            .devices
            .iter()
            .position(|d| d.kind().priority() > priority)
            .unwrap_or(self.devices.len());
        self.devices
            .insert(at, device)
            .map_err(|_| ConfigError::TooManyDevices)?;
        self.faulting
            .insert(at, false)
            .map_err(|_| ConfigError::TooManyDevices)?;
        Ok(())
    }

    /// Attach a device, builder style.
    pub fn with(mut self, device: D) -> Result<Self, Error> {
        self.add(device)?;
        Ok(self)
    }

    /// The line this pipeline drains.
    pub fn line(&self) -> &InterruptLine {
        self.line
    }

    /// Devices in scan order.
    pub fn devices(&self) -> &[D] {
        &self.devices
    }

    /// Whether the device at `index` failed its last scan.
    pub fn is_faulting(&self, index: usize) -> bool {
        self.faulting.get(index).copied().unwrap_or(false)
    }

    /// Mutable devices in scan order.
    pub fn devices_mut(&mut self) -> &mut [D] {
        &mut self.devices
    }

    /// Configure every device, continuing past failures.
    ///
    /// Returns the first error. The line is signalled afterwards so that
    /// anything latched during bring-up is read on the first cycle.
    pub async fn configure(&mut self) -> Result<(), Error> {
        let mut first = Ok(());
        for device in &mut self.devices {
            if let Err(e) = device.configure().await {
                warn!("{} configure failed: {}", device.kind().name(), e.category());
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        self.line.signal();
        first
    }

    /// One poll cycle. Scans only if the line fired since the last cycle.
    pub async fn poll_once(&mut self, now: Instant) -> Option<InputEvent> {
        if !self.line.take() {
            return None;
        }
        for (device, faulting) in self.devices.iter_mut().zip(self.faulting.iter_mut()) {
            let result = device.scan(now).await;
            match (&result, *faulting) {
                (Err(e), false) => {
                    warn!("{} scan failing: {}", device.kind().name(), e.category());
                }
                (Ok(_), true) => {
                    info!("{} scan recovered", device.kind().name());
                }
                _ => {}
            }
            *faulting = result.is_err();
            match result {
                Ok(Some(event)) => {
                    self.line.signal();
                    return Some(event);
                }
                Ok(None) => {}
                Err(_) => self.line.signal(),
            }
        }
        None
    }

    /// Poll forever, handing each event to `sink`.
    pub async fn run<F: FnMut(InputEvent)>(&mut self, mut sink: F) -> Infallible {
        loop {
            if let Some(event) = self.poll_once(Instant::now()).await {
                sink(event);
            }
            Timer::after(POLL_PERIOD).await;
        }
    }
}
