//! Shared-bus arbitration
//!
//! One [`BusArbiter`] per physical bus, never per device. Every multi-step
//! register transaction runs inside a single [`BusArbiter::with_lock`]
//! closure. The closure is synchronous, so a lock can never be held across
//! an executor yield; chips that need a settle delay between steps use
//! [`settle`], which busy-waits and is capped at [`MAX_SETTLE`].

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;
use platform::{I2cConfig, SpiConfig};

use crate::error::{ConfigError, Error};

/// Longest busy-wait permitted while a bus lock is held.
pub const MAX_SETTLE: Duration = Duration::from_millis(1);

/// Physical bus identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BusId {
    /// First I2C controller
    I2c1,
    /// Second I2C controller
    I2c2,
    /// First SPI controller
    Spi1,
    /// Second SPI controller
    Spi2,
}

impl BusId {
    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::I2c1 => "i2c1",
            Self::I2c2 => "i2c2",
            Self::Spi1 => "spi1",
            Self::Spi2 => "spi2",
        }
    }

    /// Whether this is an I2C controller.
    pub const fn is_i2c(self) -> bool {
        matches!(self, Self::I2c1 | Self::I2c2)
    }
}

/// Lock statistics, updated under a blocking mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Closures currently executing with the lock held
    pub holders: u8,
    /// Highest `holders` ever observed
    pub max_holders: u8,
    /// Completed transactions
    pub transactions: u32,
}

/// Mutual-exclusion handle for one physical bus.
pub struct BusArbiter<M: RawMutex, T> {
    id: BusId,
    timeout_us: u32,
    bus: Mutex<M, T>,
    stats: BlockingMutex<M, Cell<BusStats>>,
}

/// Decrements the holder count on every exit path, unwinding included.
struct HolderGuard<'a, M: RawMutex, T> {
    arbiter: &'a BusArbiter<M, T>,
    tag: &'static str,
}

impl<M: RawMutex, T> Drop for HolderGuard<'_, M, T> {
    fn drop(&mut self) {
        self.arbiter.stats.lock(|s| {
            let mut st = s.get();
            st.holders = st.holders.saturating_sub(1);
            st.transactions = st.transactions.wrapping_add(1);
            s.set(st);
        });
        if cfg!(feature = "debug-bus") {
            trace!("{} release by {}", self.arbiter.id.name(), self.tag);
        }
    }
}

impl<M: RawMutex, T> BusArbiter<M, T> {
    /// Wrap an initialized transport whose hardware timeout is `timeout_us`.
    pub const fn new(id: BusId, transport: T, timeout_us: u32) -> Self {
        Self {
            id,
            timeout_us,
            bus: Mutex::new(transport),
            stats: BlockingMutex::new(Cell::new(BusStats {
                holders: 0,
                max_holders: 0,
                transactions: 0,
            })),
        }
    }

    /// Bus this arbiter guards.
    pub fn id(&self) -> BusId {
        self.id
    }

    /// Hardware timeout the transport was configured with.
    pub fn timeout_us(&self) -> u32 {
        self.timeout_us
    }

    /// Snapshot of the lock statistics.
    pub fn stats(&self) -> BusStats {
        self.stats.lock(Cell::get)
    }

    /// Run `f` with exclusive ownership of the transport.
    ///
    /// `tag` names the caller in debug-bus logs. The lock is released when
    /// `f` returns, whatever it returns.
    pub async fn with_lock<R>(&self, tag: &'static str, f: impl FnOnce(&mut T) -> R) -> R {
        let mut transport = self.bus.lock().await;
        self.stats.lock(|s| {
            let mut st = s.get();
            st.holders = st.holders.saturating_add(1);
            st.max_holders = st.max_holders.max(st.holders);
            s.set(st);
        });
        if cfg!(feature = "debug-bus") {
            trace!("{} acquire by {}", self.id.name(), tag);
        }
        let _holder = HolderGuard { arbiter: self, tag };
        f(&mut transport)
    }

    /// Like [`BusArbiter::with_lock`] but gives up instead of waiting.
    pub fn try_with_lock<R>(&self, tag: &'static str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut transport = self.bus.try_lock().ok()?;
        self.stats.lock(|s| {
            let mut st = s.get();
            st.holders = st.holders.saturating_add(1);
            st.max_holders = st.max_holders.max(st.holders);
            s.set(st);
        });
        let _holder = HolderGuard { arbiter: self, tag };
        Some(f(&mut transport))
    }

    /// Recover the transport.
    pub fn into_inner(self) -> T {
        self.bus.into_inner()
    }
}

/// Busy-wait a chip settle time inside a `with_lock` closure.
///
/// Capped at [`MAX_SETTLE`] so no device can monopolize a bus.
pub fn settle(delay: Duration) {
    embassy_time::block_for(if delay > MAX_SETTLE { MAX_SETTLE } else { delay });
}

/// The set of bus arbiters present on a board.
///
/// Owned by the startup code and lent to devices by reference.
pub struct Buses<M: RawMutex, I, S = ()> {
    i2c1: Option<BusArbiter<M, I>>,
    i2c2: Option<BusArbiter<M, I>>,
    spi1: Option<BusArbiter<M, S>>,
    spi2: Option<BusArbiter<M, S>>,
}

impl<M: RawMutex, I, S> Default for Buses<M, I, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, I, S> Buses<M, I, S> {
    /// No buses.
    pub const fn new() -> Self {
        Self {
            i2c1: None,
            i2c2: None,
            spi1: None,
            spi2: None,
        }
    }

    /// Register an I2C transport. `id` must be an I2C bus and
    /// `config.timeout_us` non-zero.
    pub fn with_i2c(mut self, id: BusId, transport: I, config: I2cConfig) -> Result<Self, Error> {
        if config.timeout_us == 0 {
            return Err(ConfigError::MissingTimeout(id).into());
        }
        let arbiter = BusArbiter::new(id, transport, config.timeout_us);
        match id {
            BusId::I2c1 => self.i2c1 = Some(arbiter),
            BusId::I2c2 => self.i2c2 = Some(arbiter),
            BusId::Spi1 | BusId::Spi2 => return Err(ConfigError::MissingBus(id).into()),
        }
        Ok(self)
    }

    /// Register an SPI transport. `id` must be an SPI bus and
    /// `config.timeout_us` non-zero.
    pub fn with_spi(mut self, id: BusId, transport: S, config: SpiConfig) -> Result<Self, Error> {
        if config.timeout_us == 0 {
            return Err(ConfigError::MissingTimeout(id).into());
        }
        let arbiter = BusArbiter::new(id, transport, config.timeout_us);
        match id {
            BusId::Spi1 => self.spi1 = Some(arbiter),
            BusId::Spi2 => self.spi2 = Some(arbiter),
            BusId::I2c1 | BusId::I2c2 => return Err(ConfigError::MissingBus(id).into()),
        }
        Ok(self)
    }

    /// The arbiter for an I2C bus.
    pub fn i2c(&self, id: BusId) -> Result<&BusArbiter<M, I>, Error> {
        let slot = match id {
            BusId::I2c1 => self.i2c1.as_ref(),
            BusId::I2c2 => self.i2c2.as_ref(),
            BusId::Spi1 | BusId::Spi2 => None,
        };
        slot.ok_or(Error::Configuration(ConfigError::MissingBus(id)))
    }

    /// The arbiter for an SPI bus.
    pub fn spi(&self, id: BusId) -> Result<&BusArbiter<M, S>, Error> {
        let slot = match id {
            BusId::Spi1 => self.spi1.as_ref(),
            BusId::Spi2 => self.spi2.as_ref(),
            BusId::I2c1 | BusId::I2c2 => None,
        };
        slot.ok_or(Error::Configuration(ConfigError::MissingBus(id)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[tokio::test]
    async fn with_lock_counts_transactions() {
        let arbiter: BusArbiter<NoopRawMutex, u32> = BusArbiter::new(BusId::I2c1, 0, 1000);
        let r = arbiter
            .with_lock("test", |v| {
                *v += 1;
                *v
            })
            .await;
        assert_eq!(r, 1);
        let err: Result<(), ()> = arbiter.with_lock("test", |_| Err(())).await;
        assert!(err.is_err());
        let stats = arbiter.stats();
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.holders, 0);
        assert_eq!(stats.max_holders, 1);
        assert_eq!(arbiter.into_inner(), 1);
    }

    #[tokio::test]
    async fn try_with_lock_fails_while_held() {
        let arbiter: BusArbiter<NoopRawMutex, ()> = BusArbiter::new(BusId::I2c2, (), 1000);
        let nested = arbiter
            .with_lock("outer", |_| arbiter.try_with_lock("inner", |_| ()))
            .await;
        assert!(nested.is_none());
        assert!(arbiter.try_with_lock("again", |_| ()).is_some());
    }

    #[test]
    fn buses_reject_missing_timeout() {
        let cfg = I2cConfig {
            frequency: 400_000,
            timeout_us: 0,
        };
        let r = Buses::<NoopRawMutex, (), ()>::new().with_i2c(BusId::I2c1, (), cfg);
        assert!(matches!(
            r,
            Err(Error::Configuration(ConfigError::MissingTimeout(BusId::I2c1)))
        ));
    }

    #[test]
    fn buses_lookup() {
        let buses = Buses::<NoopRawMutex, u8, ()>::new()
            .with_i2c(BusId::I2c1, 7, I2cConfig::default())
            .unwrap();
        assert_eq!(buses.i2c(BusId::I2c1).unwrap().id(), BusId::I2c1);
        assert!(buses.i2c(BusId::I2c2).is_err());
        assert!(buses.spi(BusId::Spi1).is_err());
        assert!(Buses::<NoopRawMutex, u8, ()>::new()
            .with_i2c(BusId::Spi1, 7, I2cConfig::default())
            .is_err());
    }
}
