//! Mock implementations for testing
//!
//! Mock implementations of the platform traits plus a small simulated I2C
//! bus, for use in unit and integration tests of the interrupter core.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::vec::Vec;

use crate::*;

// ── Output pin ───────────────────────────────────────────────────────────────

/// Push-pull output pin whose level can be observed from a cloned handle.
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    level: Arc<AtomicBool>,
    rising_edges: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

/// Error reported by [`MockPin`] when failure injection is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl MockPin {
    /// New pin, low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level.
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    /// Number of low→high transitions so far.
    pub fn rising_edges(&self) -> usize {
        self.rising_edges.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MockPinError);
        }
        self.level.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MockPinError);
        }
        if !self.level.swap(true, Ordering::SeqCst) {
            self.rising_edges.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ── Edge source ──────────────────────────────────────────────────────────────

/// Input pin that reports a fixed number of edges, then an error.
#[derive(Debug, Default)]
pub struct MockEdgePin {
    remaining: usize,
}

impl MockEdgePin {
    /// Pin that fires `edges` times before failing.
    pub fn new(edges: usize) -> Self {
        Self { remaining: edges }
    }

    fn next_edge(&mut self) -> Result<(), MockPinError> {
        if self.remaining == 0 {
            return Err(MockPinError);
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for MockEdgePin {
    type Error = MockPinError;
}

impl embedded_hal_async::digital::Wait for MockEdgePin {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.next_edge()
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        self.next_edge()
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.next_edge()
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.next_edge()
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.next_edge()
    }
}

// ── PWM ──────────────────────────────────────────────────────────────────────

/// Hardware PWM slice recording the last programmed values.
#[derive(Debug, Default)]
pub struct MockPwm {
    /// Last frequency written
    pub frequency: Option<u32>,
    /// Last duty written
    pub duty: u16,
    /// Number of register writes
    pub writes: usize,
    /// When set, every call fails with this error
    pub fail_with: Option<HalError>,
}

impl MockPwm {
    /// New idle slice.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&mut self) -> Result<(), HalError> {
        self.writes += 1;
        self.fail_with.map_or(Ok(()), Err)
    }
}

impl PwmPeripheral for MockPwm {
    fn set_frequency(&mut self, hz: u32) -> Result<(), HalError> {
        self.check()?;
        if hz == 0 {
            return Err(HalError::OutOfRange);
        }
        self.frequency = Some(hz);
        Ok(())
    }

    fn set_duty_u16(&mut self, duty: u16) -> Result<(), HalError> {
        self.check()?;
        self.duty = duty;
        Ok(())
    }
}

// ── Toggle timer ─────────────────────────────────────────────────────────────

/// Toggle timer recording its reload configuration.
#[derive(Debug, Default)]
pub struct MockTimer {
    /// Edge rate when running symmetric
    pub rate_hz: Option<u32>,
    /// High/low reloads when running asymmetric
    pub asymmetric: Option<(u32, u32)>,
    /// Whether the timer is running
    pub running: bool,
    /// Level of the toggled pin
    pub pin_high: bool,
    /// Whether asymmetric reload is supported
    pub supports_asymmetric: bool,
    /// When set, `stop` fails with this error
    pub stop_fails_with: Option<HalError>,
}

impl MockTimer {
    /// Timer with symmetric reload only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer supporting asymmetric reload.
    pub fn asymmetric() -> Self {
        Self {
            supports_asymmetric: true,
            ..Self::default()
        }
    }
}

impl ToggleTimer for MockTimer {
    fn start(&mut self, rate_hz: u32) -> Result<(), HalError> {
        self.rate_hz = Some(rate_hz);
        self.asymmetric = None;
        self.running = true;
        self.pin_high = true;
        Ok(())
    }

    fn start_asymmetric(&mut self, high_us: u32, low_us: u32) -> Result<(), HalError> {
        if !self.supports_asymmetric {
            return Err(HalError::Unsupported);
        }
        self.asymmetric = Some((high_us, low_us));
        self.rate_hz = None;
        self.running = true;
        self.pin_high = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        if let Some(e) = self.stop_fails_with {
            return Err(e);
        }
        self.running = false;
        Ok(())
    }

    fn force_low(&mut self) -> Result<(), HalError> {
        self.pin_high = false;
        Ok(())
    }
}

// ── PIO state machine ────────────────────────────────────────────────────────

/// State machine with a four-word TX FIFO.
#[derive(Debug)]
pub struct MockStateMachine {
    clock_hz: u32,
    /// Words waiting in the FIFO, oldest first
    pub fifo: heapless::Deque<u32, 4>,
    /// Word the program is currently repeating
    pub current: Option<u32>,
    /// Whether the program runs
    pub enabled: bool,
    /// Level of the side-set pin
    pub pin_high: bool,
}

impl MockStateMachine {
    /// State machine clocked at `clock_hz`.
    pub fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            fifo: heapless::Deque::new(),
            current: None,
            enabled: false,
            pin_high: false,
        }
    }

    /// Simulate the program reaching its `pull noblock`.
    pub fn run_period(&mut self) {
        if !self.enabled {
            return;
        }
        if let Some(word) = self.fifo.pop_front() {
            self.current = Some(word);
        }
        self.pin_high = self.current.is_some_and(|w| w & 0xFFFF != 0);
    }
}

impl PioStateMachine for MockStateMachine {
    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn try_push(&mut self, word: u32) -> Result<(), HalError> {
        self.fifo.push_back(word).map_err(|_| HalError::FifoFull)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), HalError> {
        self.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn clear_fifo(&mut self) {
        self.fifo.clear();
        self.current = None;
    }

    fn force_pin_low(&mut self) -> Result<(), HalError> {
        self.pin_high = false;
        Ok(())
    }
}

// ── Status sink ──────────────────────────────────────────────────────────────

/// Status sink that records every update.
#[derive(Debug, Default, Clone)]
pub struct MockStatus {
    /// Updates in arrival order
    pub updates: Vec<(u8, StatusUpdate)>,
}

impl MockStatus {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest update for `channel`.
    pub fn last(&self, channel: u8) -> Option<StatusUpdate> {
        self.updates
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .map(|(_, u)| *u)
    }
}

impl StatusSink for MockStatus {
    fn update(&mut self, channel: u8, update: StatusUpdate) {
        self.updates.push((channel, update));
    }
}

// ── Simulated I2C bus ────────────────────────────────────────────────────────

/// Error reported by [`SimI2c`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimI2cError(pub embedded_hal::i2c::ErrorKind);

impl embedded_hal::i2c::Error for SimI2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        self.0
    }
}

/// How a simulated target interprets bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimKind {
    /// First written byte sets an auto-incrementing register pointer
    Registers,
    /// Quasi-bidirectional port: a written byte is the latch, reads return it
    Latch,
}

#[derive(Debug)]
struct SimTarget {
    address: u8,
    kind: SimKind,
    regs: [u8; 256],
    clear_on_read: [bool; 256],
    pointer: u8,
}

/// One completed operation on the simulated bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    /// Bytes written to `address`
    Write(u8, Vec<u8>),
    /// Number of bytes read from `address`
    Read(u8, usize),
}

/// Register-level simulation of a few I2C targets on one bus.
///
/// Targets are addressed by 7-bit address. Unknown addresses NACK. A
/// register flagged with [`SimI2c::clear_on_read`] reads once, then zeroes,
/// like interrupt-status registers on encoder and expander chips.
#[derive(Debug, Default)]
pub struct SimI2c {
    targets: Vec<SimTarget>,
    log: Vec<SimOp>,
    fail_next: usize,
    fail_kind: Option<embedded_hal::i2c::ErrorKind>,
}

impl SimI2c {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a target.
    #[must_use]
    pub fn with_target(mut self, address: u8, kind: SimKind) -> Self {
        self.targets.push(SimTarget {
            address,
            kind,
            regs: [0; 256],
            clear_on_read: [false; 256],
            pointer: 0,
        });
        self
    }

    fn target_mut(&mut self, address: u8) -> Option<&mut SimTarget> {
        self.targets.iter_mut().find(|t| t.address == address)
    }

    /// Register value (or latch value at register 0).
    pub fn reg(&self, address: u8, reg: u8) -> u8 {
        self.targets
            .iter()
            .find(|t| t.address == address)
            .map_or(0, |t| t.regs[usize::from(reg)])
    }

    /// Set a register as if the chip changed it.
    pub fn set_reg(&mut self, address: u8, reg: u8, value: u8) {
        if let Some(t) = self.target_mut(address) {
            t.regs[usize::from(reg)] = value;
        }
    }

    /// Mark a register as read-to-clear.
    pub fn clear_on_read(&mut self, address: u8, reg: u8) {
        if let Some(t) = self.target_mut(address) {
            t.clear_on_read[usize::from(reg)] = true;
        }
    }

    /// Fail the next `count` transactions with `kind`.
    pub fn fail_next(&mut self, count: usize, kind: embedded_hal::i2c::ErrorKind) {
        self.fail_next = count;
        self.fail_kind = Some(kind);
    }

    /// Completed operations, oldest first.
    pub fn log(&self) -> &[SimOp] {
        &self.log
    }

    /// Forget the operation log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Writes to `address`, oldest first.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter_map(|op| match op {
                SimOp::Write(a, bytes) if *a == address => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl embedded_hal::i2c::ErrorType for SimI2c {
    type Error = SimI2cError;
}

impl embedded_hal::i2c::I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation};

        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SimI2cError(self.fail_kind.unwrap_or(ErrorKind::Other)));
        }

        let mut log = Vec::new();
        let Some(target) = self.targets.iter_mut().find(|t| t.address == address) else {
            return Err(SimI2cError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        };

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    log.push(SimOp::Write(address, bytes.to_vec()));
                    match target.kind {
                        SimKind::Registers => {
                            let mut iter = bytes.iter();
                            if let Some(&ptr) = iter.next() {
                                target.pointer = ptr;
                            }
                            for &b in iter {
                                target.regs[usize::from(target.pointer)] = b;
                                target.pointer = target.pointer.wrapping_add(1);
                            }
                        }
                        SimKind::Latch => {
                            if let Some(&b) = bytes.last() {
                                target.regs[0] = b;
                            }
                        }
                    }
                }
                Operation::Read(buf) => {
                    log.push(SimOp::Read(address, buf.len()));
                    match target.kind {
                        SimKind::Registers => {
                            for slot in buf.iter_mut() {
                                let idx = usize::from(target.pointer);
                                *slot = target.regs[idx];
                                if target.clear_on_read[idx] {
                                    target.regs[idx] = 0;
                                }
                                target.pointer = target.pointer.wrapping_add(1);
                            }
                        }
                        SimKind::Latch => buf.fill(target.regs[0]),
                    }
                }
            }
        }
        self.log.extend(log);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use embedded_hal::digital::OutputPin as _;
    use embedded_hal::i2c::I2c as _;

    #[test]
    fn test_mock_pin_counts_edges() {
        let mut pin = MockPin::new();
        let observer = pin.clone();
        pin.set_high().unwrap();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
        pin.set_high().unwrap();
        assert!(observer.is_high());
        assert_eq!(observer.rising_edges(), 2);
    }

    #[test]
    fn test_sim_i2c_register_file() {
        let mut bus = SimI2c::new().with_target(0x20, SimKind::Registers);
        bus.write(0x20, &[0x10, 0xAA, 0xBB]).unwrap();
        let mut buf = [0u8; 2];
        bus.write_read(0x20, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
        assert!(bus.write(0x21, &[0]).is_err());
    }

    #[test]
    fn test_sim_i2c_clear_on_read() {
        let mut bus = SimI2c::new().with_target(0x20, SimKind::Registers);
        bus.set_reg(0x20, 0x05, 0x08);
        bus.clear_on_read(0x20, 0x05);
        let mut buf = [0u8];
        bus.write_read(0x20, &[0x05], &mut buf).unwrap();
        assert_eq!(buf[0], 0x08);
        bus.write_read(0x20, &[0x05], &mut buf).unwrap();
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_sim_i2c_latch_and_failure() {
        let mut bus = SimI2c::new().with_target(0x27, SimKind::Latch);
        bus.write(0x27, &[0xFE]).unwrap();
        let mut buf = [0u8];
        bus.read(0x27, &mut buf).unwrap();
        assert_eq!(buf[0], 0xFE);
        bus.fail_next(1, embedded_hal::i2c::ErrorKind::Other);
        assert!(bus.read(0x27, &mut buf).is_err());
        assert!(bus.read(0x27, &mut buf).is_ok());
    }

    #[test]
    fn test_mock_state_machine_repeats_last_word() {
        let mut sm = MockStateMachine::new(1_000_000);
        sm.set_enabled(true).unwrap();
        sm.try_push(0x0001_0002).unwrap();
        sm.run_period();
        sm.run_period();
        assert_eq!(sm.current, Some(0x0001_0002));
        assert!(sm.pin_high);
    }

    #[tokio::test]
    async fn test_forward_edges_sets_line() {
        let line = InterruptLine::new();
        let mut pin = MockEdgePin::new(2);
        let result = crate::gpio::forward_edges(&mut pin, InterruptMode::FallingEdge, &line).await;
        assert!(result.is_err());
        assert!(line.take());
    }
}
