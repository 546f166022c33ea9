//! Interrupt lines shared by input chips
//!
//! Several expander/encoder chips may drive one open-drain host pin. The
//! interrupt side of the system only ever records that the line fired;
//! which chip fired is discovered later by the poller reading each chip.

use core::sync::atomic::{AtomicBool, Ordering};

/// Pending flag for one host interrupt line.
///
/// A set flag carries no payload: it means "re-scan every device on this
/// line". Safe to share as `&'static InterruptLine` between an interrupt
/// handler and the polling task.
#[derive(Debug, Default)]
pub struct InterruptLine {
    pending: AtomicBool,
}

impl InterruptLine {
    /// Create a line with no pending interrupt.
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Record an interrupt. The only operation permitted in interrupt context.
    #[inline]
    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether an interrupt has been recorded and not yet taken.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    ///
    /// Load + store rather than `swap` so this works on cores without
    /// compare-and-swap. A signal landing between the two is covered by the
    /// scan the caller performs next.
    pub fn take(&self) -> bool {
        let was_pending = self.pending.load(Ordering::Acquire);
        if was_pending {
            self.pending.store(false, Ordering::Release);
        }
        was_pending
    }
}

/// External interrupt edge selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptMode {
    /// Trigger on rising edge
    RisingEdge,
    /// Trigger on falling edge (open-drain active-low chips)
    FallingEdge,
    /// Trigger on both edges
    BothEdges,
}

/// Forward edges of `pin` to `line` forever.
///
/// On executors where pin interrupts surface as `Wait` futures this task is
/// the interrupt handler, so it obeys the same rule: set the flag, nothing
/// else. Returns only if the pin reports an error.
pub async fn forward_edges<P>(
    pin: &mut P,
    mode: InterruptMode,
    line: &InterruptLine,
) -> Result<core::convert::Infallible, P::Error>
where
    P: embedded_hal_async::digital::Wait,
{
    loop {
        match mode {
            InterruptMode::RisingEdge => pin.wait_for_rising_edge().await?,
            InterruptMode::FallingEdge => pin.wait_for_falling_edge().await?,
            InterruptMode::BothEdges => pin.wait_for_any_edge().await?,
        }
        line.signal();
    }
}
