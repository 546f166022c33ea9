//! Per-index debounce by last-accepted timestamp.

use embassy_time::{Duration, Instant};

/// Default switch debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Suppresses repeats of the same index inside a time window.
///
/// An event is accepted when no event for its index was accepted within
/// the window before it. Suppressed events do not extend the window.
#[derive(Debug, Clone)]
pub struct Debouncer<const N: usize> {
    window: Duration,
    last: [Option<Instant>; N],
}

impl<const N: usize> Debouncer<N> {
    /// Debouncer with the given window.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last: [None; N],
        }
    }

    /// The window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether an event for `index` at `now` passes. Indices beyond `N`
    /// always pass.
    pub fn accept(&mut self, index: usize, now: Instant) -> bool {
        let Some(slot) = self.last.get_mut(index) else {
            return true;
        };
        if let Some(prev) = *slot {
            if now.saturating_duration_since(prev) <= self.window {
                return false;
            }
        }
        *slot = Some(now);
        true
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.last = [None; N];
    }
}
