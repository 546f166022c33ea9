//! Logical input events
//!
//! Raw register bits from encoder and switch chips are decoded by the
//! interrupter's input pipeline into these two event shapes.

/// Rotation direction of one detent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise, `+1`
    Clockwise,
    /// Counter-clockwise, `-1`
    CounterClockwise,
}

impl Direction {
    /// Signed step: `+1` or `-1`.
    pub const fn step(self) -> i8 {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
        }
    }

    /// Opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
        }
    }

    /// Direction from a signed step; `None` for zero.
    pub const fn from_step(step: i32) -> Option<Self> {
        if step > 0 {
            Some(Self::Clockwise)
        } else if step < 0 {
            Some(Self::CounterClockwise)
        } else {
            None
        }
    }
}

/// Decoded input event
///
/// Transient: produced by the poller, moved into the dispatcher, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    /// One detent on encoder `index` (zero-based).
    Rotate {
        /// Encoder index
        index: u8,
        /// Direction of the detent
        direction: Direction,
    },
    /// Press of switch `index` (one-based, matching the front-panel labels).
    Click {
        /// Switch index
        index: u8,
    },
}

impl InputEvent {
    /// Shorthand for a rotation event.
    pub const fn rotate(index: u8, direction: Direction) -> Self {
        Self::Rotate { index, direction }
    }

    /// Shorthand for a click event.
    pub const fn click(index: u8) -> Self {
        Self::Click { index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_steps() {
        assert_eq!(Direction::Clockwise.step(), 1);
        assert_eq!(Direction::CounterClockwise.step(), -1);
        assert_eq!(Direction::from_step(-3), Some(Direction::CounterClockwise));
        assert_eq!(Direction::from_step(0), None);
        assert_eq!(Direction::Clockwise.reversed(), Direction::CounterClockwise);
    }
}
