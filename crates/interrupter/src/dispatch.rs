//! Event routing to the active screen
//!
//! The menu system installs one [`Consumer`] at a time. Every event goes to
//! it first; what it leaves [`Outcome::Unhandled`] falls back to the
//! [`Navigator`]:
//!
//! | Event            | Fallback                     |
//! |------------------|------------------------------|
//! | `Rotate{0, dir}` | `move_selection(dir)`        |
//! | `Click{1}`       | `activate()`                 |
//! | `Click{2}`       | `back()`                     |
//! | anything else    | dropped                      |

use platform::{Direction, InputEvent};

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Not handled; the navigator fallback applies
    Unhandled,
    /// Consumed
    Handled,
    /// Consumed, and the consumer is done: return to the menu
    Exit,
}

/// A screen or controller receiving input while it is active.
///
/// Every handler defaults to [`Outcome::Unhandled`], so a consumer
/// implements only the controls it uses.
pub trait Consumer {
    /// One detent on encoder `index` (zero-based).
    fn rotate(&mut self, index: u8, direction: Direction) -> Outcome {
        let _ = (index, direction);
        Outcome::Unhandled
    }

    /// Press of switch `index` (one-based).
    fn click(&mut self, index: u8) -> Outcome {
        let _ = index;
        Outcome::Unhandled
    }
}

/// Menu-level navigation used when no consumer handles an event.
pub trait Navigator {
    /// Move the selection one step.
    fn move_selection(&mut self, direction: Direction);

    /// Enter the selected item.
    fn activate(&mut self);

    /// Leave the current screen.
    fn back(&mut self);
}

/// Routes decoded events to the active consumer or the navigator.
pub struct EventDispatcher<'a, N> {
    navigator: N,
    consumer: Option<&'a mut dyn Consumer>,
}

impl<'a, N: Navigator> EventDispatcher<'a, N> {
    /// Dispatcher with no active consumer.
    pub fn new(navigator: N) -> Self {
        Self {
            navigator,
            consumer: None,
        }
    }

    /// Install the consumer that receives events first.
    pub fn set_active_consumer(&mut self, consumer: &'a mut dyn Consumer) {
        self.consumer = Some(consumer);
    }

    /// Remove the active consumer, handing it back.
    pub fn clear_active_consumer(&mut self) -> Option<&'a mut dyn Consumer> {
        self.consumer.take()
    }

    /// Whether a consumer is installed.
    pub fn has_consumer(&self) -> bool {
        self.consumer.is_some()
    }

    /// The fallback navigator.
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Mutable fallback navigator.
    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    /// Route one event.
    pub fn dispatch(&mut self, event: InputEvent) -> Outcome {
        match event {
            InputEvent::Rotate { index, direction } => self.rotate(index, direction),
            InputEvent::Click { index } => self.switch_click(index),
        }
    }

    /// Route a rotation of encoder `index`.
    pub fn rotate(&mut self, index: u8, direction: Direction) -> Outcome {
        let outcome = self
            .consumer
            .as_mut()
            .map_or(Outcome::Unhandled, |c| c.rotate(index, direction));
        match outcome {
            Outcome::Unhandled if index == 0 => {
                self.navigator.move_selection(direction);
                Outcome::Handled
            }
            Outcome::Exit => self.exit(),
            other => other,
        }
    }

    /// Route a press of switch `index`.
    pub fn switch_click(&mut self, index: u8) -> Outcome {
        let outcome = self
            .consumer
            .as_mut()
            .map_or(Outcome::Unhandled, |c| c.click(index));
        match outcome {
            Outcome::Unhandled => match index {
                1 => {
                    self.navigator.activate();
                    Outcome::Handled
                }
                2 => {
                    self.navigator.back();
                    Outcome::Handled
                }
                _ => {
                    trace!("click {} unhandled", index);
                    Outcome::Unhandled
                }
            },
            Outcome::Exit => self.exit(),
            Outcome::Handled => Outcome::Handled,
        }
    }

    fn exit(&mut self) -> Outcome {
        self.consumer = None;
        self.navigator.back();
        Outcome::Exit
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Nav {
        moves: i32,
        activated: u32,
        backs: u32,
    }

    impl Navigator for Nav {
        fn move_selection(&mut self, direction: Direction) {
            self.moves += i32::from(direction.step());
        }

        fn activate(&mut self) {
            self.activated += 1;
        }

        fn back(&mut self) {
            self.backs += 1;
        }
    }

    /// Handles encoder 1 and switch 3; switch 2 exits.
    #[derive(Default)]
    struct Screen {
        turns: i32,
        presses: u32,
    }

    impl Consumer for Screen {
        fn rotate(&mut self, index: u8, direction: Direction) -> Outcome {
            if index == 1 {
                self.turns += i32::from(direction.step());
                Outcome::Handled
            } else {
                Outcome::Unhandled
            }
        }

        fn click(&mut self, index: u8) -> Outcome {
            match index {
                2 => Outcome::Exit,
                3 => {
                    self.presses += 1;
                    Outcome::Handled
                }
                _ => Outcome::Unhandled,
            }
        }
    }

    #[test]
    fn fallbacks_without_consumer() {
        let mut d = EventDispatcher::new(Nav::default());
        assert_eq!(
            d.dispatch(InputEvent::rotate(0, Direction::CounterClockwise)),
            Outcome::Handled
        );
        assert_eq!(d.dispatch(InputEvent::click(1)), Outcome::Handled);
        assert_eq!(d.dispatch(InputEvent::click(2)), Outcome::Handled);
        assert_eq!(d.dispatch(InputEvent::click(4)), Outcome::Unhandled);
        assert_eq!(
            d.dispatch(InputEvent::rotate(3, Direction::Clockwise)),
            Outcome::Unhandled
        );
        let nav = d.navigator();
        assert_eq!((nav.moves, nav.activated, nav.backs), (-1, 1, 1));
    }

    #[test]
    fn consumer_first_then_fallback() {
        let mut screen = Screen::default();
        {
            let mut d = EventDispatcher::new(Nav::default());
            d.set_active_consumer(&mut screen);
            assert_eq!(d.rotate(1, Direction::Clockwise), Outcome::Handled);
            // index 0 is not handled by the screen, so the navigator moves
            assert_eq!(d.rotate(0, Direction::Clockwise), Outcome::Handled);
            assert_eq!(d.switch_click(3), Outcome::Handled);
            assert_eq!(d.switch_click(1), Outcome::Handled);
            assert_eq!((d.navigator().moves, d.navigator().activated), (1, 1));
        }
        assert_eq!((screen.turns, screen.presses), (1, 1));
    }

    #[test]
    fn exit_clears_consumer_and_goes_back() {
        let mut screen = Screen::default();
        let mut d = EventDispatcher::new(Nav::default());
        d.set_active_consumer(&mut screen);
        assert_eq!(d.switch_click(2), Outcome::Exit);
        assert!(!d.has_consumer());
        assert_eq!(d.navigator().backs, 1);
        // the screen no longer sees encoder 1
        assert_eq!(d.rotate(1, Direction::Clockwise), Outcome::Unhandled);
    }
}
