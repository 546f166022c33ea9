//! Standard interrupter screen
//!
//! | Control     | Action                                         |
//! |-------------|------------------------------------------------|
//! | encoder 0   | on-time ±1 µs (±10 with ×10)                   |
//! | encoder 1   | frequency ±1 Hz (±10 with ×10), banned skipped |
//! | switch 2    | all outputs off, leave the screen              |
//! | switch 3    | toggle outputs                                 |
//! | switch 4    | toggle ×10 step                                |
//!
//! On-time is always held under the duty ceiling of the current frequency.
//! While active, every change is sent to all channels at once.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;
use platform::config::MAX_BANNED_FREQUENCIES;
use platform::{config, duty, ConfigStore, Direction, InterrupterLimits};

use crate::control::{ChannelCommand, CommandSender};
use crate::dispatch::{Consumer, Outcome};
use crate::output::PulseParams;

/// Step multiplier with ×10 enabled.
const COARSE_STEP: u32 = 10;

/// Interactive control of every output at one frequency and on-time.
pub struct InterrupterPanel<'a, M: RawMutex> {
    commands: CommandSender<'a, M>,
    limits: InterrupterLimits,
    banned: Vec<u32, MAX_BANNED_FREQUENCIES>,
    frequency_hz: u32,
    on_time_us: u32,
    active: bool,
    coarse: bool,
}

impl<'a, M: RawMutex> InterrupterPanel<'a, M> {
    /// Panel starting inactive at the configured minimum frequency and
    /// on-time.
    pub fn new(commands: CommandSender<'a, M>, store: &impl ConfigStore) -> Self {
        let limits = store.interrupter_limits();
        let mut banned = Vec::new();
        for &hz in store.banned_frequencies().iter().take(MAX_BANNED_FREQUENCIES) {
            let _ = banned.push(hz);
        }
        Self {
            commands,
            limits,
            banned,
            frequency_hz: limits.min_freq_hz,
            on_time_us: limits.min_on_time_us,
            active: false,
            coarse: false,
        }
    }

    /// Current frequency.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Current on-time.
    pub fn on_time_us(&self) -> u32 {
        self.on_time_us
    }

    /// Whether outputs are running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the ×10 step is selected.
    pub fn is_coarse(&self) -> bool {
        self.coarse
    }

    /// Request sent to the channels.
    pub fn params(&self) -> PulseParams {
        PulseParams::new(self.frequency_hz, self.on_time_us).with_max_duty(self.limits.max_duty_pct)
    }

    /// Share of the allowed on-time in use, for display.
    pub fn percent(&self) -> u8 {
        duty::percent(
            self.frequency_hz,
            self.on_time_us,
            self.limits.max_duty_pct,
            self.limits.max_on_time_us,
        )
    }

    fn step(&self) -> u32 {
        if self.coarse {
            COARSE_STEP
        } else {
            1
        }
    }

    /// Largest on-time allowed at `frequency_hz`.
    fn max_on_time(&self, frequency_hz: u32) -> u32 {
        duty::clamp_on_time(
            u32::MAX,
            frequency_hz,
            self.limits.max_duty_pct,
            self.limits.max_on_time_us,
        )
    }

    fn nudge_on_time(&mut self, direction: Direction) {
        let step = self.step();
        let requested = match direction {
            Direction::Clockwise => self.on_time_us.saturating_add(step),
            Direction::CounterClockwise => self.on_time_us.saturating_sub(step),
        };
        self.on_time_us = requested
            .min(self.max_on_time(self.frequency_hz))
            .max(self.limits.min_on_time_us);
    }

    fn nudge_frequency(&mut self, direction: Direction) {
        let step = self.step();
        let requested = match direction {
            Direction::Clockwise => self.frequency_hz.saturating_add(step),
            Direction::CounterClockwise => self.frequency_hz.saturating_sub(step),
        };
        let skipped =
            config::skip_banned(requested, i32::from(direction.step()), step, &self.banned);
        let ceiling = self.limits.max_freq_hz.max(self.limits.min_freq_hz);
        let clamped = skipped.clamp(self.limits.min_freq_hz, ceiling);
        if self.banned.contains(&clamped) {
            // only reachable at a range bound; stay put
            return;
        }
        self.frequency_hz = clamped;
        self.on_time_us = self.on_time_us.min(self.max_on_time(clamped));
    }

    fn push(&self) {
        if self.active {
            // a full queue is logged by the sender; the next change resends
            let _ = self
                .commands
                .try_submit(ChannelCommand::EnableAll { params: self.params() });
        } else {
            self.commands.stop_all();
        }
    }
}

impl<M: RawMutex> Consumer for InterrupterPanel<'_, M> {
    fn rotate(&mut self, index: u8, direction: Direction) -> Outcome {
        match index {
            0 => self.nudge_on_time(direction),
            1 => self.nudge_frequency(direction),
            _ => return Outcome::Unhandled,
        }
        if self.active {
            self.push();
        }
        Outcome::Handled
    }

    fn click(&mut self, index: u8) -> Outcome {
        match index {
            2 => {
                self.active = false;
                self.push();
                Outcome::Exit
            }
            3 => {
                self.active = !self.active;
                self.on_time_us = self.on_time_us.min(self.max_on_time(self.frequency_hz));
                debug!("interrupter {}", if self.active { "on" } else { "off" });
                self.push();
                Outcome::Handled
            }
            4 => {
                self.coarse = !self.coarse;
                Outcome::Handled
            }
            _ => Outcome::Unhandled,
        }
    }
}
