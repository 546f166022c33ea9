//! Output control task
//!
//! Screens and the MIDI engine never touch the [`ChannelBank`] directly.
//! They queue [`ChannelCommand`]s; one task owns the bank and applies them
//! in order, so enable/disable for a channel is linearizable without a
//! lock. Senders use [`CommandSender::try_submit`] from synchronous input
//! handlers: a full queue drops the command instead of stalling the input
//! path.
//!
//! Switching everything off is the exception. [`CommandSender::stop_all`]
//! never fails: when the queue is full the request is raised on a side
//! signal, and the controller handles it before anything still queued.
//! Commands waiting at that point are discarded.

use core::convert::Infallible;
use core::fmt;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use platform::StatusSink;

use crate::error::Error;
use crate::output::{ChannelBank, OutputBackend, PulseParams};

/// Commands that may wait in the queue.
pub const COMMAND_DEPTH: usize = 8;

/// A request for the output controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelCommand {
    /// Activate or retune one channel
    Enable {
        /// Channel index
        channel: u8,
        /// Waveform request
        params: PulseParams,
    },
    /// Activate or retune every channel with the same request
    EnableAll {
        /// Waveform request
        params: PulseParams,
    },
    /// Switch one channel off
    Disable {
        /// Channel index
        channel: u8,
    },
    /// Switch every channel off
    DisableAll,
}

impl ChannelCommand {
    /// Short name for log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enable { .. } => "enable",
            Self::EnableAll { .. } => "enable-all",
            Self::Disable { .. } => "disable",
            Self::DisableAll => "disable-all",
        }
    }
}

/// Bounded queue between command producers and the controller, plus the
/// all-off request that bypasses it.
pub struct CommandQueue<M: RawMutex> {
    commands: Channel<M, ChannelCommand, COMMAND_DEPTH>,
    stop: Signal<M, ()>,
}

impl<M: RawMutex> Default for CommandQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> CommandQueue<M> {
    /// Empty queue, no stop pending.
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            stop: Signal::new(),
        }
    }

    /// Take the oldest queued command without waiting.
    pub fn try_receive(&self) -> Option<ChannelCommand> {
        self.commands.try_receive().ok()
    }

    /// Whether an all-off request is waiting outside the queue.
    pub fn stop_pending(&self) -> bool {
        self.stop.signaled()
    }
}

/// The queue was full; the command is handed back.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull(pub ChannelCommand);

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command queue full, {} dropped", self.0.name())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QueueFull {}

/// Producer handle. Cheap to copy into every screen.
pub struct CommandSender<'a, M: RawMutex> {
    queue: &'a CommandQueue<M>,
}

impl<M: RawMutex> Clone for CommandSender<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for CommandSender<'_, M> {}

impl<'a, M: RawMutex> CommandSender<'a, M> {
    /// Sender feeding `queue`.
    pub fn new(queue: &'a CommandQueue<M>) -> Self {
        Self { queue }
    }

    /// Queue `command` without waiting.
    pub fn try_submit(&self, command: ChannelCommand) -> Result<(), QueueFull> {
        self.queue.commands.try_send(command).map_err(|_| {
            warn!("command queue full, {} dropped", command.name());
            QueueFull(command)
        })
    }

    /// Queue `command`, waiting for space.
    pub async fn submit(&self, command: ChannelCommand) {
        self.queue.commands.send(command).await;
    }

    /// Switch every channel off. Queued in order when there is room,
    /// otherwise raised past the queue.
    pub fn stop_all(&self) {
        if self.queue.commands.try_send(ChannelCommand::DisableAll).is_err() {
            warn!("command queue full, stop raised past it");
            self.queue.stop.signal(());
        }
    }
}

/// Applies queued commands to the channel bank it owns.
pub struct OutputController<'a, M: RawMutex, B, S, const N: usize> {
    queue: &'a CommandQueue<M>,
    bank: &'a mut ChannelBank<B, S, N>,
}

impl<'a, M, B, S, const N: usize> OutputController<'a, M, B, S, N>
where
    M: RawMutex,
    B: OutputBackend,
    S: StatusSink,
{
    /// Controller draining `queue` into `bank`.
    pub fn new(queue: &'a CommandQueue<M>, bank: &'a mut ChannelBank<B, S, N>) -> Self {
        Self { queue, bank }
    }

    /// The bank, for inspection.
    pub fn bank(&self) -> &ChannelBank<B, S, N> {
        &*self.bank
    }

    /// Apply one command now.
    pub async fn apply(&mut self, command: ChannelCommand) -> Result<(), Error> {
        trace!("apply {}", command.name());
        match command {
            ChannelCommand::Enable { channel, params } => {
                self.bank.enable(channel, true, params).await.map(|_| ())
            }
            ChannelCommand::EnableAll { params } => self.bank.enable_all(true, params).await,
            ChannelCommand::Disable { channel } => self.bank.disable(channel).await,
            ChannelCommand::DisableAll => self.bank.disable_all().await,
        }
    }

    /// Apply everything currently queued; returns how many were applied.
    ///
    /// Failures are logged and do not stop the drain.
    pub async fn drain(&mut self) -> usize {
        let mut applied = 0usize;
        loop {
            let command = if self.queue.stop.try_take().is_some() {
                self.stopping()
            } else {
                match self.queue.commands.try_receive() {
                    Ok(command) => command,
                    Err(_) => break,
                }
            };
            self.apply_logged(command).await;
            applied = applied.saturating_add(1);
        }
        applied
    }

    /// Apply commands as they arrive, forever.
    pub async fn run(&mut self) -> Infallible {
        let queue = self.queue;
        loop {
            let command = match select(queue.stop.wait(), queue.commands.receive()).await {
                Either::First(()) => self.stopping(),
                // a stop raised while this command sat in the queue wins
                Either::Second(command) => match queue.stop.try_take() {
                    Some(()) => self.stopping(),
                    None => command,
                },
            };
            self.apply_logged(command).await;
        }
    }

    /// Discard everything queued ahead of a raised stop.
    fn stopping(&mut self) -> ChannelCommand {
        let mut discarded = 0usize;
        while self.queue.commands.try_receive().is_ok() {
            discarded = discarded.saturating_add(1);
        }
        warn!("stop raised, {} queued commands discarded", discarded);
        ChannelCommand::DisableAll
    }

    async fn apply_logged(&mut self, command: ChannelCommand) {
        if let Err(e) = self.apply(command).await {
            warn!("{} failed: {}", command.name(), e.category());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::output::HardwarePwm;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{MockPwm, MockStatus};
    use platform::ChannelLimits;

    type Bank = ChannelBank<HardwarePwm<MockPwm>, MockStatus, 4>;

    fn bank(channels: usize) -> Bank {
        let mut bank = ChannelBank::new(MockStatus::new());
        for _ in 0..channels {
            bank.push(HardwarePwm::new(MockPwm::new()), ChannelLimits::default())
                .ok()
                .unwrap();
        }
        bank
    }

    #[test]
    fn try_submit_reports_full_queue() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let tx = CommandSender::new(&queue);
        for _ in 0..COMMAND_DEPTH {
            tx.try_submit(ChannelCommand::DisableAll).unwrap();
        }
        assert_eq!(
            tx.try_submit(ChannelCommand::Disable { channel: 1 }),
            Err(QueueFull(ChannelCommand::Disable { channel: 1 }))
        );
    }

    #[tokio::test]
    async fn drain_applies_in_order() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let mut bank = bank(2);
        let tx = CommandSender::new(&queue);
        tx.try_submit(ChannelCommand::EnableAll {
            params: PulseParams::new(1000, 20),
        })
        .unwrap();
        tx.try_submit(ChannelCommand::Disable { channel: 0 }).unwrap();

        let mut ctl = OutputController::new(&queue, &mut bank);
        assert_eq!(ctl.drain().await, 2);
        assert!(!ctl.bank().channel(0).unwrap().is_active());
        assert!(ctl.bank().channel(1).unwrap().is_active());
        assert_eq!(ctl.drain().await, 0);
    }

    #[tokio::test]
    async fn failed_command_does_not_stop_drain() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let mut bank = bank(1);
        let tx = CommandSender::new(&queue);
        // unknown channel, then a valid one
        tx.try_submit(ChannelCommand::Enable {
            channel: 3,
            params: PulseParams::new(500, 50),
        })
        .unwrap();
        tx.try_submit(ChannelCommand::Enable {
            channel: 0,
            params: PulseParams::new(500, 50),
        })
        .unwrap();

        let mut ctl = OutputController::new(&queue, &mut bank);
        assert_eq!(ctl.drain().await, 2);
        assert!(ctl.bank().channel(0).unwrap().is_active());
    }

    #[tokio::test]
    async fn disable_all_via_apply() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let mut bank = bank(3);
        let mut ctl = OutputController::new(&queue, &mut bank);
        ctl.apply(ChannelCommand::EnableAll {
            params: PulseParams::new(200, 100),
        })
        .await
        .unwrap();
        ctl.apply(ChannelCommand::DisableAll).await.unwrap();
        for i in 0..3 {
            assert!(!ctl.bank().channel(i).unwrap().is_active());
        }
        assert_eq!(ctl.bank().channel(2).unwrap().backend().peripheral().duty, 0);
    }

    #[test]
    fn stop_all_queues_in_order_when_there_is_room() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let tx = CommandSender::new(&queue);
        tx.try_submit(ChannelCommand::Disable { channel: 0 }).unwrap();
        tx.stop_all();
        assert!(!queue.stop_pending());
        assert_eq!(queue.try_receive(), Some(ChannelCommand::Disable { channel: 0 }));
        assert_eq!(queue.try_receive(), Some(ChannelCommand::DisableAll));
    }

    #[tokio::test]
    async fn stop_all_survives_a_full_queue() {
        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let mut bank = bank(2);
        let tx = CommandSender::new(&queue);
        let params = PulseParams::new(200, 100);
        for _ in 0..COMMAND_DEPTH {
            tx.try_submit(ChannelCommand::EnableAll { params }).unwrap();
        }
        tx.stop_all();
        assert!(queue.stop_pending());

        let mut ctl = OutputController::new(&queue, &mut bank);
        ctl.apply(ChannelCommand::EnableAll { params }).await.unwrap();
        // the stop, and nothing queued before it
        assert_eq!(ctl.drain().await, 1);
        assert!(!queue.stop_pending());
        assert_eq!(queue.try_receive(), None);
        for i in 0..2 {
            assert!(!ctl.bank().channel(i).unwrap().is_active());
            assert_eq!(ctl.bank().channel(i).unwrap().backend().peripheral().duty, 0);
        }
    }

    #[tokio::test]
    async fn run_takes_a_raised_stop_before_the_queue() {
        use embassy_time::Timer;

        let queue: CommandQueue<NoopRawMutex> = CommandQueue::new();
        let mut bank = bank(1);
        let tx = CommandSender::new(&queue);
        let params = PulseParams::new(500, 50);
        {
            let mut ctl = OutputController::new(&queue, &mut bank);
            ctl.apply(ChannelCommand::Enable { channel: 0, params }).await.unwrap();
        }
        for _ in 0..COMMAND_DEPTH {
            tx.try_submit(ChannelCommand::Enable { channel: 0, params }).unwrap();
        }
        tx.stop_all();

        let mut ctl = OutputController::new(&queue, &mut bank);
        match select(ctl.run(), Timer::after_millis(5)).await {
            Either::First(never) => match never {},
            Either::Second(()) => {}
        }
        assert!(!ctl.bank().channel(0).unwrap().is_active());
        assert_eq!(queue.try_receive(), None);
    }
}
