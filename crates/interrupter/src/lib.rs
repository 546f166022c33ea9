//! Multi-channel coil interrupter core
//!
//! Pulse generation on 2–8 output channels over heterogeneous backends,
//! and the interrupt-to-event path that turns encoder and switch chips on
//! shared buses into debounced, direction-decoded input events.
//!
//! # Architecture
//!
//! ```text
//! ISR ─signal─▶ InterruptLine ─▶ InterruptPipeline ─▶ EventDispatcher ─▶ Consumer
//!                                      │ scan                               │
//!                                      ▼                                    ▼
//!                         InputDevice ─▶ BusArbiter ◀─ OutputBackend ◀─ OutputController
//!                                                          │
//!                                                   duty ─▶ StatusSink
//! ```
//!
//! Three rules hold everywhere:
//!
//! - interrupt context only ever calls [`InterruptLine::signal`]
//! - every multi-register transaction runs inside one
//!   [`BusArbiter::with_lock`] closure, which never yields
//! - a channel reported off is physically low, even when its backend
//!   failed to stop cleanly
//!
//! # Features
//!
//! - `defmt` - Log over defmt (hardware)
//! - `tracing` - Log over tracing (host)
//! - `debug-bus` - Trace every bus lock acquire/release with its caller tag
//! - `serde` - Deserialize [`HardwareProfile`]
//! - `std` - `std::error::Error` impls
//!
//! [`InterruptLine::signal`]: platform::InterruptLine::signal
//! [`BusArbiter::with_lock`]: bus::BusArbiter::with_lock
//! [`HardwareProfile`]: context::HardwareProfile

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)]
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)] // backend trait methods are async even when the body is not
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bus;
pub mod context;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod output;
pub mod panel;
pub mod pipeline;

pub use bus::{BusArbiter, BusId, Buses};
pub use context::{DeviceEntry, HardwareContext, HardwareProfile};
pub use control::{ChannelCommand, CommandQueue, CommandSender, OutputController, QueueFull};
pub use dispatch::{Consumer, EventDispatcher, Navigator, Outcome};
pub use error::{BusFault, ConfigError, Error, HardwareFault, ParamError};
pub use input::{AnyDevice, DeviceKind, InputDevice};
pub use output::{
    AnyBackend, BackendKind, ChannelBank, Feedback, OutputBackend, OutputChannel, PulseParams,
    Waveform,
};
pub use panel::InterrupterPanel;
pub use pipeline::InterruptPipeline;
