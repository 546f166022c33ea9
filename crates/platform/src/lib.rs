//! Hardware Abstraction Layer (HAL) for the coil interrupter
//!
//! Trait-based abstractions for the peripherals an interrupter drives, and
//! the pure arithmetic shared by every output backend, so the core can be
//! developed and tested without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Interrupter core (interrupter crate: channels, input pipeline, dispatch)
//!         ↓
//! Platform HAL (this crate - trait abstractions + duty arithmetic)
//!         ↓
//! Hardware Layer (chip HAL + PAC)
//! ```
//!
//! # Abstraction Levels
//!
//! ## Waveform Peripherals
//! - [`PwmPeripheral`] - Hardware PWM slice
//! - [`ToggleTimer`] - Periodic timer toggling a pin
//! - [`PioStateMachine`] - Programmable-I/O pulse program
//!
//! ## Events and Feedback
//! - [`InterruptLine`] - ISR-safe pending flag
//! - [`InputEvent`] - Decoded rotation/click
//! - [`StatusSink`] - Per-channel status LEDs
//!
//! ## Domain
//! - [`duty`] - Duty-cycle and feedback arithmetic
//! - [`config`] - Channel limits and the [`ConfigStore`] view
//!
//! # Features
//!
//! - `std`: Enable standard library support (mocks, `std::error::Error`)
//! - `serde`: Deserialize configuration documents
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```
//! use platform::duty;
//!
//! // 1 kHz, 20 µs, 5 % ceiling → 40 % of the allowed on-time
//! assert_eq!(duty::percent(1000, 20, 5.0, 300), 40);
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod config;
pub mod duty;
pub mod gpio;
pub mod input;
pub mod mocks;
pub mod peripheral;
pub mod status;
pub mod units;

// Re-export main traits
pub use config::{ChannelLimits, ConfigStore, InterrupterLimits, StaticConfigStore};
pub use input::{Direction, InputEvent};
pub use status::{NullStatus, StatusSink, StatusUpdate};

// Re-export GPIO types
pub use gpio::{InterruptLine, InterruptMode};

// Re-export peripheral types
pub use peripheral::{
    HalError, I2cConfig, PioStateMachine, PwmPeripheral, SpiConfig, SpiMode, ToggleTimer,
};

// Re-export newtypes
pub use units::{FrequencyHz, OnTimeUs, OutOfRangeError, Percent, Rgb};
