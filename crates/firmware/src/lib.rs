//! Post-mortem backtrace wiring for the STM32H7 firmware image.
//!
//! This crate owns everything target-specific around `fault-trace`:
//!
//! ```text
//! HardFault shim · panic handler · fault_assert!   (exception_handlers)
//!         ↓
//! SESSION: SessionSlot<FirmwareSession>          (slot)
//!         ↓
//! fault_trace::Session
//!         ↓
//! CortexMCpu · LinkerRegions · SpinHalt (hal) → LineSink → defmt (sink)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32H7 target (cortex-m, cortex-m-rt, defmt)
//! - `std` - Enable standard library (host testing)
//!
//! # Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)]
#![warn(clippy::dbg_macro)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

use fault_trace::{CpuVariant, TraceConfig};

pub mod sink;
pub mod slot;

#[cfg(feature = "hardware")]
pub mod exception_handlers;
#[cfg(feature = "hardware")]
pub mod hal;

pub use sink::{LineSink, LINE_CAPACITY};
pub use slot::SessionSlot;

/// Backtrace configuration of the firmware image.
///
/// The image is named after the binary so the printed `addr2line` hint
/// points at `target/thumbv7em-none-eabihf/release/firmware`.
pub const TRACE_CONFIG: TraceConfig = TraceConfig::new(CpuVariant::CortexM7)
    .with_dump_stack(true)
    .with_firmware_name("firmware", "");

/// The session type installed on hardware.
#[cfg(feature = "hardware")]
pub type FirmwareSession = fault_trace::Session<
    hal::CortexMCpu,
    fault_trace::BareMetal,
    LineSink<LINE_CAPACITY, fn(&str)>,
    hal::SpinHalt,
>;

/// The one session reached by the exception handlers.
#[cfg(feature = "hardware")]
pub static SESSION: SessionSlot<FirmwareSession> = SessionSlot::new();
