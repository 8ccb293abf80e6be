//! Post-mortem backtrace engine for ARM Cortex-M firmware.
//!
//! When an assertion fails, a panic is raised, or a HardFault fires, this
//! crate reconstructs a best-effort call stack by scanning raw stack memory,
//! decodes the SCB fault-status registers into readable causes, writes a
//! textual report to a sink, and halts.
//!
//! # Architecture Layers
//!
//! ```text
//! Firmware (HardFault shim, panic handler, assert macro)
//!         ↓
//! Session (this crate: Ready / Asserting / Faulting)
//!         ↓
//! Walker · Decoder · Frame recovery · Region registry
//!         ↓
//! Collaborator traits (Cpu, ThreadInspector, RegionSource, Halt, fmt::Write)
//! ```
//!
//! No DWARF or EHABI tables are consulted. Every word on the stack that looks
//! like an odd (Thumb) return address inside the code region is reported, so
//! data words that happen to fall in that range show up as false positives.
//! Addresses are emitted for offline resolution with `addr2line`.
//!
//! # Features
//!
//! - `std`: mocks and the report parser for host tooling
//! - `defmt`: `defmt::Format` derives and defmt state-transition logs
//! - `tracing`: state-transition logs through `tracing` (host builds)
//!
//! # Example
//!
//! ```
//! use fault_trace::mocks::{MockCpu, MockHalt, MockMemory};
//! use fault_trace::platform::BareMetal;
//! use fault_trace::region::{MemoryRegion, StaticRegions};
//! use fault_trace::{Session, TraceConfig};
//!
//! let stack = MemoryRegion::new(0x2000_0000, 0x40);
//! let code = MemoryRegion::new(0x0800_0000, 0x1_0000);
//! let memory = MockMemory::new(0x2000_0000, &[0x0800_0109; 16]);
//! let cpu = MockCpu::new(memory, 0x2000_0000);
//!
//! let mut session: Session<_, _, String, _> =
//!     Session::new(TraceConfig::default(), cpu, BareMetal, String::new(), MockHalt::default());
//! session.initialize(&StaticRegions::new(stack, code)).unwrap();
//! session.on_assert("x > 0", "main.rs", 42).unwrap();
//! assert!(session.sink().contains("addr2line"));
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // the fault path must not panic on its own
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // the report goes to the sink, never stdout
// Pedantic lints suppressed for this register-level crate:
#![allow(clippy::doc_markdown)] // register names (HFSR, EXC_RETURN) in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod log;

pub mod config;
pub mod diagnose;
pub mod error;
pub mod frame;
pub mod message;
pub mod mocks;
pub mod platform;
pub mod region;
pub mod registers;
#[cfg(any(test, feature = "std"))]
pub mod report;
pub mod session;
pub mod walker;

pub use config::{CpuVariant, TraceConfig, DEFAULT_CALL_STACK_DEPTH};
pub use diagnose::{diagnose, FaultCause, FaultCauses};
pub use error::TraceError;
pub use frame::{ExcReturn, ExceptionFrame};
pub use platform::{BareMetal, Cpu, Halt, StackMemory, ThreadContext, ThreadInspector};
pub use region::{MemoryRegion, RegionKind, RegionRegistry, RegionSource};
pub use registers::FaultStatusSnapshot;
pub use session::{HandlingState, Outcome, Session};
pub use walker::StackWalker;
