//! Exception and panic entry points wired to the backtrace session.
//!
//! - **HardFault**: an assembly shim captures `LR` (EXC_RETURN) and `SP`
//!   exactly as they were on exception entry, before any Rust prologue can
//!   move the stack pointer, and branches to [`fault_trace_hard_fault`].
//! - **Panics** are reported as asserts, with the panic message in place of
//!   the expression.
//! - [`fault_assert!`](crate::fault_assert) without a slot lands in
//!   [`assert_failed`].
//!
//! None of these return. If the session is missing or already in use the
//! core is halted without a report.

#![allow(clippy::doc_markdown)] // HardFault, EXC_RETURN are register names

use core::panic::PanicInfo;

use fault_trace::platform::Cpu;
use fault_trace::ExcReturn;

use crate::hal::{CortexMCpu, SpinHalt};
use crate::sink::{capture, PANIC_MESSAGE_CAPACITY};
use crate::SESSION;

// Overrides cortex-m-rt's default `HardFault` symbol. Registers are handed
// over as the first two AAPCS arguments.
core::arch::global_asm!(
    ".section .text.HardFault,\"ax\",%progbits",
    ".global HardFault",
    ".type HardFault,%function",
    ".thumb_func",
    "HardFault:",
    "    mov r0, lr",
    "    mov r1, sp",
    "    b {handler}",
    handler = sym fault_trace_hard_fault,
);

/// Rust half of the HardFault handler.
///
/// # Safety
///
/// Only to be entered from the `HardFault` shim, with the exception-entry
/// `LR` in `r0` and `SP` in `r1`.
#[no_mangle]
#[allow(unsafe_code)]
pub unsafe extern "C" fn fault_trace_hard_fault(exc_return: u32, sp: u32) -> ! {
    if SESSION.fault(ExcReturn(exc_return), sp).is_none() {
        defmt::error!("HardFault before the backtrace session was available");
    }
    SpinHalt::spin()
}

/// Report a failed [`fault_assert!`](crate::fault_assert) and halt.
pub fn assert_failed(expr: &str, file: &str, line: u32) -> ! {
    if SESSION.assert_failed(expr, file, line).is_none() {
        defmt::error!("assert failed: {=str}, {=str}, {=u32}", expr, file, line);
    }
    SpinHalt::spin()
}

/// Measure how much stack a failed [`fault_assert!`](crate::fault_assert)
/// consumes below the calling frame.
///
/// Reads SP here, inlined into the caller, then takes the same slot path
/// [`assert_failed`] takes.
#[inline(always)]
#[allow(clippy::inline_always)] // the SP read must land in the caller's frame
pub fn measure_assert_overhead() -> Option<u32> {
    let caller_sp = CortexMCpu.stack_pointer();
    measure_through_slot(caller_sp)
}

// Stands in for the `assert_failed` frame.
#[inline(never)]
fn measure_through_slot(caller_sp: u32) -> Option<u32> {
    SESSION.measure_assert_overhead(caller_sp)
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    let message = capture::<PANIC_MESSAGE_CAPACITY>(&info.message());
    let (file, line) = info
        .location()
        .map_or(("<unknown>", 0), |location| (location.file(), location.line()));
    assert_failed(&message, file, line)
}
