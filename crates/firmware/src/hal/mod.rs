//! Cortex-M implementations of the backtrace collaborators.
//!
//! Everything here touches real registers or linker symbols and only builds
//! for the ARM target (`hardware` feature).

use fault_trace::platform::{Cpu, Halt, StackMemory};
use fault_trace::region::{MemoryRegion, RegionSource};

/// Direct access to the running core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CortexMCpu;

impl StackMemory for CortexMCpu {
    #[allow(unsafe_code)]
    fn read_word(&self, addr: u32) -> u32 {
        // SAFETY: the session only reads inside registered stack regions and
        // at the SCB fault-status registers, all word-aligned and mapped.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }
}

impl Cpu for CortexMCpu {
    #[inline(always)]
    #[allow(unsafe_code, clippy::inline_always)]
    fn stack_pointer(&self) -> u32 {
        let sp: u32;
        // SAFETY: reads SP into a register, no memory is touched.
        unsafe {
            core::arch::asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }
        sp
    }

    fn process_stack_pointer(&self) -> u32 {
        cortex_m::register::psp::read()
    }
}

#[allow(non_upper_case_globals)]
extern "C" {
    // cortex-m-rt link.x: bounds of .text
    static __stext: u32;
    static __etext: u32;
    // memory.x: main stack, top and bottom
    static _stack_start: u32;
    static _stack_bottom: u32;
}

/// Main-stack and code bounds taken from linker symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkerRegions;

impl LinkerRegions {
    #[allow(clippy::cast_possible_truncation)] // 32-bit address space
    fn symbol(sym: *const u32) -> u32 {
        sym as usize as u32
    }
}

impl RegionSource for LinkerRegions {
    #[allow(unsafe_code)]
    fn main_stack(&self) -> MemoryRegion {
        // SAFETY: only the addresses of the symbols are taken.
        let (bottom, top) = unsafe {
            (
                core::ptr::addr_of!(_stack_bottom),
                core::ptr::addr_of!(_stack_start),
            )
        };
        MemoryRegion::from_bounds(Self::symbol(bottom), Self::symbol(top))
    }

    #[allow(unsafe_code)]
    fn code(&self) -> MemoryRegion {
        // SAFETY: only the addresses of the symbols are taken.
        let (start, end) =
            unsafe { (core::ptr::addr_of!(__stext), core::ptr::addr_of!(__etext)) };
        MemoryRegion::from_bounds(Self::symbol(start), Self::symbol(end))
    }
}

/// Mask interrupts and spin forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinHalt;

impl SpinHalt {
    /// Stop here for good. Usable from handlers that must return `!`.
    pub fn spin() -> ! {
        cortex_m::interrupt::disable();
        loop {
            cortex_m::asm::nop();
        }
    }
}

impl Halt for SpinHalt {
    fn halt(&mut self) {
        Self::spin()
    }
}

/// Line callback of the hardware sink: one defmt frame per report line.
pub fn emit_line(line: &str) {
    defmt::println!("{=str}", line);
}
