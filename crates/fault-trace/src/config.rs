//! Build configuration for the backtrace session.
//!
//! All values are `const`-constructible so firmware can keep its
//! configuration in a `static` next to the exception handlers.

/// Default number of call-stack entries captured per episode.
pub const DEFAULT_CALL_STACK_DEPTH: usize = 16;

/// Firmware image name used in the `addr2line` hint when none is configured.
pub const DEFAULT_FIRMWARE_NAME: &str = "firmware";

/// ELF extension appended to the firmware name in the `addr2line` hint.
pub const DEFAULT_ELF_EXTENSION: &str = ".elf";

/// Cortex-M core the firmware runs on.
///
/// The variant decides which fault-status registers exist and whether the
/// hardware may push an extended floating-point exception frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpuVariant {
    /// ARMv6-M. No configurable fault-status registers, no FPU.
    CortexM0,
    /// ARMv7-M without FPU.
    CortexM3,
    /// ARMv7E-M with single-precision FPU.
    CortexM4,
    /// ARMv7E-M with FPU and caches.
    CortexM7,
}

impl CpuVariant {
    /// `true` when the core can push S0–S15/FPSCR on exception entry.
    pub const fn has_fpu(self) -> bool {
        matches!(self, Self::CortexM4 | Self::CortexM7)
    }

    /// `true` when CFSR/HFSR/DFSR/MMFAR/BFAR are implemented.
    pub const fn has_fault_status_registers(self) -> bool {
        !matches!(self, Self::CortexM0)
    }
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    /// Target core.
    pub cpu: CpuVariant,
    /// Print every word of the selected stack before the call stack.
    pub dump_stack: bool,
    /// Firmware image name printed in the `addr2line` hint.
    pub firmware_name: &'static str,
    /// Extension appended to `firmware_name` (`.elf`, `.axf`, `.out`).
    pub elf_extension: &'static str,
}

impl TraceConfig {
    /// Configuration for `cpu` with stack dumping enabled and default names.
    pub const fn new(cpu: CpuVariant) -> Self {
        Self {
            cpu,
            dump_stack: true,
            firmware_name: DEFAULT_FIRMWARE_NAME,
            elf_extension: DEFAULT_ELF_EXTENSION,
        }
    }

    /// Enable or disable the raw stack dump.
    pub const fn with_dump_stack(mut self, dump_stack: bool) -> Self {
        self.dump_stack = dump_stack;
        self
    }

    /// Set the image name and extension used in the `addr2line` hint.
    pub const fn with_firmware_name(mut self, name: &'static str, extension: &'static str) -> Self {
        self.firmware_name = name;
        self.elf_extension = extension;
        self
    }
}

impl Default for TraceConfig {
    /// Cortex-M4 with stack dumping enabled.
    fn default() -> Self {
        Self::new(CpuVariant::CortexM4)
    }
}
