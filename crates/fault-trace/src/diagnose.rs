//! Fault-status decoding.
//!
//! [`diagnose`] turns a [`FaultStatusSnapshot`] into an ordered list of
//! human-readable causes. The order follows the register layout (HFSR, then
//! MemManage, BusFault, UsageFault, then the debug status), never severity.

use core::fmt;

use heapless::Vec;

use crate::config::CpuVariant;
use crate::registers::{Bfsr, Dfsr, FaultStatusSnapshot, Hfsr, Mfsr, Ufsr};

/// Upper bound on the number of causes one snapshot can produce.
pub const MAX_FAULT_CAUSES: usize = 32;

/// Causes decoded from one snapshot, in report order.
pub type FaultCauses = Vec<FaultCause, MAX_FAULT_CAUSES>;

/// One decoded fault cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCause {
    /// HFSR.VECTTBL
    VectorFetch,
    /// MMFSR.IACCVIOL
    MemInstructionAccess,
    /// MMFSR.DACCVIOL
    MemDataAccess,
    /// MMFSR.MUNSTKERR
    MemUnstacking,
    /// MMFSR.MSTKERR
    MemStacking,
    /// MMFSR.MLSPERR
    MemLazyFpPreservation,
    /// MMFAR, valid and tied to an access violation.
    MemFaultAddress(u32),
    /// BFSR.IBUSERR
    BusInstructionAccess,
    /// BFSR.PRECISERR
    BusPreciseData,
    /// BFSR.IMPRECISERR
    BusImpreciseData,
    /// BFSR.UNSTKERR
    BusUnstacking,
    /// BFSR.STKERR
    BusStacking,
    /// BFSR.LSPERR
    BusLazyFpPreservation,
    /// BFAR, valid and tied to a precise error.
    BusFaultAddress(u32),
    /// UFSR.UNDEFINSTR
    UndefinedInstruction,
    /// UFSR.INVSTATE
    InvalidState,
    /// UFSR.INVPC
    InvalidExcReturn,
    /// UFSR.NOCP
    NoCoprocessor,
    /// UFSR.UNALIGNED
    Unaligned,
    /// UFSR.DIVBYZERO
    DivideByZero,
    /// DFSR.HALTED
    DebugHalted,
    /// DFSR.BKPT
    DebugBreakpoint,
    /// DFSR.DWTTRAP
    DebugWatchpoint,
    /// DFSR.VCATCH
    DebugVectorCatch,
    /// DFSR.EXTERNAL
    DebugExternal,
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VectorFetch => f.write_str("Hard fault is caused by failed vector fetch"),
            Self::MemInstructionAccess => {
                f.write_str("Memory management fault is caused by instruction access violation")
            }
            Self::MemDataAccess => {
                f.write_str("Memory management fault is caused by data access violation")
            }
            Self::MemUnstacking => {
                f.write_str("Memory management fault is caused by unstacking error")
            }
            Self::MemStacking => f.write_str("Memory management fault is caused by stacking error"),
            Self::MemLazyFpPreservation => f.write_str(
                "Memory management fault is caused by floating-point lazy state preservation",
            ),
            Self::MemFaultAddress(addr) => {
                write!(f, "The memory management fault occurred address is {addr:08x}")
            }
            Self::BusInstructionAccess => {
                f.write_str("Bus fault is caused by instruction access violation")
            }
            Self::BusPreciseData => {
                f.write_str("Bus fault is caused by precise data access violation")
            }
            Self::BusImpreciseData => {
                f.write_str("Bus fault is caused by imprecise data access violation")
            }
            Self::BusUnstacking => f.write_str("Bus fault is caused by unstacking error"),
            Self::BusStacking => f.write_str("Bus fault is caused by stacking error"),
            Self::BusLazyFpPreservation => {
                f.write_str("Bus fault is caused by floating-point lazy state preservation")
            }
            Self::BusFaultAddress(addr) => {
                write!(f, "The bus fault occurred address is {addr:08x}")
            }
            Self::UndefinedInstruction => {
                f.write_str("Usage fault is caused by attempt to execute an undefined instruction")
            }
            Self::InvalidState => f.write_str(
                "Usage fault is caused by attempt to switch to an invalid state (e.g., ARM)",
            ),
            Self::InvalidExcReturn => f.write_str(
                "Usage fault is caused by exception return with a bad EXC_RETURN value",
            ),
            Self::NoCoprocessor => {
                f.write_str("Usage fault is caused by attempt to execute a coprocessor instruction")
            }
            Self::Unaligned => f.write_str("Usage fault is caused by an unaligned access"),
            Self::DivideByZero => f.write_str(
                "Usage fault is caused by a divide by zero (only trapped if DIV_0_TRP is set)",
            ),
            Self::DebugHalted => f.write_str("Debug fault is caused by halt requested in NVIC"),
            Self::DebugBreakpoint => {
                f.write_str("Debug fault is caused by BKPT instruction executed")
            }
            Self::DebugWatchpoint => f.write_str("Debug fault is caused by DWT match"),
            Self::DebugVectorCatch => f.write_str("Debug fault is caused by vector catch"),
            Self::DebugExternal => f.write_str("Debug fault is caused by EDBGRQ signal asserted"),
        }
    }
}

/// Decode `snapshot` into causes for a `cpu` core.
///
/// Cortex-M0 has no fault-status registers, so nothing is decoded there.
/// `MLSPERR`/`LSPERR` are only looked at on cores with an FPU. Address
/// registers are only reported when their VALID bit is set and a matching
/// access error is present.
pub fn diagnose(snapshot: &FaultStatusSnapshot, cpu: CpuVariant) -> FaultCauses {
    let mut causes = FaultCauses::new();
    if !cpu.has_fault_status_registers() {
        return causes;
    }
    let fpu = cpu.has_fpu();
    let mut push = |cause: FaultCause| {
        // Capacity exceeds the number of distinct causes.
        let _ = causes.push(cause);
    };

    if snapshot.hfsr.contains(Hfsr::VECTTBL) {
        push(FaultCause::VectorFetch);
    }

    if snapshot.hfsr.contains(Hfsr::FORCED) {
        let mfsr = snapshot.mfsr;
        if !mfsr.is_empty() {
            let flags = [
                (Mfsr::IACCVIOL, FaultCause::MemInstructionAccess),
                (Mfsr::DACCVIOL, FaultCause::MemDataAccess),
                (Mfsr::MUNSTKERR, FaultCause::MemUnstacking),
                (Mfsr::MSTKERR, FaultCause::MemStacking),
            ];
            for (bit, cause) in flags {
                if mfsr.contains(bit) {
                    push(cause);
                }
            }
            if fpu && mfsr.contains(Mfsr::MLSPERR) {
                push(FaultCause::MemLazyFpPreservation);
            }
            if mfsr.contains(Mfsr::MMARVALID) && mfsr.intersects(Mfsr::IACCVIOL | Mfsr::DACCVIOL) {
                push(FaultCause::MemFaultAddress(snapshot.mmar));
            }
        }

        let bfsr = snapshot.bfsr;
        if !bfsr.is_empty() {
            let flags = [
                (Bfsr::IBUSERR, FaultCause::BusInstructionAccess),
                (Bfsr::PRECISERR, FaultCause::BusPreciseData),
                (Bfsr::IMPRECISERR, FaultCause::BusImpreciseData),
                (Bfsr::UNSTKERR, FaultCause::BusUnstacking),
                (Bfsr::STKERR, FaultCause::BusStacking),
            ];
            for (bit, cause) in flags {
                if bfsr.contains(bit) {
                    push(cause);
                }
            }
            if fpu && bfsr.contains(Bfsr::LSPERR) {
                push(FaultCause::BusLazyFpPreservation);
            }
            if bfsr.contains(Bfsr::BFARVALID | Bfsr::PRECISERR) {
                push(FaultCause::BusFaultAddress(snapshot.bfar));
            }
        }

        let ufsr = snapshot.ufsr;
        let flags = [
            (Ufsr::UNDEFINSTR, FaultCause::UndefinedInstruction),
            (Ufsr::INVSTATE, FaultCause::InvalidState),
            (Ufsr::INVPC, FaultCause::InvalidExcReturn),
            (Ufsr::NOCP, FaultCause::NoCoprocessor),
            (Ufsr::UNALIGNED, FaultCause::Unaligned),
            (Ufsr::DIVBYZERO, FaultCause::DivideByZero),
        ];
        for (bit, cause) in flags {
            if ufsr.contains(bit) {
                push(cause);
            }
        }
    }

    if snapshot.hfsr.contains(Hfsr::DEBUGEVT) {
        let dfsr = snapshot.dfsr;
        let flags = [
            (Dfsr::HALTED, FaultCause::DebugHalted),
            (Dfsr::BKPT, FaultCause::DebugBreakpoint),
            (Dfsr::DWTTRAP, FaultCause::DebugWatchpoint),
            (Dfsr::VCATCH, FaultCause::DebugVectorCatch),
            (Dfsr::EXTERNAL, FaultCause::DebugExternal),
        ];
        for (bit, cause) in flags {
            if dfsr.contains(bit) {
                push(cause);
            }
        }
    }

    causes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(hfsr: u32, cfsr: u32, dfsr: u32) -> FaultStatusSnapshot {
        FaultStatusSnapshot::from_words(0, cfsr, hfsr, dfsr, 0x2000_1234, 0x4000_0010, 0)
    }

    #[test]
    fn test_vector_fetch_only() {
        let causes = diagnose(&snapshot(1 << 1, 0, 0), CpuVariant::CortexM4);
        assert_eq!(causes.as_slice(), &[FaultCause::VectorFetch]);
    }

    #[test]
    fn test_cfsr_ignored_without_forced() {
        // DACCVIOL set but the fault did not escalate
        let causes = diagnose(&snapshot(0, 0x02, 0), CpuVariant::CortexM4);
        assert!(causes.is_empty());
    }

    #[test]
    fn test_precise_error_without_bfarvalid_omits_address() {
        let causes = diagnose(&snapshot(1 << 30, 0x0200, 0), CpuVariant::CortexM3);
        assert_eq!(causes.as_slice(), &[FaultCause::BusPreciseData]);
    }

    #[test]
    fn test_precise_error_with_bfarvalid_reports_address() {
        let causes = diagnose(&snapshot(1 << 30, 0x8200, 0), CpuVariant::CortexM3);
        assert_eq!(
            causes.as_slice(),
            &[FaultCause::BusPreciseData, FaultCause::BusFaultAddress(0x4000_0010)]
        );
    }

    #[test]
    fn test_mmarvalid_needs_access_violation() {
        // MUNSTKERR | MMARVALID: address not tied to an access violation
        let causes = diagnose(&snapshot(1 << 30, 0x88, 0), CpuVariant::CortexM4);
        assert_eq!(causes.as_slice(), &[FaultCause::MemUnstacking]);

        let causes = diagnose(&snapshot(1 << 30, 0x82, 0), CpuVariant::CortexM4);
        assert_eq!(
            causes.as_slice(),
            &[FaultCause::MemDataAccess, FaultCause::MemFaultAddress(0x2000_1234)]
        );
    }

    #[test]
    fn test_lazy_fp_bits_only_on_fpu_cores() {
        // MLSPERR | LSPERR
        let cfsr = 0x20 | (0x20 << 8);
        assert!(diagnose(&snapshot(1 << 30, cfsr, 0), CpuVariant::CortexM3).is_empty());
        assert_eq!(
            diagnose(&snapshot(1 << 30, cfsr, 0), CpuVariant::CortexM7).as_slice(),
            &[FaultCause::MemLazyFpPreservation, FaultCause::BusLazyFpPreservation]
        );
    }

    #[test]
    fn test_order_follows_register_layout() {
        // VECTTBL | FORCED | DEBUGEVT; IACCVIOL, IBUSERR, DIVBYZERO; BKPT
        let hfsr = (1 << 1) | (1 << 30) | (1 << 31);
        let cfsr = 0x01 | (0x01 << 8) | (0x0200 << 16);
        let causes = diagnose(&snapshot(hfsr, cfsr, 0x02), CpuVariant::CortexM4);
        assert_eq!(
            causes.as_slice(),
            &[
                FaultCause::VectorFetch,
                FaultCause::MemInstructionAccess,
                FaultCause::BusInstructionAccess,
                FaultCause::DivideByZero,
                FaultCause::DebugBreakpoint,
            ]
        );
    }

    #[test]
    fn test_cortex_m0_decodes_nothing() {
        let hfsr = (1 << 1) | (1 << 30) | (1 << 31);
        assert!(diagnose(&snapshot(hfsr, 0xFFFF_FFFF, 0x1F), CpuVariant::CortexM0).is_empty());
    }

    #[test]
    fn test_address_causes_render_eight_hex_digits() {
        let mut out = heapless::String::<64>::new();
        core::fmt::write(&mut out, format_args!("{}", FaultCause::BusFaultAddress(0x10))).unwrap();
        assert_eq!(out.as_str(), "The bus fault occurred address is 00000010");
    }
}
