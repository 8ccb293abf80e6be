//! SCB fault-status registers.
//!
//! Each register is a fixed-width integer with named bits (`bitflags`), read
//! with whole-word accesses. The Configurable Fault Status Register packs the
//! MemManage (byte 0), BusFault (byte 1) and UsageFault (half-word 1) status
//! registers; [`FaultStatusSnapshot::from_words`] splits it.
//!
//! | Register | Address       | Contents                                |
//! |----------|---------------|-----------------------------------------|
//! | SHCSR    | `0xE000_ED24` | system handler enable/active/pending     |
//! | CFSR     | `0xE000_ED28` | MMFSR \| BFSR \| UFSR                    |
//! | HFSR     | `0xE000_ED2C` | hard fault status                       |
//! | DFSR     | `0xE000_ED30` | debug fault status                      |
//! | MMFAR    | `0xE000_ED34` | MemManage fault address                 |
//! | BFAR     | `0xE000_ED38` | bus fault address                       |
//! | AFSR     | `0xE000_ED3C` | auxiliary fault status (IMPLEMENTATION DEFINED) |
//!
//! Reference: ARMv7-M ARM DDI0403E §B3.2.15–§B3.2.22.

use bitflags::bitflags;

use crate::platform::StackMemory;

/// System Handler Control and State Register address.
pub const SHCSR_ADDR: u32 = 0xE000_ED24;
/// Configurable Fault Status Register address.
pub const CFSR_ADDR: u32 = 0xE000_ED28;
/// HardFault Status Register address.
pub const HFSR_ADDR: u32 = 0xE000_ED2C;
/// Debug Fault Status Register address.
pub const DFSR_ADDR: u32 = 0xE000_ED30;
/// MemManage Fault Address Register address.
pub const MMFAR_ADDR: u32 = 0xE000_ED34;
/// BusFault Address Register address.
pub const BFAR_ADDR: u32 = 0xE000_ED38;
/// Auxiliary Fault Status Register address.
pub const AFSR_ADDR: u32 = 0xE000_ED3C;

bitflags! {
    /// System Handler Control and State Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Shcsr: u32 {
        /// MemManage exception active.
        const MEMFAULTACT = 1 << 0;
        /// BusFault exception active.
        const BUSFAULTACT = 1 << 1;
        /// UsageFault exception active.
        const USGFAULTACT = 1 << 3;
        /// SVCall active.
        const SVCALLACT = 1 << 7;
        /// Debug monitor active.
        const MONITORACT = 1 << 8;
        /// PendSV active.
        const PENDSVACT = 1 << 10;
        /// SysTick active.
        const SYSTICKACT = 1 << 11;
        /// UsageFault pending.
        const USGFAULTPENDED = 1 << 12;
        /// MemManage pending.
        const MEMFAULTPENDED = 1 << 13;
        /// BusFault pending.
        const BUSFAULTPENDED = 1 << 14;
        /// SVCall pending.
        const SVCALLPENDED = 1 << 15;
        /// MemManage enabled.
        const MEMFAULTENA = 1 << 16;
        /// BusFault enabled.
        const BUSFAULTENA = 1 << 17;
        /// UsageFault enabled.
        const USGFAULTENA = 1 << 18;
    }
}

bitflags! {
    /// MemManage Fault Status Register (CFSR bits 7:0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mfsr: u8 {
        /// Instruction fetch from a location that does not permit execution.
        const IACCVIOL = 1 << 0;
        /// Data access to a location that does not permit it.
        const DACCVIOL = 1 << 1;
        /// Unstacking on exception return caused an access violation.
        const MUNSTKERR = 1 << 3;
        /// Stacking on exception entry caused an access violation.
        const MSTKERR = 1 << 4;
        /// Fault during lazy floating-point state preservation (FPU cores).
        const MLSPERR = 1 << 5;
        /// MMFAR holds a valid fault address.
        const MMARVALID = 1 << 7;
    }
}

bitflags! {
    /// BusFault Status Register (CFSR bits 15:8).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Bfsr: u8 {
        /// Bus error on instruction prefetch.
        const IBUSERR = 1 << 0;
        /// Precise data bus error; the stacked PC points at the instruction.
        const PRECISERR = 1 << 1;
        /// Imprecise data bus error.
        const IMPRECISERR = 1 << 2;
        /// Unstacking on exception return caused a bus error.
        const UNSTKERR = 1 << 3;
        /// Stacking on exception entry caused a bus error.
        const STKERR = 1 << 4;
        /// Bus error during lazy floating-point state preservation (FPU cores).
        const LSPERR = 1 << 5;
        /// BFAR holds a valid fault address.
        const BFARVALID = 1 << 7;
    }
}

bitflags! {
    /// UsageFault Status Register (CFSR bits 31:16).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ufsr: u16 {
        /// Undefined instruction.
        const UNDEFINSTR = 1 << 0;
        /// Invalid EPSR state (e.g. branch to an even address, ARM state).
        const INVSTATE = 1 << 1;
        /// Invalid EXC_RETURN value loaded into PC.
        const INVPC = 1 << 2;
        /// Coprocessor instruction with the coprocessor disabled or absent.
        const NOCP = 1 << 3;
        /// Unaligned access with CCR.UNALIGN_TRP set.
        const UNALIGNED = 1 << 8;
        /// Divide by zero with CCR.DIV_0_TRP set.
        const DIVBYZERO = 1 << 9;
    }
}

bitflags! {
    /// HardFault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hfsr: u32 {
        /// Bus fault on a vector table read during exception processing.
        const VECTTBL = 1 << 1;
        /// A configurable fault was escalated to HardFault.
        const FORCED = 1 << 30;
        /// A debug event occurred with halting debug disabled.
        const DEBUGEVT = 1 << 31;
    }
}

bitflags! {
    /// Debug Fault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dfsr: u32 {
        /// Halt request from the NVIC (C_HALT or step).
        const HALTED = 1 << 0;
        /// BKPT instruction executed or FPB match.
        const BKPT = 1 << 1;
        /// DWT watchpoint match.
        const DWTTRAP = 1 << 2;
        /// Vector catch triggered.
        const VCATCH = 1 << 3;
        /// EDBGRQ external debug request asserted.
        const EXTERNAL = 1 << 4;
    }
}

/// The fault-status registers captured once per fault episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStatusSnapshot {
    /// System Handler Control and State.
    pub shcsr: Shcsr,
    /// MemManage status.
    pub mfsr: Mfsr,
    /// MemManage fault address.
    pub mmar: u32,
    /// BusFault status.
    pub bfsr: Bfsr,
    /// BusFault address.
    pub bfar: u32,
    /// UsageFault status.
    pub ufsr: Ufsr,
    /// HardFault status.
    pub hfsr: Hfsr,
    /// Debug fault status.
    pub dfsr: Dfsr,
    /// Auxiliary fault status; captured, never decoded.
    pub afsr: u32,
}

impl FaultStatusSnapshot {
    /// A snapshot with every register zero.
    pub const fn empty() -> Self {
        Self {
            shcsr: Shcsr::empty(),
            mfsr: Mfsr::empty(),
            mmar: 0,
            bfsr: Bfsr::empty(),
            bfar: 0,
            ufsr: Ufsr::empty(),
            hfsr: Hfsr::empty(),
            dfsr: Dfsr::empty(),
            afsr: 0,
        }
    }

    /// Build a snapshot from raw register words, splitting CFSR.
    ///
    /// Reserved bits are retained so nothing read from hardware is lost.
    #[allow(clippy::cast_possible_truncation)] // CFSR sub-registers are 8/8/16 bits wide
    pub const fn from_words(
        shcsr: u32,
        cfsr: u32,
        hfsr: u32,
        dfsr: u32,
        mmfar: u32,
        bfar: u32,
        afsr: u32,
    ) -> Self {
        Self {
            shcsr: Shcsr::from_bits_retain(shcsr),
            mfsr: Mfsr::from_bits_retain(cfsr as u8),
            mmar: mmfar,
            bfsr: Bfsr::from_bits_retain((cfsr >> 8) as u8),
            bfar,
            ufsr: Ufsr::from_bits_retain((cfsr >> 16) as u16),
            hfsr: Hfsr::from_bits_retain(hfsr),
            dfsr: Dfsr::from_bits_retain(dfsr),
            afsr,
        }
    }

    /// Read every register at its architectural address.
    pub fn read<M: StackMemory + ?Sized>(memory: &M) -> Self {
        Self::from_words(
            memory.read_word(SHCSR_ADDR),
            memory.read_word(CFSR_ADDR),
            memory.read_word(HFSR_ADDR),
            memory.read_word(DFSR_ADDR),
            memory.read_word(MMFAR_ADDR),
            memory.read_word(BFAR_ADDR),
            memory.read_word(AFSR_ADDR),
        )
    }

    /// Reassemble the CFSR word.
    pub const fn cfsr(&self) -> u32 {
        (self.mfsr.bits() as u32)
            | ((self.bfsr.bits() as u32) << 8)
            | ((self.ufsr.bits() as u32) << 16)
    }
}

impl Default for FaultStatusSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfsr_split_into_sub_registers() {
        // DACCVIOL | MMARVALID, PRECISERR | BFARVALID, DIVBYZERO
        let cfsr = 0x0200_8282;
        let snap = FaultStatusSnapshot::from_words(0, cfsr, 0, 0, 0, 0, 0);
        assert_eq!(snap.mfsr, Mfsr::DACCVIOL | Mfsr::MMARVALID);
        assert_eq!(snap.bfsr, Bfsr::PRECISERR | Bfsr::BFARVALID);
        assert_eq!(snap.ufsr, Ufsr::DIVBYZERO);
        assert_eq!(snap.cfsr(), cfsr);
    }

    #[test]
    fn test_hfsr_bits() {
        let snap = FaultStatusSnapshot::from_words(0, 0, 0x4000_0000, 0, 0, 0, 0);
        assert!(snap.hfsr.contains(Hfsr::FORCED));
        assert!(!snap.hfsr.contains(Hfsr::VECTTBL));
        assert!(!snap.hfsr.contains(Hfsr::DEBUGEVT));
    }

    #[test]
    fn test_reserved_bits_are_retained() {
        let snap = FaultStatusSnapshot::from_words(0, 0x0000_0004, 0, 0, 0, 0, 0);
        assert_eq!(snap.mfsr.bits(), 0x04);
        assert!(!snap.mfsr.contains(Mfsr::IACCVIOL));
    }

    struct Scb;

    impl StackMemory for Scb {
        fn read_word(&self, addr: u32) -> u32 {
            match addr {
                HFSR_ADDR => 0x4000_0000,
                CFSR_ADDR => 0x0000_0082,
                MMFAR_ADDR => 0x2001_0000,
                _ => 0,
            }
        }
    }

    #[test]
    fn test_read_uses_architectural_addresses() {
        let snap = FaultStatusSnapshot::read(&Scb);
        assert!(snap.hfsr.contains(Hfsr::FORCED));
        assert!(snap.mfsr.contains(Mfsr::DACCVIOL | Mfsr::MMARVALID));
        assert_eq!(snap.mmar, 0x2001_0000);
    }
}
