//! Hardware exception frame recovery.
//!
//! On exception entry the core pushes eight words onto the active stack
//! (R0–R3, R12, LR, PC, xPSR). Cores with an FPU may additionally push
//! S0–S15, FPSCR and a reserved alignment word when the interrupted context
//! had live floating-point state. `EXC_RETURN`, the value the core loads into
//! LR on entry, records which stack was used and which frame shape was pushed.
//!
//! # References
//!
//! - ARMv7-M Architecture Reference Manual DDI0403E §B1.5.6 (exception entry)
//! - ARMv7-M ARM §B1.5.8 (EXC_RETURN encoding)

use crate::config::CpuVariant;
use crate::platform::StackMemory;

/// Size of one stacked word in bytes.
pub const WORD_SIZE: u32 = 4;

/// Words in the basic integer exception frame.
pub const BASIC_FRAME_WORDS: u32 = 8;

/// Extra words pushed for an extended frame: S0–S15, FPSCR, reserved.
pub const FP_EXTENSION_WORDS: u32 = 18;

/// Register names in stacking order, padded to three columns.
pub const REGISTER_NAMES: [&str; 8] = ["R0 ", "R1 ", "R2 ", "R3 ", "R12", "LR ", "PC ", "PSR"];

/// The eight registers the core stacks on exception entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExceptionFrame {
    /// R0.
    pub r0: u32,
    /// R1.
    pub r1: u32,
    /// R2.
    pub r2: u32,
    /// R3.
    pub r3: u32,
    /// R12.
    pub r12: u32,
    /// Link register of the interrupted context.
    pub lr: u32,
    /// Address of the faulting (or next) instruction.
    pub pc: u32,
    /// Program status register.
    pub psr: u32,
}

impl ExceptionFrame {
    /// Build a frame from eight words in stacking order.
    pub const fn from_words(words: [u32; 8]) -> Self {
        let [r0, r1, r2, r3, r12, lr, pc, psr] = words;
        Self {
            r0,
            r1,
            r2,
            r3,
            r12,
            lr,
            pc,
            psr,
        }
    }

    /// Copy the frame stacked at `addr`.
    pub fn read<M: StackMemory + ?Sized>(memory: &M, addr: u32) -> Self {
        let mut words = [0u32; 8];
        let mut at = addr;
        for word in &mut words {
            *word = memory.read_word(at);
            at = at.wrapping_add(WORD_SIZE);
        }
        Self::from_words(words)
    }

    /// Registers in stacking order.
    pub const fn words(&self) -> [u32; 8] {
        [
            self.r0, self.r1, self.r2, self.r3, self.r12, self.lr, self.pc, self.psr,
        ]
    }
}

/// The `EXC_RETURN` value found in LR on handler entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExcReturn(pub u32);

impl ExcReturn {
    /// Bit 2: the interrupted context was using the process stack (PSP).
    pub const fn uses_process_stack(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// Bit 4 clear: the core pushed the extended floating-point frame.
    ///
    /// Only meaningful on cores with an FPU; see [`CpuVariant::has_fpu`].
    pub const fn has_fp_frame(self) -> bool {
        self.0 & (1 << 4) == 0
    }
}

/// Where ordinary stack scanning resumes above a frame stacked at `frame_addr`.
///
/// Returns the scan start and whether an extended FP frame was present.
pub const fn frame_end(frame_addr: u32, exc_return: ExcReturn, cpu: CpuVariant) -> (u32, bool) {
    let fpu_frame = cpu.has_fpu() && exc_return.has_fp_frame();
    let words = if fpu_frame {
        BASIC_FRAME_WORDS + FP_EXTENSION_WORDS
    } else {
        BASIC_FRAME_WORDS
    };
    (frame_addr.wrapping_add(words * WORD_SIZE), fpu_frame)
}
