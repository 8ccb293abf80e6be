//! Heuristic call-stack walker.
//!
//! Without frame pointers or unwind tables the only evidence of the call
//! chain is the return addresses that `BL`/`BLX` left behind in LR and that
//! prologues pushed to the stack. The walker scans the stack upward and keeps
//! every word that, minus one instruction, lands on an odd (Thumb) address
//! inside the code region.
//!
//! # Limitations
//!
//! Any data word that happens to look like a Thumb code address is reported
//! too. The output is a best-effort list of call sites, innermost first, for
//! offline resolution; it is not a verified unwind.

use crate::frame::{ExceptionFrame, WORD_SIZE};
use crate::platform::StackMemory;
use crate::region::MemoryRegion;

/// Scans stack memory for return addresses into the code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackWalker {
    code: MemoryRegion,
    max_depth: usize,
}

impl StackWalker {
    /// Walker accepting candidates inside `code`, reporting at most
    /// `max_depth` entries.
    pub const fn new(code: MemoryRegion, max_depth: usize) -> Self {
        Self { code, max_depth }
    }

    /// The code region candidates are checked against.
    pub const fn code(&self) -> MemoryRegion {
        self.code
    }

    /// Fill `buffer` with call sites, innermost first, and return the depth.
    ///
    /// With `frame` (fault path, stack intact) the stacked PC is entry 0 and
    /// `LR - 4` is entry 1 when it points into code. The scan then runs from
    /// `sp`, clamped into `stack`, to the top of `stack`. Only words inside
    /// `stack` are read.
    pub fn walk<M: StackMemory + ?Sized>(
        &self,
        memory: &M,
        buffer: &mut [u32],
        sp: u32,
        stack: MemoryRegion,
        frame: Option<&ExceptionFrame>,
    ) -> usize {
        let limit = self.max_depth.min(buffer.len());
        let mut depth = 0usize;
        let mut lr_valid = false;

        if let Some(frame) = frame {
            if depth < limit {
                record(buffer, &mut depth, frame.pc);
            }
            let from_lr = frame.lr.wrapping_sub(WORD_SIZE);
            if self.code.contains(from_lr) && depth < limit {
                record(buffer, &mut depth, from_lr);
                lr_valid = true;
            }
        }

        let mut addr = stack.clamp(sp);
        let end = stack.end();
        while depth < limit {
            match addr.checked_add(WORD_SIZE) {
                Some(next) if next <= end => {
                    let candidate = memory.read_word(addr).wrapping_sub(WORD_SIZE);
                    addr = next;
                    if candidate % 2 == 0 || !self.code.contains(candidate) {
                        continue;
                    }
                    if depth == 2 && lr_valid && buffer.get(1) == Some(&candidate) {
                        continue;
                    }
                    record(buffer, &mut depth, candidate);
                }
                _ => break,
            }
        }

        debug!("walk: depth {} from sp {}", depth, sp);
        depth
    }
}

fn record(buffer: &mut [u32], depth: &mut usize, addr: u32) {
    if let Some(slot) = buffer.get_mut(*depth) {
        *slot = addr;
        *depth = depth.saturating_add(1);
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const CODE: MemoryRegion = MemoryRegion::new(0x0800_0000, 0x1_0000);
    const STACK_BASE: u32 = 0x2000_0000;

    struct Stack<'a>(&'a [u32]);

    impl StackMemory for Stack<'_> {
        fn read_word(&self, addr: u32) -> u32 {
            let index = (addr.wrapping_sub(STACK_BASE) / WORD_SIZE) as usize;
            self.0.get(index).copied().unwrap_or(0)
        }
    }

    fn region(words: &[u32]) -> MemoryRegion {
        MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32)
    }

    #[test]
    fn test_scan_reports_return_addresses_in_order() {
        let a = 0x0800_0101;
        let b = 0x0800_0301;
        let words = [a + 4, 0xDEAD_BEEF, b + 4, 0];
        let mut buf = [0u32; 4];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE,
            region(&words),
            None,
        );
        assert_eq!(depth, 2);
        assert_eq!(&buf[..2], &[a, b]);
    }

    #[test]
    fn test_even_candidates_are_data() {
        let words = [0x0800_0104, 0x0800_0208];
        let mut buf = [0u32; 4];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE,
            region(&words),
            None,
        );
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_candidates_past_code_end_are_rejected() {
        // 0x0801_0001 lies past the end, 0x0800_ffff is inside
        let words = [0x0801_0005, 0x0801_0003];
        let mut buf = [0u32; 4];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE,
            region(&words),
            None,
        );
        assert_eq!(depth, 1);
        assert_eq!(buf[0], 0x0800_FFFF);
    }

    #[test]
    fn test_frame_seeds_pc_and_lr() {
        let frame = ExceptionFrame {
            pc: 0x0800_0100,
            lr: 0x0800_0205,
            ..ExceptionFrame::default()
        };
        // first stack word repeats the LR call site
        let words = [0x0800_0205, 0x0800_0405];
        let mut buf = [0u32; 8];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE,
            region(&words),
            Some(&frame),
        );
        assert_eq!(depth, 3);
        assert_eq!(&buf[..3], &[0x0800_0100, 0x0800_0201, 0x0800_0401]);
    }

    #[test]
    fn test_lr_outside_code_is_not_seeded() {
        let frame = ExceptionFrame {
            pc: 0x0800_0100,
            lr: 0xFFFF_FFF9,
            ..ExceptionFrame::default()
        };
        let words = [0x0800_0305];
        let mut buf = [0u32; 8];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE,
            region(&words),
            Some(&frame),
        );
        assert_eq!(&buf[..depth], &[0x0800_0100, 0x0800_0301]);
    }

    #[test]
    fn test_depth_capped_by_max_depth_and_buffer() {
        let words = [0x0800_0105; 10];
        let mut buf = [0u32; 8];
        let walker = StackWalker::new(CODE, 3);
        assert_eq!(
            walker.walk(&Stack(&words), &mut buf, STACK_BASE, region(&words), None),
            3
        );
        let mut small = [0u32; 2];
        let walker = StackWalker::new(CODE, 16);
        assert_eq!(
            walker.walk(&Stack(&words), &mut small, STACK_BASE, region(&words), None),
            2
        );
    }

    #[test]
    fn test_sp_below_region_is_clamped() {
        let words = [0x0800_0105, 0x0800_0205];
        let mut buf = [0u32; 4];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE - 0x100,
            region(&words),
            None,
        );
        assert_eq!(&buf[..depth], &[0x0800_0101, 0x0800_0201]);
    }

    #[test]
    fn test_sp_above_region_scans_nothing() {
        let words = [0x0800_0105, 0x0800_0205];
        let mut buf = [0u32; 4];
        let depth = StackWalker::new(CODE, 16).walk(
            &Stack(&words),
            &mut buf,
            STACK_BASE + 0x100,
            region(&words),
            None,
        );
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_empty_code_region_fails_closed() {
        let words = [0x0800_0105];
        let mut buf = [0u32; 4];
        let walker = StackWalker::new(MemoryRegion::new(0x0800_0000, 0), 16);
        assert_eq!(
            walker.walk(&Stack(&words), &mut buf, STACK_BASE, region(&words), None),
            0
        );
    }
}
