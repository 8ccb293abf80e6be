//! Property-based tests for the stack walker.
//! Depth bound, parity filter, code-range filter and read bounds hold for
//! arbitrary stack contents and stack pointers.

#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use fault_trace::mocks::MockMemory;
use fault_trace::{ExceptionFrame, MemoryRegion, StackWalker};
use proptest::prelude::*;

const CODE: MemoryRegion = MemoryRegion::new(0x0800_0000, 0x1_0000);
const STACK_BASE: u32 = 0x2000_0000;

fn stack_words() -> impl Strategy<Value = Vec<u32>> {
    // Mix code-looking words with arbitrary data.
    let word = prop_oneof![
        (0x0800_0000u32..=0x0801_0004u32),
        any::<u32>(),
    ];
    proptest::collection::vec(word, 1..64)
}

proptest! {
    /// Depth never exceeds min(max_depth, buffer length).
    #[test]
    fn depth_is_bounded(words in stack_words(), max_depth in 0usize..20, cap in 0usize..20) {
        let memory = MockMemory::new(STACK_BASE, &words);
        let stack = MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32);
        let mut buf = vec![0u32; cap];
        let walker = StackWalker::new(CODE, max_depth);
        let depth = walker.walk(&memory, &mut buf, STACK_BASE, stack, None);
        prop_assert!(depth <= max_depth.min(cap));
    }

    /// Every scanned entry is odd and inside the code region.
    #[test]
    fn entries_are_odd_and_in_code(words in stack_words()) {
        let memory = MockMemory::new(STACK_BASE, &words);
        let stack = MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32);
        let mut buf = [0u32; 16];
        let depth = StackWalker::new(CODE, 16).walk(&memory, &mut buf, STACK_BASE, stack, None);
        for entry in &buf[..depth] {
            prop_assert_eq!(entry % 2, 1, "even entry {:08x}", entry);
            prop_assert!(CODE.contains(*entry), "entry {:08x} outside code", entry);
        }
    }

    /// Reads stay inside the stack region for any starting pointer.
    #[test]
    fn reads_stay_in_region(words in stack_words(), sp in any::<u32>()) {
        let memory = MockMemory::new(STACK_BASE, &words);
        let stack = MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32);
        let mut buf = [0u32; 16];
        let _ = StackWalker::new(CODE, 16).walk(&memory, &mut buf, sp, stack, None);
        for addr in memory.reads() {
            prop_assert!(addr >= stack.start() && addr + 4 <= stack.end(),
                "read {:08x} outside {:08x}..{:08x}", addr, stack.start(), stack.end());
        }
    }

    /// Reads are bounded by region size / 4.
    #[test]
    fn reads_are_bounded_by_region_size(words in stack_words()) {
        let memory = MockMemory::new(STACK_BASE, &words);
        let stack = MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32);
        let mut buf = [0u32; 64];
        let _ = StackWalker::new(CODE, 64).walk(&memory, &mut buf, STACK_BASE, stack, None);
        prop_assert!(memory.reads().len() <= words.len());
    }

    /// The frame's LR call site is never reported twice in a row.
    #[test]
    fn frame_lr_not_duplicated(lr_offset in 0u32..0x8000, tail in stack_words()) {
        let lr = 0x0800_0005 + lr_offset * 2;
        let frame = ExceptionFrame { pc: 0x0800_0100, lr, ..ExceptionFrame::default() };
        let mut words = vec![lr];
        words.extend(tail);
        let memory = MockMemory::new(STACK_BASE, &words);
        let stack = MemoryRegion::new(STACK_BASE, (words.len() * 4) as u32);
        let mut buf = [0u32; 16];
        let walker = StackWalker::new(CODE, 16);
        let depth = walker.walk(&memory, &mut buf, STACK_BASE, stack, Some(&frame));
        prop_assert!(depth >= 2);
        prop_assert_eq!(buf[1], lr - 4);
        if depth > 2 {
            prop_assert_ne!(buf[2], buf[1]);
        }
    }
}

#[test]
fn scan_finds_two_return_addresses_in_order() {
    let a = 0x0800_0101;
    let b = 0x0800_0301;
    let words = [a + 4, 0xDEAD_BEEF, b + 4, 0];
    let memory = MockMemory::new(STACK_BASE, &words);
    let mut buf = [0u32; 2];
    let depth = StackWalker::new(CODE, 16).walk(
        &memory,
        &mut buf,
        STACK_BASE,
        MemoryRegion::new(STACK_BASE, 16),
        None,
    );
    assert_eq!(depth, 2);
    assert_eq!(buf, [a, b]);
}
