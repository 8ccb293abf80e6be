//! Mock collaborators for host tests.
//!
//! These back the unit tests, the integration tests under `tests/` and the
//! doc examples. Every mock records what the session did to it so tests can
//! assert on reads and halts as well as on the report text.

#![cfg(any(test, feature = "std"))]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::frame::WORD_SIZE;
use crate::platform::{Cpu, Halt, StackMemory, ThreadContext, ThreadInspector};
use crate::registers::FaultStatusSnapshot;

/// Word-addressed memory made of one or more contiguous segments.
///
/// Reads outside every segment return zero. Every read address is recorded.
#[derive(Debug, Default)]
pub struct MockMemory {
    segments: Vec<(u32, Vec<u32>)>,
    reads: RefCell<Vec<u32>>,
}

impl MockMemory {
    /// Memory holding `words` starting at `base`.
    pub fn new(base: u32, words: &[u32]) -> Self {
        let mut memory = Self::default();
        memory.add_segment(base, words);
        memory
    }

    /// Map another run of words at `base`.
    pub fn add_segment(&mut self, base: u32, words: &[u32]) {
        self.segments.push((base, words.to_vec()));
    }

    /// Overwrite the word at `addr` if it is mapped.
    pub fn write_word(&mut self, addr: u32, value: u32) {
        if let Some(slot) = self.slot_mut(addr) {
            *slot = value;
        }
    }

    /// Every address read so far, in order.
    pub fn reads(&self) -> Vec<u32> {
        self.reads.borrow().clone()
    }

    /// Forget recorded reads.
    pub fn clear_reads(&self) {
        self.reads.borrow_mut().clear();
    }

    fn index(base: u32, addr: u32) -> Option<usize> {
        let offset = addr.checked_sub(base)?;
        if offset % WORD_SIZE != 0 {
            return None;
        }
        usize::try_from(offset / WORD_SIZE).ok()
    }

    fn slot_mut(&mut self, addr: u32) -> Option<&mut u32> {
        self.segments.iter_mut().find_map(|(base, words)| {
            let index = Self::index(*base, addr)?;
            words.get_mut(index)
        })
    }
}

impl StackMemory for MockMemory {
    fn read_word(&self, addr: u32) -> u32 {
        self.reads.borrow_mut().push(addr);
        self.segments
            .iter()
            .find_map(|(base, words)| words.get(Self::index(*base, addr)?).copied())
            .unwrap_or(0)
    }
}

/// Scripted CPU: fixed or queued stack-pointer values over a [`MockMemory`].
#[derive(Debug)]
pub struct MockCpu {
    memory: MockMemory,
    sp: u32,
    psp: u32,
    scripted_sp: RefCell<VecDeque<u32>>,
    fault_status: Option<FaultStatusSnapshot>,
}

impl MockCpu {
    /// CPU whose SP reads as `sp` and whose PSP reads as zero.
    pub fn new(memory: MockMemory, sp: u32) -> Self {
        Self {
            memory,
            sp,
            psp: 0,
            scripted_sp: RefCell::new(VecDeque::new()),
            fault_status: None,
        }
    }

    /// Set the process stack pointer.
    #[must_use]
    pub fn with_psp(mut self, psp: u32) -> Self {
        self.psp = psp;
        self
    }

    /// Return `snapshot` from [`Cpu::fault_status`] instead of reading the
    /// SCB addresses from memory.
    #[must_use]
    pub fn with_fault_status(mut self, snapshot: FaultStatusSnapshot) -> Self {
        self.fault_status = Some(snapshot);
        self
    }

    /// Queue SP values returned by the next reads before falling back to
    /// the fixed value.
    pub fn script_sp(&self, values: &[u32]) {
        self.scripted_sp.borrow_mut().extend(values.iter().copied());
    }

    /// Change the fixed stack pointer.
    pub fn set_sp(&mut self, sp: u32) {
        self.sp = sp;
    }

    /// The backing memory.
    pub fn memory(&self) -> &MockMemory {
        &self.memory
    }

    /// The backing memory, mutably.
    pub fn memory_mut(&mut self) -> &mut MockMemory {
        &mut self.memory
    }
}

impl StackMemory for MockCpu {
    fn read_word(&self, addr: u32) -> u32 {
        self.memory.read_word(addr)
    }
}

impl Cpu for MockCpu {
    fn stack_pointer(&self) -> u32 {
        self.scripted_sp.borrow_mut().pop_front().unwrap_or(self.sp)
    }

    fn process_stack_pointer(&self) -> u32 {
        self.psp
    }

    fn fault_status(&self) -> FaultStatusSnapshot {
        self.fault_status
            .unwrap_or_else(|| FaultStatusSnapshot::read(&self.memory))
    }
}

/// Thread inspector returning a fixed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockThreads(pub ThreadContext);

impl ThreadInspector for MockThreads {
    fn current_thread(&self) -> ThreadContext {
        self.0
    }
}

/// Halt that counts calls and returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockHalt {
    calls: usize,
}

impl MockHalt {
    /// How many times the session halted.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Halt for MockHalt {
    fn halt(&mut self) {
        self.calls = self.calls.saturating_add(1);
    }
}
