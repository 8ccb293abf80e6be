//! Collaborator traits consumed by the session.
//!
//! The session never touches hardware directly. Register reads, memory reads,
//! OS introspection and the final halt all go through these traits so the
//! whole engine runs on the host against [`mocks`](crate::mocks).
//!
//! The text sink is any [`core::fmt::Write`]; write errors are ignored.

use crate::region::MemoryRegion;
use crate::registers::FaultStatusSnapshot;

/// Word-granular read access to target memory.
pub trait StackMemory {
    /// Read the 32-bit word at `addr`.
    ///
    /// Callers only pass addresses inside a registered region or one of the
    /// SCB fault-status registers.
    fn read_word(&self, addr: u32) -> u32;
}

/// Raw architectural register access.
pub trait Cpu: StackMemory {
    /// Current stack pointer (`SP`), whichever of MSP/PSP is active.
    fn stack_pointer(&self) -> u32;

    /// Process stack pointer (`PSP`).
    fn process_stack_pointer(&self) -> u32;

    /// Capture the SCB fault-status registers.
    ///
    /// The default reads them through [`StackMemory::read_word`] at their
    /// architectural addresses, which is correct for any core that has them.
    fn fault_status(&self) -> FaultStatusSnapshot {
        FaultStatusSnapshot::read(self)
    }
}

/// The current thread, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThreadContext {
    /// No OS, or no thread is running.
    None,
    /// A thread is running on its own stack.
    Provided {
        /// Bounds of the thread's stack.
        stack: MemoryRegion,
        /// Thread name, when the OS records one.
        name: Option<&'static str>,
    },
}

/// Placeholder printed for threads without a name.
pub const UNNAMED_THREAD: &str = "NO_NAME";

impl ThreadContext {
    /// Stack bounds of the running thread.
    pub const fn stack(&self) -> Option<MemoryRegion> {
        match self {
            Self::None => None,
            Self::Provided { stack, .. } => Some(*stack),
        }
    }

    /// Name of the running thread, or [`UNNAMED_THREAD`].
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Provided { name: Some(name), .. } => *name,
            _ => UNNAMED_THREAD,
        }
    }
}

/// OS-specific thread introspection.
pub trait ThreadInspector {
    /// Describe the thread that was running when the session was entered.
    fn current_thread(&self) -> ThreadContext;
}

/// Bare-metal builds: execution is always on the main stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BareMetal;

impl ThreadInspector for BareMetal {
    fn current_thread(&self) -> ThreadContext {
        ThreadContext::None
    }
}

/// Terminal action once the report is written.
pub trait Halt {
    /// Stop the processor. On hardware this must not return; test doubles
    /// record the call and return.
    fn halt(&mut self);
}
