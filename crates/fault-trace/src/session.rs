//! The diagnostic session.
//!
//! One [`Session`] owns every piece of episode state: the validated regions,
//! the handling state, the captured exception frame and fault-status
//! snapshot, and the call-stack buffer. Firmware keeps a single instance for
//! the process lifetime and enters it from the assert path or the HardFault
//! vector.
//!
//! ```text
//!            on_assert               on_fault
//!   Ready ─────────────▶ Asserting   Ready ─────────────▶ Faulting
//!
//!   Asserting: on_assert → Ignored,   on_fault → Ignored
//!   Faulting:  on_assert → Err,       on_fault → Err
//! ```
//!
//! Both episodes end in [`Halt::halt`]. The session never returns to
//! `Ready`.

use core::fmt::Write;

use crate::config::{TraceConfig, DEFAULT_CALL_STACK_DEPTH};
use crate::diagnose::diagnose;
use crate::error::TraceError;
use crate::frame::{frame_end, ExcReturn, ExceptionFrame, WORD_SIZE};
use crate::message::Message;
use crate::platform::{Cpu, Halt, StackMemory, ThreadInspector};
use crate::region::{MemoryRegion, RegionRegistry, RegionSource};
use crate::registers::FaultStatusSnapshot;
use crate::walker::StackWalker;

/// Which episode, if any, the session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlingState {
    /// Initialized, nothing has gone wrong yet.
    Ready,
    /// An assertion (or panic) is being reported.
    Asserting,
    /// A hardware fault is being reported.
    Faulting,
}

/// Result of a call into an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The report was written and [`Halt::halt`] was called.
    Halted,
    /// Another episode already owns the halt; nothing was written.
    Ignored,
}

/// Why the assert path was entered.
enum AssertEntry<'a> {
    /// A failed assertion to report.
    Report {
        expr: &'a str,
        file: &'a str,
        line: u32,
    },
    /// Only record the depth below `caller_sp`.
    Measure { caller_sp: u32 },
}

/// Post-mortem backtrace session.
///
/// - `C`: register and memory access
/// - `T`: OS thread introspection ([`BareMetal`](crate::BareMetal) without an OS)
/// - `W`: report sink
/// - `H`: terminal halt
/// - `DEPTH`: call-stack capacity
pub struct Session<C, T, W, H, const DEPTH: usize = DEFAULT_CALL_STACK_DEPTH> {
    config: TraceConfig,
    cpu: C,
    threads: T,
    sink: W,
    halt: H,
    regions: Option<RegionRegistry>,
    state: HandlingState,
    assert_overhead: u32,
    call_stack: [u32; DEPTH],
    depth: usize,
    frame: Option<ExceptionFrame>,
    fault_status: Option<FaultStatusSnapshot>,
    stack_overflow: bool,
    fpu_frame: bool,
    on_thread: bool,
}

impl<C, T, W, H, const DEPTH: usize> Session<C, T, W, H, DEPTH>
where
    C: Cpu,
    T: ThreadInspector,
    W: Write,
    H: Halt,
{
    /// Build an uninitialized session around its collaborators.
    pub const fn new(config: TraceConfig, cpu: C, threads: T, sink: W, halt: H) -> Self {
        Self {
            config,
            cpu,
            threads,
            sink,
            halt,
            regions: None,
            state: HandlingState::Ready,
            assert_overhead: 0,
            call_stack: [0; DEPTH],
            depth: 0,
            frame: None,
            fault_status: None,
            stack_overflow: false,
            fpu_frame: false,
            on_thread: false,
        }
    }

    /// Load and validate the regions, then measure the assert-path overhead.
    ///
    /// Writes nothing on success. A bad region or a second call is a
    /// contract violation: the error is written, the session halts and the
    /// error is returned.
    pub fn initialize<S: RegionSource + ?Sized>(&mut self, source: &S) -> Result<(), TraceError> {
        if self.regions.is_some() {
            return Err(self.violation(TraceError::AlreadyInitialized));
        }
        let regions = match RegionRegistry::load(source) {
            Ok(regions) => regions,
            Err(err) => return Err(self.violation(err)),
        };
        self.measure_assert_overhead();
        self.regions = Some(regions);
        self.state = HandlingState::Ready;
        debug!(
            "backtrace ready: cpu {}, assert overhead {} bytes",
            self.config.cpu as u8,
            self.assert_overhead
        );
        Ok(())
    }

    /// Measure how much stack one trip into the assert machinery consumes.
    ///
    /// Takes SP here, in the caller's frame, then enters the same inner
    /// function [`on_assert`](Self::on_assert) runs and takes SP again at
    /// the point where a real assert reads it. Assert-path dumps start this
    /// many bytes above that inner SP, so the report shows the caller's
    /// stack, not the reporter's own frames. Writes nothing and leaves the
    /// state alone.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn measure_assert_overhead(&mut self) -> u32 {
        let caller_sp = self.cpu.stack_pointer();
        self.measure_assert_overhead_from(caller_sp)
    }

    /// Like [`measure_assert_overhead`](Self::measure_assert_overhead), for
    /// wrappers that enter the session through frames of their own.
    ///
    /// `caller_sp` is the SP read where asserting code would call the
    /// wrapper; the wrapper's frames are then part of the overhead.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn measure_assert_overhead_from(&mut self, caller_sp: u32) -> u32 {
        // Measuring never reports, so the outcome carries nothing.
        let _ = self.assert_entry(AssertEntry::Measure { caller_sp });
        self.assert_overhead
    }

    /// Report a failed assertion (or panic) and halt.
    ///
    /// A second call while already asserting returns [`Outcome::Ignored`]
    /// without writing or halting. Calling while faulting, or before
    /// [`initialize`](Self::initialize), is a contract violation.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn on_assert(&mut self, expr: &str, file: &str, line: u32) -> Result<Outcome, TraceError> {
        self.assert_entry(AssertEntry::Report { expr, file, line })
    }

    #[inline(never)]
    fn assert_entry(&mut self, entry: AssertEntry<'_>) -> Result<Outcome, TraceError> {
        let sp = self.cpu.stack_pointer();
        let (expr, file, line) = match entry {
            AssertEntry::Measure { caller_sp } => {
                self.assert_overhead = caller_sp.saturating_sub(sp);
                return Ok(Outcome::Ignored);
            }
            AssertEntry::Report { expr, file, line } => (expr, file, line),
        };
        let Some(regions) = self.regions else {
            return Err(self.violation(TraceError::NotInitialized));
        };
        match self.state {
            HandlingState::Ready => {}
            HandlingState::Asserting => return Ok(Outcome::Ignored),
            HandlingState::Faulting => return Err(self.violation(TraceError::AssertDuringFault)),
        }
        self.state = HandlingState::Asserting;
        warn!("assert: {} at {}:{}", expr, file, line);

        let thread = self.threads.current_thread();
        let thread_stack = if sp == self.cpu.process_stack_pointer() {
            thread.stack()
        } else {
            None
        };
        self.on_thread = thread_stack.is_some();
        let region = thread_stack.unwrap_or(regions.main_stack());

        blank_line(&mut self.sink);
        if self.on_thread {
            emit(
                &mut self.sink,
                Message::AssertOnThread {
                    thread: thread.name(),
                    expr,
                    file,
                    line,
                },
            );
        } else {
            emit(&mut self.sink, Message::AssertOnHandler { expr, file, line });
        }

        let dump_from = sp.saturating_add(self.assert_overhead);
        self.check_overflow(region, dump_from);
        if self.config.dump_stack {
            self.dump_stack(region, dump_from);
        }

        self.depth = StackWalker::new(regions.code(), DEPTH).walk(
            &self.cpu,
            &mut self.call_stack,
            sp,
            region,
            None,
        );
        self.print_call_stack();
        self.halt.halt();
        Ok(Outcome::Halted)
    }

    /// Report a hardware fault and halt.
    ///
    /// `exc_return` is the LR value on handler entry and `sp` the stack
    /// pointer the handler was entered with. A call while asserting returns
    /// [`Outcome::Ignored`]; a second call while faulting, or a call before
    /// [`initialize`](Self::initialize), is a contract violation.
    pub fn on_fault(&mut self, exc_return: ExcReturn, sp: u32) -> Result<Outcome, TraceError> {
        let Some(regions) = self.regions else {
            return Err(self.violation(TraceError::NotInitialized));
        };
        match self.state {
            HandlingState::Ready => {}
            HandlingState::Asserting => return Ok(Outcome::Ignored),
            HandlingState::Faulting => return Err(self.violation(TraceError::ReentrantFault)),
        }
        self.state = HandlingState::Faulting;
        warn!("fault: exc_return {} sp {}", exc_return.0, sp);

        let thread = self.threads.current_thread();
        let thread_stack = if exc_return.uses_process_stack() {
            thread.stack()
        } else {
            None
        };
        self.on_thread = thread_stack.is_some();
        let region = thread_stack.unwrap_or(regions.main_stack());

        blank_line(&mut self.sink);
        let frame_addr = if self.on_thread {
            emit(
                &mut self.sink,
                Message::FaultOnThread {
                    thread: thread.name(),
                },
            );
            self.cpu.process_stack_pointer()
        } else {
            emit(&mut self.sink, Message::FaultOnHandler);
            sp
        };

        let (scan_start, fpu_frame) = frame_end(frame_addr, exc_return, self.config.cpu);
        self.fpu_frame = fpu_frame;
        self.check_overflow(region, scan_start);
        if self.config.dump_stack {
            self.dump_stack(region, scan_start);
        }

        if !self.stack_overflow {
            let frame = ExceptionFrame::read(&self.cpu, frame_addr);
            self.print_registers(&frame);
            self.frame = Some(frame);
        }

        if self.config.cpu.has_fault_status_registers() {
            let snapshot = self.cpu.fault_status();
            for cause in diagnose(&snapshot, self.config.cpu) {
                emit(&mut self.sink, Message::Cause(cause));
            }
            self.fault_status = Some(snapshot);
        }

        self.depth = StackWalker::new(regions.code(), DEPTH).walk(
            &self.cpu,
            &mut self.call_stack,
            scan_start,
            region,
            self.frame.as_ref(),
        );
        self.print_call_stack();
        self.halt.halt();
        Ok(Outcome::Halted)
    }

    /// Walk the current stack from `sp` into `buffer` without reporting.
    ///
    /// Uses the same region selection as the entry points: during a fault
    /// the stack the fault was taken on, seeded with the captured frame;
    /// otherwise the thread stack when `SP == PSP`, else the main stack.
    pub fn backtrace(&self, buffer: &mut [u32], sp: u32) -> Result<usize, TraceError> {
        let regions = self.regions.ok_or(TraceError::NotInitialized)?;
        let thread = self.threads.current_thread();
        let (region, frame) = if self.state == HandlingState::Faulting {
            let region = if self.on_thread {
                thread.stack()
            } else {
                None
            };
            (region, self.frame.as_ref())
        } else if self.cpu.stack_pointer() == self.cpu.process_stack_pointer() {
            (thread.stack(), None)
        } else {
            (None, None)
        };
        let region = region.unwrap_or(regions.main_stack());
        let walker = StackWalker::new(regions.code(), DEPTH);
        Ok(walker.walk(&self.cpu, buffer, sp, region, frame))
    }

    fn check_overflow(&mut self, region: MemoryRegion, sp: u32) {
        self.stack_overflow = !region.contains(sp);
        if self.stack_overflow {
            warn!("stack pointer {} outside {}+{}", sp, region.start(), region.size());
            emit(
                &mut self.sink,
                Message::StackOverflow {
                    on_thread: self.on_thread,
                    sp,
                },
            );
        }
    }

    fn dump_stack(&mut self, region: MemoryRegion, from: u32) {
        emit(
            &mut self.sink,
            Message::StackInfo {
                on_thread: self.on_thread,
            },
        );
        let end = region.end();
        let mut addr = region.clamp(from);
        while let Some(next) = addr.checked_add(WORD_SIZE).filter(|next| *next <= end) {
            let data = self.cpu.read_word(addr);
            emit(&mut self.sink, Message::StackWord { addr, data });
            addr = next;
        }
        emit(&mut self.sink, Message::StackFooter);
    }

    fn print_registers(&mut self, frame: &ExceptionFrame) {
        let [r0, r1, r2, r3, r12, lr, pc, psr] = frame.words();
        emit(&mut self.sink, Message::RegistersTitle);
        emit(
            &mut self.sink,
            Message::RegisterRow {
                first: 0,
                values: [r0, r1, r2, r3],
            },
        );
        emit(
            &mut self.sink,
            Message::RegisterRow {
                first: 4,
                values: [r12, lr, pc, psr],
            },
        );
        emit(&mut self.sink, Message::RegistersFooter);
    }

    fn print_call_stack(&mut self) {
        let addrs = self.call_stack.get(..self.depth).unwrap_or(&[]);
        if addrs.is_empty() {
            emit(&mut self.sink, Message::CallStackError);
        } else {
            emit(
                &mut self.sink,
                Message::CallStack {
                    image: self.config.firmware_name,
                    extension: self.config.elf_extension,
                    addrs,
                },
            );
        }
    }

    fn violation(&mut self, err: TraceError) -> TraceError {
        warn!("backtrace contract violated");
        emit(&mut self.sink, Message::ContractViolation(err));
        self.halt.halt();
        err
    }
}

impl<C, T, W, H, const DEPTH: usize> Session<C, T, W, H, DEPTH> {
    /// Current handling state.
    pub const fn state(&self) -> HandlingState {
        self.state
    }

    /// `true` once [`initialize`](Self::initialize) has succeeded.
    pub const fn is_initialized(&self) -> bool {
        self.regions.is_some()
    }

    /// Validated regions, once initialized.
    pub const fn regions(&self) -> Option<&RegionRegistry> {
        self.regions.as_ref()
    }

    /// The configuration the session was built with.
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Bytes skipped above SP when dumping the stack on the assert path.
    pub const fn assert_overhead(&self) -> u32 {
        self.assert_overhead
    }

    /// Call sites captured by the last episode, innermost first.
    pub fn call_stack(&self) -> &[u32] {
        self.call_stack.get(..self.depth).unwrap_or(&[])
    }

    /// Exception frame captured by the fault path.
    pub const fn exception_frame(&self) -> Option<&ExceptionFrame> {
        self.frame.as_ref()
    }

    /// Fault-status registers captured by the fault path.
    pub const fn fault_status(&self) -> Option<&FaultStatusSnapshot> {
        self.fault_status.as_ref()
    }

    /// The stack pointer was outside its region.
    pub const fn stack_overflowed(&self) -> bool {
        self.stack_overflow
    }

    /// The fault pushed an extended floating-point frame.
    pub const fn fpu_frame(&self) -> bool {
        self.fpu_frame
    }

    /// The episode was raised on a thread stack.
    pub const fn on_thread(&self) -> bool {
        self.on_thread
    }

    /// The report sink.
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    /// The report sink, mutably (to flush a buffered sink).
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// The CPU collaborator.
    pub const fn cpu(&self) -> &C {
        &self.cpu
    }

    /// The halt collaborator.
    pub const fn halter(&self) -> &H {
        &self.halt
    }
}

impl<C, T, W, H, const DEPTH: usize> core::fmt::Debug for Session<C, T, W, H, DEPTH> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("regions", &self.regions)
            .field("depth", &self.depth)
            .field("stack_overflow", &self.stack_overflow)
            .field("on_thread", &self.on_thread)
            .finish_non_exhaustive()
    }
}

fn emit<W: Write>(sink: &mut W, message: Message<'_>) {
    // Sink failures cannot be reported anywhere else.
    let _ = writeln!(sink, "{message}");
}

fn blank_line<W: Write>(sink: &mut W) {
    let _ = sink.write_str("\n");
}
