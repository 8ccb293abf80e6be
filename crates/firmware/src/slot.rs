//! Global home of the backtrace session.
//!
//! The session is created in `main`, then reached from the HardFault handler,
//! the panic handler and [`fault_assert!`](crate::fault_assert). All access
//! goes through a critical section. A handler that finds the session already
//! borrowed (a fault raised while a report is being written) gets `None`
//! back and only halts.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use fault_trace::platform::{Cpu, Halt, ThreadInspector};
use fault_trace::{ExcReturn, Outcome, Session, TraceError};

/// A session installed once and borrowed by the exception paths.
pub struct SessionSlot<S> {
    inner: Mutex<RefCell<Option<S>>>,
}

impl<S> SessionSlot<S> {
    /// Empty slot, suitable for a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Move `session` into the slot.
    ///
    /// Hands the session back if one is already installed or the slot is in
    /// use.
    pub fn install(&self, session: S) -> Result<(), S> {
        critical_section::with(|cs| {
            let Ok(mut slot) = self.inner.borrow(cs).try_borrow_mut() else {
                return Err(session);
            };
            if slot.is_some() {
                return Err(session);
            }
            *slot = Some(session);
            Ok(())
        })
    }

    /// `true` once a session has been installed.
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow()
                .map_or(true, |slot| slot.is_some())
        })
    }

    /// Run `f` on the installed session.
    ///
    /// Returns `None` when nothing is installed or the session is already
    /// borrowed further up the stack.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow(cs).try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
    }
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SessionSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl<C, T, W, H, const DEPTH: usize> SessionSlot<Session<C, T, W, H, DEPTH>>
where
    C: Cpu,
    T: ThreadInspector,
    W: fmt::Write,
    H: Halt,
{
    /// Report a failed assertion through the installed session.
    pub fn assert_failed(
        &self,
        expr: &str,
        file: &str,
        line: u32,
    ) -> Option<Result<Outcome, TraceError>> {
        self.with(|session| session.on_assert(expr, file, line))
    }

    /// Report a failed assertion, halting through `fallback` when no session
    /// can take it.
    ///
    /// An empty or busy slot would otherwise let the failed assertion
    /// return to its caller.
    pub fn assert_or_halt<F: Halt>(
        &self,
        expr: &str,
        file: &str,
        line: u32,
        fallback: &mut F,
    ) -> Option<Result<Outcome, TraceError>> {
        let outcome = self.assert_failed(expr, file, line);
        if outcome.is_none() {
            fallback.halt();
        }
        outcome
    }

    /// Measure the assert-path overhead through the slot.
    ///
    /// `caller_sp` is the SP where asserting code calls into the slot, so
    /// the slot's own frames count towards the overhead.
    pub fn measure_assert_overhead(&self, caller_sp: u32) -> Option<u32> {
        self.with(|session| session.measure_assert_overhead_from(caller_sp))
    }

    /// Report a hardware fault through the installed session.
    pub fn fault(&self, exc_return: ExcReturn, sp: u32) -> Option<Result<Outcome, TraceError>> {
        self.with(|session| session.on_fault(exc_return, sp))
    }
}

/// Check a condition and report through a [`SessionSlot`] when it fails.
///
/// `fault_assert!(slot, fallback => cond)` reports through `slot` and calls
/// [`Halt::halt`] on `fallback` when the slot is empty or busy. On hardware
/// builds `fault_assert!(cond)` reports through the firmware's global
/// session. Both forms end in a halt when `cond` is false.
#[macro_export]
macro_rules! fault_assert {
    ($slot:expr, $fallback:expr => $cond:expr $(,)?) => {
        if !$cond {
            let _ = $slot.assert_or_halt(
                ::core::stringify!($cond),
                ::core::file!(),
                ::core::line!(),
                &mut $fallback,
            );
        }
    };
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::exception_handlers::assert_failed(
                ::core::stringify!($cond),
                ::core::file!(),
                ::core::line!(),
            );
        }
    };
}
