//! Contract and configuration errors.
//!
//! None of these are recoverable. The session writes the error to the sink
//! and halts before handing it back, so a caller that ignores the `Err` still
//! never continues past a broken contract.

use thiserror_no_std::Error;

use crate::region::RegionKind;

/// Errors reported by the region registry and the session entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TraceError {
    /// An entry point was called before [`Session::initialize`](crate::Session::initialize).
    #[error("backtrace used before initialization")]
    NotInitialized,
    /// [`Session::initialize`](crate::Session::initialize) was called twice.
    #[error("backtrace already initialized")]
    AlreadyInitialized,
    /// A region reported by the [`RegionSource`](crate::RegionSource) has zero size.
    #[error("{0} region has zero size")]
    EmptyRegion(RegionKind),
    /// A region extends past the end of the 32-bit address space.
    #[error("{0} region wraps the address space")]
    RegionOverflow(RegionKind),
    /// The fault entry point was re-entered while a fault was being handled.
    #[error("fault raised while already handling a fault")]
    ReentrantFault,
    /// The assert entry point was called while a fault was being handled.
    #[error("assert raised while handling a fault")]
    AssertDuringFault,
}
