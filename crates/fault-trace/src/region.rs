//! Memory regions and the region registry.
//!
//! Two regions matter to the walker: the main stack (MSP) and the executable
//! code segment. Both come from link-time symbols that only the firmware can
//! resolve, so they arrive through [`RegionSource`] and are validated once by
//! [`RegionRegistry::load`].

use core::fmt;

use crate::error::TraceError;

/// A contiguous address range `[start, start + size]`.
///
/// The end address is treated as inclusive by [`contains`](Self::contains): a
/// return address equal to the end of the code segment is still accepted, and
/// a stack pointer sitting exactly at the top of an empty stack is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    start: u32,
    size: u32,
}

impl MemoryRegion {
    /// Create a region. No validation; see [`RegionRegistry::load`].
    pub const fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    /// Create a region from a `[start, end)` pair of linker symbols.
    ///
    /// An `end` below `start` yields an empty region.
    pub const fn from_bounds(start: u32, end: u32) -> Self {
        Self {
            start,
            size: end.saturating_sub(start),
        }
    }

    /// Lowest address of the region.
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Size in bytes.
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// One past the last byte, saturated at `u32::MAX`.
    pub const fn end(&self) -> u32 {
        self.start.saturating_add(self.size)
    }

    /// `true` when the region has zero size.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// `true` when `addr` lies in `[start, end]`. Empty regions contain nothing.
    pub const fn contains(&self, addr: u32) -> bool {
        !self.is_empty() && addr >= self.start && addr <= self.end()
    }

    /// Clamp `addr` into `[start, end]`.
    pub fn clamp(&self, addr: u32) -> u32 {
        addr.clamp(self.start, self.end())
    }
}

/// Which registered region an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionKind {
    /// The main (MSP) stack.
    MainStack,
    /// The executable code segment.
    Code,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainStack => write!(f, "main stack"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// Provider of the main-stack and code-segment bounds.
///
/// One implementation per toolchain/linker script; the firmware crate reads
/// `cortex-m-rt` linker symbols.
pub trait RegionSource {
    /// Bounds of the main (MSP) stack.
    fn main_stack(&self) -> MemoryRegion;

    /// Bounds of the executable code segment.
    fn code(&self) -> MemoryRegion;
}

/// A [`RegionSource`] holding fixed bounds, for tests and for targets whose
/// memory map is known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRegions {
    main_stack: MemoryRegion,
    code: MemoryRegion,
}

impl StaticRegions {
    /// Wrap fixed main-stack and code bounds.
    pub const fn new(main_stack: MemoryRegion, code: MemoryRegion) -> Self {
        Self { main_stack, code }
    }
}

impl RegionSource for StaticRegions {
    fn main_stack(&self) -> MemoryRegion {
        self.main_stack
    }

    fn code(&self) -> MemoryRegion {
        self.code
    }
}

/// Validated main-stack and code regions, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionRegistry {
    main_stack: MemoryRegion,
    code: MemoryRegion,
}

impl RegionRegistry {
    /// Read both regions from `source` and validate them.
    ///
    /// # Errors
    ///
    /// - [`TraceError::EmptyRegion`] if either region has zero size
    /// - [`TraceError::RegionOverflow`] if either region runs past `u32::MAX`
    pub fn load<S: RegionSource + ?Sized>(source: &S) -> Result<Self, TraceError> {
        let main_stack = validate(source.main_stack(), RegionKind::MainStack)?;
        let code = validate(source.code(), RegionKind::Code)?;
        debug!(
            "regions: stack {}+{} code {}+{}",
            main_stack.start(),
            main_stack.size(),
            code.start(),
            code.size()
        );
        Ok(Self { main_stack, code })
    }

    /// The main (MSP) stack.
    pub const fn main_stack(&self) -> MemoryRegion {
        self.main_stack
    }

    /// The executable code segment.
    pub const fn code(&self) -> MemoryRegion {
        self.code
    }
}

fn validate(region: MemoryRegion, kind: RegionKind) -> Result<MemoryRegion, TraceError> {
    if region.is_empty() {
        return Err(TraceError::EmptyRegion(kind));
    }
    if region.start().checked_add(region.size()).is_none() {
        return Err(TraceError::RegionOverflow(kind));
    }
    Ok(region)
}
