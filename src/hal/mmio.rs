//! Register block access
//!
//! The channel engine never dereferences addresses itself. It talks to a
//! [`RegisterBlock`], which on hardware is [`Mmio`] (volatile accesses at
//! a fixed base) and on the host is a simulated core.

/// 32-bit register file addressed by byte offset from the core base.
pub trait RegisterBlock {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Read-modify-write the register at `offset`.
    #[inline]
    fn modify<F>(&self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(offset);
        self.write(offset, f(value));
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }
}

/// Memory-mapped register block at a fixed physical base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Create an accessor for the core mapped at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the mapped, 4-byte aligned address of an AXI DMA
    /// register block, valid for the life of the returned value, and no
    /// other driver may program the same channels.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the block
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl RegisterBlock for Mmio {
    #[inline(always)]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` requires a valid mapped register block at `base`.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline(always)]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: `new` requires a valid mapped register block at `base`.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
