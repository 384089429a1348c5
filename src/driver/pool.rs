//! DMA buffer storage for the streaming reader.
//!
//! The pool is plain caller-owned memory, usually a `static`. A
//! [`StreamChannel`](crate::StreamChannel) borrows it for its whole life, so
//! the buffers cannot move or be dropped while the hardware may still write
//! into them.
//!
//! Bus addresses are the CPU addresses of the buffers. Platforms with an
//! IOMMU or a non-identity DMA window must place the pool in memory where the
//! two coincide.

use core::cell::UnsafeCell;

use crate::internal::constants::{DEFAULT_MAX_PACKET_LEN, DEFAULT_POOL_SIZE};

/// One DMA buffer
#[repr(C, align(64))]
pub struct DmaBuffer<const BUF: usize> {
    data: UnsafeCell<[u8; BUF]>,
}

impl<const BUF: usize> DmaBuffer<BUF> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new([0; BUF]),
        }
    }
}

/// Fixed set of `N` buffers of `BUF` bytes each.
///
/// # Example
///
/// ```ignore
/// static POOL: DmaPool<4, 4096> = DmaPool::new();
/// let stream = StreamChannel::new(rx, &POOL, StreamConfig::new())?;
/// ```
pub struct DmaPool<const N: usize = DEFAULT_POOL_SIZE, const BUF: usize = DEFAULT_MAX_PACKET_LEN> {
    buffers: [DmaBuffer<BUF>; N],
}

// SAFETY: buffer contents are only touched by the hardware while the owning
// transaction is pending and by one reader while it is detached. The stream
// state machine keeps those phases apart.
unsafe impl<const N: usize, const BUF: usize> Sync for DmaPool<N, BUF> {}

impl<const N: usize, const BUF: usize> DmaPool<N, BUF> {
    /// Create a zeroed pool.
    pub const fn new() -> Self {
        Self {
            buffers: [const { DmaBuffer::new() }; N],
        }
    }

    /// Number of buffers
    pub const fn len(&self) -> usize {
        N
    }

    /// True for a zero-sized pool
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Size of each buffer in bytes
    pub const fn buffer_size(&self) -> usize {
        BUF
    }

    /// Total bytes of buffer memory
    pub const fn memory_usage() -> usize {
        N * BUF
    }

    /// Address the hardware uses for buffer `idx`.
    pub(crate) fn bus_addr(&self, idx: usize) -> u64 {
        self.buffers[idx].data.get() as usize as u64
    }

    /// First `len` bytes of buffer `idx`.
    ///
    /// # Safety
    ///
    /// The transaction owning `idx` must be detached, so neither the
    /// hardware nor another reader touches the buffer for the lifetime of
    /// the returned slice.
    pub(crate) unsafe fn filled(&self, idx: usize, len: usize) -> &[u8] {
        let len = len.min(BUF);
        // SAFETY: exclusive access guaranteed by the caller
        unsafe { core::slice::from_raw_parts(self.buffers[idx].data.get().cast::<u8>(), len) }
    }
}

impl<const N: usize, const BUF: usize> Default for DmaPool<N, BUF> {
    fn default() -> Self {
        Self::new()
    }
}
