//! DMA buffer pool (C1): a bounded LIFO cache of pre-pinned buffers backing
//! RX refills and TX copies, with a lazy overflow path.
//!
//! Grounded on `dma_buffers.c`'s `fill_dma_pool`/`alloc_dma_buf`/
//! `free_dma_buf`: the C array-plus-cursor stack becomes an
//! [`alloc::vec::Vec`] used with `push`/`pop`, the same collection the
//! teacher already depends on for its own ring storage.

use crate::dma::{round_up_32, DmaAddr, DmaAlloc};
use crate::error::InitError;
use alloc::vec::Vec;

pub struct Pool<A: DmaAlloc> {
    alloc: A,
    buf_size: usize,
    alignment: usize,
    queue: Vec<DmaAddr>,
    /// Set once by `fill`; past this many buffers live in the stack, `free`
    /// treats an incoming buffer as overflow and releases it for real
    /// instead of caching it.
    capacity: usize,
}

impl<A: DmaAlloc> Pool<A> {
    pub fn new(alloc: A, buf_size: usize, alignment: usize) -> Self {
        Pool { alloc, buf_size, alignment, queue: Vec::new(), capacity: 0 }
    }

    /// Pins `count` buffers once, at init, before any ring reset.
    pub fn fill(&mut self, count: usize) -> Result<(), InitError> {
        debug_assert!(self.capacity == 0, "fill must run exactly once per driver instance");
        self.queue.reserve(count);
        for _ in 0..count {
            let buf = self.pin_alloc_one().ok_or(InitError::PoolFill)?;
            self.queue.push(buf);
        }
        self.capacity = count;
        Ok(())
    }

    /// Pops the top of the stack if non-empty, otherwise lazily pins a fresh
    /// buffer. `None` only on underlying allocation failure.
    pub fn alloc(&mut self) -> Option<DmaAddr> {
        self.queue.pop().or_else(|| self.pin_alloc_one())
    }

    /// Pushes `buf` back if the stack has room; unpins and frees it outright
    /// if the stack is already at capacity (this buffer was an overflow
    /// draw, never a permanent pool member).
    pub fn free(&mut self, buf: DmaAddr) {
        if self.queue.len() >= self.capacity {
            self.alloc.unpin(buf.virt, self.buf_size);
            self.alloc.free(buf.virt, self.buf_size);
        } else {
            self.queue.push(buf);
        }
    }

    /// Releases every buffer currently cached in the pool. Called from
    /// `Driver`'s `Drop` once both rings have returned their outstanding
    /// buffers here.
    pub(crate) fn drain(&mut self) {
        while let Some(buf) = self.queue.pop() {
            self.alloc.unpin(buf.virt, self.buf_size);
            self.alloc.free(buf.virt, self.buf_size);
        }
    }

    fn pin_alloc_one(&mut self) -> Option<DmaAddr> {
        let virt = self.alloc.alloc(self.buf_size, self.alignment, false)?;
        let phys = self.alloc.pin(virt, self.buf_size)?;
        self.alloc.cache_clean(virt, self.buf_size);
        Some(DmaAddr { phys, virt })
    }

    /// Pins a caller-supplied virtual range directly, bypassing the stack
    /// entirely. Used by the scatter-TX path to DMA-pin pbuf-sized fragments
    /// that were never drawn from this pool.
    pub(crate) fn pin_fragment(&mut self, virt: *mut u8, len: usize) -> Option<DmaAddr> {
        let phys = self.alloc.pin(virt, len)?;
        self.alloc.cache_clean(virt, round_up_32(len));
        Some(DmaAddr { phys, virt })
    }

    pub(crate) fn unpin_fragment(&mut self, buf: DmaAddr, len: usize) {
        self.alloc.unpin(buf.virt, len);
    }

    pub(crate) fn cache_clean(&mut self, buf: &DmaAddr, len: usize) {
        self.alloc.cache_clean(buf.virt, round_up_32(len));
    }

    pub(crate) fn cache_invalidate(&mut self, buf: &DmaAddr, len: usize) {
        self.alloc.cache_invalidate(buf.virt, round_up_32(len));
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::test_support::VecDmaAlloc;

    #[test]
    fn fill_then_alloc_drains_the_stack_lifo() {
        let mut pool = Pool::new(VecDmaAlloc::new(), 64, 16);
        pool.fill(3).unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        let c = pool.alloc().unwrap();
        assert_ne!(a.virt, b.virt);
        assert_ne!(b.virt, c.virt);
        // Stack is empty now; the next alloc is a lazy overflow draw, not a failure.
        let d = pool.alloc().unwrap();
        assert_ne!(d.virt, a.virt);
    }

    #[test]
    fn free_below_capacity_pushes_back() {
        let mut pool = Pool::new(VecDmaAlloc::new(), 64, 16);
        pool.fill(2).unwrap();
        let a = pool.alloc().unwrap();
        assert_eq!(pool.queue.len(), 1);
        pool.free(a);
        assert_eq!(pool.queue.len(), 2);
    }

    #[test]
    fn free_at_capacity_releases_the_overflow_buffer() {
        let mut pool = Pool::new(VecDmaAlloc::new(), 64, 16);
        pool.fill(1).unwrap();
        let _permanent = pool.alloc().unwrap();
        let overflow = pool.alloc().unwrap();
        // Stack is at its capacity-worth of entries (0 live), freeing the
        // overflow buffer must not grow the stack past `capacity`.
        pool.free(overflow);
        assert_eq!(pool.queue.len(), 0);
    }

    #[test]
    fn fill_failure_surfaces_pool_fill_error() {
        let mut pool = Pool::new(VecDmaAlloc::fail_after(2), 64, 16);
        assert_eq!(pool.fill(5), Err(InitError::PoolFill));
    }
}
