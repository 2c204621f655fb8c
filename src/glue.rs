//! Stack glue (C6): bridges the ring engine to the upper network stack.
//!
//! Grounded on `lwip.c`'s `ethif_init`/`recieve_packet`/`ethif_input`/
//! `ethif_link_output`, including the scatter-then-copy-fallback unwind path
//! `ethif_link_output` takes when a fragment fails to pin.

use crate::desc::DescFuncs;
use crate::dma::{round_up_32, DmaAddr, DmaAlloc};
use crate::driver::Driver;
use crate::error::{LinkOutputError, RxOutcome};
use crate::iface::IfaceFuncs;
use crate::tx::TxOwner;
use alloc::vec::Vec;
use core::ptr::NonNull;

/// Upward contract: the opaque consumer of delivered frames. `allocate_rx_buf`'s
/// destination is a raw pointer rather than a physical address because the
/// concrete `recieve_packet`/`ethif_input` flow this is grounded on is
/// copy-based, not zero-copy, on the RX side; `tx_complete` is not part of
/// this trait because it is delivered directly as the `CompleteFn` recorded
/// on a TX slot at submission time, not dispatched through the stack object.
pub trait Stack {
    type RxHandle;

    fn allocate_rx_buf(&mut self, size: usize) -> Option<(Self::RxHandle, *mut u8)>;
    fn input(&mut self, handle: Self::RxHandle, len: usize);
}

const LINK_OUTPUT_MAX_SPINS: u32 = 1000;

/// Cheap accessor returning the hardware address and MTU captured during
/// `Driver::new`'s `low_level_init` call.
pub fn ethif_init<D, Ii, A>(driver: &Driver<D, Ii, A>) -> (crate::iface::MacAddress, u16)
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    (driver.mac, driver.mtu)
}

/// Pulls one frame, if any, copies it into a stack-allocated buffer, and
/// hands it upward. Returns whether another frame may already be waiting
/// (the caller should loop while this returns true).
pub fn ethif_input<D, Ii, A, S>(driver: &mut Driver<D, Ii, A>, stack: &mut S) -> bool
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
    S: Stack,
{
    match driver.rx.rxget(&mut driver.desc) {
        RxOutcome::Empty => false,
        RxOutcome::Error { handle, .. } => {
            #[cfg(feature = "log")]
            log::warn!("dropping rx frame flagged by hardware as errored");
            driver.pool.free(handle);
            driver.rx.mark_refillable();
            driver.rx.rxrefill(&mut driver.desc, &mut driver.pool);
            true
        }
        RxOutcome::Frame { handle, len } => {
            driver.pool.cache_invalidate(&handle, len);
            match stack.allocate_rx_buf(len) {
                Some((rx_handle, dst)) => {
                    unsafe {
                        core::ptr::copy_nonoverlapping(handle.virt, dst, len);
                    }
                    driver.pool.free(handle);
                    stack.input(rx_handle, len);
                }
                None => {
                    #[cfg(feature = "log")]
                    log::warn!("stack failed to allocate an rx buffer, dropping frame");
                    driver.pool.free(handle);
                }
            }
            driver.rx.mark_refillable();
            driver.rx.rxrefill(&mut driver.desc, &mut driver.pool);
            true
        }
    }
}

/// Sends `packet` (one or more fragments), blocking on a bounded spin of
/// `txcomplete` if the ring is momentarily full.
pub fn link_output<D, Ii, A>(
    driver: &mut Driver<D, Ii, A>,
    fragments: &[&[u8]],
    cookie: NonNull<()>,
    complete: crate::tx::CompleteFn,
) -> Result<(), LinkOutputError>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    submit(driver, fragments, cookie, complete, true)
}

/// Non-blocking variant: returns `WouldBlock` immediately instead of
/// spinning when the ring has no space.
pub fn link_output_nonblocking<D, Ii, A>(
    driver: &mut Driver<D, Ii, A>,
    fragments: &[&[u8]],
    cookie: NonNull<()>,
    complete: crate::tx::CompleteFn,
) -> Result<(), LinkOutputError>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    submit(driver, fragments, cookie, complete, false)
}

fn submit<D, Ii, A>(
    driver: &mut Driver<D, Ii, A>,
    fragments: &[&[u8]],
    cookie: NonNull<()>,
    complete: crate::tx::CompleteFn,
    blocking: bool,
) -> Result<(), LinkOutputError>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    if driver.fault.is_some() {
        return Err(LinkOutputError::MemErr);
    }

    wait_for_space(driver, fragments.len() as u16, blocking)?;

    match pin_all(driver, fragments) {
        Some(pinned) => {
            submit_scatter(driver, pinned, cookie, complete);
            driver.iface.start_tx_logic();
            Ok(())
        }
        None => submit_copy(driver, fragments, cookie, complete),
    }
}

fn wait_for_space<D, Ii, A>(driver: &mut Driver<D, Ii, A>, n: u16, blocking: bool) -> Result<(), LinkOutputError>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    if driver.tx.txhasspace(n) {
        return Ok(());
    }
    if !blocking {
        return Err(LinkOutputError::WouldBlock);
    }
    for _ in 0..LINK_OUTPUT_MAX_SPINS {
        driver.tx.txcomplete(&mut driver.desc, &mut driver.pool);
        if driver.tx.txhasspace(n) {
            return Ok(());
        }
    }
    Err(LinkOutputError::MemErr)
}

/// Pins every fragment for zero-copy transmission. On any per-fragment pin
/// failure, unwinds (unpinning what has already succeeded) and returns
/// `None` so the caller falls back to the single-buffer copy path.
fn pin_all<D, Ii, A>(driver: &mut Driver<D, Ii, A>, fragments: &[&[u8]]) -> Option<Vec<(DmaAddr, u16)>>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    let mut pinned = Vec::with_capacity(fragments.len());
    for frag in fragments {
        match driver.pool.pin_fragment(frag.as_ptr() as *mut u8, frag.len()) {
            Some(buf) => pinned.push((buf, frag.len() as u16)),
            None => {
                for (buf, len) in pinned {
                    driver.pool.unpin_fragment(buf, len as usize);
                }
                return None;
            }
        }
    }
    Some(pinned)
}

fn submit_scatter<D, Ii, A>(
    driver: &mut Driver<D, Ii, A>,
    pinned: Vec<(DmaAddr, u16)>,
    cookie: NonNull<()>,
    complete: crate::tx::CompleteFn,
) where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    let n = pinned.len();
    let mut fragments = Vec::with_capacity(n);
    for (idx, (buf, len)) in pinned.into_iter().enumerate() {
        let owner = if idx + 1 == n {
            TxOwner::PinnedLast { len: len as usize, cookie, complete }
        } else {
            TxOwner::PinnedFragment { len: len as usize }
        };
        fragments.push((buf, len, owner));
    }
    driver
        .tx
        .txputmany(&mut driver.desc, fragments)
        .expect("caller already confirmed txhasspace before pinning fragments");
}

/// Single-buffer fallback used when scatter pinning fails. Copies the whole
/// packet into one pool buffer; since the source data no longer needs to
/// outlive the call once copied, the completion callback fires synchronously
/// right here rather than waiting for hardware.
fn submit_copy<D, Ii, A>(
    driver: &mut Driver<D, Ii, A>,
    fragments: &[&[u8]],
    cookie: NonNull<()>,
    complete: crate::tx::CompleteFn,
) -> Result<(), LinkOutputError>
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
{
    let total: usize = fragments.iter().map(|f| f.len()).sum();
    if total > driver.pool.buf_size() {
        return Err(LinkOutputError::MemErr);
    }
    let mut res = driver.tx.txget(&mut driver.pool).ok_or(LinkOutputError::MemErr)?;
    let buf = res.take();
    let mut off = 0;
    for frag in fragments {
        unsafe {
            core::ptr::copy_nonoverlapping(frag.as_ptr(), buf.virt.add(off), frag.len());
        }
        off += frag.len();
    }
    driver.pool.cache_clean(&buf, round_up_32(total));
    driver.tx.txput(&mut driver.desc, res, buf, total as u16);
    driver.iface.start_tx_logic();
    // Slot is `TxOwner::Pool`; the caller's slice no longer needs to stay
    // alive once copied, so fire completion synchronously rather than
    // waiting for hardware to reap it.
    complete(cookie);
    Ok(())
}
