//! `smoltcp::phy::Device` adapter, gated behind the `smoltcp_phy` feature.
//!
//! Grounded on the teacher's own `smoltcp_phy` module plus
//! `oxidecomputer-hubris`'s `OurRxToken`/`OurTxToken`/`Device` impl, using
//! the same lifetime-parameterized `Device<'a>` API the teacher's pinned
//! smoltcp dependency predates.

use crate::desc::DescFuncs;
use crate::dma::DmaAlloc;
use crate::driver::Driver;
use crate::error::RxOutcome;
use crate::iface::IfaceFuncs;
use smoltcp::phy::{Device, DeviceCapabilities, RxToken, TxToken};
use smoltcp::time::Instant;

pub struct OurRxToken {
    bytes: alloc::vec::Vec<u8>,
}

impl RxToken for OurRxToken {
    fn consume<R, F>(self, _timestamp: Instant, f: F) -> smoltcp::Result<R>
    where
        F: FnOnce(&mut [u8]) -> smoltcp::Result<R>,
    {
        let mut bytes = self.bytes;
        f(&mut bytes)
    }
}

pub struct OurTxToken<'a, D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> {
    driver: &'a mut Driver<D, Ii, A>,
}

impl<'a, D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> TxToken for OurTxToken<'a, D, Ii, A> {
    fn consume<R, F>(self, _timestamp: Instant, len: usize, f: F) -> smoltcp::Result<R>
    where
        F: FnOnce(&mut [u8]) -> smoltcp::Result<R>,
    {
        let mut res = self
            .driver
            .tx
            .txget(&mut self.driver.pool)
            .ok_or(smoltcp::Error::Exhausted)?;
        let buf = res.take();
        let slice = unsafe { core::slice::from_raw_parts_mut(buf.virt, len) };
        let result = f(slice)?;
        self.driver.pool.cache_clean(&buf, len);
        self.driver.tx.txput(&mut self.driver.desc, res, buf, len as u16);
        self.driver.iface.start_tx_logic();
        Ok(result)
    }
}

impl<'a, D: DescFuncs + 'a, Ii: IfaceFuncs + 'a, A: DmaAlloc + 'a> Device<'a> for Driver<D, Ii, A> {
    type RxToken = OurRxToken;
    type TxToken = OurTxToken<'a, D, Ii, A>;

    fn receive(&'a mut self) -> Option<(Self::RxToken, Self::TxToken)> {
        match self.rx.rxget(&mut self.desc) {
            RxOutcome::Frame { handle, len } => {
                self.pool.cache_invalidate(&handle, len);
                let mut bytes = alloc::vec::Vec::with_capacity(len);
                unsafe {
                    bytes.set_len(len);
                    core::ptr::copy_nonoverlapping(handle.virt, bytes.as_mut_ptr(), len);
                }
                self.pool.free(handle);
                self.rx.mark_refillable();
                self.rx.rxrefill(&mut self.desc, &mut self.pool);
                Some((OurRxToken { bytes }, OurTxToken { driver: self }))
            }
            RxOutcome::Error { handle, .. } => {
                self.pool.free(handle);
                self.rx.mark_refillable();
                self.rx.rxrefill(&mut self.desc, &mut self.pool);
                None
            }
            RxOutcome::Empty => None,
        }
    }

    fn transmit(&'a mut self) -> Option<Self::TxToken> {
        self.tx.txcomplete(&mut self.desc, &mut self.pool);
        Some(OurTxToken { driver: self })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = self.mtu as usize;
        caps.max_burst_size = Some(1);
        caps
    }
}
