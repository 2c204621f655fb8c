//! Per-MAC descriptor-ring adapter: the narrow vtable a concrete driver
//! implements to plug its hardware descriptor format into the ring engine.
//!
//! Grounded on `raw_descriptors.h`'s twelve-function `desc_funcs` table;
//! split here into a `TxDescFuncs`/`RxDescFuncs` pair (mirroring the
//! original's own tx/rx split) joined by a blanket [`DescFuncs`].

use crate::dma::DmaAddr;

pub trait TxDescFuncs {
    /// Initialize a fresh ring of `count` descriptors at `base`. The ring
    /// base is owned by the driver for its whole lifetime and is only
    /// borrowed here, unlike the per-slot buffers below.
    fn init_tx_ring(&mut self, base: &DmaAddr, count: u16);
    /// Write `buf`/`len` into slot `i` and mark it hardware-owned. `wrap` is
    /// true on the ring's last slot; adapters whose hardware wrap bit is
    /// sticky across resets must still OR it in idempotently rather than
    /// assume this is only ever called once per slot.
    fn set_tx_desc(&mut self, i: u16, buf: &DmaAddr, len: u16, wrap: bool);
    /// Hands `n` consecutive descriptors starting at `start` to hardware in
    /// one call. Adapters transfer ownership in reverse order internally
    /// (last fragment first) so hardware never observes a `LAST`-flagged
    /// descriptor still owned by a predecessor it hasn't yet seen.
    fn ready_tx_desc(&mut self, start: u16, n: u16);
    fn is_tx_desc_empty(&self, i: u16) -> bool;
    fn is_tx_complete(&self, i: u16) -> bool;
}

pub trait RxDescFuncs {
    fn init_rx_ring(&mut self, base: &DmaAddr, count: u16);
    fn set_rx_desc(&mut self, i: u16, buf: &DmaAddr, wrap: bool);
    fn is_rx_desc_empty(&self, i: u16) -> bool;
    /// Length of the frame landed in slot `i`. Only meaningful once
    /// `is_rx_desc_empty(i)` is false.
    fn get_rx_desc_len(&self, i: u16) -> usize;
    fn is_rx_error(&self, i: u16) -> bool;
}

/// Blanket join: anything implementing both halves satisfies the full
/// contract the ring engine needs.
pub trait DescFuncs: TxDescFuncs + RxDescFuncs {}
impl<T: TxDescFuncs + RxDescFuncs> DescFuncs for T {}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::{RxDescFuncs, TxDescFuncs};
    use crate::dma::DmaAddr;
    use core::cell::Cell;

    const OWN: u32 = 1 << 31;
    const WRAP: u32 = 1 << 30;
    const LAST: u32 = 1 << 29;
    const ERROR: u32 = 1 << 28;
    const LEN_MASK: u32 = 0x0fff;

    #[derive(Clone, Copy, Default)]
    struct MockDesc {
        flags: u32,
        phys: u32,
    }

    /// Software-driven descriptor store for unit and scenario tests. Bit
    /// layout follows the teacher's own `RXDESC_0_OWN = 1<<31` convention
    /// and `hermit-os-kernel`'s GEM driver for the remaining status bits.
    pub struct MockMac {
        tx: alloc::vec::Vec<Cell<MockDesc>>,
        rx: alloc::vec::Vec<Cell<MockDesc>>,
    }

    impl MockMac {
        pub fn new() -> Self {
            MockMac { tx: alloc::vec::Vec::new(), rx: alloc::vec::Vec::new() }
        }

        /// Test hook: simulate hardware finishing transmission of slot `i`.
        pub fn complete_tx(&self, i: u16) {
            let mut d = self.tx[i as usize].get();
            d.flags &= !OWN;
            self.tx[i as usize].set(d);
        }

        /// Test hook: simulate a frame landing in slot `i`.
        pub fn deliver_rx(&self, i: u16, len: usize, error: bool) {
            let mut d = self.rx[i as usize].get();
            d.flags &= !OWN;
            d.flags = (d.flags & !LEN_MASK) | (len as u32 & LEN_MASK);
            if error {
                d.flags |= ERROR;
            } else {
                d.flags &= !ERROR;
            }
            self.rx[i as usize].set(d);
        }
    }

    impl TxDescFuncs for MockMac {
        fn init_tx_ring(&mut self, _base: &DmaAddr, count: u16) {
            self.tx = alloc::vec::Vec::new();
            self.tx.resize(count as usize, Cell::new(MockDesc::default()));
        }

        fn set_tx_desc(&mut self, i: u16, buf: &DmaAddr, len: u16, wrap: bool) {
            let mut flags = OWN | (len as u32 & LEN_MASK);
            if wrap {
                flags |= WRAP;
            }
            self.tx[i as usize].set(MockDesc { flags, phys: buf.phys });
        }

        fn ready_tx_desc(&mut self, start: u16, n: u16) {
            let count = self.tx.len() as u16;
            for k in (0..n).rev() {
                let i = (start + k) % count;
                let mut d = self.tx[i as usize].get();
                if k == n - 1 {
                    d.flags |= LAST;
                }
                d.flags |= OWN;
                self.tx[i as usize].set(d);
            }
        }

        fn is_tx_desc_empty(&self, i: u16) -> bool {
            self.tx[i as usize].get().flags & OWN == 0
        }

        fn is_tx_complete(&self, i: u16) -> bool {
            self.tx[i as usize].get().flags & OWN == 0
        }
    }

    impl RxDescFuncs for MockMac {
        fn init_rx_ring(&mut self, _base: &DmaAddr, count: u16) {
            self.rx = alloc::vec::Vec::new();
            self.rx.resize(count as usize, Cell::new(MockDesc::default()));
        }

        fn set_rx_desc(&mut self, i: u16, buf: &DmaAddr, wrap: bool) {
            let mut flags = OWN;
            if wrap {
                flags |= WRAP;
            }
            self.rx[i as usize].set(MockDesc { flags, phys: buf.phys });
        }

        fn is_rx_desc_empty(&self, i: u16) -> bool {
            self.rx[i as usize].get().flags & OWN != 0
        }

        fn get_rx_desc_len(&self, i: u16) -> usize {
            (self.rx[i as usize].get().flags & LEN_MASK) as usize
        }

        fn is_rx_error(&self, i: u16) -> bool {
            self.rx[i as usize].get().flags & ERROR != 0
        }
    }
}
