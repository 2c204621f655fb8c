//! Lifecycle & init (C8): allocates descriptor memory, brings the MAC up,
//! primes RX, and tears everything back down on drop.
//!
//! Grounded on `descriptors.c`'s `desc_init`/`desc_reset`, translated from
//! the original's `goto panic` unwind chain into `Result` plus `?`.

use crate::desc::DescFuncs;
use crate::dma::{DmaAddr, DmaAlloc};
use crate::error::{DriverFault, InitError};
use crate::iface::{IfaceFuncs, MacAddress};
use crate::pool::Pool;
use crate::rx::RxRing;
use crate::tx::TxRing;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub rx_desc_count: u16,
    pub tx_desc_count: u16,
    pub prealloc_count: usize,
    pub prealloc_buf_size: usize,
    pub dma_alignment: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), InitError> {
        if self.rx_desc_count < 3 {
            return Err(InitError::InvalidConfig("rx_desc_count must be >= 3"));
        }
        if self.tx_desc_count < 3 {
            return Err(InitError::InvalidConfig("tx_desc_count must be >= 3"));
        }
        let min_pool = self.tx_desc_count as usize + 2 * self.rx_desc_count as usize;
        if self.prealloc_count < min_pool {
            return Err(InitError::InvalidConfig("prealloc_count must be >= tx_desc_count + 2*rx_desc_count"));
        }
        if !self.dma_alignment.is_power_of_two() || self.dma_alignment < 16 {
            return Err(InitError::InvalidConfig("dma_alignment must be a power of two >= 16"));
        }
        Ok(())
    }
}

pub struct Driver<D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> {
    pub(crate) desc: D,
    pub(crate) iface: Ii,
    pub(crate) pool: Pool<A>,
    pub(crate) tx: TxRing,
    pub(crate) rx: RxRing,
    tx_base: DmaAddr,
    rx_base: DmaAddr,
    tx_count: u16,
    rx_count: u16,
    pub mac: MacAddress,
    pub mtu: u16,
    pub fault: Option<DriverFault>,
}

impl<D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> Driver<D, Ii, A> {
    /// Steps 1-8 of the component's init sequence. Step 9 (clearing and
    /// unmasking IRQ sources at the interrupt controller) is the embedding
    /// firmware's responsibility: this crate has no IRQ registrar of its
    /// own to call into.
    pub fn new(mut desc: D, mut iface: Ii, mut alloc: A, config: Config) -> Result<Self, InitError> {
        config.validate()?;

        let tx_base = alloc
            .alloc(
                config.tx_desc_count as usize * config.dma_alignment,
                config.dma_alignment,
                false,
            )
            .ok_or(InitError::DescAlloc)?;
        let tx_phys = alloc.pin(tx_base, config.tx_desc_count as usize * config.dma_alignment).ok_or(InitError::DescAlloc)?;
        let rx_base = alloc
            .alloc(
                config.rx_desc_count as usize * config.dma_alignment,
                config.dma_alignment,
                false,
            )
            .ok_or(InitError::DescAlloc)?;
        let rx_phys = alloc.pin(rx_base, config.rx_desc_count as usize * config.dma_alignment).ok_or(InitError::DescAlloc)?;

        let mut tx = TxRing::new(config.tx_desc_count, config.prealloc_buf_size);
        let mut rx = RxRing::new(config.rx_desc_count);

        let mut pool = Pool::new(alloc, config.prealloc_buf_size, config.dma_alignment);
        pool.fill(config.prealloc_count)?;

        let tx_base = DmaAddr { phys: tx_phys, virt: tx_base };
        let rx_base = DmaAddr { phys: rx_phys, virt: rx_base };

        tx.reset(&mut desc, &tx_base, config.tx_desc_count);
        rx.reset(&mut desc, &rx_base, config.rx_desc_count);

        let mac = iface.low_level_init()?;

        rx.rxrefill(&mut desc, &mut pool);

        Ok(Driver {
            desc,
            iface,
            pool,
            tx,
            rx,
            tx_base,
            rx_base,
            tx_count: config.tx_desc_count,
            rx_count: config.rx_desc_count,
            mac,
            mtu: 1500,
            fault: None,
        })
    }

    /// Puts the ring engine back to empty without re-allocating rings or
    /// tearing down the MAC. Any in-flight TX is reaped first so its
    /// completion callback still fires exactly once. Called at init and
    /// after a fatal bus error.
    pub fn reset(&mut self) {
        self.tx.drain_all(&mut self.pool);
        self.tx.reset(&mut self.desc, &self.tx_base, self.tx_count);
        self.rx.reset(&mut self.desc, &self.rx_base, self.rx_count);
        self.rx.rxrefill(&mut self.desc, &mut self.pool);
        self.fault = None;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl<D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> Driver<D, Ii, A> {
    pub fn desc_mut(&mut self) -> &mut D {
        &mut self.desc
    }

    pub fn tx_mut(&mut self) -> &mut TxRing {
        &mut self.tx
    }

    pub fn rx_mut(&mut self) -> &mut RxRing {
        &mut self.rx
    }

    /// Reaps whatever TX completions the mock adapter currently reports,
    /// without exposing `desc`/`pool` as a simultaneous two-field borrow.
    pub fn reap_tx(&mut self) {
        self.tx.txcomplete(&mut self.desc, &mut self.pool);
    }
}

impl<D: DescFuncs, Ii: IfaceFuncs, A: DmaAlloc> Drop for Driver<D, Ii, A> {
    /// Reaps outstanding TX (firing completions so cookies are not leaked),
    /// then drains the pool. The original never implements an equivalent
    /// `desc_free`; this closes that gap.
    fn drop(&mut self) {
        self.tx.drain_all(&mut self.pool);
        self.pool.drain();
    }
}
