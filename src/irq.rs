//! IRQ / poll front-end (C7): turns a hardware interrupt or a polling tick
//! into ring-engine work.
//!
//! Grounded on `lwip.c`'s thin IRQ wrapper functions and on the teacher's
//! own `eth_interrupt_handler`: drain until no source remains, ack placement
//! gated on whether the adapter's controller is edge- or level-triggered.

use crate::desc::DescFuncs;
use crate::dma::DmaAlloc;
use crate::driver::Driver;
use crate::glue::Stack;
use crate::iface::{IfaceFuncs, IrqAckKind};

/// Services one interrupt: drains TX completions, processes pending RX
/// frames, refills, and marks the driver faulted on a bus error. Returns
/// once no interrupt source remains pending.
pub fn handle_irq<D, Ii, A, S>(driver: &mut Driver<D, Ii, A>, stack: &mut S)
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
    S: Stack,
{
    loop {
        let sources = driver.iface.raw_handle_irq();
        if !sources.any() {
            break;
        }
        if matches!(Ii::IRQ_KIND, IrqAckKind::EdgeLatched) {
            driver.iface.ack_irq(sources);
        }
        drain(driver, stack, sources);
        if matches!(Ii::IRQ_KIND, IrqAckKind::LevelSensitive) {
            driver.iface.ack_irq(sources);
        }
    }
}

/// Runs the same drain body from a polling tick, with no ack to issue.
pub fn poll<D, Ii, A, S>(driver: &mut Driver<D, Ii, A>, stack: &mut S)
where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
    S: Stack,
{
    use crate::iface::IrqSources;
    drain(driver, stack, IrqSources { rx_frame: true, tx_frame: true, bus_error: false });
}

fn drain<D, Ii, A, S>(
    driver: &mut Driver<D, Ii, A>,
    stack: &mut S,
    sources: crate::iface::IrqSources,
) where
    D: DescFuncs,
    Ii: IfaceFuncs,
    A: DmaAlloc,
    S: Stack,
{
    if sources.bus_error {
        #[cfg(feature = "log")]
        log::error!("mac reported a bus error, marking driver faulted");
        driver.fault = Some(crate::error::DriverFault::BusError);
        return;
    }
    if sources.tx_frame {
        driver.tx.txcomplete(&mut driver.desc, &mut driver.pool);
    }
    if sources.rx_frame {
        while crate::glue::ethif_input(driver, stack) {}
    }
}
