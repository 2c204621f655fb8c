//! Per-MAC interface control: start/stop logic, raw submission, and
//! interrupt handling below the ring engine.
//!
//! Grounded on `raw_iface.h`'s `struct raw_iface_funcs` and its call sites
//! in `lwip.c` (`ethif_init` calling `low_level_init`, the IRQ handler
//! calling `raw_handle_irq`/`ack_irq`).

/// Outcome of a single `raw_tx` attempt, resolving the spec's mixed
/// synchronous/asynchronous completion question: some MACs finish small
/// frames inline, most only ever enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTxOutcome {
    Enqueued,
    CompletedInline,
    Failed,
}

/// Whether an adapter's IRQ line needs an explicit ack and, if so, where in
/// the handler it belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqAckKind {
    /// Ack before draining (edge-triggered controllers that latch a new
    /// event while still being serviced).
    EdgeLatched,
    /// Ack after draining (level-sensitive controllers where acking first
    /// would immediately re-assert the line).
    LevelSensitive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqSources {
    pub rx_frame: bool,
    pub tx_frame: bool,
    pub bus_error: bool,
}

impl IrqSources {
    pub fn any(&self) -> bool {
        self.rx_frame || self.tx_frame || self.bus_error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

pub trait IfaceFuncs {
    const IRQ_KIND: IrqAckKind;

    /// One-time hardware bring-up: clocks, PHY reset/link wait, MAC address
    /// programming, descriptor base registers.
    fn low_level_init(&mut self) -> Result<MacAddress, crate::error::InitError>;
    fn start_tx_logic(&mut self);
    fn start_rx_logic(&mut self);
    /// Kick the MAC to look at newly-readied TX descriptors. Some
    /// controllers need an explicit doorbell write even though the
    /// descriptor ring itself already has ownership bits set.
    fn raw_tx(&mut self) -> RawTxOutcome;
    fn raw_handle_irq(&mut self) -> IrqSources;
    fn ack_irq(&mut self, sources: IrqSources);
}
