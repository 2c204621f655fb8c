//! Error kinds surfaced across the ring-engine/pool/lifecycle boundary.
//!
//! `BufExhausted` from the original taxonomy has no variant here: it never
//! escapes a call, it just makes `rxrefill` return early and a frame get
//! dropped (see [`crate::rx::RxRing::rxrefill`]).

use core::fmt;

/// Returned by the TX submission path when the ring has no free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    QueueFull,
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::QueueFull => f.write_str("tx ring has no free slot"),
        }
    }
}

impl core::error::Error for TxError {}

/// Outcome of a single `rxget` call.
#[derive(Debug)]
pub enum RxOutcome {
    /// Nothing to read: either the ring is fully unarmed or hardware has not
    /// finished the next slot.
    Empty,
    /// A frame was received without a reported hardware error.
    Frame { handle: crate::dma::DmaAddr, len: usize },
    /// A frame was received but the MAC flagged an error on it; the core
    /// still hands it up so callers can count the drop before freeing it.
    Error { handle: crate::dma::DmaAddr, len: usize },
}

/// Failure during [`crate::driver::Driver::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    DescAlloc,
    RingAlloc,
    PoolFill,
    InvalidConfig(&'static str),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::DescAlloc => f.write_str("adapter failed to allocate a descriptor ring"),
            InitError::RingAlloc => f.write_str("failed to allocate ring side-storage"),
            InitError::PoolFill => f.write_str("failed to pre-pin the buffer pool"),
            InitError::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
        }
    }
}

impl core::error::Error for InitError {}

/// A fault that leaves the driver unusable until [`crate::driver::Driver::reset`]
/// is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFault {
    BusError,
}

impl fmt::Display for DriverFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverFault::BusError => f.write_str("mac reported a bus error"),
        }
    }
}

impl core::error::Error for DriverFault {}

/// Failure surfaced by [`crate::glue::link_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutputError {
    /// The ring is full and the caller asked not to block.
    WouldBlock,
    /// The ring never drained within the bounded retry, or the packet does
    /// not fit the fallback single-buffer path.
    MemErr,
}

impl fmt::Display for LinkOutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOutputError::WouldBlock => f.write_str("tx ring full, caller asked not to block"),
            LinkOutputError::MemErr => f.write_str("tx submission failed"),
        }
    }
}

impl core::error::Error for LinkOutputError {}
