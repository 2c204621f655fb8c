//! DMA descriptor-ring engine coupling a raw Ethernet MAC to an upper
//! network stack, generalized across MAC families via narrow adapter
//! traits (`desc::DescFuncs`, `iface::IfaceFuncs`).
//!
//! The ring engine, buffer pool, and stack glue here are platform-neutral;
//! a concrete driver plugs in by implementing [`desc::DescFuncs`] and
//! [`iface::IfaceFuncs`] against its own descriptor layout and MMIO, then
//! constructing a [`driver::Driver`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod desc;
pub mod dma;
pub mod driver;
pub mod error;
pub mod glue;
pub mod iface;
pub mod irq;
mod pool;
mod ring;
pub mod rx;
pub mod tx;

#[cfg(feature = "smoltcp_phy")]
pub mod smoltcp_phy;

pub use driver::{Config, Driver};
pub use pool::Pool;
