//! End-to-end scenarios against a software MAC: loopback TX, scatter TX,
//! and TX queue-full recovery, run against the real `Driver` rather than
//! the bare rings.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use eth_ring_core::desc::mock::MockMac;
use eth_ring_core::dma::test_support::VecDmaAlloc;
use eth_ring_core::driver::{Config, Driver};
use eth_ring_core::error::LinkOutputError;
use eth_ring_core::glue::{self, Stack};
use eth_ring_core::iface::{IfaceFuncs, IrqAckKind, IrqSources, MacAddress, RawTxOutcome};
use eth_ring_core::irq;

struct NullIface;

impl IfaceFuncs for NullIface {
    const IRQ_KIND: IrqAckKind = IrqAckKind::LevelSensitive;

    fn low_level_init(&mut self) -> Result<MacAddress, eth_ring_core::error::InitError> {
        Ok(MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]))
    }
    fn start_tx_logic(&mut self) {}
    fn start_rx_logic(&mut self) {}
    fn raw_tx(&mut self) -> RawTxOutcome {
        RawTxOutcome::Enqueued
    }
    fn raw_handle_irq(&mut self) -> IrqSources {
        IrqSources::default()
    }
    fn ack_irq(&mut self, _sources: IrqSources) {}
}

fn build(rx: u16, tx: u16, pool: usize) -> Driver<MockMac, NullIface, VecDmaAlloc> {
    let config = Config {
        rx_desc_count: rx,
        tx_desc_count: tx,
        prealloc_count: pool,
        prealloc_buf_size: 1536,
        dma_alignment: 16,
    };
    Driver::new(MockMac::new(), NullIface, VecDmaAlloc::new(), config).unwrap()
}

fn tx_complete(cookie: NonNull<()>) {
    let counter = cookie.cast::<AtomicUsize>();
    unsafe { (*counter.as_ptr()).fetch_add(1, Ordering::SeqCst) };
}

fn complete_all_tx(driver: &mut Driver<MockMac, NullIface, VecDmaAlloc>, count: u16) {
    for i in 0..count {
        driver.desc_mut().complete_tx(i);
    }
}

#[derive(Default)]
struct RecordingStack {
    frames: Vec<Vec<u8>>,
    alloc_fail_after: Option<usize>,
    alloc_calls: usize,
}

impl Stack for RecordingStack {
    type RxHandle = Vec<u8>;

    fn allocate_rx_buf(&mut self, size: usize) -> Option<(Self::RxHandle, *mut u8)> {
        if let Some(limit) = self.alloc_fail_after {
            if self.alloc_calls >= limit {
                return None;
            }
        }
        self.alloc_calls += 1;
        let mut buf = vec![0u8; size];
        let ptr = buf.as_mut_ptr();
        Some((buf, ptr))
    }

    fn input(&mut self, mut handle: Self::RxHandle, len: usize) {
        handle.truncate(len);
        self.frames.push(handle);
    }
}

#[test]
fn rx_frames_delivered_in_order_then_refilled() {
    let mut driver = build(8, 8, 32);
    let mut stack = RecordingStack::default();

    driver.desc_mut().deliver_rx(0, 64, false);
    driver.desc_mut().deliver_rx(1, 128, false);
    irq::poll(&mut driver, &mut stack);

    assert_eq!(stack.frames.len(), 2);
    assert_eq!(stack.frames[0].len(), 64);
    assert_eq!(stack.frames[1].len(), 128);
}

#[test]
fn rx_frame_dropped_when_stack_allocation_fails() {
    let mut driver = build(8, 8, 32);
    let mut stack = RecordingStack { alloc_fail_after: Some(0), ..RecordingStack::default() };

    driver.desc_mut().deliver_rx(0, 64, false);
    irq::poll(&mut driver, &mut stack);

    assert!(stack.frames.is_empty());
}

#[test]
fn rx_error_flagged_frame_is_dropped_not_delivered() {
    let mut driver = build(8, 8, 32);
    let mut stack = RecordingStack::default();

    driver.desc_mut().deliver_rx(0, 64, true);
    irq::poll(&mut driver, &mut stack);

    assert!(stack.frames.is_empty());
}

#[test]
fn faulted_driver_rejects_further_tx_submissions() {
    let mut driver = build(8, 8, 32);
    driver.fault = Some(eth_ring_core::error::DriverFault::BusError);

    let frame = [0u8; 16];
    let counter = AtomicUsize::new(0);
    let cookie = NonNull::from(&counter).cast::<()>();
    let result = glue::link_output(&mut driver, &[&frame], cookie, tx_complete);
    assert!(result.is_err());
}

#[test]
fn bus_error_irq_source_marks_driver_faulted() {
    struct FaultyIface(bool);
    impl IfaceFuncs for FaultyIface {
        const IRQ_KIND: IrqAckKind = IrqAckKind::LevelSensitive;
        fn low_level_init(&mut self) -> Result<MacAddress, eth_ring_core::error::InitError> {
            Ok(MacAddress([0; 6]))
        }
        fn start_tx_logic(&mut self) {}
        fn start_rx_logic(&mut self) {}
        fn raw_tx(&mut self) -> RawTxOutcome {
            RawTxOutcome::Enqueued
        }
        fn raw_handle_irq(&mut self) -> IrqSources {
            if self.0 {
                self.0 = false;
                IrqSources { rx_frame: false, tx_frame: false, bus_error: true }
            } else {
                IrqSources::default()
            }
        }
        fn ack_irq(&mut self, _sources: IrqSources) {}
    }

    let config = Config {
        rx_desc_count: 8,
        tx_desc_count: 8,
        prealloc_count: 32,
        prealloc_buf_size: 1536,
        dma_alignment: 16,
    };
    let mut driver = Driver::new(MockMac::new(), FaultyIface(true), VecDmaAlloc::new(), config).unwrap();
    let mut stack = RecordingStack::default();
    irq::handle_irq(&mut driver, &mut stack);
    assert_eq!(driver.fault, Some(eth_ring_core::error::DriverFault::BusError));
}

#[test]
fn small_packet_loopback() {
    let mut driver = build(16, 16, 48);
    let counter = AtomicUsize::new(0);
    let cookie = NonNull::from(&counter).cast::<()>();

    let frame = [0xaau8; 64];
    glue::link_output(&mut driver, &[&frame], cookie, tx_complete).unwrap();
    assert!(!driver.tx_mut().txhasspace(15));

    complete_all_tx(&mut driver, 16);
    driver.reap_tx();
    assert!(driver.tx_mut().txhasspace(15));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn scatter_tx_of_three_fragments() {
    let mut driver = build(16, 16, 48);
    let counter = AtomicUsize::new(0);
    let cookie = NonNull::from(&counter).cast::<()>();

    let a = vec![1u8; 60];
    let b = vec![2u8; 200];
    let c = vec![3u8; 100];
    glue::link_output(&mut driver, &[&a, &b, &c], cookie, tx_complete).unwrap();
    assert!(!driver.tx_mut().txhasspace(14));

    complete_all_tx(&mut driver, 16);
    driver.reap_tx();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(driver.tx_mut().txhasspace(15));
}

#[test]
fn tx_queue_full_then_recovers() {
    let mut driver = build(4, 4, 16);
    let counter = AtomicUsize::new(0);
    let cookie = NonNull::from(&counter).cast::<()>();
    let frame = [0u8; 32];

    for _ in 0..3 {
        glue::link_output_nonblocking(&mut driver, &[&frame], cookie, tx_complete).unwrap();
    }
    let result = glue::link_output_nonblocking(&mut driver, &[&frame], cookie, tx_complete);
    assert_eq!(result, Err(LinkOutputError::WouldBlock));

    complete_all_tx(&mut driver, 4);
    driver.reap_tx();
    assert_eq!(counter.load(Ordering::SeqCst), 3);

    glue::link_output_nonblocking(&mut driver, &[&frame], cookie, tx_complete).unwrap();
    complete_all_tx(&mut driver, 4);
    driver.reap_tx();
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}
