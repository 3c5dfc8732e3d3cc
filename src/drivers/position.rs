//! Edge-triggered position latch for the arm sensors.
//!
//! Two falling-edge interrupts ("arm extended", "arm retracted") each feed
//! a rate-limited [`EdgeFilter`] and a saturating [`WaitSignal`].  The ISR
//! side only touches atomics and `Signal::signal`; it never blocks and never
//! allocates.  The sequencer consumes through [`PositionSensePort`].
//!
//! On the device the blocking wait runs on `esp_idf_hal::task::block_on`,
//! whose waker is a FreeRTOS task notification: signalling from the ISR
//! notifies the waiting task and requests a context switch on ISR exit.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::app::ports::{PositionEdge, PositionSensePort};

pub const DEFAULT_EDGE_HOLDOFF_MS: u32 = 50;

/// Per-line software debounce for interrupt context.
///
/// Single producer: only one ISR calls [`accept`](Self::accept) per filter.
pub struct EdgeFilter {
    holdoff_ms: AtomicU32,
    last_accepted_ms: AtomicU32,
    any_accepted: AtomicBool,
}

impl EdgeFilter {
    pub const fn new(holdoff_ms: u32) -> Self {
        Self {
            holdoff_ms: AtomicU32::new(holdoff_ms),
            last_accepted_ms: AtomicU32::new(0),
            any_accepted: AtomicBool::new(false),
        }
    }

    /// `true` if the edge at `now_ms` is at least one hold-off after the last accepted one.
    pub fn accept(&self, now_ms: u32) -> bool {
        let holdoff = self.holdoff_ms.load(Ordering::Relaxed);
        let last = self.last_accepted_ms.load(Ordering::Relaxed);
        if self.any_accepted.load(Ordering::Relaxed) && now_ms.wrapping_sub(last) < holdoff {
            return false;
        }
        self.last_accepted_ms.store(now_ms, Ordering::Relaxed);
        self.any_accepted.store(true, Ordering::Relaxed);
        true
    }

    pub fn set_holdoff(&self, ms: u32) {
        self.holdoff_ms.store(ms, Ordering::Relaxed);
    }
}

/// Binary wait-signal: at most one pending unit, extra gives are no-ops.
pub struct WaitSignal {
    inner: Signal<CriticalSectionRawMutex, ()>,
}

impl WaitSignal {
    pub const fn new() -> Self {
        Self {
            inner: Signal::new(),
        }
    }

    /// Set the signal.  Safe from interrupt context.
    pub fn give(&self) {
        self.inner.signal(());
    }

    /// Consume a pending unit without blocking.
    pub fn try_take(&self) -> bool {
        self.inner.try_take().is_some()
    }

    /// Block the calling task until a unit is available, then consume it.
    pub fn wait(&self) {
        block_on(self.inner.wait());
    }
}

impl Default for WaitSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
fn block_on<F: core::future::Future>(fut: F) -> F::Output {
    esp_idf_svc::hal::task::block_on(fut)
}

#[cfg(not(target_os = "espidf"))]
fn block_on<F: core::future::Future>(fut: F) -> F::Output {
    futures_lite::future::block_on(fut)
}

/// Both position lines.
pub struct PositionLatch {
    extended_filter: EdgeFilter,
    extended: WaitSignal,
    retracted_filter: EdgeFilter,
    retracted: WaitSignal,
}

impl PositionLatch {
    pub const fn new(holdoff_ms: u32) -> Self {
        Self {
            extended_filter: EdgeFilter::new(holdoff_ms),
            extended: WaitSignal::new(),
            retracted_filter: EdgeFilter::new(holdoff_ms),
            retracted: WaitSignal::new(),
        }
    }

    /// Interrupt entry point.  Returns whether the edge was accepted.
    pub fn on_edge(&self, edge: PositionEdge, now_ms: u32) -> bool {
        let (filter, signal) = self.line(edge);
        if !filter.accept(now_ms) {
            return false;
        }
        signal.give();
        true
    }

    /// Apply the configured hold-off to both lines.  Call before enabling interrupts.
    pub fn set_holdoff(&self, ms: u32) {
        self.extended_filter.set_holdoff(ms);
        self.retracted_filter.set_holdoff(ms);
    }

    fn line(&self, edge: PositionEdge) -> (&EdgeFilter, &WaitSignal) {
        match edge {
            PositionEdge::Extended => (&self.extended_filter, &self.extended),
            PositionEdge::Retracted => (&self.retracted_filter, &self.retracted),
        }
    }
}

impl PositionSensePort for PositionLatch {
    fn drain(&self, edge: PositionEdge) -> bool {
        self.line(edge).1.try_take()
    }

    fn wait(&self, edge: PositionEdge) {
        self.line(edge).1.wait();
    }
}

/// The latch the GPIO interrupt handlers in `hw_init` feed.
pub static POSITION_LATCH: PositionLatch = PositionLatch::new(DEFAULT_EDGE_HOLDOFF_MS);
