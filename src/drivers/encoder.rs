//! Rotary encoder pulse accumulation.
//!
//! ## Hardware
//!
//! Quadrature encoder, A on GPIO17 and B on GPIO18, decoded x2 by a PCNT
//! unit: every A edge counts, B selects direction.  The hardware register
//! is 16-bit and resets to zero when it reaches the +/- limit, so the
//! sampling loop must drain it well before that many counts accumulate.
//!
//! [`PulseAccumulator`] owns the counter and keeps the unbounded running
//! total.  [`SoftQuadrature`] reproduces the same decode in software.
//! Nothing wires it to edge interrupts; callers feed it A/B edges directly.

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::app::ports::PulseCounter;

/// Drain-and-accumulate wrapper around a hardware or software counter.
pub struct PulseAccumulator<C> {
    counter: C,
    total: i64,
    counts_per_revolution: u32,
}

impl<C: PulseCounter> PulseAccumulator<C> {
    pub fn new(counter: C, counts_per_revolution: u32) -> Self {
        Self {
            counter,
            total: 0,
            counts_per_revolution: counts_per_revolution.max(1),
        }
    }

    /// Pause, read, clear, resume; add the delta to the running total.
    pub fn drain(&mut self) -> i16 {
        self.counter.pause();
        let delta = self.counter.read();
        self.counter.clear();
        self.counter.resume();
        self.total += i64::from(delta);
        delta
    }

    /// Discard stale hardware counts and zero the running total.
    pub fn reset(&mut self) {
        self.drain();
        self.total = 0;
    }

    /// Running total in degrees.
    pub fn angle(&self) -> f32 {
        (self.total as f64 * 360.0 / f64::from(self.counts_per_revolution)) as f32
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }
}

// ---------------------------------------------------------------------------
// Software decoder
// ---------------------------------------------------------------------------

/// Edge-interrupt quadrature decoder with the PCNT unit's semantics.
///
/// `on_a_edge` is the only method called from interrupt context.
pub struct SoftQuadrature {
    count: AtomicI32,
    limit: i32,
    paused: AtomicBool,
}

impl SoftQuadrature {
    pub const fn new(limit: i16) -> Self {
        Self {
            count: AtomicI32::new(0),
            limit: limit as i32,
            paused: AtomicBool::new(false),
        }
    }

    /// Count one edge on line A.  Rising counts up and falling counts down
    /// while B is low; B high reverses the direction.
    pub fn on_a_edge(&self, a_rising: bool, b_high: bool) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        let step = if a_rising == b_high { -1 } else { 1 };
        let limit = self.limit;
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                let next = c + step;
                Some(if next >= limit || next <= -limit { 0 } else { next })
            });
    }
}

impl PulseCounter for &SoftQuadrature {
    fn pause(&mut self) {
        self.paused.store(true, Ordering::Release);
    }

    fn read(&mut self) -> i16 {
        self.count.load(Ordering::Acquire) as i16
    }

    fn clear(&mut self) {
        self.count.store(0, Ordering::Release);
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// PCNT unit (ESP32)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
pub use pcnt::PcntCounter;

#[cfg(target_os = "espidf")]
mod pcnt {
    use esp_idf_svc::hal::gpio::AnyInputPin;
    use esp_idf_svc::hal::pcnt::{
        Pcnt, PcntChannel, PcntChannelConfig, PcntControlMode, PcntCountMode, PcntDriver,
        PinIndex,
    };
    use esp_idf_svc::hal::peripheral::Peripheral;
    use esp_idf_svc::sys::EspError;
    use log::{info, warn};

    use crate::app::ports::PulseCounter;

    /// One PCNT unit, channel 0: pulse = A, control = B.
    pub struct PcntCounter {
        unit: PcntDriver<'static>,
    }

    impl PcntCounter {
        pub fn new<P: Pcnt>(
            unit: impl Peripheral<P = P> + 'static,
            pin_a: AnyInputPin,
            pin_b: AnyInputPin,
            limit: i16,
        ) -> Result<Self, EspError> {
            let mut unit = PcntDriver::new(
                unit,
                Some(pin_a),
                Some(pin_b),
                Option::<AnyInputPin>::None,
                Option::<AnyInputPin>::None,
            )?;
            unit.channel_config(
                PcntChannel::Channel0,
                PinIndex::Pin0,
                PinIndex::Pin1,
                &PcntChannelConfig {
                    lctrl_mode: PcntControlMode::Keep,
                    hctrl_mode: PcntControlMode::Reverse,
                    pos_mode: PcntCountMode::Increment,
                    neg_mode: PcntCountMode::Decrement,
                    counter_h_lim: limit,
                    counter_l_lim: -limit,
                },
            )?;
            unit.counter_pause()?;
            unit.counter_clear()?;
            unit.counter_resume()?;
            info!("encoder: PCNT configured (limit +/-{limit})");
            Ok(Self { unit })
        }
    }

    impl PulseCounter for PcntCounter {
        fn pause(&mut self) {
            if let Err(e) = self.unit.counter_pause() {
                warn!("encoder: pause failed: {e}");
            }
        }

        fn read(&mut self) -> i16 {
            self.unit.get_counter_value().unwrap_or_else(|e| {
                warn!("encoder: read failed: {e}");
                0
            })
        }

        fn clear(&mut self) {
            if let Err(e) = self.unit.counter_clear() {
                warn!("encoder: clear failed: {e}");
            }
        }

        fn resume(&mut self) {
            if let Err(e) = self.unit.counter_resume() {
                warn!("encoder: resume failed: {e}");
            }
        }
    }
}
