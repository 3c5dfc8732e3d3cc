//! Test sequencer: raise, sample, report.
//!
//! ```text
//!   Idle ──start──▶ Raising ──extended, retracted──▶ Sampling ──6 s──▶ Reporting ──▶ Idle
//! ```
//!
//! [`TestSequencer::run`] executes one whole cycle on the calling context
//! (the physical-I/O context).  It blocks inside the two position waits
//! for as long as the sensors take; there is no timeout and no abort.
//! All I/O is injected at the call site through port traits.

use log::{info, warn};

use crate::config::RigConfig;
use crate::drivers::actuator::pulse_output;
use crate::drivers::encoder::PulseAccumulator;
use crate::error::{FatalError, SensorError};

use super::events::StatusEvent;
use super::ports::{
    AccelerometerPort, ActuatorPort, EnvironmentPort, Output, PositionEdge, PositionSensePort,
    PulseCounter, ReportPort, StatusSink, TimePort,
};
use super::record::TestRunRecord;

/// Sequencer state.  Only `Idle` accepts a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Raising,
    Sampling,
    Reporting,
}

/// What a completed run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: usize,
    pub published: bool,
}

pub struct TestSequencer<C> {
    rig: RigConfig,
    accumulator: PulseAccumulator<C>,
    state: RunState,
    accel_offset: f32,
}

impl<C: PulseCounter> TestSequencer<C> {
    pub fn new(rig: RigConfig, counter: C) -> Self {
        let accumulator = PulseAccumulator::new(counter, rig.counts_per_revolution);
        Self {
            rig,
            accumulator,
            state: RunState::Idle,
            accel_offset: 0.0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn accel_offset(&self) -> f32 {
        self.accel_offset
    }

    /// Run one full test.  Returns `None` if the sequencer was not idle.
    ///
    /// A fatal error can only come from the reconnect performed by the
    /// report port before publishing.
    pub fn run(
        &mut self,
        hw: &mut (impl ActuatorPort + EnvironmentPort + AccelerometerPort),
        position: &impl PositionSensePort,
        time: &impl TimePort,
        sink: &mut impl StatusSink,
        reporter: &mut impl ReportPort,
    ) -> Result<Option<RunSummary>, FatalError> {
        if self.state != RunState::Idle {
            warn!("sequencer: start ignored in {:?}", self.state);
            return Ok(None);
        }

        self.transition(RunState::Raising, sink);
        self.raise_arm(hw, position, time, sink);

        self.transition(RunState::Sampling, sink);
        let record = self.sample(hw, time, sink);
        let samples = record.len();

        self.transition(RunState::Reporting, sink);
        let published = match record.to_json() {
            Ok(payload) => {
                drop(record);
                reporter.publish_report(&payload)
            }
            Err(e) => {
                warn!("sequencer: {e}");
                sink.emit(&StatusEvent::PublishFailed);
                Ok(false)
            }
        };

        self.transition(RunState::Idle, sink);
        let published = published?;
        info!("sequencer: run complete, {samples} samples, published={published}");
        Ok(Some(RunSummary { samples, published }))
    }

    fn raise_arm(
        &mut self,
        hw: &mut impl ActuatorPort,
        position: &impl PositionSensePort,
        time: &impl TimePort,
        sink: &mut impl StatusSink,
    ) {
        sink.emit(&StatusEvent::RaisingArm);
        time.sleep_ms(self.rig.pre_raise_delay_ms);

        // Stale edges from before the pulse must not satisfy the waits below.
        position.drain(PositionEdge::Extended);
        position.drain(PositionEdge::Retracted);

        pulse_output(hw, time, Output::ArmRaise, self.rig.raise_pulse_ms);

        // Unbounded: a sensor that never fires hangs this context.
        position.wait(PositionEdge::Extended);
        sink.emit(&StatusEvent::ArmExtended);
        time.sleep_ms(self.rig.extend_settle_ms);

        position.drain(PositionEdge::Retracted);
        position.wait(PositionEdge::Retracted);
        sink.emit(&StatusEvent::ArmRetracted);
        time.sleep_ms(self.rig.retract_settle_ms);
    }

    fn sample(
        &mut self,
        hw: &mut (impl EnvironmentPort + AccelerometerPort),
        time: &impl TimePort,
        sink: &mut impl StatusSink,
    ) -> TestRunRecord {
        let window = u64::from(self.rig.sample_window_ms);
        let ticks = (self.rig.sample_window_ms / self.rig.sample_tick_ms.max(1)) as usize;
        let mut record = TestRunRecord::with_capacity(ticks + 1, self.rig.report_acceleration);

        self.accumulator.reset();
        sink.emit(&StatusEvent::TestStarted);
        let start = time.uptime_ms();

        loop {
            let elapsed = time.uptime_ms().saturating_sub(start);
            if elapsed >= window {
                break;
            }
            self.accumulator.drain();
            let accel = self
                .rig
                .report_acceleration
                .then(|| hw.read_accel_z().ok().map(|z| z - self.accel_offset))
                .flatten();
            record.push(self.accumulator.angle(), elapsed as u32, accel);
            time.sleep_ms(self.rig.sample_tick_ms);
        }

        record.temp = log_sensor("temperature", hw.read_temperature_c());
        record.hum = log_sensor("humidity", hw.read_humidity_pct());
        sink.emit(&StatusEvent::DataCollected {
            samples: record.len(),
        });
        record
    }

    /// Average `calibration_samples` z-acceleration readings and keep the
    /// result as the zero offset for acceleration reporting.
    pub fn calibrate(
        &mut self,
        accel: &mut impl AccelerometerPort,
        time: &impl TimePort,
        sink: &mut impl StatusSink,
    ) -> Result<f32, SensorError> {
        let mut sum = 0.0_f64;
        let mut taken = 0_u32;
        for _ in 0..self.rig.calibration_samples {
            match accel.read_accel_z() {
                Ok(z) => {
                    sum += f64::from(z);
                    taken += 1;
                }
                Err(e) => warn!("calibrate: sample skipped: {e}"),
            }
            time.sleep_ms(self.rig.calibration_spacing_ms);
        }
        if taken == 0 {
            return Err(SensorError::ReadFailed);
        }
        self.accel_offset = (sum / f64::from(taken)) as f32;
        sink.emit(&StatusEvent::Calibrated {
            offset: self.accel_offset,
        });
        Ok(self.accel_offset)
    }

    fn transition(&mut self, to: RunState, sink: &mut impl StatusSink) {
        let from = self.state;
        self.state = to;
        info!("sequencer: {from:?} -> {to:?}");
        sink.emit(&StatusEvent::StateChanged { from, to });
    }
}

fn log_sensor(what: &str, reading: Result<f32, SensorError>) -> Option<f32> {
    reading
        .inspect_err(|e| warn!("sequencer: {what} unavailable: {e}"))
        .ok()
}
