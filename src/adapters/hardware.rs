//! Hardware adapter: bridges rig peripherals to domain port traits.
//!
//! Combines the pulsed outputs with the ambient and acceleration sensors
//! behind [`ActuatorPort`], [`EnvironmentPort`] and [`AccelerometerPort`],
//! so the sequencer takes a single `hw` argument.  Ambient readings are
//! range-checked here before they reach a report.

use crate::app::ports::{AccelerometerPort, ActuatorPort, EnvironmentPort, Output};
use crate::error::SensorError;
use crate::sensors::{HUMIDITY_RANGE_PCT, TEMPERATURE_RANGE_C, plausible};

/// Concrete adapter that combines all rig hardware behind port traits.
pub struct RigHardware<O, E, A> {
    outputs: O,
    environment: E,
    accel: A,
}

impl<O, E, A> RigHardware<O, E, A> {
    pub fn new(outputs: O, environment: E, accel: A) -> Self {
        Self {
            outputs,
            environment,
            accel,
        }
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<O: ActuatorPort, E, A> ActuatorPort for RigHardware<O, E, A> {
    fn set_output(&mut self, output: Output, high: bool) {
        self.outputs.set_output(output, high);
    }
}

// ── Sensor port implementations ───────────────────────────────

impl<O, E: EnvironmentPort, A> EnvironmentPort for RigHardware<O, E, A> {
    fn read_temperature_c(&mut self) -> Result<f32, SensorError> {
        plausible(self.environment.read_temperature_c()?, TEMPERATURE_RANGE_C)
    }

    fn read_humidity_pct(&mut self) -> Result<f32, SensorError> {
        plausible(self.environment.read_humidity_pct()?, HUMIDITY_RANGE_PCT)
    }
}

impl<O, E, A: AccelerometerPort> AccelerometerPort for RigHardware<O, E, A> {
    fn read_accel_z(&mut self) -> Result<f32, SensorError> {
        self.accel.read_accel_z()
    }
}
