//! Sensor capabilities.
//!
//! The rig reads ambient temperature/humidity once per run and, optionally,
//! z-acceleration once per sample.  Register-level drivers for the boards in
//! use are supplied by the integrator through [`EnvironmentPort`] and
//! [`AccelerometerPort`]; [`Unwired`] stands in when none is fitted, so the
//! report carries `null` readings instead of the run failing.

use crate::app::ports::{AccelerometerPort, EnvironmentPort};
use crate::error::SensorError;

/// Operating range of the ambient sensor (BME280 class), °C.
pub const TEMPERATURE_RANGE_C: (f32, f32) = (-40.0, 85.0);
pub const HUMIDITY_RANGE_PCT: (f32, f32) = (0.0, 100.0);

/// Placeholder for a capability with no driver attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unwired;

impl EnvironmentPort for Unwired {
    fn read_temperature_c(&mut self) -> Result<f32, SensorError> {
        Err(SensorError::NotWired)
    }

    fn read_humidity_pct(&mut self) -> Result<f32, SensorError> {
        Err(SensorError::NotWired)
    }
}

impl AccelerometerPort for Unwired {
    fn read_accel_z(&mut self) -> Result<f32, SensorError> {
        Err(SensorError::NotWired)
    }
}

/// Reject readings outside `(min, max)` and non-finite values.
pub fn plausible(reading: f32, (min, max): (f32, f32)) -> Result<f32, SensorError> {
    if reading.is_finite() && (min..=max).contains(&reading) {
        Ok(reading)
    } else {
        Err(SensorError::OutOfRange)
    }
}
