//! The result of one test run.
//!
//! Created fresh when sampling starts, serialised once for publishing, then
//! dropped.  Nothing is retained between runs.

use serde::Serialize;

use crate::error::CommsError;

/// Serialised in field order: `encoder`, `test_time_ms`, optional `accelerometer`, `temp`, `hum`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestRunRecord {
    /// Encoder angle in degrees, one per sampling tick.
    pub encoder: Vec<f32>,
    /// Milliseconds since sampling started, parallel to `encoder`.
    pub test_time_ms: Vec<u32>,
    /// Calibrated z-acceleration, parallel to `encoder`; only when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<Vec<Option<f32>>>,
    /// Temperature at run end (°C); `null` if the sensor failed.
    pub temp: Option<f32>,
    /// Relative humidity at run end (%); `null` if the sensor failed.
    pub hum: Option<f32>,
}

impl TestRunRecord {
    pub fn with_capacity(samples: usize, with_acceleration: bool) -> Self {
        Self {
            encoder: Vec::with_capacity(samples),
            test_time_ms: Vec::with_capacity(samples),
            accelerometer: with_acceleration.then(|| Vec::with_capacity(samples)),
            temp: None,
            hum: None,
        }
    }

    pub fn push(&mut self, angle_deg: f32, elapsed_ms: u32, accel_z: Option<f32>) {
        self.encoder.push(angle_deg);
        self.test_time_ms.push(elapsed_ms);
        if let Some(accel) = self.accelerometer.as_mut() {
            accel.push(accel_z);
        }
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// JSON payload for the report topic.
    pub fn to_json(&self) -> Result<String, CommsError> {
        serde_json::to_string(self).map_err(|_| CommsError::EncodeFailed)
    }
}
