//! Pulsed rig outputs: arm-raise command and magnet release.
//!
//! Both outputs are idle-low and only ever driven as a fixed-width HIGH
//! pulse.  [`PulseOutputs`] maps the domain's [`Output`] onto two
//! `embedded-hal` pins; [`pulse_output`] is the one place the pulse shape
//! is produced.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::{ActuatorPort, Output, TimePort};
use crate::error::ActuatorError;

pub struct PulseOutputs<R, M> {
    arm_raise: R,
    magnet_drop: M,
}

impl<R: OutputPin, M: OutputPin> PulseOutputs<R, M> {
    /// Takes both pins and drives them low.
    pub fn new(mut arm_raise: R, mut magnet_drop: M) -> Self {
        let _ = arm_raise.set_low();
        let _ = magnet_drop.set_low();
        Self {
            arm_raise,
            magnet_drop,
        }
    }

    fn drive(&mut self, output: Output, high: bool) -> Result<(), ActuatorError> {
        match output {
            Output::ArmRaise => self
                .arm_raise
                .set_state(high.into())
                .map_err(|_| ActuatorError::GpioWriteFailed),
            Output::MagnetDrop => self
                .magnet_drop
                .set_state(high.into())
                .map_err(|_| ActuatorError::GpioWriteFailed),
        }
    }
}

impl<R: OutputPin, M: OutputPin> ActuatorPort for PulseOutputs<R, M> {
    fn set_output(&mut self, output: Output, high: bool) {
        if let Err(e) = self.drive(output, high) {
            warn!("actuator: {output:?} -> {high}: {e}");
        }
    }
}

/// Drive `output` high for `width_ms`, then low again.  Blocks the caller.
pub fn pulse_output(
    actuators: &mut impl ActuatorPort,
    time: &impl TimePort,
    output: Output,
    width_ms: u32,
) {
    actuators.set_output(output, true);
    time.sleep_ms(width_ms);
    actuators.set_output(output, false);
}
