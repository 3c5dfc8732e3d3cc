//! Rig drivers, hardware initialisation, and peripheral helpers.

pub mod actuator;
pub mod button;
pub mod encoder;
pub mod gpio;
pub mod hw_init;
pub mod position;
pub mod task_pin;
