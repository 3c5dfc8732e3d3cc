//! `embedded-hal` pin wrappers over the raw GPIO helpers in [`hw_init`](super::hw_init).
//!
//! Pins must have been configured by `init_peripherals()` first; these types
//! only read and write levels.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use super::hw_init::{gpio_read, gpio_write};

/// An input configured by `init_peripherals()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInput {
    pin: i32,
}

impl RawInput {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }
}

impl ErrorType for RawInput {
    type Error = Infallible;
}

impl InputPin for RawInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.pin))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!gpio_read(self.pin))
    }
}

/// An output configured by `init_peripherals()`.  Starts low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOutput {
    pin: i32,
}

impl RawOutput {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }
}

impl ErrorType for RawOutput {
    type Error = Infallible;
}

impl OutputPin for RawOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, true);
        Ok(())
    }
}
