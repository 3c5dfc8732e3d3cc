//! One-shot rig pin setup.
//!
//! Sets GPIO directions and pulls, and hooks the two position-sensor lines
//! to [`POSITION_LATCH`](super::position::POSITION_LATCH) through the
//! per-pin ISR service.  Runs once from `main()` before the scheduling
//! contexts start.  The encoder pins belong to
//! [`PcntCounter`](super::encoder) and are not touched here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::app::ports::PositionEdge;
#[cfg(target_os = "espidf")]
use crate::drivers::position::POSITION_LATCH;
use crate::pins;

/// Which ESP-IDF call failed, with its return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrRegisterFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (what, rc) = match self {
            Self::GpioConfigFailed(rc) => ("gpio_config", rc),
            Self::IsrInstallFailed(rc) => ("gpio_install_isr_service", rc),
            Self::IsrRegisterFailed(rc) => ("gpio_isr_handler_add", rc),
        };
        write!(f, "{what} returned {rc}")
    }
}

impl std::error::Error for HwInitError {}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("GPIO")
    }
}

// ── Pin directions ────────────────────────────────────────────

/// `(pin, internal pull-up, falling-edge interrupt)` for every rig input.
/// The retracted sensor is the one input without the internal pull-up.
const INPUT_PINS: [(i32, bool, bool); 4] = [
    (pins::START_BUTTON_GPIO, true, false),
    (pins::DROP_BUTTON_GPIO, true, false),
    (pins::ARM_EXTENDED_GPIO, true, true),
    (pins::ARM_RETRACTED_GPIO, false, true),
];

/// Buttons and position sensors as inputs, both pulse outputs low.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for (pin, pull_up, falling_edge_irq) in INPUT_PINS {
        let intr = if falling_edge_irq {
            gpio_int_type_t_GPIO_INTR_NEGEDGE
        } else {
            gpio_int_type_t_GPIO_INTR_DISABLE
        };
        configure_pin(pin, gpio_mode_t_GPIO_MODE_INPUT, pull_up, intr)?;
    }

    for pin in [pins::ARM_COMMAND_GPIO, pins::MAGNET_RELAY_GPIO] {
        configure_pin(
            pin,
            gpio_mode_t_GPIO_MODE_OUTPUT,
            false,
            gpio_int_type_t_GPIO_INTR_DISABLE,
        )?;
        gpio_write(pin, false);
    }

    info!("hw_init: rig pins ready");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): {} inputs, nothing to configure", INPUT_PINS.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
fn configure_pin(
    pin: i32,
    mode: gpio_mode_t,
    pull_up: bool,
    intr_type: gpio_int_type_t,
) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type,
    };
    // SAFETY: called from main() before any context owns the pin.
    let rc = unsafe { gpio_config(&cfg) };
    if rc == ESP_OK as i32 {
        Ok(())
    } else {
        Err(HwInitError::GpioConfigFailed(rc))
    }
}

// ── Level access ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read on a pin configured as input above.
    unsafe { gpio_get_level(pin) != 0 }
}

/// Host build: inputs sit at their pulled-up idle level.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: register write; each output pin has a single owner.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── Position interrupts ───────────────────────────────────────

#[cfg(target_os = "espidf")]
fn isr_now_ms() -> u32 {
    // SAFETY: reads the system timer; callable from ISR context.
    (unsafe { esp_timer_get_time() } / 1_000) as u32
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn arm_extended_isr(_arg: *mut core::ffi::c_void) {
    POSITION_LATCH.on_edge(PositionEdge::Extended, isr_now_ms());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn arm_retracted_isr(_arg: *mut core::ffi::c_void) {
    POSITION_LATCH.on_edge(PositionEdge::Retracted, isr_now_ms());
}

/// Apply the edge hold-off, then attach both position handlers.
/// Call after [`init_peripherals`].
#[cfg(target_os = "espidf")]
pub fn init_isr_service(edge_holdoff_ms: u32) -> Result<(), HwInitError> {
    POSITION_LATCH.set_holdoff(edge_holdoff_ms);

    // SAFETY: the handlers only touch atomics and the embassy Signal inside
    // POSITION_LATCH.  ESP_ERR_INVALID_STATE means the service already runs.
    unsafe {
        let rc = gpio_install_isr_service(0);
        if rc != ESP_OK as i32 && rc != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(rc));
        }

        let handlers: [(i32, unsafe extern "C" fn(*mut core::ffi::c_void)); 2] = [
            (pins::ARM_EXTENDED_GPIO, arm_extended_isr),
            (pins::ARM_RETRACTED_GPIO, arm_retracted_isr),
        ];
        for (pin, handler) in handlers {
            let rc = gpio_isr_handler_add(pin, Some(handler), core::ptr::null_mut());
            if rc != ESP_OK as i32 {
                return Err(HwInitError::IsrRegisterFailed(rc));
            }
            gpio_intr_enable(pin);
        }
    }

    info!("hw_init: position interrupts armed (hold-off {edge_holdoff_ms} ms)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(edge_holdoff_ms: u32) -> Result<(), HwInitError> {
    crate::drivers::position::POSITION_LATCH.set_holdoff(edge_holdoff_ms);
    log::info!("hw_init(sim): interrupts simulated, hold-off {edge_holdoff_ms} ms");
    Ok(())
}
