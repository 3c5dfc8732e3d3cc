//! ESP32 time adapter.
//!
//! Implements [`TimePort`] for the hammer rig.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for the clock and
//!   `FreeRtos::delay_ms` for the delay, which yields the core to other
//!   tasks. With `CONFIG_FREERTOS_HZ=1000` one tick is one millisecond.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `std::thread::sleep` for host-side simulation.

use crate::app::ports::TimePort;

/// Time adapter for the ESP32-S3 platform.
#[derive(Debug, Clone)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl TimePort for Esp32TimeAdapter {
    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a read of the 64-bit system timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since construction (monotonic).
    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(&self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
