//! Core-pinned thread spawning for the ESP32-S3 dual core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority and
//! stack size.  On non-ESP targets, falls back to a plain thread.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation
//! on the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for the ESP32-S3 Xtensa LX7 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): WiFi/lwIP live here, so does the connectivity context.
    Pro = 0,
    /// Core 1 (APP_CPU): physical I/O and test execution.
    App = 1,
}

/// Placement of one long-running execution context.
#[derive(Debug, Clone, Copy)]
pub struct ContextSpec {
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
    /// Null-terminated, e.g. `"io\0"`.
    pub name: &'static str,
}

impl ContextSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn a thread pinned to `spec.core` with the given priority and stack.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    spec: ContextSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: plain struct setup and a thread-local config write; `name`
    // is 'static and null-terminated.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
        }
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    spec: ContextSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}
