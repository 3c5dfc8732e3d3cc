//! Serial console command input.
//!
//! Implements [`LinePort`] over the console UART.  Bytes are read without
//! blocking and assembled into lines by [`LineAssembler`]; `\r` or `\n`
//! ends a line.  A line longer than the buffer, or containing non-ASCII
//! bytes, is discarded whole.

use crate::app::commands::{CONSOLE_LINE_CAPACITY, ConsoleLine};
use crate::app::ports::LinePort;

/// Byte-at-a-time line builder with overflow discard.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: heapless::String<CONSOLE_LINE_CAPACITY>,
    discarding: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  Returns a line when a terminator completes a non-empty one.
    pub fn push(&mut self, byte: u8) -> Option<ConsoleLine> {
        if byte == b'\n' || byte == b'\r' {
            let discarded = core::mem::take(&mut self.discarding);
            let line = core::mem::take(&mut self.buf);
            return (!discarded && !line.is_empty()).then_some(line);
        }
        if self.discarding {
            return None;
        }
        if !byte.is_ascii() || self.buf.push(char::from(byte)).is_err() {
            self.buf.clear();
            self.discarding = true;
        }
        None
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF UART
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct UartConsole {
    port: i32,
    assembler: LineAssembler,
}

#[cfg(target_os = "espidf")]
impl UartConsole {
    const RX_BUFFER: i32 = 256;

    /// Install the UART driver on the console port if the VFS has not already.
    pub fn new(port: i32) -> Result<Self, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::sys::{esp, uart_driver_install, uart_is_driver_installed};

        // SAFETY: called once at boot before the console context starts.
        unsafe {
            if !uart_is_driver_installed(port) {
                esp!(uart_driver_install(
                    port,
                    Self::RX_BUFFER,
                    0,
                    0,
                    core::ptr::null_mut(),
                    0
                ))?;
            }
        }
        log::info!("console: UART{port} command input ready");
        Ok(Self {
            port,
            assembler: LineAssembler::new(),
        })
    }
}

#[cfg(target_os = "espidf")]
impl LinePort for UartConsole {
    fn read_line(&mut self) -> Option<ConsoleLine> {
        let mut byte = 0u8;
        loop {
            // SAFETY: one-byte buffer on the stack; zero ticks means no wait.
            let n = unsafe {
                esp_idf_svc::sys::uart_read_bytes(self.port, (&raw mut byte).cast(), 1, 0)
            };
            if n <= 0 {
                return None;
            }
            if let Some(line) = self.assembler.push(byte) {
                return Some(line);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Host console: replays scripted bytes through the same assembler.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct UartConsole {
    pending: std::collections::VecDeque<u8>,
    assembler: LineAssembler,
}

#[cfg(not(target_os = "espidf"))]
impl UartConsole {
    pub fn new(_port: i32) -> Result<Self, crate::error::Error> {
        Ok(Self::default())
    }

    /// Queue raw bytes as if typed on the console.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinePort for UartConsole {
    fn read_line(&mut self) -> Option<ConsoleLine> {
        while let Some(byte) = self.pending.pop_front() {
            if let Some(line) = self.assembler.push(byte) {
                return Some(line);
            }
        }
        None
    }
}
