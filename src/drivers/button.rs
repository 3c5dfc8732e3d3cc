//! Polled debounce for the two operator push-buttons.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups: released reads high,
//! pressed reads low.  Both lines are sampled by [`DebouncedInputs::poll`]
//! from the physical-I/O context every loop iteration (~10 ms).
//!
//! ## Debounce rule
//!
//! | Event                                   | Effect                         |
//! |-----------------------------------------|--------------------------------|
//! | raw level differs from last raw level   | transition timestamp resets    |
//! | raw level unchanged for >= interval     | stable state takes raw level   |
//! | stable state goes high -> low           | command flag set, status emitted |

use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::debug;

use crate::app::commands::{Command, CommandSource};
use crate::app::events::StatusEvent;
use crate::app::ports::StatusSink;
use crate::flags::CommandFlags;

/// Debounce state for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    interval_ms: u32,
    last_raw: bool,
    stable: bool,
    last_transition_ms: u32,
}

impl Debouncer {
    /// Starts released (high), matching the pulled-up idle level.
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_raw: true,
            stable: true,
            last_transition_ms: 0,
        }
    }

    /// Feed one raw sample.  Returns the new stable level when it changes.
    pub fn update(&mut self, raw: bool, now_ms: u32) -> Option<bool> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_transition_ms = now_ms;
        }
        if now_ms.wrapping_sub(self.last_transition_ms) >= self.interval_ms && raw != self.stable {
            self.stable = raw;
            return Some(raw);
        }
        None
    }

    pub fn stable(&self) -> bool {
        self.stable
    }
}

/// The start and drop buttons, wired to the shared command flags.
pub struct DebouncedInputs<S, D> {
    start_pin: S,
    drop_pin: D,
    start: Debouncer,
    drop: Debouncer,
    flags: Arc<CommandFlags>,
}

impl<S: InputPin, D: InputPin> DebouncedInputs<S, D> {
    pub fn new(start_pin: S, drop_pin: D, debounce_ms: u32, flags: Arc<CommandFlags>) -> Self {
        Self {
            start_pin,
            drop_pin,
            start: Debouncer::new(debounce_ms),
            drop: Debouncer::new(debounce_ms),
            flags,
        }
    }

    /// Sample both lines once.
    pub fn poll(&mut self, now_ms: u32, sink: &mut impl StatusSink) {
        // A failed read is treated as "no sample this tick".
        if let Ok(raw) = self.start_pin.is_high() {
            if self.start.update(raw, now_ms) == Some(false) {
                self.flags.request_start();
                Self::announce(Command::Start, sink);
            }
        }
        if let Ok(raw) = self.drop_pin.is_high() {
            if self.drop.update(raw, now_ms) == Some(false) {
                self.flags.request_drop();
                Self::announce(Command::Drop, sink);
            }
        }
    }

    fn announce(command: Command, sink: &mut impl StatusSink) {
        debug!("button: {command:?} pressed");
        sink.emit(&StatusEvent::CommandAccepted {
            command,
            source: CommandSource::Button,
        });
    }
}
