//! Log-based status sink adapter.
//!
//! Implements [`StatusSink`] by writing status events to the ESP-IDF
//! logger (UART / USB-CDC in production).  A display driver would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::StatusEvent;
use crate::app::ports::StatusSink;

/// Adapter that logs every [`StatusEvent`] to the serial console.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl LogStatusSink {
    pub fn new() -> Self {
        Self
    }
}

impl StatusSink for LogStatusSink {
    fn emit(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::LinkLost | StatusEvent::PublishFailed => warn!("STATUS | {event}"),
            StatusEvent::StateChanged { from, to } => info!("STATE | {from:?} -> {to:?}"),
            _ => info!("STATUS | {event}"),
        }
    }
}
