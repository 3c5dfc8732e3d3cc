//! Port traits — the hexagonal boundary between rig logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TestSequencer / ConnectivityManager (domain)
//! ```
//!
//! Driven adapters (pins, pulse counter, WiFi, MQTT, console, clock)
//! implement these traits.  The domain consumes them via generics, so the
//! sequencing and reconnection logic never touches hardware directly and
//! runs unchanged against the mocks in `tests/integration/mock_hw.rs`.

use heapless::String;

use super::commands::{CONSOLE_LINE_CAPACITY, InboundMessage};
use super::events::StatusEvent;
use crate::config::{BrokerCandidate, NetworkCredential};
use crate::error::{CommsError, FatalError, SensorError};

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic clock plus a blocking delay for the calling context.
pub trait TimePort {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Block the calling context, yielding the core to other tasks.
    fn sleep_ms(&self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Status sink port (domain → display / console)
// ───────────────────────────────────────────────────────────────

/// Receives free-text progress messages.  Must never block.
pub trait StatusSink {
    fn emit(&mut self, event: &StatusEvent);
}

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The two pulsed outputs of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Arm-command line; a pulse starts the raise motion.
    ArmRaise,
    /// Magnet relay; a pulse releases the hammer.
    MagnetDrop,
}

pub trait ActuatorPort {
    /// Drive an output high (`true`) or low.
    fn set_output(&mut self, output: Output, high: bool);
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Ambient conditions, read once at the end of every run.
pub trait EnvironmentPort {
    fn read_temperature_c(&mut self) -> Result<f32, SensorError>;
    fn read_humidity_pct(&mut self) -> Result<f32, SensorError>;
}

/// Linear acceleration along the drop axis.
pub trait AccelerometerPort {
    fn read_accel_z(&mut self) -> Result<f32, SensorError>;
}

/// Which position sensor an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionEdge {
    Extended,
    Retracted,
}

/// Consumer side of the two position wait-signals.
pub trait PositionSensePort {
    /// Discard a pending signal without blocking.  Returns whether one was pending.
    fn drain(&self, edge: PositionEdge) -> bool;

    /// Block until the signal fires.  No timeout.
    fn wait(&self, edge: PositionEdge);
}

impl<P: PositionSensePort + ?Sized> PositionSensePort for &P {
    fn drain(&self, edge: PositionEdge) -> bool {
        (**self).drain(edge)
    }

    fn wait(&self, edge: PositionEdge) {
        (**self).wait(edge);
    }
}

/// Signed pulse accumulation over an encoder.
pub trait PulseCounter {
    /// Stop counting.
    fn pause(&mut self);
    /// Current count since the last clear.
    fn read(&mut self) -> i16;
    fn clear(&mut self);
    fn resume(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Connectivity ports
// ───────────────────────────────────────────────────────────────

/// WiFi station control.
pub trait NetworkPort {
    /// Start joining `credential`.  Completion is observed via [`is_joined`](Self::is_joined).
    fn begin(&mut self, credential: &NetworkCredential) -> Result<(), CommsError>;

    fn is_joined(&self) -> bool;
}

/// MQTT client control.
pub trait BrokerPort {
    /// Connect and block until the broker accepts or the attempt fails.
    fn connect(&mut self, broker: &BrokerCandidate, client_id: &str) -> Result<(), CommsError>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;

    /// Next message received since the last call, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

/// Where the sequencer hands a finished report.
///
/// `Ok(true)` published, `Ok(false)` dropped after the single attempt,
/// `Err` only when reconnecting before the attempt hit a fatal condition.
pub trait ReportPort {
    fn publish_report(&mut self, payload: &str) -> Result<bool, FatalError>;
}

/// Line-oriented local command input.
pub trait LinePort {
    /// Next complete line, without the terminator.  Never blocks.
    fn read_line(&mut self) -> Option<String<CONSOLE_LINE_CAPACITY>>;
}

/// Whole-device restart, the only recovery from a [`FatalError`].
pub trait RestartPort {
    fn restart(&mut self, reason: &FatalError);
}
