//! Application core — rig sequencing and connectivity logic, zero I/O.
//!
//! This module contains the rules of the drop-test rig: the test sequencer
//! state machine, the connectivity join/reconnect state machines and the
//! command vocabulary.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod connectivity;
pub mod events;
pub mod ports;
pub mod record;
pub mod sequencer;
