//! Hammer node firmware library.
//!
//! Exposes the rig logic (sequencer, connectivity, command intake) for
//! integration testing on the host. All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod flags;
pub mod pins;
pub mod scheduler;
pub mod supervisor;

pub mod adapters;
pub mod drivers;
pub mod sensors;
