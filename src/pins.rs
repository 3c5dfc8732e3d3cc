//! GPIO / peripheral pin assignments for the hammer rig controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Operator push-buttons (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Starts a full test run.
pub const START_BUTTON_GPIO: i32 = 2;
/// Pulses the magnet release.
pub const DROP_BUTTON_GPIO: i32 = 1;

// ---------------------------------------------------------------------------
// Arm position sensors (falling-edge interrupts)
// ---------------------------------------------------------------------------

/// Internal pull-up enabled.
pub const ARM_EXTENDED_GPIO: i32 = 3;
/// Plain input, no internal pull-up.
pub const ARM_RETRACTED_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Pulsed outputs
// ---------------------------------------------------------------------------

/// Arm controller command line; a HIGH pulse starts the raise motion.
pub const ARM_COMMAND_GPIO: i32 = 14;
/// Magnet relay; a HIGH pulse releases the hammer.
pub const MAGNET_RELAY_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Rotary encoder (PCNT unit 0)
// ---------------------------------------------------------------------------

pub const ENCODER_A_GPIO: i32 = 17;
pub const ENCODER_B_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// UART carrying the debug log and the START / DROP command lines.
pub const CONSOLE_UART: i32 = 0;
