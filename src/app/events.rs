//! Outbound status events.
//!
//! The sequencer, connectivity manager and input drivers emit these through
//! the [`StatusSink`](super::ports::StatusSink) port.  The `Display` text is
//! what a display surface or the debug console shows; it is not a stable
//! contract.

use core::fmt;

use super::commands::{Command, CommandSource};
use super::sequencer::RunState;

/// Progress and state messages emitted at each major transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    NetworkJoining { index: usize },
    NetworkJoined { index: usize },
    BrokerConnecting { index: usize, attempt: u32 },
    BrokerConnected { index: usize },
    LinkLost,
    Reconnecting { attempt: u32 },

    /// A command flag was set.
    CommandAccepted { command: Command, source: CommandSource },
    /// Secondary result topic acknowledgement (placeholder).
    ResultAcknowledged { accepted: bool },

    /// The sequencer moved between states.
    StateChanged { from: RunState, to: RunState },
    RaisingArm,
    ArmExtended,
    ArmRetracted,
    TestStarted,
    DataCollected { samples: usize },
    PublishSucceeded,
    PublishFailed,
    Dropped,
    Calibrated { offset: f32 },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkJoining { index } => write!(f, "Connecting to WiFi #{index}"),
            Self::NetworkJoined { index } => write!(f, "WiFi #{index} connected"),
            Self::BrokerConnecting { index, attempt } => {
                write!(f, "Connecting to MQTT #{index} (try {attempt})")
            }
            Self::BrokerConnected { index } => write!(f, "MQTT #{index} connected"),
            Self::LinkLost => f.write_str("MQTT link lost"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting (try {attempt})"),
            Self::CommandAccepted { command, source } => {
                write!(f, "{command:?} requested via {source:?}")
            }
            Self::ResultAcknowledged { accepted: true } => f.write_str("Result accepted"),
            Self::ResultAcknowledged { accepted: false } => f.write_str("Result rejected"),
            Self::StateChanged { from, to } => write!(f, "{from:?} -> {to:?}"),
            Self::RaisingArm => f.write_str("Raising hammer"),
            Self::ArmExtended => f.write_str("Arm extended"),
            Self::ArmRetracted => f.write_str("Arm retracted"),
            Self::TestStarted => f.write_str("Test started"),
            Self::DataCollected { samples } => {
                write!(f, "Data collection complete ({samples} samples)")
            }
            Self::PublishSucceeded => f.write_str("Data published"),
            Self::PublishFailed => f.write_str("Publish failed"),
            Self::Dropped => f.write_str("Hammer dropped"),
            Self::Calibrated { offset } => write!(f, "Calibrated, offset {offset:.3}"),
        }
    }
}
