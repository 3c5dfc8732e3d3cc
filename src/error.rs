//! Unified error types for the hammer node firmware.
//!
//! Subsystems report their own small `Copy` error enums.  Boot-time setup
//! failures are collected into [`Error`] before `main` gives up.  Conditions
//! whose only recovery is a full chip restart are a separate type,
//! [`FatalError`], so the compiler keeps the two paths apart.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Why boot could not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The bus transaction failed or timed out.
    ReadFailed,
    /// No driver is attached to this capability.
    NotWired,
    /// The reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::NotWired => write!(f, "sensor not wired"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO level write failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Credential could not be handed to the WiFi driver.
    InvalidCredential,
    /// The WiFi driver rejected the join request.
    WifiJoinFailed,
    /// The broker did not accept the connection in time.
    BrokerConnectFailed,
    /// The broker link is down.
    NotConnected,
    SubscribeFailed,
    PublishFailed,
    /// The report could not be serialised.
    EncodeFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredential => write!(f, "invalid WiFi credential"),
            Self::WifiJoinFailed => write!(f, "WiFi join failed"),
            Self::BrokerConnectFailed => write!(f, "MQTT connect failed"),
            Self::NotConnected => write!(f, "MQTT not connected"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::EncodeFailed => write!(f, "report encoding failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fatal conditions
// ---------------------------------------------------------------------------

/// Conditions resolved only by restarting the whole device.
///
/// Returned up through the scheduling contexts to the supervisor, which
/// logs the reason and restarts.  Nothing below the supervisor attempts
/// partial recovery from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// Every WiFi credential was tried without joining.
    NetworkCandidatesExhausted,
    /// Every broker address was tried without connecting.
    BrokerCandidatesExhausted,
    /// The steady-state reconnection loop hit its attempt ceiling.
    ReconnectLimitExceeded { attempts: u32 },
    /// A scheduling context stopped without reporting a reason.
    ContextExited,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkCandidatesExhausted => write!(f, "no WiFi network could be joined"),
            Self::BrokerCandidatesExhausted => write!(f, "no MQTT broker could be reached"),
            Self::ReconnectLimitExceeded { attempts } => {
                write!(f, "MQTT reconnect failed after {attempts} attempts")
            }
            Self::ContextExited => write!(f, "execution context exited"),
        }
    }
}

impl std::error::Error for FatalError {}
