//! Inbound commands: what the outside world can ask the rig to do.
//!
//! Three producers feed the same two command flags: the MQTT command topic,
//! the serial console, and the physical push-buttons.  Parsing lives here so
//! every producer agrees on the vocabulary.

use heapless::{String, Vec};

/// Longest console line kept; longer lines are discarded whole.
pub const CONSOLE_LINE_CAPACITY: usize = 64;
/// Longest inbound MQTT payload kept; longer payloads are ignored.
pub const INBOUND_PAYLOAD_CAPACITY: usize = 64;

/// Literal payload on the command topic that starts a test.
pub const START_TEST_PAYLOAD: &[u8] = b"start_test";
pub const RESULT_OK_PAYLOAD: &[u8] = b"OK";
pub const RESULT_FAIL_PAYLOAD: &[u8] = b"FAIL";

pub type ConsoleLine = String<CONSOLE_LINE_CAPACITY>;

/// An operator request, independent of where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Raise the arm, sample the fall, report.
    Start,
    /// Pulse the magnet release.
    Drop,
}

/// Where a [`Command`] originated, for status reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Remote,
    Console,
    Button,
}

/// Parse one console line.  Case-insensitive, surrounding whitespace ignored.
pub fn parse_console_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("START") {
        Some(Command::Start)
    } else if line.eq_ignore_ascii_case("DROP") {
        Some(Command::Drop)
    } else {
        None
    }
}

/// A message delivered by the broker, copied out of the client callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<48>,
    pub payload: Vec<u8, INBOUND_PAYLOAD_CAPACITY>,
}

impl InboundMessage {
    /// Copy a topic/payload pair.  `None` if either exceeds its capacity.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        Some(Self {
            topic: String::try_from(topic).ok()?,
            payload: Vec::from_slice(payload).ok()?,
        })
    }
}

/// Decoded meaning of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    StartTest,
    /// `OK` on the result topic. Reserved; no behaviour attached yet.
    ResultAccepted,
    /// `FAIL` on the result topic. Reserved; no behaviour attached yet.
    ResultRejected,
}

/// Match a message against the subscribed topics.
///
/// Unknown topics and payloads yield `None` and are silently dropped.
pub fn decode_inbound(
    msg: &InboundMessage,
    command_topic: &str,
    result_topic: Option<&str>,
) -> Option<InboundAction> {
    let payload = msg.payload.as_slice();
    if msg.topic == command_topic {
        return (payload == START_TEST_PAYLOAD).then_some(InboundAction::StartTest);
    }
    if result_topic.is_some_and(|t| msg.topic == t) {
        return match payload {
            RESULT_OK_PAYLOAD => Some(InboundAction::ResultAccepted),
            RESULT_FAIL_PAYLOAD => Some(InboundAction::ResultRejected),
            _ => None,
        };
    }
    None
}
