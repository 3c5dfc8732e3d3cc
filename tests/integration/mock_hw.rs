//! Mock adapters for integration tests.
//!
//! Time is virtual: `sleep_ms` advances the shared clock instead of
//! blocking, so a full six-second sampling window runs instantly and every
//! delay the domain inserts is visible as elapsed virtual time.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorType, InputPin};
use hammer_node::app::commands::{CONSOLE_LINE_CAPACITY, InboundMessage};
use hammer_node::app::events::StatusEvent;
use hammer_node::app::ports::{
    AccelerometerPort, ActuatorPort, BrokerPort, EnvironmentPort, LinePort, NetworkPort, Output,
    PositionEdge, PositionSensePort, PulseCounter, ReportPort, StatusSink, TimePort,
};
use hammer_node::config::{BrokerCandidate, NetworkCredential};
use hammer_node::error::{CommsError, FatalError, SensorError};

// ── Virtual clock ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now_ms: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl TimePort for VirtualClock {
    fn uptime_ms(&self) -> u64 {
        self.now()
    }

    fn sleep_ms(&self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── Status sink ───────────────────────────────────────────────

/// Records every event; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&StatusEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl StatusSink for RecordingSink {
    fn emit(&mut self, event: &StatusEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Network ───────────────────────────────────────────────────

/// Associates only with the SSIDs listed in `reachable`.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    pub reachable: Vec<&'static str>,
    pub begun: Vec<String>,
    joined: bool,
}

#[allow(dead_code)]
impl ScriptedNetwork {
    pub fn reaching(reachable: &[&'static str]) -> Self {
        Self {
            reachable: reachable.to_vec(),
            ..Self::default()
        }
    }

    pub fn drop_link(&mut self) {
        self.joined = false;
    }
}

impl NetworkPort for ScriptedNetwork {
    fn begin(&mut self, credential: &NetworkCredential) -> Result<(), CommsError> {
        self.begun.push(credential.ssid.as_str().to_owned());
        self.joined = self.reachable.contains(&credential.ssid.as_str());
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.joined
    }
}

// ── Broker ────────────────────────────────────────────────────

/// Connect outcomes are taken from `script`; once it runs dry every
/// attempt returns `fallback`.
#[derive(Debug)]
pub struct ScriptedBroker {
    pub script: VecDeque<Result<(), CommsError>>,
    pub fallback: Result<(), CommsError>,
    pub connected: bool,
    pub connect_hosts: Vec<String>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub publish_fails: bool,
    pub inbound: VecDeque<InboundMessage>,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(()),
            connected: false,
            connect_hosts: Vec::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
            publish_fails: false,
            inbound: VecDeque::new(),
        }
    }
}

#[allow(dead_code)]
impl ScriptedBroker {
    pub fn always(outcome: Result<(), CommsError>) -> Self {
        Self {
            fallback: outcome,
            ..Self::default()
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<(), CommsError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound
            .push_back(InboundMessage::new(topic, payload).unwrap());
    }
}

impl BrokerPort for ScriptedBroker {
    fn connect(&mut self, broker: &BrokerCandidate, _client_id: &str) -> Result<(), CommsError> {
        self.connect_hosts.push(broker.host.as_str().to_owned());
        let outcome = self.script.pop_front().unwrap_or(self.fallback);
        self.connected = outcome.is_ok();
        outcome
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.connected || self.publish_fails {
            return Err(CommsError::PublishFailed);
        }
        self.published.push((
            topic.to_owned(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

// ── Rig hardware ──────────────────────────────────────────────

/// Records output writes with the virtual time they happened at.
#[derive(Debug)]
pub struct MockRig {
    clock: VirtualClock,
    pub writes: Vec<(Output, bool, u64)>,
    pub temperature: Result<f32, SensorError>,
    pub humidity: Result<f32, SensorError>,
    pub accel_z: Result<f32, SensorError>,
}

#[allow(dead_code)]
impl MockRig {
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            writes: Vec::new(),
            temperature: Ok(21.5),
            humidity: Ok(40.0),
            accel_z: Err(SensorError::NotWired),
        }
    }

    /// `(rise, fall)` timestamps of every completed pulse on `output`.
    pub fn pulses(&self, output: Output) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut rose = None;
        for &(o, high, t) in &self.writes {
            if o != output {
                continue;
            }
            match (high, rose) {
                (true, _) => rose = Some(t),
                (false, Some(r)) => {
                    out.push((r, t));
                    rose = None;
                }
                (false, None) => {}
            }
        }
        out
    }
}

impl ActuatorPort for MockRig {
    fn set_output(&mut self, output: Output, high: bool) {
        self.writes.push((output, high, self.clock.now()));
    }
}

impl EnvironmentPort for MockRig {
    fn read_temperature_c(&mut self) -> Result<f32, SensorError> {
        self.temperature
    }

    fn read_humidity_pct(&mut self) -> Result<f32, SensorError> {
        self.humidity
    }
}

impl AccelerometerPort for MockRig {
    fn read_accel_z(&mut self) -> Result<f32, SensorError> {
        self.accel_z
    }
}

// ── Position sensors ──────────────────────────────────────────

/// Both sensors fire the moment they are waited on.
#[derive(Debug, Default)]
pub struct InstantPosition {
    pub log: RefCell<Vec<(&'static str, PositionEdge)>>,
}

#[allow(dead_code)]
impl InstantPosition {
    pub fn waits(&self) -> Vec<PositionEdge> {
        self.log
            .borrow()
            .iter()
            .filter(|(op, _)| *op == "wait")
            .map(|(_, e)| *e)
            .collect()
    }
}

impl PositionSensePort for InstantPosition {
    fn drain(&self, edge: PositionEdge) -> bool {
        self.log.borrow_mut().push(("drain", edge));
        false
    }

    fn wait(&self, edge: PositionEdge) {
        self.log.borrow_mut().push(("wait", edge));
    }
}

// ── Pulse counter ─────────────────────────────────────────────

/// Reports `per_read` counts on every read.
#[derive(Debug, Default)]
pub struct SteadyCounter {
    pub per_read: i16,
    pub reads: u32,
    pub paused: bool,
}

impl PulseCounter for SteadyCounter {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn read(&mut self) -> i16 {
        assert!(self.paused, "counter read while running");
        self.reads += 1;
        self.per_read
    }

    fn clear(&mut self) {}

    fn resume(&mut self) {
        self.paused = false;
    }
}

// ── Report sink ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub payloads: Vec<String>,
    pub outcome: Option<FatalError>,
}

impl ReportPort for RecordingReporter {
    fn publish_report(&mut self, payload: &str) -> Result<bool, FatalError> {
        self.payloads.push(payload.to_owned());
        match self.outcome {
            Some(fatal) => Err(fatal),
            None => Ok(true),
        }
    }
}

// ── Buttons and console ───────────────────────────────────────

/// Pull-up input whose level the test drives.
#[derive(Debug, Clone)]
pub struct MockPin {
    high: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn released() -> Self {
        Self {
            high: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn press(&self) {
        self.high.store(false, Ordering::Release);
    }

    pub fn release(&self) {
        self.high.store(true, Ordering::Release);
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.load(Ordering::Acquire))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.load(Ordering::Acquire))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedLines {
    pub lines: VecDeque<&'static str>,
}

impl LinePort for ScriptedLines {
    fn read_line(&mut self) -> Option<heapless::String<CONSOLE_LINE_CAPACITY>> {
        self.lines
            .pop_front()
            .and_then(|l| heapless::String::try_from(l).ok())
    }
}

// ── Config helpers ────────────────────────────────────────────

#[allow(dead_code)]
pub fn network(ssid: &str) -> NetworkCredential {
    NetworkCredential {
        ssid: heapless::String::try_from(ssid).unwrap(),
        password: heapless::String::try_from("password1").unwrap(),
    }
}

#[allow(dead_code)]
pub fn broker(host: &str) -> BrokerCandidate {
    BrokerCandidate {
        host: heapless::String::try_from(host).unwrap(),
        port: 1883,
        username: None,
        password: None,
    }
}
