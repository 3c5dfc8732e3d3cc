//! Connectivity manager: network join, broker join, reconnection, dispatch.
//!
//! ```text
//!   join_network ──▶ join_broker ──▶ connected ──link lost──▶ reconnect
//!        │                │                                      │
//!   exhausted ▼      exhausted ▼                         20 failures ▼
//!                     FatalError → supervisor → restart
//! ```
//!
//! Candidate indices only move forward within one join cycle.  Once a
//! candidate succeeds its index is retained and reused by [`reconnect`]
//! until the device restarts.
//!
//! [`reconnect`]: ConnectivityManager::reconnect

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::config::{ConnectivityConfig, Topic};
use crate::error::FatalError;
use crate::flags::CommandFlags;

use super::commands::{Command, CommandSource, InboundAction, InboundMessage, decode_inbound};
use super::events::StatusEvent;
use super::ports::{BrokerPort, NetworkPort, ReportPort, StatusSink, TimePort};

pub struct ConnectivityManager<N, B, T, S> {
    link: ConnectivityConfig,
    network: N,
    broker: B,
    time: T,
    sink: S,
    flags: Arc<CommandFlags>,
    network_index: Option<usize>,
    broker_index: Option<usize>,
    reconnect_attempts: u32,
    command_topic: Topic,
    report_topic: Topic,
    result_topic: Option<Topic>,
}

impl<N, B, T, S> ConnectivityManager<N, B, T, S>
where
    N: NetworkPort,
    B: BrokerPort,
    T: TimePort,
    S: StatusSink,
{
    pub fn new(
        link: ConnectivityConfig,
        network: N,
        broker: B,
        time: T,
        sink: S,
        flags: Arc<CommandFlags>,
    ) -> Self {
        Self {
            command_topic: link.command_topic(),
            report_topic: link.report_topic(),
            result_topic: link.result_topic(),
            link,
            network,
            broker,
            time,
            sink,
            flags,
            network_index: None,
            broker_index: None,
            reconnect_attempts: 0,
        }
    }

    /// Join a network, then a broker.  Either list running out is fatal.
    pub fn bring_up(&mut self) -> Result<(), FatalError> {
        self.join_network()?;
        self.join_broker()?;
        Ok(())
    }

    /// Try each credential in order, polling for association.
    pub fn join_network(&mut self) -> Result<usize, FatalError> {
        for (index, credential) in self.link.networks.iter().enumerate() {
            self.sink.emit(&StatusEvent::NetworkJoining { index });
            info!("wifi: joining #{index} \"{}\"", credential.ssid);

            if let Err(e) = self.network.begin(credential) {
                warn!("wifi: #{index} rejected: {e}");
                continue;
            }
            for _ in 0..self.link.join_polls_per_network {
                self.time.sleep_ms(self.link.join_poll_interval_ms);
                if self.network.is_joined() {
                    self.network_index = Some(index);
                    self.sink.emit(&StatusEvent::NetworkJoined { index });
                    info!("wifi: joined #{index}");
                    return Ok(index);
                }
            }
            warn!("wifi: #{index} did not associate");
        }
        Err(FatalError::NetworkCandidatesExhausted)
    }

    /// Try each broker in order, a fixed number of times each.
    pub fn join_broker(&mut self) -> Result<usize, FatalError> {
        for (index, candidate) in self.link.brokers.iter().enumerate() {
            for attempt in 1..=self.link.broker_attempts_per_candidate {
                self.sink.emit(&StatusEvent::BrokerConnecting { index, attempt });
                match self.broker.connect(candidate, &self.link.node_name) {
                    Ok(()) => {
                        self.broker_index = Some(index);
                        self.sink.emit(&StatusEvent::BrokerConnected { index });
                        info!("mqtt: connected to #{index} {}", candidate.host);
                        self.subscribe_all();
                        return Ok(index);
                    }
                    Err(e) => {
                        warn!("mqtt: #{index} attempt {attempt} failed: {e}");
                        self.time.sleep_ms(self.link.broker_retry_delay_ms);
                    }
                }
            }
        }
        Err(FatalError::BrokerCandidatesExhausted)
    }

    /// Reconnect to the retained broker, re-joining the retained network
    /// first if it dropped.  Fatal once the attempt ceiling is reached.
    pub fn reconnect(&mut self) -> Result<(), FatalError> {
        loop {
            if self.try_reconnect()? {
                return Ok(());
            }
            self.time.sleep_ms(self.link.reconnect_delay_ms);
        }
    }

    /// A single reconnect attempt, counted against the ceiling.
    ///
    /// `Ok(false)` means the link is still down and another attempt is
    /// allowed.  The count survives between calls and resets on success,
    /// so callers may interleave other work between attempts.
    pub fn try_reconnect(&mut self) -> Result<bool, FatalError> {
        if self.reconnect_attempts == 0 {
            self.sink.emit(&StatusEvent::LinkLost);
        }
        let index = self.broker_index.unwrap_or(0);
        let Some(candidate) = self.link.brokers.get(index) else {
            return Err(FatalError::BrokerCandidatesExhausted);
        };

        let limit = self.link.reconnect_attempt_limit;
        self.reconnect_attempts += 1;
        let attempt = self.reconnect_attempts;
        self.sink.emit(&StatusEvent::Reconnecting { attempt });

        if !self.network.is_joined() {
            if let Some(credential) = self.network_index.and_then(|i| self.link.networks.get(i)) {
                debug!("wifi: link down, re-joining \"{}\"", credential.ssid);
                if let Err(e) = self.network.begin(credential) {
                    warn!("wifi: re-join rejected: {e}");
                }
            }
        }

        match self.broker.connect(candidate, &self.link.node_name) {
            Ok(()) => {
                self.reconnect_attempts = 0;
                self.broker_index = Some(index);
                self.sink.emit(&StatusEvent::BrokerConnected { index });
                info!("mqtt: reconnected after {attempt} attempt(s)");
                self.subscribe_all();
                Ok(true)
            }
            Err(e) => {
                warn!("mqtt: reconnect {attempt}/{limit} failed: {e}");
                if attempt >= limit {
                    self.reconnect_attempts = 0;
                    Err(FatalError::ReconnectLimitExceeded { attempts: limit })
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Pause between two [`try_reconnect`](Self::try_reconnect) calls.
    pub fn reconnect_delay_ms(&self) -> u32 {
        self.link.reconnect_delay_ms
    }

    pub fn is_link_up(&self) -> bool {
        self.broker.is_connected()
    }

    /// Drain every message the broker has delivered since the last call.
    pub fn service_inbound(&mut self) {
        while let Some(msg) = self.broker.poll_inbound() {
            self.dispatch(&msg);
        }
    }

    /// Act on one inbound message.  Unknown topics and payloads are ignored.
    pub fn dispatch(&mut self, msg: &InboundMessage) -> Option<InboundAction> {
        let action = decode_inbound(msg, &self.command_topic, self.result_topic.as_deref());
        match action {
            Some(InboundAction::StartTest) => {
                self.flags.request_start();
                self.sink.emit(&StatusEvent::CommandAccepted {
                    command: Command::Start,
                    source: CommandSource::Remote,
                });
            }
            Some(InboundAction::ResultAccepted) => {
                self.sink.emit(&StatusEvent::ResultAcknowledged { accepted: true });
            }
            Some(InboundAction::ResultRejected) => {
                self.sink.emit(&StatusEvent::ResultAcknowledged { accepted: false });
            }
            None => debug!("mqtt: ignored message on {}", msg.topic),
        }
        action
    }

    /// Publish once, reconnecting first if the link is down.
    pub fn publish_report(&mut self, payload: &str) -> Result<bool, FatalError> {
        if !self.broker.is_connected() {
            self.reconnect()?;
        }
        match self.broker.publish(&self.report_topic, payload.as_bytes()) {
            Ok(()) => {
                info!("mqtt: report published ({} bytes)", payload.len());
                self.sink.emit(&StatusEvent::PublishSucceeded);
                Ok(true)
            }
            Err(e) => {
                warn!("mqtt: report lost: {e}");
                self.sink.emit(&StatusEvent::PublishFailed);
                Ok(false)
            }
        }
    }

    pub fn network_index(&self) -> Option<usize> {
        self.network_index
    }

    pub fn broker_index(&self) -> Option<usize> {
        self.broker_index
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    fn subscribe_all(&mut self) {
        let topics = core::iter::once(&self.command_topic).chain(self.result_topic.as_ref());
        for topic in topics {
            match self.broker.subscribe(topic) {
                Ok(()) => debug!("mqtt: subscribed {topic}"),
                Err(e) => warn!("mqtt: subscribe {topic} failed: {e}"),
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Shared handle
// ───────────────────────────────────────────────────────────────

/// Cloneable handle shared by both scheduling contexts.
///
/// The connectivity context services the link through it; the physical-I/O
/// context publishes reports through its [`ReportPort`] impl.  Both are
/// serialised by the mutex, so a publish issued during a reconnect waits
/// for that reconnect instead of starting a second one.
pub struct ConnectivityHandle<N, B, T, S> {
    inner: Arc<Mutex<ConnectivityManager<N, B, T, S>>>,
}

impl<N, B, T, S> Clone for ConnectivityHandle<N, B, T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N, B, T, S> ConnectivityHandle<N, B, T, S> {
    pub fn new(manager: ConnectivityManager<N, B, T, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Lock the manager.  A panic in the other context does not poison it.
    pub fn lock(&self) -> MutexGuard<'_, ConnectivityManager<N, B, T, S>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<N, B, T, S> ReportPort for ConnectivityHandle<N, B, T, S>
where
    N: NetworkPort,
    B: BrokerPort,
    T: TimePort,
    S: StatusSink,
{
    fn publish_report(&mut self, payload: &str) -> Result<bool, FatalError> {
        self.lock().publish_report(payload)
    }
}
