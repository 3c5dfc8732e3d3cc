//! MQTT client adapter.
//!
//! Implements [`BrokerPort`].  The ESP-IDF client runs its own task and
//! delivers events through a callback; the callback only flips the
//! `connected` flag and copies received messages into [`INBOUND`], a
//! bounded channel the connectivity context drains with `poll_inbound`.
//! Messages that arrive while the channel is full are dropped.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: loopback stub that logs publishes.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::InboundMessage;

/// Messages waiting for the connectivity context.
pub const INBOUND_DEPTH: usize = 8;

pub static INBOUND: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH> =
    Channel::new();

/// Copy a received message into [`INBOUND`].  Returns `false` if dropped.
pub fn deliver_inbound(topic: &str, payload: &[u8]) -> bool {
    InboundMessage::new(topic, payload).is_some_and(|msg| INBOUND.try_send(msg).is_ok())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::MqttBroker;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::mqtt::client::{
        EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{debug, info, warn};

    use super::{INBOUND, deliver_inbound};
    use crate::app::commands::InboundMessage;
    use crate::app::ports::BrokerPort;
    use crate::config::BrokerCandidate;
    use crate::error::CommsError;

    /// How long `connect` waits for the broker's CONNACK.
    const CONNECT_TIMEOUT_MS: u32 = 5_000;
    const CONNECT_POLL_MS: u32 = 50;

    pub struct MqttBroker {
        client: Option<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
    }

    impl MqttBroker {
        pub fn new() -> Self {
            Self {
                client: None,
                connected: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Default for MqttBroker {
        fn default() -> Self {
            Self::new()
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self, broker: &BrokerCandidate, client_id: &str) -> Result<(), CommsError> {
            // Tear down any previous session before dialling again.
            self.client = None;
            self.connected.store(false, Ordering::Release);

            let url = broker.url();
            let config = MqttClientConfiguration {
                client_id: Some(client_id),
                username: broker.username.as_deref(),
                password: broker.password.as_deref(),
                ..Default::default()
            };

            let connected = Arc::clone(&self.connected);
            let client = EspMqttClient::new_cb(&url, &config, move |event| match event.payload() {
                EventPayload::Connected(_) => connected.store(true, Ordering::Release),
                EventPayload::Disconnected => connected.store(false, Ordering::Release),
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    if !deliver_inbound(topic, data) {
                        warn!("mqtt: inbound message on {topic} dropped");
                    }
                }
                _ => {}
            })
            .map_err(|e| {
                warn!("mqtt: client init failed: {e}");
                CommsError::BrokerConnectFailed
            })?;
            self.client = Some(client);

            let mut waited = 0;
            while waited < CONNECT_TIMEOUT_MS {
                if self.connected.load(Ordering::Acquire) {
                    info!("mqtt: CONNACK from {url}");
                    return Ok(());
                }
                FreeRtos::delay_ms(CONNECT_POLL_MS);
                waited += CONNECT_POLL_MS;
            }
            self.client = None;
            Err(CommsError::BrokerConnectFailed)
        }

        fn is_connected(&self) -> bool {
            self.client.is_some() && self.connected.load(Ordering::Acquire)
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
            let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
            client
                .subscribe(topic, QoS::AtMostOnce)
                .map(|id| debug!("mqtt: subscribe {topic} (msg {id})"))
                .map_err(|_| CommsError::SubscribeFailed)
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
            let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|_| CommsError::PublishFailed)
        }

        fn poll_inbound(&mut self) -> Option<InboundMessage> {
            INBOUND.try_receive().ok()
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::MqttBroker;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use log::info;

    use super::INBOUND;
    use crate::app::commands::InboundMessage;
    use crate::app::ports::BrokerPort;
    use crate::config::BrokerCandidate;
    use crate::error::CommsError;

    /// Loopback broker: connects instantly, logs publishes, and serves
    /// whatever was fed into [`INBOUND`](super::INBOUND).
    #[derive(Debug, Default)]
    pub struct MqttBroker {
        connected: bool,
    }

    impl MqttBroker {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self, broker: &BrokerCandidate, client_id: &str) -> Result<(), CommsError> {
            info!("MQTT(sim): {client_id} connected to {}", broker.url());
            self.connected = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
            info!("MQTT(sim): subscribed {topic}");
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
            if !self.connected {
                return Err(CommsError::NotConnected);
            }
            info!("MQTT(sim): {} bytes to {topic}", payload.len());
            Ok(())
        }

        fn poll_inbound(&mut self) -> Option<InboundMessage> {
            INBOUND.try_receive().ok()
        }
    }
}
