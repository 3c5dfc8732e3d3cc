//! System configuration parameters
//!
//! All tunable timing and connectivity parameters for the hammer rig.
//! Connectivity candidates are baked in at build time from `HAMMER_*`
//! environment variables (see `build.rs` and `.env.example`).

use core::fmt::{self, Write as _};

use heapless::{String, Vec};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::error::Error;

/// Maximum number of WiFi credentials tried in one join cycle.
pub const MAX_NETWORKS: usize = 4;
/// Maximum number of broker addresses tried in one join cycle.
pub const MAX_BROKERS: usize = 4;

pub const DEFAULT_NODE_NAME: &str = "hammer";
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Topic buffer; node names are capped at 32 bytes so every derived topic fits.
pub type Topic = String<48>;

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub rig: RigConfig,
    pub link: ConnectivityConfig,
}

/// Physical test-rig timing and encoder geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    // --- Inputs ---
    /// Push-button debounce interval (milliseconds)
    pub debounce_ms: u32,
    /// Minimum spacing between accepted position-sensor edges (milliseconds)
    pub edge_holdoff_ms: u32,

    // --- Raise sequence ---
    pub pre_raise_delay_ms: u32,
    /// Arm-command pulse width (milliseconds)
    pub raise_pulse_ms: u32,
    /// Settle after the "extended" edge (milliseconds)
    pub extend_settle_ms: u32,
    /// Settle after the "retracted" edge (milliseconds)
    pub retract_settle_ms: u32,

    // --- Sampling ---
    /// Sampling tick period (milliseconds)
    pub sample_tick_ms: u32,
    /// Total sampling window (milliseconds)
    pub sample_window_ms: u32,
    /// Encoder counts per full revolution (after hardware decode)
    pub counts_per_revolution: u32,
    /// Hardware counter high/low limit (symmetric)
    pub counter_limit: i16,
    /// Record calibrated z-acceleration alongside each sample
    pub report_acceleration: bool,
    pub calibration_samples: u32,
    pub calibration_spacing_ms: u32,

    // --- Drop / loop ---
    /// Magnet-release pulse width (milliseconds)
    pub drop_pulse_ms: u32,
    /// Yield between scheduling-context iterations (milliseconds)
    pub loop_yield_ms: u32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            edge_holdoff_ms: 50,

            pre_raise_delay_ms: 100,
            raise_pulse_ms: 500,
            extend_settle_ms: 4_000,
            retract_settle_ms: 1_000,

            sample_tick_ms: 1,
            sample_window_ms: 6_000,
            counts_per_revolution: 2048,
            counter_limit: 10_000,
            report_acceleration: false,
            calibration_samples: 100,
            calibration_spacing_ms: 10,

            drop_pulse_ms: 500,
            loop_yield_ms: 10,
        }
    }
}

/// One WiFi network the node may join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredential {
    pub ssid: String<32>,
    pub password: String<64>,
}

/// One MQTT broker the node may connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerCandidate {
    pub host: String<64>,
    pub port: u16,
    pub username: Option<String<32>>,
    pub password: Option<String<64>>,
}

impl BrokerCandidate {
    /// `mqtt://host:port` form used by the ESP-IDF client.
    pub fn url(&self) -> String<96> {
        let mut url = String::new();
        // 64-byte host + scheme + port always fits in 96
        let _ = write!(url, "mqtt://{}:{}", self.host, self.port);
        url
    }
}

/// Network and broker candidate lists plus their retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Node name; used as MQTT client id and to derive topics.
    pub node_name: String<32>,
    /// WiFi credentials in the order they are tried.
    pub networks: Vec<NetworkCredential, MAX_NETWORKS>,
    /// Brokers in the order they are tried.
    pub brokers: Vec<BrokerCandidate, MAX_BROKERS>,
    /// Subscribe to `<node>/results` as well as `<node>/actions`.
    pub result_topic_enabled: bool,

    // --- Network join ---
    pub join_poll_interval_ms: u32,
    pub join_polls_per_network: u32,

    // --- Broker join ---
    pub broker_attempts_per_candidate: u32,
    pub broker_retry_delay_ms: u32,

    // --- Steady-state reconnection ---
    pub reconnect_delay_ms: u32,
    /// Consecutive failed reconnects tolerated before restarting.
    pub reconnect_attempt_limit: u32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        let mut node_name = String::new();
        let _ = node_name.push_str(DEFAULT_NODE_NAME);
        Self {
            node_name,
            networks: Vec::new(),
            brokers: Vec::new(),
            result_topic_enabled: false,

            join_poll_interval_ms: 500,
            join_polls_per_network: 10,

            broker_attempts_per_candidate: 3,
            broker_retry_delay_ms: 2_000,

            reconnect_delay_ms: 5_000,
            reconnect_attempt_limit: 20,
        }
    }
}

impl ConnectivityConfig {
    /// Build from the `HAMMER_*` variables captured at compile time.
    ///
    /// A malformed variable is logged and that field keeps its default.
    pub fn from_build_env() -> Self {
        let mut cfg = Self::default();

        if let Some(name) = option_env!("HAMMER_NODE_NAME") {
            match parse_node_name(name) {
                Ok(n) => cfg.node_name = n,
                Err(e) => warn!("HAMMER_NODE_NAME ignored: {e}"),
            }
        }
        if let Some(raw) = option_env!("HAMMER_WIFI_NETWORKS") {
            match parse_networks(raw) {
                Ok(list) => cfg.networks = list,
                Err(e) => warn!("HAMMER_WIFI_NETWORKS ignored: {e}"),
            }
        }
        if let Some(raw) = option_env!("HAMMER_MQTT_BROKERS") {
            match parse_brokers(raw) {
                Ok(list) => cfg.brokers = list,
                Err(e) => warn!("HAMMER_MQTT_BROKERS ignored: {e}"),
            }
        }
        cfg
    }

    /// Primary inbound command topic, `<node>/actions`.
    pub fn command_topic(&self) -> Topic {
        self.topic("", "/actions")
    }

    /// Outbound report topic, `node/<node>`.
    pub fn report_topic(&self) -> Topic {
        self.topic("node/", "")
    }

    /// Secondary result topic, `<node>/results`, when enabled.
    pub fn result_topic(&self) -> Option<Topic> {
        self.result_topic_enabled
            .then(|| self.topic("", "/results"))
    }

    fn topic(&self, prefix: &str, suffix: &str) -> Topic {
        let mut t = Topic::new();
        let _ = write!(t, "{prefix}{}{suffix}", self.node_name);
        t
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    EmptyNodeName,
    FieldTooLong,
    TooManyCandidates,
    /// An entry is missing its separator or a required field.
    MalformedEntry,
    InvalidPort,
    NonPrintableSsid,
    ZeroTick,
    WindowShorterThanTick,
    ZeroCountsPerRevolution,
    ZeroCounterLimit,
    ZeroAttemptCeiling,
}

impl ConfigError {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyNodeName => "node name is empty",
            Self::FieldTooLong => "field exceeds its fixed capacity",
            Self::TooManyCandidates => "too many candidates",
            Self::MalformedEntry => "malformed candidate entry",
            Self::InvalidPort => "invalid port number",
            Self::NonPrintableSsid => "SSID contains non-printable characters",
            Self::ZeroTick => "sampling tick is zero",
            Self::WindowShorterThanTick => "sampling window shorter than one tick",
            Self::ZeroCountsPerRevolution => "counts per revolution is zero",
            Self::ZeroCounterLimit => "counter limit must be positive",
            Self::ZeroAttemptCeiling => "attempt ceiling is zero",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.as_str())
    }
}

impl SystemConfig {
    /// Build the boot configuration: rig defaults plus build-time candidates.
    pub fn from_build_env() -> Self {
        Self {
            rig: RigConfig::default(),
            link: ConnectivityConfig::from_build_env(),
        }
    }

    /// Reject values the scheduler and sequencer cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rig = &self.rig;
        if rig.sample_tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if rig.sample_window_ms < rig.sample_tick_ms {
            return Err(ConfigError::WindowShorterThanTick);
        }
        if rig.counts_per_revolution == 0 {
            return Err(ConfigError::ZeroCountsPerRevolution);
        }
        if rig.counter_limit <= 0 {
            return Err(ConfigError::ZeroCounterLimit);
        }

        let link = &self.link;
        if link.node_name.is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        if link.join_polls_per_network == 0
            || link.broker_attempts_per_candidate == 0
            || link.reconnect_attempt_limit == 0
        {
            return Err(ConfigError::ZeroAttemptCeiling);
        }
        if link.networks.iter().any(|n| !is_printable_ascii(&n.ssid)) {
            return Err(ConfigError::NonPrintableSsid);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build-time variable parsing
// ---------------------------------------------------------------------------

fn bounded<const N: usize>(s: &str) -> Result<String<N>, ConfigError> {
    String::try_from(s).map_err(|()| ConfigError::FieldTooLong)
}

pub fn parse_node_name(raw: &str) -> Result<String<32>, ConfigError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ConfigError::EmptyNodeName);
    }
    bounded(name)
}

/// Parse `ssid:password;ssid2:password2`. The password may contain `:`.
pub fn parse_networks(raw: &str) -> Result<Vec<NetworkCredential, MAX_NETWORKS>, ConfigError> {
    let mut out = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (ssid, password) = entry.split_once(':').ok_or(ConfigError::MalformedEntry)?;
        if ssid.is_empty() {
            return Err(ConfigError::MalformedEntry);
        }
        if !is_printable_ascii(ssid) {
            return Err(ConfigError::NonPrintableSsid);
        }
        let cred = NetworkCredential {
            ssid: bounded(ssid)?,
            password: bounded(password)?,
        };
        out.push(cred).map_err(|_| ConfigError::TooManyCandidates)?;
    }
    Ok(out)
}

/// Parse `host[:port[:user[:password]]];...`.
pub fn parse_brokers(raw: &str) -> Result<Vec<BrokerCandidate, MAX_BROKERS>, ConfigError> {
    let mut out = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let mut fields = entry.splitn(4, ':');
        let host = fields.next().unwrap_or_default();
        if host.is_empty() {
            return Err(ConfigError::MalformedEntry);
        }
        let port = match fields.next() {
            None | Some("") => DEFAULT_MQTT_PORT,
            Some(p) => match p.parse::<u16>() {
                Ok(0) | Err(_) => return Err(ConfigError::InvalidPort),
                Ok(port) => port,
            },
        };
        let username = fields.next().filter(|u| !u.is_empty()).map(bounded).transpose()?;
        let password = fields.next().filter(|p| !p.is_empty()).map(bounded).transpose()?;
        let broker = BrokerCandidate {
            host: bounded(host)?,
            port,
            username,
            password,
        };
        out.push(broker).map_err(|_| ConfigError::TooManyCandidates)?;
    }
    Ok(out)
}
