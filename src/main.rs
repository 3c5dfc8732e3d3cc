//! Hammer node firmware — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RigHardware        LogStatusSink   Esp32TimeAdapter           │
//! │  (Actuator+Sensors) (StatusSink)    (TimePort)                 │
//! │  WifiStation        MqttBroker      UartConsole   PcntCounter  │
//! │  (NetworkPort)      (BrokerPort)    (LinePort)    (counter)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐    │
//! │  │ ConnectivityManager      │  │ TestSequencer            │    │
//! │  │ join · reconnect · inbox │  │ raise · sample · report  │    │
//! │  └──────────────────────────┘  └──────────────────────────┘    │
//! │                                                                │
//! │  Context A (core 0)  ·  Context B (core 1)  ·  Supervisor      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, mpsc};

use anyhow::{Context as _, Result, anyhow, ensure};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyInputPin, Pin};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use hammer_node::adapters::console::UartConsole;
use hammer_node::adapters::hardware::RigHardware;
use hammer_node::adapters::log_sink::LogStatusSink;
use hammer_node::adapters::mqtt::MqttBroker;
use hammer_node::adapters::time::Esp32TimeAdapter;
use hammer_node::adapters::wifi::WifiStation;
use hammer_node::app::connectivity::{ConnectivityHandle, ConnectivityManager};
use hammer_node::app::ports::RestartPort;
use hammer_node::app::sequencer::TestSequencer;
use hammer_node::config::SystemConfig;
use hammer_node::drivers::actuator::PulseOutputs;
use hammer_node::drivers::button::DebouncedInputs;
use hammer_node::drivers::encoder::PcntCounter;
use hammer_node::drivers::gpio::{RawInput, RawOutput};
use hammer_node::drivers::hw_init;
use hammer_node::drivers::position::POSITION_LATCH;
use hammer_node::error::Error;
use hammer_node::flags::CommandFlags;
use hammer_node::pins;
use hammer_node::scheduler::{ConnectivityContext, IoContext, spawn_contexts};
use hammer_node::sensors::Unwired;
use hammer_node::supervisor::{ChipRestart, supervise};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Hammer node v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = SystemConfig::from_build_env();
    config
        .validate()
        .map_err(Error::from)
        .context("invalid configuration")?;
    if config.link.networks.is_empty() || config.link.brokers.is_empty() {
        warn!("No WiFi networks or MQTT brokers configured; set HAMMER_* at build time");
    }
    let SystemConfig { rig, link } = config;

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    hw_init::init_peripherals()
        .inspect_err(|e| error!("hw_init: {e}"))
        .map_err(Error::from)?;
    hw_init::init_isr_service(rig.edge_holdoff_ms)
        .inspect_err(|e| error!("hw_init: {e}"))
        .map_err(Error::from)?;

    let encoder_a = AnyInputPin::from(peripherals.pins.gpio17);
    let encoder_b = AnyInputPin::from(peripherals.pins.gpio18);
    ensure!(
        i32::from(encoder_a.pin()) == pins::ENCODER_A_GPIO
            && i32::from(encoder_b.pin()) == pins::ENCODER_B_GPIO,
        "encoder pins out of step with pins.rs"
    );
    let counter = PcntCounter::new(peripherals.pcnt0, encoder_a, encoder_b, rig.counter_limit)?;

    // ── 4. Connectivity bring-up (fatal → restart) ────────────
    let flags = Arc::new(CommandFlags::new());
    let consumer = flags
        .claim_consumer()
        .ok_or_else(|| anyhow!("flag consumer already claimed"))?;

    let mut manager = ConnectivityManager::new(
        link,
        WifiStation::new(peripherals.modem, sysloop, nvs)?,
        MqttBroker::new(),
        Esp32TimeAdapter::new(),
        LogStatusSink::new(),
        Arc::clone(&flags),
    );
    if let Err(fatal) = manager.bring_up() {
        ChipRestart.restart(&fatal);
    }
    let link = ConnectivityHandle::new(manager);

    // ── 5. Rig hardware and sequencer ─────────────────────────
    let time = Esp32TimeAdapter::new();
    let mut sink = LogStatusSink::new();
    let mut hw = RigHardware::new(
        PulseOutputs::new(
            RawOutput::new(pins::ARM_COMMAND_GPIO),
            RawOutput::new(pins::MAGNET_RELAY_GPIO),
        ),
        Unwired,
        Unwired,
    );
    let mut sequencer = TestSequencer::new(rig.clone(), counter);
    if rig.report_acceleration {
        if let Err(e) = sequencer.calibrate(&mut hw, &time, &mut sink) {
            warn!("Calibration failed ({e}); acceleration reported uncorrected");
        }
    }
    let inputs = DebouncedInputs::new(
        RawInput::new(pins::START_BUTTON_GPIO),
        RawInput::new(pins::DROP_BUTTON_GPIO),
        rig.debounce_ms,
        Arc::clone(&flags),
    );

    // ── 6. Contexts + supervisor ──────────────────────────────
    let link_ctx = ConnectivityContext::new(
        link.clone(),
        UartConsole::new(pins::CONSOLE_UART)?,
        flags,
        Esp32TimeAdapter::new(),
        LogStatusSink::new(),
        rig.loop_yield_ms,
    );
    let io_ctx = IoContext::new(
        sequencer,
        inputs,
        hw,
        &POSITION_LATCH,
        time,
        sink,
        link,
        consumer,
        rig.drop_pulse_ms,
        rig.loop_yield_ms,
    );

    let (fatal_tx, fatal_rx) = mpsc::channel();
    spawn_contexts(move || link_ctx.run(), move || io_ctx.run(), &fatal_tx)?;
    drop(fatal_tx);

    info!("Boot complete, supervising");
    supervise(&fatal_rx, &mut ChipRestart);
    Ok(())
}
