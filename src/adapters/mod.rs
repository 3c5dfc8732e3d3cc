//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                         | Connects to              |
//! |------------|------------------------------------|--------------------------|
//! | `console`  | LinePort                           | Console UART             |
//! | `hardware` | ActuatorPort, EnvironmentPort,     | Rig outputs and sensors  |
//! |            | AccelerometerPort                  |                          |
//! | `log_sink` | StatusSink                         | Serial log output        |
//! | `mqtt`     | BrokerPort                         | ESP-IDF MQTT client      |
//! | `time`     | TimePort                           | ESP32 system timer       |
//! | `wifi`     | NetworkPort                        | ESP-IDF WiFi STA         |

pub mod console;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
