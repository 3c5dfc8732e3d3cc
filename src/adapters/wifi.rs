//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`], the hexagonal boundary for network
//! association.  Join policy (which credential, how many polls) lives in
//! the connectivity manager; this adapter only starts a join and reports
//! whether the station is associated with an IP.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulation stub that associates immediately.

#[cfg(not(target_os = "espidf"))]
use log::info;

#[cfg(not(target_os = "espidf"))]
use crate::app::ports::NetworkPort;
use crate::config::NetworkCredential;
use crate::error::CommsError;

use super::utils::is_printable_ascii;

/// WPA2 needs 8-64 bytes; empty means an open network.
fn validate(credential: &NetworkCredential) -> Result<(), CommsError> {
    let ssid = credential.ssid.as_str();
    if ssid.is_empty() || !is_printable_ascii(ssid) {
        return Err(CommsError::InvalidCredential);
    }
    let pw_len = credential.password.len();
    if pw_len != 0 && pw_len < 8 {
        return Err(CommsError::InvalidCredential);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::WifiStation;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::EspError;
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use super::validate;
    use crate::app::ports::NetworkPort;
    use crate::config::NetworkCredential;
    use crate::error::CommsError;

    pub struct WifiStation {
        wifi: EspWifi<'static>,
    }

    impl WifiStation {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: Option<EspDefaultNvsPartition>,
        ) -> Result<Self, EspError> {
            let wifi = EspWifi::new(modem, sysloop, nvs)?;
            Ok(Self { wifi })
        }
    }

    impl NetworkPort for WifiStation {
        fn begin(&mut self, credential: &NetworkCredential) -> Result<(), CommsError> {
            validate(credential)?;

            if self.wifi.is_connected().unwrap_or(false) {
                let _ = self.wifi.disconnect();
            }

            let auth_method = if credential.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let config = Configuration::Client(ClientConfiguration {
                ssid: credential
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|()| CommsError::InvalidCredential)?,
                password: credential
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|()| CommsError::InvalidCredential)?,
                auth_method,
                ..Default::default()
            });

            let started = self.wifi.is_started().unwrap_or(false);
            let result = self
                .wifi
                .set_configuration(&config)
                .and_then(|()| if started { Ok(()) } else { self.wifi.start() })
                .and_then(|()| self.wifi.connect());
            match result {
                Ok(()) => {
                    info!("WiFi: join started for '{}'", credential.ssid);
                    Ok(())
                }
                Err(e) => {
                    warn!("WiFi: join request failed: {e}");
                    Err(CommsError::WifiJoinFailed)
                }
            }
        }

        fn is_joined(&self) -> bool {
            self.wifi.is_connected().unwrap_or(false)
                && self.wifi.sta_netif().is_up().unwrap_or(false)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Simulation station: every valid credential associates on the first poll.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct WifiStation {
    joined: Option<heapless::String<32>>,
}

#[cfg(not(target_os = "espidf"))]
impl WifiStation {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_os = "espidf"))]
impl NetworkPort for WifiStation {
    fn begin(&mut self, credential: &NetworkCredential) -> Result<(), CommsError> {
        validate(credential)?;
        info!("WiFi(sim): associated with '{}'", credential.ssid);
        self.joined = Some(credential.ssid.clone());
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.joined.is_some()
    }
}
