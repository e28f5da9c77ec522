//! ESP-IDF radio driver.
//!
//! Wraps the ESP-IDF WiFi driver as a [`RadioDriver`]. The station and
//! access point roles map onto the driver mode: `Client`, `AccessPoint` or
//! `Mixed`, with the driver stopped when both roles are off. Switching modes
//! keeps the other role's configuration, so toggling one role leaves the
//! other running.

use super::radio::{
    AccessPointLink, ClientRecord, RadioDriver, RadioError, RadioEvent, ScanRecord, Security,
    StationLink,
};
use crate::config::{AP_IP, AP_MAX_CLIENTS};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi,
};
use esp_idf_sys::{esp, EspError};
use log::{debug, info};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

const CONNECT_POLL: Duration = Duration::from_millis(100);

fn driver(e: EspError) -> RadioError {
    RadioError::Driver(e.to_string())
}

fn security(auth: Option<AuthMethod>) -> Security {
    match auth {
        None | Some(AuthMethod::None) => Security::Open,
        Some(AuthMethod::WEP) => Security::Wep,
        Some(AuthMethod::WPA) | Some(AuthMethod::WPA2Personal) | Some(AuthMethod::WPAWPA2Personal) => {
            Security::Wpa2
        }
        Some(AuthMethod::WPA3Personal) | Some(AuthMethod::WPA2WPA3Personal) => Security::Wpa3,
        Some(_) => Security::Other,
    }
}

/// ESP32 WiFi radio.
pub struct EspRadio<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    station: Option<ClientConfiguration>,
    access_point: Option<AccessPointConfiguration>,
    /// Current association, for link-loss detection.
    linked: Option<(String, Security)>,
    last_client_count: usize,
}

impl<'a> EspRadio<'a> {
    /// Take the modem and create the driver with both roles off.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, RadioError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(driver)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(driver)?;

        Ok(Self {
            wifi,
            station: None,
            access_point: None,
            linked: None,
            last_client_count: 0,
        })
    }

    /// Push the current role set to the driver.
    fn apply(&mut self) -> Result<(), RadioError> {
        let configuration = match (&self.station, &self.access_point) {
            (Some(sta), Some(ap)) => Configuration::Mixed(sta.clone(), ap.clone()),
            (Some(sta), None) => Configuration::Client(sta.clone()),
            (None, Some(ap)) => Configuration::AccessPoint(ap.clone()),
            (None, None) => {
                if self.wifi.is_started().map_err(driver)? {
                    self.wifi.stop().map_err(driver)?;
                }
                debug!("WiFi driver stopped");
                return Ok(());
            }
        };

        self.wifi.set_configuration(&configuration).map_err(driver)?;
        if !self.wifi.is_started().map_err(driver)? {
            self.wifi.start().map_err(driver)?;
        }
        Ok(())
    }

    fn client_list(&self) -> Result<Vec<ClientRecord>, RadioError> {
        let mut list = esp_idf_sys::wifi_sta_list_t::default();
        // SAFETY: `list` is a valid out-parameter for the duration of the call.
        esp!(unsafe { esp_idf_sys::esp_wifi_ap_get_sta_list(&mut list) }).map_err(driver)?;

        let count = usize::try_from(list.num).unwrap_or(0).min(list.sta.len());
        Ok(list.sta[..count]
            .iter()
            .map(|sta| ClientRecord {
                mac: sta.mac,
                rssi: sta.rssi,
            })
            .collect())
    }
}

impl RadioDriver for EspRadio<'_> {
    fn mac_address(&self) -> Result<[u8; 6], RadioError> {
        self.wifi.wifi().sta_netif().get_mac().map_err(driver)
    }

    fn station_activate(&mut self) -> Result<(), RadioError> {
        self.station = Some(ClientConfiguration::default());
        self.apply()
    }

    fn station_deactivate(&mut self) -> Result<(), RadioError> {
        if self.linked.take().is_some() {
            self.wifi.disconnect().map_err(driver)?;
        }
        self.station = None;
        self.apply()
    }

    fn station_connect(
        &mut self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<StationLink, RadioError> {
        if self.station.is_none() {
            return Err(RadioError::NotActive);
        }

        // Auth mode comes from the scan. Open networks join without a password.
        let found = self.wifi.scan().map_err(driver)?;
        let Some(target) = found.into_iter().find(|ap| ap.ssid.as_str() == ssid) else {
            return Err(RadioError::NotFound);
        };
        let security = security(target.auth_method);
        let (auth_method, password) = if security.is_open() {
            (AuthMethod::None, "")
        } else {
            (target.auth_method.unwrap_or(AuthMethod::WPA2Personal), password)
        };
        debug!("Joining {} ({})", ssid, security);

        self.station = Some(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| RadioError::Driver("ssid too long".to_string()))?,
            password: password
                .try_into()
                .map_err(|_| RadioError::Driver("password too long".to_string()))?,
            auth_method,
            ..Default::default()
        });
        self.apply()?;

        self.wifi.wifi_mut().connect().map_err(driver)?;
        let deadline = Instant::now() + timeout;
        while !self.wifi.is_connected().map_err(driver)? {
            if Instant::now() >= deadline {
                let _ = self.wifi.wifi_mut().disconnect();
                return Err(RadioError::Timeout);
            }
            std::thread::sleep(CONNECT_POLL);
        }
        self.wifi.wait_netif_up().map_err(|_| RadioError::Timeout)?;

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info().map_err(driver)?;
        let rssi = self.station_link()?.map_or(0, |link| link.rssi);
        self.linked = Some((ssid.to_string(), security));

        info!("Associated with {}", ssid);
        Ok(StationLink {
            ssid: ssid.to_string(),
            ip: Ipv4Addr::from(ip_info.ip.octets()),
            rssi,
            security,
        })
    }

    fn station_disconnect(&mut self) -> Result<(), RadioError> {
        self.linked = None;
        if self.wifi.is_connected().map_err(driver)? {
            self.wifi.disconnect().map_err(driver)?;
        }
        Ok(())
    }

    fn station_scan(&mut self) -> Result<Vec<ScanRecord>, RadioError> {
        if self.station.is_none() {
            return Err(RadioError::NotActive);
        }
        let found = self.wifi.scan().map_err(driver)?;
        Ok(found
            .into_iter()
            .map(|ap| ScanRecord {
                ssid: ap.ssid.to_string(),
                rssi: ap.signal_strength,
                security: security(ap.auth_method),
            })
            .collect())
    }

    fn station_link(&self) -> Result<Option<StationLink>, RadioError> {
        if !self.wifi.is_connected().map_err(driver)? {
            return Ok(None);
        }
        let mut record = esp_idf_sys::wifi_ap_record_t::default();
        // SAFETY: `record` is a valid out-parameter for the duration of the call.
        esp!(unsafe { esp_idf_sys::esp_wifi_sta_get_ap_info(&mut record) }).map_err(driver)?;
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info().map_err(driver)?;

        let ssid_len = record
            .ssid
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(record.ssid.len());
        let ssid = String::from_utf8_lossy(&record.ssid[..ssid_len]).into_owned();
        let security = match &self.linked {
            Some((linked, security)) if *linked == ssid => *security,
            _ => Security::Other,
        };
        Ok(Some(StationLink {
            ssid,
            ip: Ipv4Addr::from(ip_info.ip.octets()),
            rssi: record.rssi,
            security,
        }))
    }

    fn ap_activate(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        self.access_point = Some(AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| RadioError::Driver("ssid too long".to_string()))?,
            password: password
                .try_into()
                .map_err(|_| RadioError::Driver("password too long".to_string()))?,
            auth_method,
            max_connections: AP_MAX_CLIENTS,
            ..Default::default()
        });
        self.last_client_count = 0;

        if let Err(e) = self.apply() {
            self.access_point = None;
            return Err(e);
        }
        Ok(())
    }

    fn ap_deactivate(&mut self) -> Result<(), RadioError> {
        self.access_point = None;
        self.last_client_count = 0;
        self.apply()
    }

    fn ap_link(&self) -> Result<AccessPointLink, RadioError> {
        if self.access_point.is_none() {
            return Err(RadioError::NotActive);
        }
        Ok(AccessPointLink {
            ip: AP_IP,
            clients: self.client_list()?,
        })
    }

    fn take_events(&mut self) -> Vec<RadioEvent> {
        let mut events = Vec::new();

        if self.linked.is_some() && !self.wifi.is_connected().unwrap_or(false) {
            if let Some((ssid, _)) = self.linked.take() {
                events.push(RadioEvent::StationLost {
                    reason: format!("lost association with {}", ssid),
                });
            }
        }

        if self.access_point.is_some() {
            if let Ok(clients) = self.client_list() {
                if clients.len() != self.last_client_count {
                    self.last_client_count = clients.len();
                    events.push(RadioEvent::ApClientsChanged {
                        count: clients.len(),
                    });
                }
            }
        }

        events
    }
}
