//! Wireless configuration.
//!
//! Persisted configuration types, validation rules, NVS key names and
//! runtime options. Everything here is platform independent and host-testable.

mod wifi;

pub use wifi::{
    default_ap_ssid, validate_ap_password, validate_ssid, ConfigError, Credentials, WifiOptions,
    WirelessConfig, AP_IP, AP_MAX_CLIENTS, CONNECTION_TIMEOUT, DEFAULT_AP_SSID_PREFIX,
    KEY_AP_ENABLED, KEY_AP_PASSWORD, KEY_AP_SSID, KEY_STA_ENABLED, KEY_STA_PASSWORD,
    KEY_STA_SSID, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN, NVS_NAMESPACE,
};
