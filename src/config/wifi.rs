//! Wireless configuration data structures.
//!
//! Platform-independent types for the persisted station and access point
//! configuration, plus the validation rules applied before anything reaches
//! the radio or the store.
//!
//! # Example
//!
//! ```
//! use cardputer_wifi::config::{validate_ap_password, ConfigError, WirelessConfig};
//!
//! let config = WirelessConfig::with_default_ap_ssid("Cardputer-1A2B");
//! assert!(!config.has_station_credentials());
//!
//! assert!(validate_ap_password("").is_ok());
//! assert!(validate_ap_password("12345678").is_ok());
//! assert!(matches!(
//!     validate_ap_password("short"),
//!     Err(ConfigError::PasswordTooShort { .. })
//! ));
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default station connection timeout.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed address of the access point interface.
pub const AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Maximum number of stations allowed to join the access point.
pub const AP_MAX_CLIENTS: u16 = 4;

/// Prefix for the device-derived default AP SSID.
pub const DEFAULT_AP_SSID_PREFIX: &str = "Cardputer";

/// NVS namespace for the wireless configuration.
pub const NVS_NAMESPACE: &str = "cardputer_wifi";

/// NVS key: station role enabled.
pub const KEY_STA_ENABLED: &str = "sta_on";
/// NVS key: access point role enabled.
pub const KEY_AP_ENABLED: &str = "ap_on";
/// NVS key: saved station SSID.
pub const KEY_STA_SSID: &str = "sta_ssid";
/// NVS key: saved station password.
pub const KEY_STA_PASSWORD: &str = "sta_password";
/// NVS key: access point SSID.
pub const KEY_AP_SSID: &str = "ap_ssid";
/// NVS key: access point password.
pub const KEY_AP_PASSWORD: &str = "ap_password";

/// Build the device-unique default AP SSID from the radio MAC address.
///
/// Uses the last two MAC bytes, e.g. `Cardputer-1A2B`.
pub fn default_ap_ssid(prefix: &str, mac: [u8; 6]) -> String {
    format!("{}-{:02X}{:02X}", prefix, mac[4], mac[5])
}

/// Validate an SSID for either role.
pub fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    Ok(())
}

/// Validate an access point password.
///
/// Empty means an open AP. Anything else must be usable for WPA2.
pub fn validate_ap_password(password: &str) -> Result<(), ConfigError> {
    if !password.is_empty() && password.len() < MIN_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooShort {
            len: password.len(),
            min: MIN_PASSWORD_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Durable wireless configuration.
///
/// One instance lives in the `cardputer_wifi` namespace. The two enable flags
/// are independent; either role may be on without the other.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WirelessConfig {
    /// Station role was last commanded on.
    pub sta_enabled: bool,
    /// Access point role was last commanded on.
    pub ap_enabled: bool,
    /// Saved station network, empty when none.
    pub sta_ssid: String,
    /// Saved station password, empty for open networks.
    pub sta_password: String,
    /// Access point SSID.
    pub ap_ssid: String,
    /// Access point password, empty for an open AP.
    pub ap_password: String,
}

impl WirelessConfig {
    /// First-boot configuration: both roles off, no saved network, open AP.
    pub fn with_default_ap_ssid(ap_ssid: impl Into<String>) -> Self {
        Self {
            sta_enabled: false,
            ap_enabled: false,
            sta_ssid: String::new(),
            sta_password: String::new(),
            ap_ssid: ap_ssid.into(),
            ap_password: String::new(),
        }
    }

    /// Check whether a station network has been saved.
    pub fn has_station_credentials(&self) -> bool {
        !self.sta_ssid.is_empty()
    }

    /// Check whether the access point runs without a password.
    pub fn ap_is_open(&self) -> bool {
        self.ap_password.is_empty()
    }

    /// Drop the saved station network.
    pub fn clear_station_credentials(&mut self) {
        self.sta_ssid.zeroize();
        self.sta_password.zeroize();
    }
}

impl fmt::Debug for WirelessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WirelessConfig")
            .field("sta_enabled", &self.sta_enabled)
            .field("ap_enabled", &self.ap_enabled)
            .field("sta_ssid", &self.sta_ssid)
            .field("sta_password", &"<redacted>")
            .field("ap_ssid", &self.ap_ssid)
            .field("ap_password", &"<redacted>")
            .finish()
    }
}

/// A saved SSID and password, e.g. for prefilling a settings editor.
///
/// The password is wiped when the value is dropped and never printed by
/// `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    /// Check whether no password is set.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// The password as a row of `*`, one per character.
    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime tuning for the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiOptions {
    /// How long a station connect may block before failing with a timeout.
    pub connect_timeout: Duration,
    /// Prefix of the device-derived default AP SSID.
    pub ap_ssid_prefix: String,
}

impl WifiOptions {
    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the default AP SSID prefix.
    pub fn with_ap_ssid_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ap_ssid_prefix = prefix.into();
        self
    }
}

impl Default for WifiOptions {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECTION_TIMEOUT,
            ap_ssid_prefix: DEFAULT_AP_SSID_PREFIX.to_string(),
        }
    }
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Credentials Tests ====================

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials {
            ssid: "HomeNet".into(),
            password: "pw123456".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("HomeNet"));
        assert!(!printed.contains("pw123456"));
        assert_eq!(credentials.masked_password(), "********");
        assert!(!credentials.is_open());
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_empty_ssid() {
        assert_eq!(validate_ssid(""), Err(ConfigError::SsidEmpty));
    }

    #[test]
    fn test_ssid_too_long() {
        let long_ssid = "a".repeat(33);
        assert!(matches!(
            validate_ssid(&long_ssid),
            Err(ConfigError::SsidTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_ssid_max_length() {
        assert!(validate_ssid(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_ap_password_lengths() {
        for len in 0..=70 {
            let password = "x".repeat(len);
            let valid = len == 0 || (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len);
            assert_eq!(
                validate_ap_password(&password).is_ok(),
                valid,
                "length {}",
                len
            );
        }
    }

    #[test]
    fn test_password_too_short_reports_length() {
        assert_eq!(
            validate_ap_password("1234567"),
            Err(ConfigError::PasswordTooShort { len: 7, min: 8 })
        );
    }

    // ==================== WirelessConfig Tests ====================

    #[test]
    fn test_default_config() {
        let config = WirelessConfig::with_default_ap_ssid("Cardputer-0001");
        assert!(!config.sta_enabled);
        assert!(!config.ap_enabled);
        assert!(!config.has_station_credentials());
        assert!(config.ap_is_open());
        assert_eq!(config.ap_ssid, "Cardputer-0001");
    }

    #[test]
    fn test_default_ap_ssid_from_mac() {
        let mac = [0x24, 0x0a, 0xc4, 0x00, 0x1a, 0x2b];
        assert_eq!(default_ap_ssid("Cardputer", mac), "Cardputer-1A2B");
    }

    #[test]
    fn test_clear_station_credentials() {
        let mut config = WirelessConfig::with_default_ap_ssid("ap");
        config.sta_ssid = "HomeNet".into();
        config.sta_password = "pw123456".into();
        config.clear_station_credentials();
        assert!(!config.has_station_credentials());
        assert!(config.sta_password.is_empty());
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let mut config = WirelessConfig::with_default_ap_ssid("ap");
        config.sta_password = "hunter22".into();
        config.ap_password = "secret99".into();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter22"));
        assert!(!debug.contains("secret99"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_options_builder() {
        let options = WifiOptions::default()
            .with_connect_timeout(Duration::from_millis(250))
            .with_ap_ssid_prefix("Badge");
        assert_eq!(options.connect_timeout, Duration::from_millis(250));
        assert_eq!(options.ap_ssid_prefix, "Badge");
    }
}
