//! Radio driver facade.
//!
//! One physical radio exposed as two independently activatable roles.
//! Implementations guarantee that activating or deactivating one role never
//! changes whether the other role is active; the manager relies on that and
//! does not arbitrate radio sharing itself.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Security mode advertised by a scanned network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Security {
    /// No authentication.
    Open,
    /// Legacy WEP.
    Wep,
    /// WPA/WPA2 personal.
    Wpa2,
    /// WPA3 personal (or WPA2/WPA3 transition).
    Wpa3,
    /// Enterprise or anything the driver does not classify.
    Other,
}

impl Security {
    /// Whether joining requires no password.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Short label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Wep => "WEP",
            Self::Wpa2 => "WPA2",
            Self::Wpa3 => "WPA3",
            Self::Other => "secured",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network seen by a station scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub ssid: String,
    /// Received signal strength in dBm.
    pub rssi: i8,
    pub security: Security,
}

/// Current station association, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationLink {
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub rssi: i8,
    /// Security of the joined network.
    pub security: Security,
}

/// A station attached to our access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRecord {
    pub mac: [u8; 6],
    pub rssi: i8,
}

impl ClientRecord {
    /// MAC address as lowercase colon-separated hex.
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Access point state, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointLink {
    pub ip: Ipv4Addr,
    pub clients: Vec<ClientRecord>,
}

/// Unsolicited changes reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// The station association dropped without being asked to.
    StationLost { reason: String },
    /// The number of attached AP clients changed.
    ApClientsChanged { count: usize },
}

/// Radio facade used by the manager.
///
/// All calls block until the hardware operation resolves. `station_connect`
/// must give up after `timeout` and report [`RadioError::Timeout`].
pub trait RadioDriver {
    /// Factory MAC address, used to derive the default AP SSID.
    fn mac_address(&self) -> Result<[u8; 6], RadioError>;

    /// Power up the station role.
    fn station_activate(&mut self) -> Result<(), RadioError>;

    /// Power down the station role.
    fn station_deactivate(&mut self) -> Result<(), RadioError>;

    /// Join a network.
    ///
    /// The driver looks up the network's security itself: for an open
    /// network any password is ignored, and the returned link reports
    /// [`Security::Open`].
    fn station_connect(
        &mut self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<StationLink, RadioError>;

    /// Leave the current network. Not an error when not associated.
    fn station_disconnect(&mut self) -> Result<(), RadioError>;

    /// Scan for networks. Requires the station role to be active.
    fn station_scan(&mut self) -> Result<Vec<ScanRecord>, RadioError>;

    /// Current association, `None` when not connected.
    fn station_link(&self) -> Result<Option<StationLink>, RadioError>;

    /// Start (or restart) the access point. An empty password means open.
    fn ap_activate(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// Stop the access point. Attached clients are dropped.
    fn ap_deactivate(&mut self) -> Result<(), RadioError>;

    /// Access point address and currently attached clients.
    fn ap_link(&self) -> Result<AccessPointLink, RadioError>;

    /// Drain unsolicited events observed since the last call.
    fn take_events(&mut self) -> Vec<RadioEvent> {
        Vec::new()
    }
}

/// Errors reported by a [`RadioDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The operation did not finish before its deadline.
    Timeout,
    /// The network rejected our credentials.
    AuthRejected,
    /// The requested network is not in range.
    NotFound,
    /// The role needed for the operation is not active.
    NotActive,
    /// Any other driver failure.
    Driver(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::AuthRejected => write!(f, "authentication rejected"),
            Self::NotFound => write!(f, "network not found"),
            Self::NotActive => write!(f, "interface not active"),
            Self::Driver(msg) => write!(f, "driver error: {}", msg),
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_string() {
        let client = ClientRecord {
            mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x0a],
            rssi: -40,
        };
        assert_eq!(client.mac_string(), "de:ad:be:ef:00:0a");
    }

    #[test]
    fn test_security_labels() {
        assert!(Security::Open.is_open());
        assert!(!Security::Wpa2.is_open());
        assert_eq!(Security::Wpa3.to_string(), "WPA3");
    }
}
