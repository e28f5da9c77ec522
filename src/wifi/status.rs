//! Interface status model.
//!
//! The station and access point roles are two independent state machines
//! held side by side in [`WifiStatus`]. Statuses are derived at runtime and
//! never persisted.

use super::radio::{ScanRecord, Security};
use std::fmt;
use std::net::Ipv4Addr;

/// Map a signal strength to 1-4 display bars.
pub fn signal_bars(rssi: i8) -> u8 {
    if rssi > -50 {
        4
    } else if rssi > -60 {
        3
    } else if rssi > -70 {
        2
    } else {
        1
    }
}

/// Station role status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StationStatus {
    /// Radio role off.
    #[default]
    Disabled,
    /// Role is being powered up.
    Enabling,
    /// Role on, not associated and never asked to connect.
    Idle,
    /// A scan is running.
    Scanning,
    /// Joining `ssid`.
    Connecting { ssid: String },
    /// Associated with an address.
    Connected { ssid: String, ip: Ipv4Addr, rssi: i8 },
    /// Role on, association ended.
    Disconnected,
    /// Last operation failed.
    Failed { reason: String },
}

impl StationStatus {
    /// Check if associated with a network.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabling => write!(f, "enabling"),
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Connecting { ssid } => write!(f, "connecting to {}", ssid),
            Self::Connected { ssid, ip, rssi } => write!(
                f,
                "connected to {} ({}, {} bars)",
                ssid,
                ip,
                signal_bars(*rssi)
            ),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Access point role status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessPointStatus {
    /// Radio role off.
    #[default]
    Disabled,
    /// Access point is starting.
    Enabling,
    /// Broadcasting `ssid`.
    Active {
        ssid: String,
        ip: Ipv4Addr,
        client_count: usize,
    },
    /// Last operation failed; the role is off.
    ///
    /// Stays until the next access point command. There is no automatic
    /// move to `Disabled`, so the reason remains visible.
    Failed { reason: String },
}

impl AccessPointStatus {
    /// Check if the access point is up.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

impl fmt::Display for AccessPointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabling => write!(f, "enabling"),
            Self::Active {
                ssid,
                ip,
                client_count,
            } => write!(f, "active {} ({}, {} clients)", ssid, ip, client_count),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Snapshot of both roles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiStatus {
    pub station: StationStatus,
    pub access_point: AccessPointStatus,
}

/// Result of a successful station connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConnection {
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub rssi: i8,
}

/// Result of a successful access point start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointInfo {
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub open: bool,
}

/// Saved access point settings, safe to show on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApSummary {
    pub ssid: String,
    pub open: bool,
}

/// One scanned network, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i8,
    /// 1-4.
    pub bars: u8,
    pub security: Security,
}

impl From<ScanRecord> for ScanEntry {
    fn from(record: ScanRecord) -> Self {
        Self {
            bars: signal_bars(record.rssi),
            ssid: record.ssid,
            rssi: record.rssi,
            security: record.security,
        }
    }
}

/// Snapshot of one scan, strongest network first.
///
/// Consumed once; a new scan is needed for fresh results.
#[derive(Debug)]
pub struct ScanResults {
    records: std::vec::IntoIter<ScanRecord>,
}

impl ScanResults {
    pub(crate) fn new(mut records: Vec<ScanRecord>) -> Self {
        records.retain(|r| !r.ssid.is_empty());
        records.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        Self {
            records: records.into_iter(),
        }
    }
}

impl Iterator for ScanResults {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(ScanEntry::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for ScanResults {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bar_thresholds() {
        assert_eq!(signal_bars(-30), 4);
        assert_eq!(signal_bars(-49), 4);
        assert_eq!(signal_bars(-50), 3);
        assert_eq!(signal_bars(-59), 3);
        assert_eq!(signal_bars(-60), 2);
        assert_eq!(signal_bars(-69), 2);
        assert_eq!(signal_bars(-70), 1);
        assert_eq!(signal_bars(-95), 1);
    }

    #[test]
    fn test_scan_results_sorted_and_filtered() {
        let records = vec![
            ScanRecord {
                ssid: "Weak".into(),
                rssi: -80,
                security: Security::Wpa2,
            },
            ScanRecord {
                ssid: String::new(),
                rssi: -20,
                security: Security::Open,
            },
            ScanRecord {
                ssid: "Strong".into(),
                rssi: -45,
                security: Security::Open,
            },
        ];
        let results = ScanResults::new(records);
        assert_eq!(results.len(), 2);
        let entries: Vec<_> = results.collect();
        assert_eq!(entries[0].ssid, "Strong");
        assert_eq!(entries[0].bars, 4);
        assert_eq!(entries[1].ssid, "Weak");
        assert_eq!(entries[1].bars, 1);
    }

    #[test]
    fn test_status_display() {
        let status = StationStatus::Connected {
            ssid: "HomeNet".into(),
            ip: Ipv4Addr::new(192, 168, 1, 20),
            rssi: -55,
        };
        assert_eq!(status.to_string(), "connected to HomeNet (192.168.1.20, 3 bars)");
        assert_eq!(
            StationStatus::Failed {
                reason: "auth failed".into()
            }
            .to_string(),
            "failed: auth failed"
        );
        assert_eq!(
            AccessPointStatus::Active {
                ssid: "Cardputer-AP".into(),
                ip: Ipv4Addr::new(192, 168, 4, 1),
                client_count: 2,
            }
            .to_string(),
            "active Cardputer-AP (192.168.4.1, 2 clients)"
        );
    }

    #[test]
    fn test_default_is_disabled() {
        let status = WifiStatus::default();
        assert_eq!(status.station, StationStatus::Disabled);
        assert_eq!(status.access_point, AccessPointStatus::Disabled);
    }
}
