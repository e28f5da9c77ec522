//! Wireless interface management.
//!
//! # Components
//!
//! - [`WifiManager`] - station + access point state machines and persistence
//! - [`RadioDriver`] - the radio facade the manager drives
//! - [`SimulatedRadio`] - scripted radio for host builds and tests
//! - `EspRadio` - ESP-IDF WiFi driver (ESP32 only)
//!
//! Configuration types (SSID and password rules, NVS keys) live in
//! [`crate::config`]; storage backends live in [`crate::store`].

#[cfg(feature = "esp32")]
mod connection;
mod error;
mod manager;
mod radio;
mod sim;
mod status;

#[cfg(feature = "esp32")]
pub use connection::EspRadio;
pub use error::WifiError;
pub use manager::{WifiManager, CONFIG_UNAVAILABLE};
pub use radio::{
    AccessPointLink, ClientRecord, RadioDriver, RadioError, RadioEvent, ScanRecord, Security,
    StationLink,
};
pub use sim::{ConnectGate, SimNetwork, SimulatedRadio, SIM_MAC};
pub use status::{
    signal_bars, AccessPointInfo, AccessPointStatus, ApSummary, ScanEntry, ScanResults,
    StationConnection, StationStatus, WifiStatus,
};
