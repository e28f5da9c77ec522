//! Cardputer wireless interface manager.
//!
//! Manages the station and access point roles of the Cardputer's single
//! radio as two independent state machines, persists the desired state of
//! each role, and restores it at boot.
//!
//! Everything except the ESP-IDF backends (`EspRadio`, `NvsStore`) is
//! platform-independent and tested on the host against [`SimulatedRadio`]
//! and [`MemoryStore`].

pub mod config;
pub mod console;
pub mod store;
pub mod wifi;

// Re-export commonly used items
pub use config::{ConfigError, Credentials, WifiOptions, WirelessConfig};
pub use console::{execute, ConsoleCommand};
pub use store::{ConfigStore, MemoryStore, StoreError};
pub use wifi::{
    AccessPointStatus, RadioDriver, SimulatedRadio, StationStatus, WifiError, WifiManager,
    WifiStatus,
};
