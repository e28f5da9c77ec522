//! Persistent configuration store.
//!
//! The manager talks to durable storage through [`ConfigStore`], a namespaced
//! typed key-value store with an explicit commit step. Values written with
//! `set_*` or `remove` are staged; only [`ConfigStore::commit`] makes them
//! durable, so a reset between a write and its commit leaves the previous
//! values intact.
//!
//! # Backends
//!
//! - [`MemoryStore`] - in-memory store with fault injection (tests, demos)
//! - [`FileStore`] - JSON file on the host filesystem (host only)
//! - [`NvsStore`] - ESP32 Non-Volatile Storage (ESP32 only)
//!
//! The role loaders ([`load_station`], [`load_access_point`]) read each
//! role's keys independently so a corrupt value for one role never prevents
//! restoring the other.

use crate::config::{
    WirelessConfig, KEY_AP_ENABLED, KEY_AP_PASSWORD, KEY_AP_SSID, KEY_STA_ENABLED,
    KEY_STA_PASSWORD, KEY_STA_SSID,
};
use std::fmt;

mod memory;
pub use memory::MemoryStore;

#[cfg(not(feature = "esp32"))]
mod file;
#[cfg(not(feature = "esp32"))]
pub use file::FileStore;

#[cfg(feature = "esp32")]
mod nvs;
#[cfg(feature = "esp32")]
pub use nvs::NvsStore;

/// Namespaced key-value store with explicit commit.
pub trait ConfigStore {
    /// Read a boolean. `Ok(None)` means the key is absent.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError>;

    /// Read a string. `Ok(None)` means the key is absent.
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stage a boolean write.
    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), StoreError>;

    /// Stage a string write.
    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Stage removal of a key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Make all staged writes durable.
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// Load the station role's keys into `config`.
///
/// `config` is only modified when every key was read successfully.
pub fn load_station<S: ConfigStore + ?Sized>(
    store: &S,
    config: &mut WirelessConfig,
) -> Result<(), StoreError> {
    let enabled = store.get_bool(KEY_STA_ENABLED)?.unwrap_or(false);
    let ssid = store.get_str(KEY_STA_SSID)?.unwrap_or_default();
    let password = store.get_str(KEY_STA_PASSWORD)?.unwrap_or_default();

    config.sta_enabled = enabled;
    config.sta_ssid = ssid;
    config.sta_password = password;
    Ok(())
}

/// Load the access point role's keys into `config`.
///
/// An absent SSID keeps whatever default `config` already carries; a stored
/// empty SSID is kept as empty.
pub fn load_access_point<S: ConfigStore + ?Sized>(
    store: &S,
    config: &mut WirelessConfig,
) -> Result<(), StoreError> {
    let enabled = store.get_bool(KEY_AP_ENABLED)?.unwrap_or(false);
    let ssid = store.get_str(KEY_AP_SSID)?;
    let password = store.get_str(KEY_AP_PASSWORD)?.unwrap_or_default();

    config.ap_enabled = enabled;
    if let Some(ssid) = ssid {
        config.ap_ssid = ssid;
    }
    config.ap_password = password;
    Ok(())
}

/// Roles covered by a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    pub station: bool,
    pub access_point: bool,
}

impl Roles {
    pub const BOTH: Roles = Roles {
        station: true,
        access_point: true,
    };

    /// Roles whose persisted keys differ between two configurations.
    pub fn changed(before: &WirelessConfig, after: &WirelessConfig) -> Self {
        Self {
            station: before.sta_enabled != after.sta_enabled
                || before.sta_ssid != after.sta_ssid
                || before.sta_password != after.sta_password,
            access_point: before.ap_enabled != after.ap_enabled
                || before.ap_ssid != after.ap_ssid
                || before.ap_password != after.ap_password,
        }
    }

    pub fn any(&self) -> bool {
        self.station || self.access_point
    }

    pub fn union(self, other: Roles) -> Self {
        Self {
            station: self.station || other.station,
            access_point: self.access_point || other.access_point,
        }
    }
}

/// Stage the station role's keys.
///
/// Backends that apply staged keys one at a time (NVS) do so in staging
/// order. The SSID is dropped first and written last, so a reset partway
/// through leaves either the old network or no network, never a new
/// password paired with the old SSID. Empty credentials are removed rather
/// than stored as empty strings.
fn stage_station<S: ConfigStore + ?Sized>(
    store: &mut S,
    config: &WirelessConfig,
) -> Result<(), StoreError> {
    store.set_bool(KEY_STA_ENABLED, config.sta_enabled)?;
    store.remove(KEY_STA_SSID)?;
    if config.has_station_credentials() {
        store.set_str(KEY_STA_PASSWORD, &config.sta_password)?;
        store.set_str(KEY_STA_SSID, &config.sta_ssid)?;
    } else {
        store.remove(KEY_STA_PASSWORD)?;
    }
    Ok(())
}

/// Stage the access point role's keys, password before SSID.
fn stage_access_point<S: ConfigStore + ?Sized>(
    store: &mut S,
    config: &WirelessConfig,
) -> Result<(), StoreError> {
    store.set_bool(KEY_AP_ENABLED, config.ap_enabled)?;
    store.set_str(KEY_AP_PASSWORD, &config.ap_password)?;
    store.set_str(KEY_AP_SSID, &config.ap_ssid)?;
    Ok(())
}

/// Write the keys of `roles` and commit them.
///
/// Keys of roles left out are not touched, so a role whose stored values
/// could not be read survives writes made on behalf of the other role.
pub fn save_roles<S: ConfigStore + ?Sized>(
    store: &mut S,
    config: &WirelessConfig,
    roles: Roles,
) -> Result<(), StoreError> {
    if roles.station {
        stage_station(store, config)?;
    }
    if roles.access_point {
        stage_access_point(store, config)?;
    }

    store.commit()?;
    log::debug!(
        "Wireless config committed: sta={} ({}), ap={} ({})",
        config.sta_enabled,
        if roles.station { "written" } else { "kept" },
        config.ap_enabled,
        if roles.access_point { "written" } else { "kept" },
    );
    Ok(())
}

/// Write the full configuration and commit it.
pub fn save_config<S: ConfigStore + ?Sized>(
    store: &mut S,
    config: &WirelessConfig,
) -> Result<(), StoreError> {
    save_roles(store, config, Roles::BOTH)
}

/// Errors reported by a [`ConfigStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The namespace could not be opened.
    Unavailable(String),
    /// A key could not be read (corrupt entry, I/O error).
    Read { key: String, reason: String },
    /// A key holds a value of a different type.
    TypeMismatch { key: String },
    /// A write could not be staged.
    Write { key: String, reason: String },
    /// Staged writes could not be made durable (e.g. storage full).
    Commit(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "store unavailable: {}", reason),
            Self::Read { key, reason } => write!(f, "failed to read {}: {}", key, reason),
            Self::TypeMismatch { key } => write!(f, "unexpected type for {}", key),
            Self::Write { key, reason } => write!(f, "failed to write {}: {}", key, reason),
            Self::Commit(reason) => write!(f, "commit failed: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> WirelessConfig {
        WirelessConfig::with_default_ap_ssid("Cardputer-0001")
    }

    #[test]
    fn test_load_from_empty_store_keeps_defaults() {
        let store = MemoryStore::new();
        let mut config = defaults();
        load_station(&store, &mut config).unwrap();
        load_access_point(&store, &mut config).unwrap();
        assert_eq!(config, defaults());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let mut config = defaults();
        config.sta_enabled = true;
        config.sta_ssid = "HomeNet".into();
        config.sta_password = "pw123456".into();
        config.ap_enabled = true;
        config.ap_ssid = "Cardputer-AP".into();
        save_config(&mut store, &config).unwrap();

        let mut loaded = defaults();
        load_station(&store, &mut loaded).unwrap();
        load_access_point(&store, &mut loaded).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_stored_empty_ap_ssid_is_kept() {
        let mut store = MemoryStore::new();
        store.set_str(KEY_AP_SSID, "").unwrap();
        store.commit().unwrap();

        let mut config = defaults();
        load_access_point(&store, &mut config).unwrap();
        assert!(config.ap_ssid.is_empty());
    }

    #[test]
    fn test_empty_station_credentials_are_removed() {
        let mut store = MemoryStore::new();
        let mut config = defaults();
        config.sta_ssid = "HomeNet".into();
        save_config(&mut store, &config).unwrap();
        assert_eq!(store.durable_str(KEY_STA_SSID), Some("HomeNet".to_string()));

        config.clear_station_credentials();
        save_config(&mut store, &config).unwrap();
        assert_eq!(store.durable_str(KEY_STA_SSID), None);
        assert_eq!(store.durable_str(KEY_STA_PASSWORD), None);
    }

    #[test]
    fn test_station_read_failure_leaves_config_untouched() {
        let mut store = MemoryStore::new();
        store.set_str(KEY_STA_SSID, "HomeNet").unwrap();
        store.set_bool(KEY_STA_ENABLED, true).unwrap();
        store.commit().unwrap();
        store.fail_reads(KEY_STA_PASSWORD);

        let mut config = defaults();
        assert!(load_station(&store, &mut config).is_err());
        assert_eq!(config, defaults());
        assert!(load_access_point(&store, &mut config).is_ok());
    }

    #[test]
    fn test_save_roles_leaves_other_role_untouched() {
        let mut store = MemoryStore::new();
        let mut config = defaults();
        config.sta_enabled = true;
        config.sta_ssid = "HomeNet".into();
        config.sta_password = "pw123456".into();
        save_config(&mut store, &config).unwrap();

        let mut ap_only = defaults();
        ap_only.ap_enabled = true;
        ap_only.ap_ssid = "Cardputer-AP".into();
        let roles = Roles::changed(&defaults(), &ap_only);
        assert_eq!(
            roles,
            Roles {
                station: false,
                access_point: true
            }
        );
        save_roles(&mut store, &ap_only, roles).unwrap();

        assert_eq!(store.durable_bool(KEY_STA_ENABLED), Some(true));
        assert_eq!(store.durable_str(KEY_STA_SSID), Some("HomeNet".to_string()));
        assert_eq!(store.durable_bool(KEY_AP_ENABLED), Some(true));
        assert_eq!(store.durable_str(KEY_AP_SSID), Some("Cardputer-AP".to_string()));
    }

    /// Records staged operations in order.
    #[derive(Default)]
    struct Recorder {
        ops: Vec<String>,
    }

    impl ConfigStore for Recorder {
        fn get_bool(&self, _key: &str) -> Result<Option<bool>, StoreError> {
            Ok(None)
        }

        fn get_str(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set_bool(&mut self, key: &str, _value: bool) -> Result<(), StoreError> {
            self.ops.push(format!("set {}", key));
            Ok(())
        }

        fn set_str(&mut self, key: &str, _value: &str) -> Result<(), StoreError> {
            self.ops.push(format!("set {}", key));
            Ok(())
        }

        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            self.ops.push(format!("remove {}", key));
            Ok(())
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.ops.push("commit".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_station_ssid_dropped_first_and_written_last() {
        let mut store = Recorder::default();
        let mut config = defaults();
        config.sta_ssid = "HomeNet".into();
        config.sta_password = "pw123456".into();
        save_roles(
            &mut store,
            &config,
            Roles {
                station: true,
                access_point: false,
            },
        )
        .unwrap();

        assert_eq!(
            store.ops,
            vec![
                "set sta_on",
                "remove sta_ssid",
                "set sta_password",
                "set sta_ssid",
                "commit",
            ]
        );
    }

    #[test]
    fn test_roles_changed() {
        let base = defaults();
        assert!(!Roles::changed(&base, &base).any());

        let mut other = base.clone();
        other.sta_password = "new-pass".into();
        assert_eq!(
            Roles::changed(&base, &other),
            Roles {
                station: true,
                access_point: false
            }
        );
        assert_eq!(Roles::changed(&base, &other).union(Roles::BOTH), Roles::BOTH);
    }

    #[test]
    fn test_commit_failure_surfaces() {
        let mut store = MemoryStore::new();
        store.fail_commits(true);
        let result = save_config(&mut store, &defaults());
        assert!(matches!(result, Err(StoreError::Commit(_))));
        assert_eq!(store.durable_bool(KEY_STA_ENABLED), None);
    }
}
