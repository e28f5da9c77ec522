//! Wireless interface manager.
//!
//! Owns the desired and actual state of the station and access point roles,
//! drives the radio facade, and persists every successful user-driven change.
//!
//! # Concurrency
//!
//! Commands take `&self` so the manager can be shared with a UI thread, but
//! only one command runs at a time: a command issued while another is in
//! flight fails immediately with [`WifiError::RadioBusy`]. Status lives
//! behind its own lock, so [`WifiManager::status`] returns intermediate states
//! such as `Connecting` while a command is blocked on the radio.
//!
//! Lock order: hardware, then shared state. `status()` only takes the latter.
//!
//! # Example
//!
//! ```
//! use cardputer_wifi::config::WifiOptions;
//! use cardputer_wifi::store::MemoryStore;
//! use cardputer_wifi::wifi::{SimNetwork, SimulatedRadio, StationStatus, WifiManager};
//!
//! let radio = SimulatedRadio::with_networks(vec![SimNetwork::secured("HomeNet", "pw123456", -48)]);
//! let manager = WifiManager::new(radio, MemoryStore::new(), WifiOptions::default());
//! manager.restore().unwrap();
//!
//! manager.sta_enable().unwrap();
//! let connection = manager.sta_connect("HomeNet", "pw123456").unwrap();
//! assert_eq!(connection.ssid, "HomeNet");
//! assert!(manager.status().station.is_connected());
//! ```

use super::error::WifiError;
use super::radio::{ClientRecord, RadioDriver, RadioEvent};
use super::status::{
    AccessPointInfo, AccessPointStatus, ApSummary, ScanResults, StationConnection, StationStatus,
    WifiStatus,
};
use crate::config::{
    default_ap_ssid, validate_ap_password, validate_ssid, Credentials, WifiOptions,
    WirelessConfig, AP_IP,
};
use crate::store::{load_access_point, load_station, save_roles, ConfigStore, Roles};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Failure reason shown when a role's stored config cannot be read at boot.
pub const CONFIG_UNAVAILABLE: &str = "config unavailable";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Radio and store, touched only by the command in flight.
struct Hardware<R, S> {
    radio: R,
    store: S,
    sta_active: bool,
    /// SSID and password the AP is running with.
    ap_running: Option<(String, String)>,
    /// Roles whose last change did not make it to durable storage.
    unsaved: Roles,
}

/// State readable by anyone at any time.
struct Shared {
    status: WifiStatus,
    config: WirelessConfig,
}

/// Clears the pending flag when a command finishes.
struct CommandGuard<'a> {
    pending: &'a AtomicBool,
}

impl Drop for CommandGuard<'_> {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Station + access point manager over one radio.
pub struct WifiManager<R, S> {
    hardware: Mutex<Hardware<R, S>>,
    shared: Mutex<Shared>,
    pending: AtomicBool,
    restored: AtomicBool,
    options: WifiOptions,
}

impl<R: RadioDriver, S: ConfigStore> WifiManager<R, S> {
    /// Create a manager with both roles disabled.
    ///
    /// Nothing is read from the store until [`restore`](Self::restore).
    pub fn new(radio: R, store: S, options: WifiOptions) -> Self {
        let ap_ssid = match radio.mac_address() {
            Ok(mac) => default_ap_ssid(&options.ap_ssid_prefix, mac),
            Err(e) => {
                warn!("Could not read radio MAC ({}), using generic AP name", e);
                format!("{}-AP", options.ap_ssid_prefix)
            }
        };

        Self {
            hardware: Mutex::new(Hardware {
                radio,
                store,
                sta_active: false,
                ap_running: None,
                unsaved: Roles::default(),
            }),
            shared: Mutex::new(Shared {
                status: WifiStatus::default(),
                config: WirelessConfig::with_default_ap_ssid(ap_ssid),
            }),
            pending: AtomicBool::new(false),
            restored: AtomicBool::new(false),
            options,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of both roles. Never blocks on the radio.
    pub fn status(&self) -> WifiStatus {
        lock(&self.shared).status.clone()
    }

    /// SSID of the saved station network, if any.
    pub fn saved_network(&self) -> Option<String> {
        let shared = lock(&self.shared);
        shared
            .config
            .has_station_credentials()
            .then(|| shared.config.sta_ssid.clone())
    }

    /// Saved station network and password, if any.
    pub fn station_credentials(&self) -> Option<Credentials> {
        let shared = lock(&self.shared);
        shared.config.has_station_credentials().then(|| Credentials {
            ssid: shared.config.sta_ssid.clone(),
            password: shared.config.sta_password.clone(),
        })
    }

    /// Saved access point settings, without the password.
    pub fn access_point_config(&self) -> ApSummary {
        let shared = lock(&self.shared);
        ApSummary {
            ssid: shared.config.ap_ssid.clone(),
            open: shared.config.ap_is_open(),
        }
    }

    /// Saved access point SSID and password, for prefilling an editor.
    pub fn access_point_settings(&self) -> Credentials {
        let shared = lock(&self.shared);
        Credentials {
            ssid: shared.config.ap_ssid.clone(),
            password: shared.config.ap_password.clone(),
        }
    }

    // =========================================================================
    // Boot
    // =========================================================================

    /// Load the stored configuration and bring each enabled role back up.
    ///
    /// Both roles are restored independently: a failure in one never stops
    /// the other. Restoring does not write to the store.
    pub fn restore(&self) -> Result<WifiStatus, WifiError> {
        let _guard = self.begin()?;
        if self.restored.swap(true, Ordering::AcqRel) {
            return Err(WifiError::AlreadyRestored);
        }

        let mut hw = lock(&self.hardware);
        let mut config = self.config();
        let station_loaded = load_station(&hw.store, &mut config);
        let ap_loaded = load_access_point(&hw.store, &mut config);
        lock(&self.shared).config = config.clone();

        info!(
            "Restoring wireless state: sta={}, ap={}",
            config.sta_enabled, config.ap_enabled
        );

        match station_loaded {
            Err(e) => {
                error!("Station config unavailable: {}", e);
                self.set_station(StationStatus::Failed {
                    reason: CONFIG_UNAVAILABLE.to_string(),
                });
            }
            Ok(()) if config.sta_enabled => self.restore_station(&mut hw, &config),
            Ok(()) => {}
        }

        match ap_loaded {
            Err(e) => {
                error!("Access point config unavailable: {}", e);
                self.set_access_point(AccessPointStatus::Failed {
                    reason: CONFIG_UNAVAILABLE.to_string(),
                });
            }
            Ok(()) if config.ap_enabled => self.restore_access_point(&mut hw, &config),
            Ok(()) => {}
        }

        Ok(self.status())
    }

    fn restore_station(&self, hw: &mut Hardware<R, S>, config: &WirelessConfig) {
        if let Err(e) = self.activate_station(hw) {
            warn!("Station restore failed: {}", e);
            return;
        }
        if !config.has_station_credentials() {
            debug!("No saved network, station idle");
            return;
        }
        if let Err(e) = self.connect_station(hw, &config.sta_ssid, &config.sta_password, false) {
            warn!("Saved network {} unavailable: {}", config.sta_ssid, e);
        }
    }

    fn restore_access_point(&self, hw: &mut Hardware<R, S>, config: &WirelessConfig) {
        if config.ap_ssid.is_empty() {
            warn!("Access point enabled but no SSID stored");
            self.set_access_point(AccessPointStatus::Failed {
                reason: WifiError::NoSsid.reason(),
            });
            return;
        }
        if let Err(e) = validate_ap_password(&config.ap_password) {
            warn!("Stored access point password rejected: {}", e);
            self.set_access_point(AccessPointStatus::Failed {
                reason: WifiError::InvalidPassword.reason(),
            });
            return;
        }
        if let Err(e) = self.start_access_point(hw, &config.ap_ssid, &config.ap_password) {
            warn!("Access point restore failed: {}", e);
        }
    }

    // =========================================================================
    // Station role
    // =========================================================================

    /// Power up the station role. Lands in `Idle`; never auto-connects.
    pub fn sta_enable(&self) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);
        self.activate_station(&mut hw)?;
        self.persist(&mut hw, |c| c.sta_enabled = true)
    }

    /// Power down the station role, disconnecting first if associated.
    pub fn sta_disable(&self) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);

        if hw.sta_active {
            if self.station_connected() {
                match hw.radio.station_disconnect() {
                    Ok(()) => self.set_station(StationStatus::Disconnected),
                    Err(e) => warn!("Disconnect before disable failed: {}", e),
                }
            }
            if let Err(e) = hw.radio.station_deactivate() {
                let err = WifiError::from(e);
                warn!("Station disable failed: {}", err);
                self.set_station(StationStatus::Failed { reason: err.reason() });
                return Err(err);
            }
            hw.sta_active = false;
            info!("Station disabled");
        }

        self.set_station(StationStatus::Disabled);
        self.persist(&mut hw, |c| c.sta_enabled = false)
    }

    /// Scan for networks, strongest first.
    pub fn sta_scan(&self) -> Result<ScanResults, WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);
        if !hw.sta_active {
            return Err(WifiError::InterfaceDisabled);
        }

        let previous = self.status().station;
        if !previous.is_connected() {
            self.set_station(StationStatus::Scanning);
        }
        let scanned = hw.radio.station_scan();
        self.set_station(previous);

        let records = scanned.map_err(|e| {
            warn!("Scan failed: {}", e);
            WifiError::from(e)
        })?;
        debug!("Scan found {} networks", records.len());
        Ok(ScanResults::new(records))
    }

    /// Join a network and save it on success.
    ///
    /// A failed attempt leaves the previously saved network untouched.
    pub fn sta_connect(&self, ssid: &str, password: &str) -> Result<StationConnection, WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);
        self.connect_station(&mut hw, ssid, password, true)
    }

    /// Join the saved network.
    pub fn sta_connect_saved(&self) -> Result<StationConnection, WifiError> {
        let _guard = self.begin()?;
        let config = self.config();
        if !config.has_station_credentials() {
            return Err(WifiError::NoSavedCredentials);
        }
        let mut hw = lock(&self.hardware);
        self.connect_station(&mut hw, &config.sta_ssid, &config.sta_password, true)
    }

    /// Leave the current network. A no-op unless connected or failed.
    ///
    /// From `Failed` the radio is told to disconnect as well, since a failed
    /// disconnect may have left the link up.
    pub fn sta_disconnect(&self) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);
        if !hw.sta_active {
            return Err(WifiError::InterfaceDisabled);
        }

        match self.status().station {
            StationStatus::Connected { ssid, .. } => {
                self.disconnect_station(&mut hw)?;
                info!("Disconnected from {}", ssid);
            }
            StationStatus::Failed { .. } => self.disconnect_station(&mut hw)?,
            _ => {}
        }
        Ok(())
    }

    /// Erase the saved network, disconnecting if currently associated.
    pub fn sta_forget(&self) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);

        if hw.sta_active
            && matches!(
                self.status().station,
                StationStatus::Connected { .. } | StationStatus::Failed { .. }
            )
        {
            self.disconnect_station(&mut hw)?;
        }
        info!("Forgetting saved network");
        self.persist(&mut hw, WirelessConfig::clear_station_credentials)
    }

    /// Drop the current association.
    ///
    /// On failure the link state is unknown, so the status becomes `Failed`
    /// rather than staying `Connected`.
    fn disconnect_station(&self, hw: &mut Hardware<R, S>) -> Result<(), WifiError> {
        match hw.radio.station_disconnect() {
            Ok(()) => {
                self.set_station(StationStatus::Disconnected);
                Ok(())
            }
            Err(e) => {
                let err = WifiError::from(e);
                warn!("Disconnect failed: {}", err);
                self.set_station(StationStatus::Failed { reason: err.reason() });
                Err(err)
            }
        }
    }

    fn activate_station(&self, hw: &mut Hardware<R, S>) -> Result<(), WifiError> {
        if hw.sta_active {
            return Ok(());
        }

        self.set_station(StationStatus::Enabling);
        match hw.radio.station_activate() {
            Ok(()) => {
                hw.sta_active = true;
                self.set_station(StationStatus::Idle);
                info!("Station enabled");
                Ok(())
            }
            Err(e) => {
                let err = WifiError::from(e);
                warn!("Station enable failed: {}", err);
                self.set_station(StationStatus::Failed { reason: err.reason() });
                Err(err)
            }
        }
    }

    fn connect_station(
        &self,
        hw: &mut Hardware<R, S>,
        ssid: &str,
        password: &str,
        persist: bool,
    ) -> Result<StationConnection, WifiError> {
        validate_ssid(ssid)?;
        if !hw.sta_active {
            return Err(WifiError::InterfaceDisabled);
        }

        if self.station_connected() {
            if let Err(e) = hw.radio.station_disconnect() {
                warn!("Disconnect before reconnect failed: {}", e);
            }
        }

        self.set_station(StationStatus::Connecting {
            ssid: ssid.to_string(),
        });
        info!("Connecting to {}...", ssid);

        let link = match hw
            .radio
            .station_connect(ssid, password, self.options.connect_timeout)
        {
            Ok(link) => link,
            Err(e) => {
                let err = WifiError::from(e);
                warn!("Connection to {} failed: {}", ssid, err);
                if let Err(e) = hw.radio.station_disconnect() {
                    debug!("Cleanup disconnect failed: {}", e);
                }
                self.set_station(StationStatus::Failed { reason: err.reason() });
                return Err(err);
            }
        };

        info!("Connected to {}, IP: {}", ssid, link.ip);
        self.set_station(StationStatus::Connected {
            ssid: ssid.to_string(),
            ip: link.ip,
            rssi: link.rssi,
        });

        if persist {
            let saved_password = if link.security.is_open() { "" } else { password };
            self.persist(hw, |c| {
                c.sta_enabled = true;
                c.sta_ssid = ssid.to_string();
                c.sta_password = saved_password.to_string();
            })?;
        }

        Ok(StationConnection {
            ssid: ssid.to_string(),
            ip: link.ip,
            rssi: link.rssi,
        })
    }

    // =========================================================================
    // Access point role
    // =========================================================================

    /// Start the access point with the given or saved settings.
    ///
    /// Settings are validated before the radio is touched.
    pub fn ap_enable(
        &self,
        ssid: Option<&str>,
        password: Option<&str>,
    ) -> Result<AccessPointInfo, WifiError> {
        let _guard = self.begin()?;
        let config = self.config();
        let ssid = ssid.unwrap_or(&config.ap_ssid).to_string();
        let password = password.unwrap_or(&config.ap_password).to_string();

        if ssid.is_empty() {
            return Err(WifiError::NoSsid);
        }
        validate_ssid(&ssid)?;
        validate_ap_password(&password)?;

        let mut hw = lock(&self.hardware);
        let running = hw.ap_running.clone();
        let info = match running {
            Some((ref current_ssid, ref current_password))
                if *current_ssid == ssid && *current_password == password =>
            {
                AccessPointInfo {
                    ssid: ssid.clone(),
                    ip: AP_IP,
                    open: password.is_empty(),
                }
            }
            Some(_) => self.reconfigure_access_point(&mut hw, &ssid, &password)?,
            None => self.start_access_point(&mut hw, &ssid, &password)?,
        };

        self.persist(&mut hw, |c| {
            c.ap_enabled = true;
            c.ap_ssid = ssid.clone();
            c.ap_password = password.clone();
        })?;
        Ok(info)
    }

    /// Stop the access point. Attached clients are dropped.
    pub fn ap_disable(&self) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        let mut hw = lock(&self.hardware);

        if hw.ap_running.is_some() {
            hw.radio.ap_deactivate()?;
            hw.ap_running = None;
            info!("Access point disabled");
        }

        self.set_access_point(AccessPointStatus::Disabled);
        self.persist(&mut hw, |c| c.ap_enabled = false)
    }

    /// Change the saved access point settings.
    ///
    /// A running access point is restarted with the new settings. Observers
    /// see either the old or the new access point active, never a stopped
    /// one: if the new settings fail to start, the old ones are brought back.
    pub fn ap_set_config(&self, ssid: &str, password: &str) -> Result<(), WifiError> {
        let _guard = self.begin()?;
        validate_ssid(ssid)?;
        validate_ap_password(password)?;

        let mut hw = lock(&self.hardware);
        let unchanged = hw
            .ap_running
            .as_ref()
            .is_some_and(|(s, p)| s == ssid && p == password);
        if hw.ap_running.is_some() && !unchanged {
            self.reconfigure_access_point(&mut hw, ssid, password)?;
        }

        self.persist(&mut hw, |c| {
            c.ap_ssid = ssid.to_string();
            c.ap_password = password.to_string();
        })
    }

    /// Stations currently attached to the access point.
    ///
    /// Queries the radio on every call; empty when the AP is not running.
    pub fn ap_clients(&self) -> Result<Vec<ClientRecord>, WifiError> {
        let _guard = self.begin()?;
        let hw = lock(&self.hardware);
        if hw.ap_running.is_none() {
            return Ok(Vec::new());
        }

        let link = hw.radio.ap_link()?;
        self.update_client_count(link.clients.len());
        Ok(link.clients)
    }

    fn start_access_point(
        &self,
        hw: &mut Hardware<R, S>,
        ssid: &str,
        password: &str,
    ) -> Result<AccessPointInfo, WifiError> {
        self.set_access_point(AccessPointStatus::Enabling);
        match hw.radio.ap_activate(ssid, password) {
            Ok(()) => {
                hw.ap_running = Some((ssid.to_string(), password.to_string()));
                self.set_access_point(AccessPointStatus::Active {
                    ssid: ssid.to_string(),
                    ip: AP_IP,
                    client_count: 0,
                });
                info!(
                    "Access point {} up ({})",
                    ssid,
                    if password.is_empty() { "open" } else { "WPA2" }
                );
                Ok(AccessPointInfo {
                    ssid: ssid.to_string(),
                    ip: AP_IP,
                    open: password.is_empty(),
                })
            }
            Err(e) => {
                let err = WifiError::from(e);
                warn!("Access point start failed: {}", err);
                if let Err(e) = hw.radio.ap_deactivate() {
                    debug!("Cleanup deactivate failed: {}", e);
                }
                hw.ap_running = None;
                self.set_access_point(AccessPointStatus::Failed { reason: err.reason() });
                Err(err)
            }
        }
    }

    /// Restart a running AP with new settings, rolling back on failure.
    ///
    /// Status keeps showing the old `Active` until the new one is up.
    fn reconfigure_access_point(
        &self,
        hw: &mut Hardware<R, S>,
        ssid: &str,
        password: &str,
    ) -> Result<AccessPointInfo, WifiError> {
        let Some((old_ssid, old_password)) = hw.ap_running.clone() else {
            return self.start_access_point(hw, ssid, password);
        };

        info!("Restarting access point {} as {}", old_ssid, ssid);
        if let Err(e) = hw.radio.ap_deactivate() {
            warn!("Access point stop failed: {}", e);
        }

        let err = match hw.radio.ap_activate(ssid, password) {
            Ok(()) => {
                hw.ap_running = Some((ssid.to_string(), password.to_string()));
                self.set_access_point(AccessPointStatus::Active {
                    ssid: ssid.to_string(),
                    ip: AP_IP,
                    client_count: 0,
                });
                return Ok(AccessPointInfo {
                    ssid: ssid.to_string(),
                    ip: AP_IP,
                    open: password.is_empty(),
                });
            }
            Err(e) => WifiError::from(e),
        };

        warn!("New access point settings failed ({}), restoring {}", err, old_ssid);
        match hw.radio.ap_activate(&old_ssid, &old_password) {
            Ok(()) => {
                self.set_access_point(AccessPointStatus::Active {
                    ssid: old_ssid,
                    ip: AP_IP,
                    client_count: 0,
                });
            }
            Err(rollback) => {
                error!("Access point rollback failed: {}", rollback);
                hw.ap_running = None;
                self.set_access_point(AccessPointStatus::Failed { reason: err.reason() });
            }
        }
        Err(err)
    }

    // =========================================================================
    // Radio events
    // =========================================================================

    /// Apply unsolicited radio events (link loss, client changes).
    ///
    /// Call from the control loop between commands. Returns the number of
    /// events handled; skipped entirely while a command is in flight.
    pub fn process_radio_events(&self) -> usize {
        let Ok(_guard) = self.begin() else {
            return 0;
        };
        let mut hw = lock(&self.hardware);
        let events = hw.radio.take_events();

        for event in &events {
            match event {
                RadioEvent::StationLost { reason } => {
                    if self.station_connected() {
                        warn!("Station link lost: {}", reason);
                        self.set_station(StationStatus::Disconnected);
                    }
                }
                RadioEvent::ApClientsChanged { count } => {
                    debug!("Access point has {} clients", count);
                    self.update_client_count(*count);
                }
            }
        }
        events.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin(&self) -> Result<CommandGuard<'_>, WifiError> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                debug!("Command rejected, another is in flight");
                WifiError::RadioBusy
            })?;
        Ok(CommandGuard {
            pending: &self.pending,
        })
    }

    fn config(&self) -> WirelessConfig {
        lock(&self.shared).config.clone()
    }

    fn station_connected(&self) -> bool {
        lock(&self.shared).status.station.is_connected()
    }

    fn set_station(&self, status: StationStatus) {
        lock(&self.shared).status.station = status;
    }

    fn set_access_point(&self, status: AccessPointStatus) {
        lock(&self.shared).status.access_point = status;
    }

    fn update_client_count(&self, count: usize) {
        if let AccessPointStatus::Active { client_count, .. } =
            &mut lock(&self.shared).status.access_point
        {
            *client_count = count;
        }
    }

    /// Apply `update` to the config and write out the roles it changed.
    ///
    /// Only changed roles are written, so a role whose stored keys could not
    /// be read at boot keeps them until a command targets that role. The
    /// in-memory config is updated even when the write fails, and the
    /// failed roles are written again with the next change.
    fn persist<F>(&self, hw: &mut Hardware<R, S>, update: F) -> Result<(), WifiError>
    where
        F: FnOnce(&mut WirelessConfig),
    {
        let current = self.config();
        let mut next = current.clone();
        update(&mut next);
        let roles = Roles::changed(&current, &next).union(hw.unsaved);
        if !roles.any() {
            return Ok(());
        }

        let result = save_roles(&mut hw.store, &next, roles);
        hw.unsaved = if result.is_err() { roles } else { Roles::default() };
        lock(&self.shared).config = next;
        result.map_err(|e| {
            warn!("Failed to persist wireless config: {}", e);
            WifiError::from(e)
        })
    }
}
