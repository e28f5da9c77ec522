//! Simulated radio for host builds and tests.
//!
//! Behaves like a single radio with independent station and access point
//! roles: scripted networks can be scanned and joined, clients can join the
//! access point, and faults can be injected. Clones share state, so a test
//! can keep a handle to inspect the hardware after giving the radio away.

use super::radio::{
    AccessPointLink, ClientRecord, RadioDriver, RadioError, RadioEvent, ScanRecord, Security,
    StationLink,
};
use crate::config::AP_IP;
use std::net::Ipv4Addr;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// MAC address of the simulated radio.
pub const SIM_MAC: [u8; 6] = [0x24, 0x0a, 0xc4, 0x12, 0x1a, 0x2b];

/// A network the simulated station can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNetwork {
    pub ssid: String,
    pub password: String,
    pub rssi: i8,
    pub security: Security,
    /// When false, connects run into the timeout.
    pub reachable: bool,
}

impl SimNetwork {
    /// A WPA2 network.
    pub fn secured(ssid: &str, password: &str, rssi: i8) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
            rssi,
            security: Security::Wpa2,
            reachable: true,
        }
    }

    /// An open network.
    pub fn open(ssid: &str, rssi: i8) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: String::new(),
            rssi,
            security: Security::Open,
            reachable: true,
        }
    }

    /// Make connects to this network time out.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }
}

/// Handle for holding a station connect in flight.
///
/// Returned by [`SimulatedRadio::hold_next_connect`]. The connect signals
/// `wait_entered` once it is running and blocks until `release`.
pub struct ConnectGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl ConnectGate {
    /// Block until the held connect has started.
    pub fn wait_entered(&self) {
        let _ = self.entered.recv();
    }

    /// Let the held connect finish.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

struct HeldConnect {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
struct SimState {
    networks: Vec<SimNetwork>,
    sta_active: bool,
    ap_active: bool,
    ap_settings: Option<(String, String)>,
    link: Option<StationLink>,
    clients: Vec<ClientRecord>,
    events: Vec<RadioEvent>,
    operations: Vec<&'static str>,
    fail_station_activate: bool,
    fail_station_deactivate: bool,
    fail_station_disconnect: bool,
    failing_ap_activations: usize,
    fail_scan: bool,
    held_connect: Option<HeldConnect>,
}

/// Shared simulated radio.
#[derive(Clone, Default)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedRadio {
    /// Radio with no networks in range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Radio seeing `networks`.
    pub fn with_networks(networks: Vec<SimNetwork>) -> Self {
        let radio = Self::new();
        radio.state().networks = networks;
        radio
    }

    /// A small neighbourhood for interactive use.
    pub fn demo() -> Self {
        Self::with_networks(vec![
            SimNetwork::secured("HomeNet", "pw123456", -48),
            SimNetwork::secured("Office", "correct-horse", -63),
            SimNetwork::open("CoffeeShop", -71),
            SimNetwork::secured("Basement", "password1", -85).unreachable(),
        ])
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- fault injection & scripted events ----

    /// Make station activation fail.
    pub fn fail_station_activate(&self, fail: bool) {
        self.state().fail_station_activate = fail;
    }

    /// Make station deactivation fail, leaving the role powered.
    pub fn fail_station_deactivate(&self, fail: bool) {
        self.state().fail_station_deactivate = fail;
    }

    /// Make station disconnects fail, leaving any association up.
    pub fn fail_station_disconnect(&self, fail: bool) {
        self.state().fail_station_disconnect = fail;
    }

    /// Make the next `count` access point starts fail.
    pub fn fail_ap_activations(&self, count: usize) {
        self.state().failing_ap_activations = count;
    }

    /// Make scans fail.
    pub fn fail_scan(&self, fail: bool) {
        self.state().fail_scan = fail;
    }

    /// Block the next station connect until the returned gate is released.
    pub fn hold_next_connect(&self) -> ConnectGate {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        self.state().held_connect = Some(HeldConnect {
            entered: entered_tx,
            release: release_rx,
        });
        ConnectGate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    /// Drop the station association as if the network went away.
    pub fn drop_station_link(&self, reason: &str) {
        let mut state = self.state();
        if state.link.take().is_some() {
            state.events.push(RadioEvent::StationLost {
                reason: reason.to_string(),
            });
        }
    }

    /// Attach a client to the access point. Ignored when the AP is off.
    pub fn join_client(&self, mac: [u8; 6], rssi: i8) {
        let mut state = self.state();
        if !state.ap_active {
            return;
        }
        state.clients.push(ClientRecord { mac, rssi });
        let count = state.clients.len();
        state.events.push(RadioEvent::ApClientsChanged { count });
    }

    /// Detach a client from the access point.
    pub fn leave_client(&self, mac: [u8; 6]) {
        let mut state = self.state();
        state.clients.retain(|c| c.mac != mac);
        let count = state.clients.len();
        state.events.push(RadioEvent::ApClientsChanged { count });
    }

    // ---- inspection ----

    /// Whether the station role is powered.
    pub fn station_active(&self) -> bool {
        self.state().sta_active
    }

    /// Whether the access point role is powered.
    pub fn ap_active(&self) -> bool {
        self.state().ap_active
    }

    /// SSID and password the access point was last started with.
    pub fn ap_settings(&self) -> Option<(String, String)> {
        self.state().ap_settings.clone()
    }

    /// Names of driver calls made so far.
    pub fn operations(&self) -> Vec<&'static str> {
        self.state().operations.clone()
    }

    /// Forget the recorded driver calls.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }
}

impl RadioDriver for SimulatedRadio {
    fn mac_address(&self) -> Result<[u8; 6], RadioError> {
        Ok(SIM_MAC)
    }

    fn station_activate(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.operations.push("station_activate");
        if state.fail_station_activate {
            return Err(RadioError::Driver("station start failed".to_string()));
        }
        state.sta_active = true;
        Ok(())
    }

    fn station_deactivate(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.operations.push("station_deactivate");
        if state.fail_station_deactivate {
            return Err(RadioError::Driver("station stop failed".to_string()));
        }
        state.sta_active = false;
        state.link = None;
        Ok(())
    }

    fn station_connect(
        &mut self,
        ssid: &str,
        password: &str,
        _timeout: Duration,
    ) -> Result<StationLink, RadioError> {
        let held = {
            let mut state = self.state();
            state.operations.push("station_connect");
            if !state.sta_active {
                return Err(RadioError::NotActive);
            }
            state.held_connect.take()
        };

        // Wait outside the lock so observers can keep inspecting the radio
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.recv();
        }

        let mut state = self.state();
        let (index, network) = state
            .networks
            .iter()
            .enumerate()
            .find(|(_, n)| n.ssid == ssid)
            .map(|(i, n)| (i, n.clone()))
            .ok_or(RadioError::NotFound)?;

        if !network.reachable {
            return Err(RadioError::Timeout);
        }
        if !network.security.is_open() && network.password != password {
            return Err(RadioError::AuthRejected);
        }

        let link = StationLink {
            ssid: network.ssid,
            ip: Ipv4Addr::new(192, 168, 1, 100 + index as u8),
            rssi: network.rssi,
            security: network.security,
        };
        state.link = Some(link.clone());
        Ok(link)
    }

    fn station_disconnect(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.operations.push("station_disconnect");
        if state.fail_station_disconnect {
            return Err(RadioError::Driver("disconnect failed".to_string()));
        }
        state.link = None;
        Ok(())
    }

    fn station_scan(&mut self) -> Result<Vec<ScanRecord>, RadioError> {
        let mut state = self.state();
        state.operations.push("station_scan");
        if !state.sta_active {
            return Err(RadioError::NotActive);
        }
        if state.fail_scan {
            return Err(RadioError::Driver("scan aborted".to_string()));
        }
        Ok(state
            .networks
            .iter()
            .map(|n| ScanRecord {
                ssid: n.ssid.clone(),
                rssi: n.rssi,
                security: n.security,
            })
            .collect())
    }

    fn station_link(&self) -> Result<Option<StationLink>, RadioError> {
        Ok(self.state().link.clone())
    }

    fn ap_activate(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let mut state = self.state();
        state.operations.push("ap_activate");
        if state.failing_ap_activations > 0 {
            state.failing_ap_activations -= 1;
            return Err(RadioError::Driver("ap start failed".to_string()));
        }
        state.ap_active = true;
        state.ap_settings = Some((ssid.to_string(), password.to_string()));
        state.clients.clear();
        Ok(())
    }

    fn ap_deactivate(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.operations.push("ap_deactivate");
        state.ap_active = false;
        state.clients.clear();
        Ok(())
    }

    fn ap_link(&self) -> Result<AccessPointLink, RadioError> {
        let state = self.state();
        if !state.ap_active {
            return Err(RadioError::NotActive);
        }
        Ok(AccessPointLink {
            ip: AP_IP,
            clients: state.clients.clone(),
        })
    }

    fn take_events(&mut self) -> Vec<RadioEvent> {
        std::mem::take(&mut self.state().events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_independent() {
        let mut radio = SimulatedRadio::new();
        radio.station_activate().unwrap();
        radio.ap_activate("ap", "").unwrap();
        radio.station_deactivate().unwrap();
        assert!(radio.ap_active());
        radio.station_activate().unwrap();
        radio.ap_deactivate().unwrap();
        assert!(radio.station_active());
    }

    #[test]
    fn test_connect_outcomes() {
        let mut radio = SimulatedRadio::with_networks(vec![
            SimNetwork::secured("HomeNet", "pw123456", -48),
            SimNetwork::open("Cafe", -70),
            SimNetwork::secured("Far", "password1", -90).unreachable(),
        ]);
        let timeout = Duration::from_secs(1);
        assert_eq!(
            radio.station_connect("HomeNet", "pw123456", timeout),
            Err(RadioError::NotActive)
        );
        radio.station_activate().unwrap();

        assert_eq!(
            radio.station_connect("HomeNet", "wrong", timeout),
            Err(RadioError::AuthRejected)
        );
        assert_eq!(
            radio.station_connect("Nowhere", "", timeout),
            Err(RadioError::NotFound)
        );
        assert_eq!(
            radio.station_connect("Far", "password1", timeout),
            Err(RadioError::Timeout)
        );
        let cafe = radio.station_connect("Cafe", "ignored", timeout).unwrap();
        assert_eq!(cafe.security, Security::Open);

        let link = radio.station_connect("HomeNet", "pw123456", timeout).unwrap();
        assert_eq!(link.ssid, "HomeNet");
        assert_eq!(radio.station_link().unwrap(), Some(link));
    }

    #[test]
    fn test_client_events() {
        let mut radio = SimulatedRadio::new();
        radio.join_client([1, 2, 3, 4, 5, 6], -40);
        assert!(radio.take_events().is_empty());

        radio.ap_activate("ap", "").unwrap();
        radio.join_client([1, 2, 3, 4, 5, 6], -40);
        assert_eq!(
            radio.take_events(),
            vec![RadioEvent::ApClientsChanged { count: 1 }]
        );
        assert_eq!(radio.ap_link().unwrap().clients.len(), 1);

        radio.ap_deactivate().unwrap();
        assert!(radio.ap_link().is_err());
    }
}
