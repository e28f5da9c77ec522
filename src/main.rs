//! Cardputer wireless manager firmware.
//!
//! Restores both radio roles at boot, then runs the serial console. On the
//! host it drives a simulated radio and keeps its config in a JSON file
//! (`CARDPUTER_WIFI_STORE` overrides the default path).

use cardputer_wifi::config::WifiOptions;
use cardputer_wifi::console::{execute, ConsoleCommand};
use cardputer_wifi::store::ConfigStore;
use cardputer_wifi::wifi::{RadioDriver, WifiManager};
use log::{error, info, warn};
use std::io::{BufRead, Write};

// ESP32: Initialize ESP-IDF before anything else
#[cfg(feature = "esp32")]
fn platform_init() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("ESP-IDF initialized");
}

// Host: Just initialize env_logger
#[cfg(not(feature = "esp32"))]
fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Print the prompt.
fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Restore saved state, then serve console commands until input ends.
fn run<R: RadioDriver, S: ConfigStore>(manager: WifiManager<R, S>) {
    match manager.restore() {
        Ok(status) => info!(
            "Restored: STA {}, AP {}",
            status.station, status.access_point
        ),
        Err(e) => error!("Restore failed: {}", e),
    }

    println!();
    println!("=== Cardputer WiFi ===");
    println!("Type 'help' for commands");
    println!();
    print_prompt();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        manager.process_radio_events();

        match lines.next() {
            Some(Ok(line)) => {
                for output in execute(&manager, &ConsoleCommand::parse(&line)) {
                    println!("{}", output);
                }
                print_prompt();
            }
            Some(Err(e)) => {
                warn!("Console read failed: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            // The device console never closes; keep polling radio events
            #[cfg(feature = "esp32")]
            None => std::thread::sleep(std::time::Duration::from_millis(100)),
            #[cfg(not(feature = "esp32"))]
            None => break,
        }
    }
}

#[cfg(feature = "esp32")]
fn main() {
    use cardputer_wifi::store::NvsStore;
    use cardputer_wifi::wifi::EspRadio;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    platform_init();

    let setup = || -> Result<_, String> {
        let peripherals = Peripherals::take().map_err(|e| e.to_string())?;
        let sysloop = EspSystemEventLoop::take().map_err(|e| e.to_string())?;
        let nvs = EspDefaultNvsPartition::take().map_err(|e| e.to_string())?;

        let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs.clone()))
            .map_err(|e| e.to_string())?;
        let store = NvsStore::open(nvs).map_err(|e| e.to_string())?;
        Ok(WifiManager::new(radio, store, WifiOptions::default()))
    };

    match setup() {
        Ok(manager) => run(manager),
        Err(e) => {
            error!("Wireless setup failed: {}", e);
            loop {
                std::thread::sleep(std::time::Duration::from_secs(10));
            }
        }
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    use cardputer_wifi::store::{FileStore, MemoryStore};
    use cardputer_wifi::wifi::SimulatedRadio;

    platform_init();

    let store = match std::env::var("CARDPUTER_WIFI_STORE") {
        Ok(path) => FileStore::open(path),
        Err(_) => FileStore::open_default(),
    };
    let radio = SimulatedRadio::demo();
    let options = WifiOptions::default();

    match store {
        Ok(store) => {
            info!("Config store: {:?}", store.path());
            run(WifiManager::new(radio, store, options));
        }
        Err(e) => {
            warn!("Config store unavailable ({}), settings will not persist", e);
            run(WifiManager::new(radio, MemoryStore::new(), options));
        }
    }
}
