//! Station credential seeding utility for ESP32.
//!
//! Writes a station network into the wireless config namespace in NVS and
//! enables the station role, so the next boot of the firmware joins it.
//! The access point settings already in NVS are left as they are.
//!
//! Usage:
//!   WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret" cargo configure-wifi
//!
//! For open networks (no password):
//!   WIFI_SSID="OpenNetwork" WIFI_PASSWORD="" cargo configure-wifi

/// Network SSID - set via WIFI_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

/// Network password - set via WIFI_PASSWORD environment variable at compile time.
/// Empty string for open networks.
#[cfg(feature = "esp32")]
const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use cardputer_wifi::config::{
        validate_ssid, ConfigError, KEY_STA_ENABLED, KEY_STA_PASSWORD, KEY_STA_SSID,
        MAX_PASSWORD_LEN,
    };
    use cardputer_wifi::store::{ConfigStore, NvsStore};
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== Cardputer WiFi Configuration ===\n");

    let ssid = match WIFI_SSID {
        Some(s) if !s.is_empty() => s,
        _ => {
            halt_with_error(
                "Error: WIFI_SSID environment variable not set at compile time.\n\n\
                 Usage:\n  \
                 WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi\n\n\
                 For open networks:\n  \
                 WIFI_SSID=\"OpenNetwork\" WIFI_PASSWORD=\"\" cargo configure-wifi",
            );
        }
    };
    let password = WIFI_PASSWORD.unwrap_or("");

    println!("SSID: {}", ssid);
    println!(
        "Password: {} ({} chars)",
        if password.is_empty() { "(none)" } else { "****" },
        password.len()
    );

    match validate_ssid(ssid) {
        Ok(()) => {}
        Err(ConfigError::SsidTooLong { len, max }) => {
            halt_with_error(&format!("Error: SSID too long ({} bytes, max {})", len, max));
        }
        Err(e) => halt_with_error(&format!("Error: {}", e)),
    }
    if password.len() > MAX_PASSWORD_LEN {
        halt_with_error(&format!(
            "Error: Password too long ({} bytes, max {})",
            password.len(),
            MAX_PASSWORD_LEN
        ));
    }

    let partition = match EspDefaultNvsPartition::take() {
        Ok(partition) => partition,
        Err(e) => halt_with_error(&format!("Error initializing NVS: {:?}", e)),
    };
    let mut store = match NvsStore::open(partition) {
        Ok(store) => store,
        Err(e) => halt_with_error(&format!("Error opening config namespace: {}", e)),
    };

    let result = store
        .set_bool(KEY_STA_ENABLED, true)
        .and_then(|()| store.set_str(KEY_STA_SSID, ssid))
        .and_then(|()| store.set_str(KEY_STA_PASSWORD, password))
        .and_then(|()| store.commit());
    match result {
        Ok(()) => {
            println!("\n=== Station network saved to NVS ===");
            println!("\nThe Cardputer will join {} on next boot.", ssid);
        }
        Err(e) => halt_with_error(&format!("Error saving to NVS: {}", e)),
    }

    println!("\n=== Done - you can disconnect the device ===\n");
    std::thread::sleep(std::time::Duration::from_secs(2));
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi");
    std::process::exit(1);
}
