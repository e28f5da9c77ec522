//! Serial console for driving the wireless manager.
//!
//! Stands in for the settings screen: each line typed on the serial port (or
//! stdin on the host) is parsed into a [`ConsoleCommand`] and run against the
//! manager, producing lines to print.
//!
//! # Commands
//!
//! - `status` - Show both roles and the saved settings
//! - `sta on|off` - Enable or disable the station role
//! - `scan` - List nearby networks
//! - `connect <ssid> [password]` - Join a network and save it
//! - `reconnect` - Join the saved network
//! - `disconnect` - Leave the current network
//! - `forget` - Erase the saved network
//! - `ap on [ssid] [password]` - Start the access point
//! - `ap off` - Stop the access point
//! - `ap set <ssid> [password]` - Change the access point settings
//! - `clients` - List stations attached to the access point
//! - `help` - Show available commands
//!
//! Double quotes group words, so `connect "Home Net" "my password"` works.
//!
//! # Example Session
//!
//! ```text
//! > sta on
//! Station enabled
//! > connect HomeNet pw123456
//! Connected to HomeNet (192.168.1.100)
//! > ap on Cardputer-AP
//! Access point Cardputer-AP up at 192.168.4.1 (open)
//! ```

use crate::store::ConfigStore;
use crate::wifi::{RadioDriver, WifiError, WifiManager};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    StationOn,
    StationOff,
    Scan,
    Connect { ssid: String, password: String },
    Reconnect,
    Disconnect,
    Forget,
    ApOn {
        ssid: Option<String>,
        password: Option<String>,
    },
    ApOff,
    ApSet { ssid: String, password: String },
    Clients,
    Help,
    /// Unknown or malformed command, with the message to show.
    Unknown(String),
}

/// Split a line into words, keeping double-quoted runs together.
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if quoted || !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err("Unterminated quote".to_string());
    }
    if quoted || !current.is_empty() {
        words.push(current);
    }
    Ok(words)
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let words = match tokenize(input.trim()) {
            Ok(words) => words,
            Err(msg) => return ConsoleCommand::Unknown(msg),
        };
        let Some((cmd, args)) = words.split_first() else {
            return ConsoleCommand::Unknown(String::new());
        };
        let arg = |i: usize| args.get(i).cloned();

        match cmd.to_lowercase().as_str() {
            "status" | "s" => ConsoleCommand::Status,
            "sta" => match args.first().map(|a| a.to_lowercase()).as_deref() {
                Some("on") => ConsoleCommand::StationOn,
                Some("off") => ConsoleCommand::StationOff,
                _ => ConsoleCommand::Unknown("Usage: sta on|off".to_string()),
            },
            "scan" => ConsoleCommand::Scan,
            "connect" | "c" => match arg(0) {
                Some(ssid) if args.len() <= 2 => ConsoleCommand::Connect {
                    ssid,
                    password: arg(1).unwrap_or_default(),
                },
                _ => ConsoleCommand::Unknown("Usage: connect <ssid> [password]".to_string()),
            },
            "reconnect" => ConsoleCommand::Reconnect,
            "disconnect" => ConsoleCommand::Disconnect,
            "forget" => ConsoleCommand::Forget,
            "ap" => match args.first().map(|a| a.to_lowercase()).as_deref() {
                Some("on") if args.len() <= 3 => ConsoleCommand::ApOn {
                    ssid: arg(1),
                    password: arg(2),
                },
                Some("off") => ConsoleCommand::ApOff,
                Some("set") if (2..=3).contains(&args.len()) => ConsoleCommand::ApSet {
                    ssid: args[1].clone(),
                    password: arg(2).unwrap_or_default(),
                },
                _ => ConsoleCommand::Unknown(
                    "Usage: ap on [ssid] [password] | ap off | ap set <ssid> [password]"
                        .to_string(),
                ),
            },
            "clients" => ConsoleCommand::Clients,
            "help" | "h" | "?" => ConsoleCommand::Help,
            _ => ConsoleCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  status                     Show both roles and saved settings
  sta on|off                 Enable or disable the station role
  scan                       List nearby networks
  connect <ssid> [password]  Join a network and save it
  reconnect                  Join the saved network
  disconnect                 Leave the current network
  forget                     Erase the saved network
  ap on [ssid] [password]    Start the access point
  ap off                     Stop the access point
  ap set <ssid> [password]   Change access point settings
  clients                    List attached stations
  help                       Show this help

Use double quotes for names with spaces: connect "Home Net" secret123
"#;

/// Render a 1-4 bar signal meter.
fn meter(bars: u8) -> String {
    let bars = usize::from(bars.min(4));
    format!("[{}{}]", "#".repeat(bars), ".".repeat(4 - bars))
}

fn error_line(e: &WifiError) -> String {
    format!("Error: {}", e)
}

/// Run a command and return the lines to print.
pub fn execute<R: RadioDriver, S: ConfigStore>(
    manager: &WifiManager<R, S>,
    command: &ConsoleCommand,
) -> Vec<String> {
    let done = |result: Result<(), WifiError>, ok: &str| match result {
        Ok(()) => vec![ok.to_string()],
        Err(e) => vec![error_line(&e)],
    };

    match command {
        ConsoleCommand::Status => status_lines(manager),
        ConsoleCommand::StationOn => done(manager.sta_enable(), "Station enabled"),
        ConsoleCommand::StationOff => done(manager.sta_disable(), "Station disabled"),
        ConsoleCommand::Scan => match manager.sta_scan() {
            Ok(results) if results.len() == 0 => vec!["No networks found".to_string()],
            Ok(results) => {
                let mut lines = vec![format!("{} networks:", results.len())];
                lines.extend(results.map(|entry| {
                    format!(
                        "  {} {:<32} {:>4} dBm  {}",
                        meter(entry.bars),
                        entry.ssid,
                        entry.rssi,
                        entry.security
                    )
                }));
                lines
            }
            Err(e) => vec![error_line(&e)],
        },
        ConsoleCommand::Connect { ssid, password } => {
            connection_lines(manager.sta_connect(ssid, password))
        }
        ConsoleCommand::Reconnect => connection_lines(manager.sta_connect_saved()),
        ConsoleCommand::Disconnect => done(manager.sta_disconnect(), "Disconnected"),
        ConsoleCommand::Forget => done(manager.sta_forget(), "Saved network forgotten"),
        ConsoleCommand::ApOn { ssid, password } => {
            match manager.ap_enable(ssid.as_deref(), password.as_deref()) {
                Ok(info) => vec![format!(
                    "Access point {} up at {} ({})",
                    info.ssid,
                    info.ip,
                    if info.open { "open" } else { "WPA2" }
                )],
                Err(e) => vec![error_line(&e)],
            }
        }
        ConsoleCommand::ApOff => done(manager.ap_disable(), "Access point disabled"),
        ConsoleCommand::ApSet { ssid, password } => done(
            manager.ap_set_config(ssid, password),
            "Access point settings saved",
        ),
        ConsoleCommand::Clients => match manager.ap_clients() {
            Ok(clients) => {
                let mut lines = vec![format!("{} clients", clients.len())];
                lines.extend(
                    clients
                        .iter()
                        .map(|c| format!("  {}  {:>4} dBm", c.mac_string(), c.rssi)),
                );
                lines
            }
            Err(e) => vec![error_line(&e)],
        },
        ConsoleCommand::Help => HELP_TEXT.trim().lines().map(str::to_string).collect(),
        ConsoleCommand::Unknown(msg) if msg.is_empty() => Vec::new(),
        ConsoleCommand::Unknown(msg) => vec![msg.clone()],
    }
}

fn connection_lines(
    result: Result<crate::wifi::StationConnection, WifiError>,
) -> Vec<String> {
    match result {
        Ok(connection) => vec![format!(
            "Connected to {} ({})",
            connection.ssid, connection.ip
        )],
        Err(e) => vec![error_line(&e)],
    }
}

fn status_lines<R: RadioDriver, S: ConfigStore>(manager: &WifiManager<R, S>) -> Vec<String> {
    let status = manager.status();
    let ap = manager.access_point_settings();
    let ap_password = if ap.is_open() {
        "open".to_string()
    } else {
        format!("password {}", ap.masked_password())
    };

    vec![
        format!("STA: {}", status.station),
        format!(
            "     saved: {}",
            manager.saved_network().as_deref().unwrap_or("(none)")
        ),
        format!("AP:  {}", status.access_point),
        format!(
            "     config: {} / {}",
            if ap.ssid.is_empty() { "(no ssid)" } else { ap.ssid.as_str() },
            ap_password
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WifiOptions;
    use crate::store::MemoryStore;
    use crate::wifi::{SimNetwork, SimulatedRadio};

    fn manager() -> WifiManager<SimulatedRadio, MemoryStore> {
        let radio = SimulatedRadio::with_networks(vec![
            SimNetwork::secured("Home Net", "pw123456", -48),
            SimNetwork::open("CoffeeShop", -71),
        ]);
        let manager = WifiManager::new(radio, MemoryStore::new(), WifiOptions::default());
        manager.restore().unwrap();
        manager
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ConsoleCommand::parse("status"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("  STA on "), ConsoleCommand::StationOn);
        assert_eq!(ConsoleCommand::parse("sta off"), ConsoleCommand::StationOff);
        assert_eq!(ConsoleCommand::parse("ap off"), ConsoleCommand::ApOff);
        assert_eq!(ConsoleCommand::parse("?"), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("reconnect"), ConsoleCommand::Reconnect);
    }

    #[test]
    fn test_parse_quoted_arguments() {
        assert_eq!(
            ConsoleCommand::parse(r#"connect "Home Net" "my secret""#),
            ConsoleCommand::Connect {
                ssid: "Home Net".into(),
                password: "my secret".into(),
            }
        );
        assert_eq!(
            ConsoleCommand::parse(r#"ap on Cardputer-AP """#),
            ConsoleCommand::ApOn {
                ssid: Some("Cardputer-AP".into()),
                password: Some(String::new()),
            }
        );
    }

    #[test]
    fn test_parse_optional_arguments() {
        assert_eq!(
            ConsoleCommand::parse("connect CoffeeShop"),
            ConsoleCommand::Connect {
                ssid: "CoffeeShop".into(),
                password: String::new(),
            }
        );
        assert_eq!(
            ConsoleCommand::parse("ap on"),
            ConsoleCommand::ApOn {
                ssid: None,
                password: None,
            }
        );
        assert_eq!(
            ConsoleCommand::parse("ap set NewName"),
            ConsoleCommand::ApSet {
                ssid: "NewName".into(),
                password: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConsoleCommand::parse("connect"),
            ConsoleCommand::Unknown(msg) if msg.starts_with("Usage")
        ));
        assert!(matches!(
            ConsoleCommand::parse("sta maybe"),
            ConsoleCommand::Unknown(msg) if msg.starts_with("Usage")
        ));
        assert!(matches!(
            ConsoleCommand::parse(r#"connect "Home"#),
            ConsoleCommand::Unknown(msg) if msg == "Unterminated quote"
        ));
        assert!(matches!(
            ConsoleCommand::parse("reboot"),
            ConsoleCommand::Unknown(msg) if msg.contains("reboot")
        ));
        assert_eq!(
            ConsoleCommand::parse("   "),
            ConsoleCommand::Unknown(String::new())
        );
    }

    // ==================== Execution Tests ====================

    #[test]
    fn test_execute_connect_flow() {
        let manager = manager();
        let run = |line: &str| execute(&manager, &ConsoleCommand::parse(line));

        assert_eq!(run("connect CoffeeShop"), vec!["Error: interface disabled"]);
        assert_eq!(run("sta on"), vec!["Station enabled"]);
        assert_eq!(
            run(r#"connect "Home Net" pw123456"#),
            vec!["Connected to Home Net (192.168.1.100)"]
        );
        assert_eq!(run("connect \"Home Net\" wrong"), vec!["Error: auth failed"]);

        let status = run("status");
        assert_eq!(status[0], "STA: failed: auth failed");
        assert_eq!(status[1], "     saved: Home Net");
    }

    #[test]
    fn test_execute_scan() {
        let manager = manager();
        execute(&manager, &ConsoleCommand::StationOn);
        let lines = execute(&manager, &ConsoleCommand::Scan);
        assert_eq!(lines[0], "2 networks:");
        assert!(lines[1].starts_with("  [####] Home Net"));
        assert!(lines[1].ends_with("WPA2"));
        assert!(lines[2].starts_with("  [#...] CoffeeShop"));
        assert!(lines[2].ends_with("open"));
    }

    #[test]
    fn test_execute_access_point() {
        let manager = manager();
        let run = |line: &str| execute(&manager, &ConsoleCommand::parse(line));

        assert_eq!(run("ap on Cardputer-AP short"), vec!["Error: invalid password"]);
        assert_eq!(
            run("ap on Cardputer-AP"),
            vec!["Access point Cardputer-AP up at 192.168.4.1 (open)"]
        );
        assert_eq!(run("clients"), vec!["0 clients"]);
        assert_eq!(run("ap set Renamed longpassword"), vec!["Access point settings saved"]);

        let status = run("status");
        assert_eq!(status[2], "AP:  active Renamed (192.168.4.1, 0 clients)");
        assert_eq!(status[3], "     config: Renamed / password ************");
        assert_eq!(run("ap off"), vec!["Access point disabled"]);
    }

    #[test]
    fn test_execute_help_and_unknown() {
        let manager = manager();
        let help = execute(&manager, &ConsoleCommand::Help);
        assert!(help.iter().any(|l| l.contains("connect <ssid>")));
        assert!(execute(&manager, &ConsoleCommand::parse("")).is_empty());
    }

    #[test]
    fn test_meter() {
        assert_eq!(meter(4), "[####]");
        assert_eq!(meter(2), "[##..]");
        assert_eq!(meter(1), "[#...]");
    }
}
